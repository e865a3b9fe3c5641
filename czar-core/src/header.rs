use std::path::Path;

use crate::unit::Declaration;

/// Includes every generated header starts with.
pub const PREAMBLE: &[&str] = &["<stddef.h>", "<stdint.h>", "<stdbool.h>"];

/// Include-guard macro for a unit, derived from its root-relative path.
pub fn guard_name(relative: &Path) -> String {
    let stem = relative.with_extension("");
    let mut guard = String::from("CZAR_");
    for ch in stem.to_string_lossy().chars() {
        if ch.is_ascii_alphanumeric() {
            guard.push(ch.to_ascii_uppercase());
        } else {
            guard.push('_');
        }
    }
    guard.push_str("_H");
    guard
}

/// Render the header for one unit.
///
/// Output depends only on the arguments, so identical declaration lists
/// always produce identical bytes.
pub fn synthesize_header(guard: &str, declarations: &[Declaration]) -> String {
    let mut out = String::new();
    out.push_str("/* Generated by czar. Do not edit. */\n");
    out.push_str(&format!("#ifndef {guard}\n#define {guard}\n\n"));
    for include in PREAMBLE {
        out.push_str(&format!("#include {include}\n"));
    }
    if !declarations.is_empty() {
        out.push('\n');
    }
    for decl in declarations {
        out.push_str(&decl.prototype());
        out.push('\n');
    }
    out.push_str(&format!("\n#endif /* {guard} */\n"));
    out
}
