//! Implicit visibility between units that share a directory.
//!
//! A directory acts as a module: every unit sees the generated headers of
//! all its siblings without an import marker.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};

use crate::import::quoted_include;
use crate::unit::TranslationUnit;

/// Header file names of every other unit in the same directory as
/// `units[index]`, in sorted order.
pub fn sibling_headers(units: &[TranslationUnit], index: usize) -> BTreeSet<String> {
    let Some(unit) = units.get(index) else {
        return BTreeSet::new();
    };
    let own = unit.header_file_name();
    units
        .iter()
        .enumerate()
        .filter(|(i, other)| *i != index && other.directory() == unit.directory())
        .map(|(_, other)| other.header_file_name())
        .filter(|name| *name != own)
        .collect()
}

/// Insert `#include "<sibling>"` lines for every sibling header not
/// already included.
///
/// The includes go right after the unit's own `#include "<own_header>"`
/// when there is one, otherwise after the leading block of blank lines,
/// comments and preprocessor lines. A conditional block still open where
/// that block ends is not entered; the includes go ahead of it.
pub fn inject_siblings(text: &[u8], own_header: &str, siblings: &BTreeSet<String>) -> Vec<u8> {
    let lines: Vec<Cow<'_, str>> = text
        .split_inclusive(|&b| b == b'\n')
        .map(String::from_utf8_lossy)
        .collect();
    let present: HashSet<&str> = lines.iter().filter_map(|line| quoted_include(line)).collect();
    let missing: Vec<&String> = siblings
        .iter()
        .filter(|name| name.as_str() != own_header && !present.contains(name.as_str()))
        .collect();
    if missing.is_empty() {
        return text.to_vec();
    }

    let insert_at = lines
        .iter()
        .position(|line| quoted_include(line) == Some(own_header))
        .map(|index| index + 1)
        .unwrap_or_else(|| prologue_len(&lines));

    let mut raw_lines = text.split_inclusive(|&b| b == b'\n');
    let mut out = Vec::with_capacity(text.len() + missing.len() * 24);
    for line in raw_lines.by_ref().take(insert_at) {
        out.extend_from_slice(line);
    }
    if out.last().is_some_and(|&b| b != b'\n') {
        out.push(b'\n');
    }
    for name in missing {
        out.extend_from_slice(format!("#include \"{name}\"\n").as_bytes());
    }
    for line in raw_lines {
        out.extend_from_slice(line);
    }
    out
}

/// Number of leading lines that are blank, comments or preprocessor
/// directives, cut back to the first `#if` that is still open there.
fn prologue_len(lines: &[Cow<'_, str>]) -> usize {
    let mut in_comment = false;
    let mut continued = false;
    let mut open_conditionals: Vec<usize> = Vec::new();
    let mut end = lines.len();

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if in_comment {
            in_comment = !trimmed.contains("*/");
            continue;
        }
        if continued {
            continued = trimmed.ends_with('\\');
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        if let Some(directive) = trimmed.strip_prefix('#') {
            let keyword = directive
                .trim_start()
                .split(|c: char| !c.is_ascii_alphanumeric())
                .next()
                .unwrap_or_default();
            match keyword {
                "if" | "ifdef" | "ifndef" => open_conditionals.push(index),
                "endif" => {
                    open_conditionals.pop();
                }
                _ => {}
            }
            continued = trimmed.ends_with('\\');
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("/*") {
            match rest.find("*/") {
                None => in_comment = true,
                Some(close) if rest[close + 2..].trim().is_empty() => {}
                Some(_) => {
                    end = index;
                    break;
                }
            }
            continue;
        }
        end = index;
        break;
    }

    open_conditionals.first().copied().unwrap_or(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn inject(text: &str, own_header: &str, siblings: &BTreeSet<String>) -> String {
        String::from_utf8(inject_siblings(text.as_bytes(), own_header, siblings)).expect("utf8")
    }

    fn units(paths: &[&str]) -> Vec<TranslationUnit> {
        let root = Path::new("/project");
        paths
            .iter()
            .map(|p| TranslationUnit::new(root, PathBuf::from("/project").join(p)))
            .collect()
    }

    #[test]
    fn siblings_exclude_self_and_other_directories() {
        let units = units(&["a.cz", "b.cz", "c.cz", "net/d.cz"]);
        assert_eq!(sibling_headers(&units, 1), set(&["a.h", "c.h"]));
        assert!(sibling_headers(&units, 3).is_empty());
    }

    #[test]
    fn injects_after_prologue() {
        let text = "/* math\n * helpers */\n#include <stdio.h>\n#define TWO \\\n  2\n\nint main(void) { return add(1, 1); }\n";
        let out = inject(text, "main.h", &set(&["math.h", "io.h"]));
        assert_eq!(
            out,
            "/* math\n * helpers */\n#include <stdio.h>\n#define TWO \\\n  2\n\n#include \"io.h\"\n#include \"math.h\"\nint main(void) { return add(1, 1); }\n"
        );
    }

    #[test]
    fn injects_after_self_include() {
        let text = "#include \"main.h\"\n#include <stdio.h>\nint main(void) { return 0; }\n";
        let out = inject(text, "main.h", &set(&["a.h"]));
        assert_eq!(
            out,
            "#include \"main.h\"\n#include \"a.h\"\n#include <stdio.h>\nint main(void) { return 0; }\n"
        );
    }

    #[test]
    fn injection_is_idempotent() {
        let text = "int b(void) { return a(); }\n";
        let siblings = set(&["a.h", "c.h"]);
        let once = inject(text, "b.h", &siblings);
        let twice = inject(&once, "b.h", &siblings);
        assert_eq!(once, "#include \"a.h\"\n#include \"c.h\"\nint b(void) { return a(); }\n");
        assert_eq!(once, twice);
    }

    #[test]
    fn never_includes_own_header() {
        let out = inject("int a(void) { return 0; }\n", "a.h", &set(&["a.h"]));
        assert_eq!(out, "int a(void) { return 0; }\n");
    }

    #[test]
    fn prologue_only_text_gets_includes_appended() {
        let out = inject("// nothing here", "x.h", &set(&["y.h"]));
        assert_eq!(out, "// nothing here\n#include \"y.h\"\n");
    }

    #[test]
    fn includes_stay_outside_an_open_conditional() {
        let text = "#include <stdio.h>\n#if 1\nint main(void) { return add(1, 1); }\n#endif\n";
        assert_eq!(
            inject(text, "main.h", &set(&["a.h"])),
            "#include <stdio.h>\n#include \"a.h\"\n#if 1\nint main(void) { return add(1, 1); }\n#endif\n"
        );

        let nested = "#ifndef NO_MAIN\n#ifdef DEBUG\n#include <assert.h>\n#endif\nint main(void) { return 0; }\n#endif\nint other(void) { return add(1, 2); }\n";
        assert!(inject(nested, "main.h", &set(&["a.h"])).starts_with("#include \"a.h\"\n#ifndef NO_MAIN\n"));
    }

    #[test]
    fn closed_conditional_stays_in_the_prologue() {
        let text = "#ifdef DEBUG\n#include <assert.h>\n#endif\nint main(void) { return 0; }\n";
        assert_eq!(
            inject(text, "main.h", &set(&["a.h"])),
            "#ifdef DEBUG\n#include <assert.h>\n#endif\n#include \"a.h\"\nint main(void) { return 0; }\n"
        );
    }

    #[test]
    fn non_utf8_text_is_preserved_around_injected_includes() {
        let text = b"/* caf\xe9 */\nint b(void) { return a(); }\n";
        let out = inject_siblings(text, "b.h", &set(&["a.h"]));
        assert_eq!(out, b"/* caf\xe9 */\n#include \"a.h\"\nint b(void) { return a(); }\n");
    }
}
