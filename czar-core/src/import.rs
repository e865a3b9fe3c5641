//! Expansion of `// @import "dir"` markers into concrete includes.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::unit::{HEADER_EXTENSION, ImportDirective, SOURCE_EXTENSION};

/// Token that introduces an import marker inside a line comment.
pub const IMPORT_TOKEN: &str = "@import";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerLine<'a> {
    /// Not an import marker.
    Plain,
    /// Well-formed marker naming a directory.
    Import(&'a str),
    /// Carries the token but no usable quoted path.
    Malformed,
}

/// Classify one line of C text.
pub fn parse_import_marker(line: &str) -> MarkerLine<'_> {
    let Some(comment) = line.trim_start().strip_prefix("//") else {
        return MarkerLine::Plain;
    };
    let Some(rest) = comment.trim_start().strip_prefix(IMPORT_TOKEN) else {
        return MarkerLine::Plain;
    };
    if !rest.starts_with([' ', '\t']) {
        return if rest.trim().is_empty() {
            MarkerLine::Malformed
        } else {
            MarkerLine::Plain
        };
    }
    let Some(quoted) = rest.trim_start().strip_prefix('"') else {
        return MarkerLine::Malformed;
    };
    match quoted.find('"') {
        Some(end) if end > 0 => MarkerLine::Import(&quoted[..end]),
        _ => MarkerLine::Malformed,
    }
}

/// Generated headers directly inside `dir`, sorted by file name.
///
/// A header counts as generated when a source unit with the same stem sits
/// next to it. A missing directory yields an empty list.
pub fn list_generated_headers(dir: &Path) -> io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut headers = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == HEADER_EXTENSION)
            && path.with_extension(SOURCE_EXTENSION).is_file()
        {
            if let Some(name) = path.file_name() {
                headers.push(name.to_string_lossy().into_owned());
            }
        }
    }
    Ok(headers)
}

/// Target of a quoted `#include "..."` line, if the line is one.
pub fn quoted_include(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('#')?;
    let rest = rest.trim_start().strip_prefix("include")?;
    let rest = rest.trim_start().strip_prefix('"')?;
    rest.find('"').map(|end| &rest[..end])
}

/// Replace every import marker in `text` with includes for the generated
/// headers of the named directory.
///
/// Paths are resolved against `unit_dir`; `own_header` is never included.
/// Text without markers comes back unchanged, so running this over its own
/// output is a no-op. Lines that are not valid UTF-8 are never markers and
/// are copied through as they are.
pub fn expand_imports(
    text: &[u8],
    unit_dir: &Path,
    own_header: &str,
) -> io::Result<(Vec<u8>, Vec<ImportDirective>)> {
    let mut seen: HashSet<String> = text
        .split(|&b| b == b'\n')
        .filter_map(|line| std::str::from_utf8(line).ok())
        .filter_map(quoted_include)
        .map(str::to_string)
        .collect();
    let mut out = Vec::with_capacity(text.len());
    let mut directives = Vec::new();

    for (index, line) in text.split_inclusive(|&b| b == b'\n').enumerate() {
        let line_number = index + 1;
        let marker = std::str::from_utf8(line).map_or(MarkerLine::Plain, parse_import_marker);
        let module = match marker {
            MarkerLine::Plain => {
                out.extend_from_slice(line);
                continue;
            }
            MarkerLine::Malformed => {
                warn!(line = line_number, "malformed import marker left in place");
                out.extend_from_slice(line);
                continue;
            }
            MarkerLine::Import(module) => module,
        };

        let target = unit_dir.join(module);
        let same_dir = same_directory(&target, unit_dir);
        let prefix = module.trim_end_matches('/');
        let headers: Vec<String> = list_generated_headers(&target)?
            .into_iter()
            .filter(|name| !(same_dir && name == own_header))
            .map(|name| format!("{prefix}/{name}"))
            .collect();

        if headers.is_empty() {
            warn!(module, line = line_number, "import matched no generated headers");
            out.extend_from_slice(
                format!("/* czar: import \"{module}\" matched no generated headers */\n").as_bytes(),
            );
        } else {
            debug!(module, count = headers.len(), "expanded import");
            for include in &headers {
                if seen.insert(include.clone()) {
                    out.extend_from_slice(format!("#include \"{include}\"\n").as_bytes());
                }
            }
        }

        directives.push(ImportDirective {
            module: module.to_string(),
            headers,
            line: line_number,
        });
    }

    Ok((out, directives))
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
