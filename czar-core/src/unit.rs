use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::CzarError;
use crate::header;

/// File extension identifying source units.
pub const SOURCE_EXTENSION: &str = "cz";
pub const C_EXTENSION: &str = "c";
pub const HEADER_EXTENSION: &str = "h";
pub const OBJECT_EXTENSION: &str = "o";

/// A top-level function definition found in a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub return_type: String,
    pub params: String,
    /// 1-based line of the function name.
    pub line: usize,
}

impl Declaration {
    pub fn prototype(&self) -> String {
        let separator = if self.return_type.ends_with('*') { "" } else { " " };
        format!(
            "{}{}{}({});",
            self.return_type, separator, self.name, self.params
        )
    }
}

/// One `// @import "dir"` marker and what it expanded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    pub module: String,
    /// Include paths emitted for the marker, relative to the importing unit.
    pub headers: Vec<String>,
    pub line: usize,
}

impl ImportDirective {
    pub fn is_resolved(&self) -> bool {
        !self.headers.is_empty()
    }
}

/// A source file plus everything generated from it.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub source: PathBuf,
    /// Source path relative to the build root.
    pub relative: PathBuf,
    /// Source bytes as read; units are not required to be UTF-8.
    pub raw: Vec<u8>,
    pub transpiled: Vec<u8>,
    pub c_path: PathBuf,
    pub header_path: PathBuf,
    pub object_path: PathBuf,
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportDirective>,
    /// Header file names of the other units in the same directory.
    pub siblings: BTreeSet<String>,
    pub imports_expanded: bool,
    pub siblings_injected: bool,
}

impl TranslationUnit {
    pub fn new(root: &Path, source: PathBuf) -> Self {
        let relative = source.strip_prefix(root).unwrap_or(&source).to_path_buf();
        Self {
            c_path: source.with_extension(C_EXTENSION),
            header_path: source.with_extension(HEADER_EXTENSION),
            object_path: source.with_extension(OBJECT_EXTENSION),
            source,
            relative,
            raw: Vec::new(),
            transpiled: Vec::new(),
            declarations: Vec::new(),
            imports: Vec::new(),
            siblings: BTreeSet::new(),
            imports_expanded: false,
            siblings_injected: false,
        }
    }

    pub fn directory(&self) -> &Path {
        self.source.parent().unwrap_or(Path::new(""))
    }

    /// File name of the generated header, e.g. `math.h`.
    pub fn header_file_name(&self) -> String {
        self.header_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn guard_name(&self) -> String {
        header::guard_name(&self.relative)
    }
}

/// Recursively find every source unit under `root`, in a stable order.
pub fn discover_units(root: impl AsRef<Path>) -> Result<Vec<TranslationUnit>, CzarError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(CzarError::NoSourceUnits {
            root: root.to_path_buf(),
        });
    }

    let mut units = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| CzarError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && is_source_path(path) {
            units.push(TranslationUnit::new(root, path.to_path_buf()));
        }
    }

    if units.is_empty() {
        return Err(CzarError::NoSourceUnits {
            root: root.to_path_buf(),
        });
    }
    Ok(units)
}

pub fn is_source_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}
