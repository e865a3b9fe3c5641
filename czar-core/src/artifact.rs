use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Write `contents` to `path` through a sibling temporary file, so a failed
/// write never leaves a truncated artifact behind.
pub fn write_artifact(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    let staging = staging_path(path);
    let result = fs::write(&staging, contents).and_then(|()| fs::rename(&staging, path));
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

/// Remove an artifact, returning whether it existed.
pub fn remove_artifact(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
