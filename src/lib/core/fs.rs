use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use super::error::Result;

/// Ensure the directory an output file will be written into exists.
/// A bare file name resolves to the working directory and needs nothing.
pub fn make_parent_dirs<P: AsRef<Path>>(path: P) -> Result<()> {
    match path.as_ref().parent() {
        Some(dir) if dir != Path::new("") => Ok(fs::create_dir_all(dir)?),
        _ => Ok(()),
    }
}

/// Detect whether a feature or ignore file should be read through a gzip decoder.
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> bool {
    matches!(
        path.as_ref().extension().unwrap_or_else(|| OsStr::new("")),
        ext if ext == "gz"
    )
}
