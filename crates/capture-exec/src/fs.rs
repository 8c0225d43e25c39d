//! Filesystem helpers

use std::io;
use std::path::Path;

/// Create `path` and its parents unless it already is a directory.
///
/// Calling this repeatedly on the same path is harmless.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
}
