//! Filesystem probes
//!
//! Stateless helpers used by the scanner and the manager to decide what
//! is on disk. None of them return errors for a missing path.

use std::io;
use std::path::{Component, Path};

/// Hidden index file listing every resource a package provides
pub const INDEX_FILE: &str = ".index.json";

/// Package manifest file at the package root
pub const MANIFEST_FILE: &str = "package.json";

/// Optional sub-directory holding additional indexed example resources
pub const EXAMPLES_DIR: &str = "examples";

/// Check whether anything exists at `path`
///
/// Permission errors and any other I/O failure count as "does not exist".
pub fn exists(path: &Path) -> bool {
    std::fs::metadata(path).is_ok()
}

/// Create `path` and all missing ancestors
///
/// Succeeds without touching the filesystem if something already occupies
/// `path`, including a regular file.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    if exists(path) {
        return Ok(());
    }

    std::fs::create_dir_all(path)?;
    tracing::debug!("Created directory: {}", path.display());
    Ok(())
}

/// Check whether `path` is a directory carrying a hidden index file
pub fn is_indexed_package(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }

    std::fs::metadata(path.join(INDEX_FILE))
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Check whether `path` names an entry strictly below `base`
///
/// Purely lexical: any `..` or root component after `base` fails the check.
pub fn is_within(base: &Path, path: &Path) -> bool {
    match path.strip_prefix(base) {
        Ok(rest) => {
            rest.components().next().is_some()
                && rest.components().all(|c| matches!(c, Component::Normal(_)))
        }
        Err(_) => false,
    }
}
