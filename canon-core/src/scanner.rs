//! Package scanner
//!
//! Reads one package directory into the cache: `package.json` first, then
//! the root `.index.json`, then `examples/.index.json` when present. A scan
//! never fails outward; what happened is reported as a [`ScanOutcome`].

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::CanonicalCache;
use crate::error::ScanError;
use crate::fs::{self, EXAMPLES_DIR};
use crate::index;
use crate::package::{PackageIdentity, PackageInfo, PackageManifest};

/// Result of scanning one package directory
#[derive(Debug)]
pub enum ScanOutcome {
    /// Manifest registered and every index file ingested
    Scanned {
        package: PackageIdentity,
        entries: usize,
    },

    /// Manifest registered, but at least one index file failed
    ///
    /// `entries` counts what was ingested from the index files that did
    /// succeed.
    Partial {
        package: PackageIdentity,
        entries: usize,
        errors: Vec<ScanError>,
    },

    /// Manifest missing or unparsable; the cache was not touched
    Skipped { path: PathBuf, reason: ScanError },
}

impl ScanOutcome {
    /// The registered package, unless the scan was skipped
    pub fn package(&self) -> Option<&PackageIdentity> {
        match self {
            ScanOutcome::Scanned { package, .. } | ScanOutcome::Partial { package, .. } => {
                Some(package)
            }
            ScanOutcome::Skipped { .. } => None,
        }
    }

    /// Entries appended to the cache by this scan
    pub fn entries(&self) -> usize {
        match self {
            ScanOutcome::Scanned { entries, .. } | ScanOutcome::Partial { entries, .. } => *entries,
            ScanOutcome::Skipped { .. } => 0,
        }
    }

    pub fn is_scanned(&self) -> bool {
        matches!(self, ScanOutcome::Scanned { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ScanOutcome::Skipped { .. })
    }
}

/// Scan a package directory into the cache
pub fn scan(package_path: &Path, cache: &mut CanonicalCache) -> ScanOutcome {
    let manifest = match probe_directory(package_path)
        .and_then(|()| PackageManifest::from_dir(package_path))
    {
        Ok(manifest) => manifest,
        Err(reason) => {
            warn!(
                "Skipping package at {}: {}",
                package_path.display(),
                reason.chain()
            );
            return ScanOutcome::Skipped {
                path: package_path.to_path_buf(),
                reason,
            };
        }
    };

    let info = cache.register_package(PackageInfo::from_manifest(&manifest, package_path));
    let package = info.id.clone();
    for (name, version) in &info.dependencies {
        debug!("{} depends on {}@{}", package, name, version);
    }

    let mut entries = 0;
    let mut errors = Vec::new();

    match index::process(package_path, &manifest, cache) {
        Ok(count) => entries += count,
        Err(e) => {
            warn!("Failed to index {}: {}", package, e.chain());
            errors.push(e);
        }
    }

    let examples = package_path.join(EXAMPLES_DIR);
    if fs::is_indexed_package(&examples) {
        match index::process(&examples, &manifest, cache) {
            Ok(count) => entries += count,
            Err(e) => {
                warn!("Failed to index examples of {}: {}", package, e.chain());
                errors.push(e);
            }
        }
    }

    if errors.is_empty() {
        info!("Scanned {}: {} entries", package, entries);
        ScanOutcome::Scanned { package, entries }
    } else {
        ScanOutcome::Partial {
            package,
            entries,
            errors,
        }
    }
}

fn probe_directory(package_path: &Path) -> Result<(), ScanError> {
    let inaccessible = |source: io::Error| ScanError::DirectoryInaccessible {
        path: package_path.to_path_buf(),
        source,
    };

    let meta = std::fs::metadata(package_path).map_err(inaccessible)?;
    if !meta.is_dir() {
        return Err(inaccessible(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }
    Ok(())
}

/// Scan several package directories in order
///
/// One bad package never stops the batch.
pub fn scan_all<P: AsRef<Path>>(
    package_paths: &[P],
    cache: &mut CanonicalCache,
) -> Vec<ScanOutcome> {
    let outcomes: Vec<ScanOutcome> = package_paths
        .iter()
        .map(|path| scan(path.as_ref(), cache))
        .collect();

    let skipped = outcomes.iter().filter(|o| o.is_skipped()).count();
    info!(
        "Scan complete: {} packages, {} skipped, {} entries total",
        outcomes.len(),
        skipped,
        cache.len()
    );

    outcomes
}
