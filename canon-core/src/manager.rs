//! Canonical manager
//!
//! Owns one [`CanonicalCache`] for a working directory. `init` makes the
//! configured packages available (fetching the missing ones), scans them
//! and reports what happened per package; queries then read the cache.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cache::{CanonicalCache, SearchCriteria};
use crate::config::ManagerConfig;
use crate::fetch::PackageFetcher;
use crate::fs::{self, EXAMPLES_DIR, MANIFEST_FILE};
use crate::index::IndexEntry;
use crate::lock::PackageLock;
use crate::package::{PackageIdentity, PackageInfo};
use crate::scanner::{self, ScanOutcome};

/// What happened to one configured package during `init`
#[derive(Debug)]
pub enum PackageStatus {
    /// The identifier could not be parsed
    Invalid { reason: String },

    /// The package was missing locally and the fetcher failed
    FetchFailed { reason: String },

    /// The package directory was scanned
    Scanned(ScanOutcome),
}

/// Per-package line of an [`InitReport`]
#[derive(Debug)]
pub struct PackageReport {
    /// Identifier or local path as configured
    pub source: String,

    /// Package root that was scanned, if one was reached
    pub path: Option<PathBuf>,

    /// Whether the package was fetched during this run
    pub fetched: bool,

    pub status: PackageStatus,
}

impl PackageReport {
    /// True when the package ended up with no registered package info
    pub fn is_failed(&self) -> bool {
        match &self.status {
            PackageStatus::Invalid { .. } | PackageStatus::FetchFailed { .. } => true,
            PackageStatus::Scanned(outcome) => outcome.is_skipped(),
        }
    }
}

/// Summary of one `init` run
#[derive(Debug, Default)]
pub struct InitReport {
    pub packages: Vec<PackageReport>,
}

impl InitReport {
    /// Packages that contributed no package info
    pub fn failed(&self) -> Vec<&PackageReport> {
        self.packages.iter().filter(|p| p.is_failed()).collect()
    }

    /// Entries appended across all packages
    pub fn entry_count(&self) -> usize {
        self.packages
            .iter()
            .map(|p| match &p.status {
                PackageStatus::Scanned(outcome) => outcome.entries(),
                _ => 0,
            })
            .sum()
    }

    pub fn fetched_count(&self) -> usize {
        self.packages.iter().filter(|p| p.fetched).count()
    }
}

/// Façade over the package cache for one working directory
pub struct CanonicalManager {
    config: ManagerConfig,
    cache: CanonicalCache,
    fetcher: Box<dyn PackageFetcher>,
    report: InitReport,
}

impl CanonicalManager {
    /// Create a manager using the registry fetcher when available
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config.validate()?;

        #[cfg(feature = "registry")]
        let fetcher = crate::fetch::RegistryFetcher::new()?;
        #[cfg(not(feature = "registry"))]
        let fetcher = crate::fetch::NoFetcher;

        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Create a manager with a custom fetch collaborator
    pub fn with_fetcher(config: ManagerConfig, fetcher: impl PackageFetcher + 'static) -> Self {
        Self {
            config,
            cache: CanonicalCache::new(),
            fetcher: Box::new(fetcher),
            report: InitReport::default(),
        }
    }

    /// Make every configured package available and scan it
    ///
    /// Packages are handled one at a time in configuration order; a package
    /// that fails to fetch or scan contributes nothing and the run goes on.
    /// Local package directories are scanned after the configured packages.
    pub async fn init(&mut self) -> &InitReport {
        info!(
            "Initializing canonical manager in {}",
            self.config.working_dir.display()
        );

        if let Err(e) = fs::ensure_directory(&self.config.working_dir) {
            warn!(
                "Failed to create working directory {}: {}",
                self.config.working_dir.display(),
                e
            );
        }

        let lock_path = self.config.lock_path();
        let mut lock = PackageLock::load_from_path(&lock_path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable lock file: {:#}", e);
            PackageLock::default()
        });

        let mut report = InitReport::default();

        for spec in self.config.packages.clone() {
            let line = self.init_package(&spec, &mut lock).await;
            report.packages.push(line);
        }

        for path in self.config.local_packages.clone() {
            let outcome = scanner::scan(&path, &mut self.cache);
            report.packages.push(PackageReport {
                source: path.display().to_string(),
                path: Some(path),
                fetched: false,
                status: PackageStatus::Scanned(outcome),
            });
        }

        if report.fetched_count() > 0 {
            if let Err(e) = lock.save_to_path(&lock_path) {
                warn!("Failed to write lock file: {:#}", e);
            }
        }

        let failed = report.failed().len();
        if failed > 0 {
            warn!("{} of {} packages failed", failed, report.packages.len());
        }
        info!(
            "Canonical manager ready: {} packages, {} entries",
            self.cache.package_count(),
            self.cache.len()
        );

        self.report = report;
        &self.report
    }

    async fn init_package(&mut self, spec: &str, lock: &mut PackageLock) -> PackageReport {
        let id = match PackageIdentity::parse(spec) {
            Ok(id) => id,
            Err(e) => {
                warn!("Skipping package '{}': {}", spec, e);
                return PackageReport {
                    source: spec.to_string(),
                    path: None,
                    fetched: false,
                    status: PackageStatus::Invalid {
                        reason: e.to_string(),
                    },
                };
            }
        };

        let release_dir = self.config.release_dir(&id);
        if !id.is_path_safe() || !fs::is_within(&self.config.packages_root(), &release_dir) {
            warn!(
                "Skipping package '{}': {} is outside {}",
                spec,
                release_dir.display(),
                self.config.packages_root().display()
            );
            return PackageReport {
                source: spec.to_string(),
                path: None,
                fetched: false,
                status: PackageStatus::Invalid {
                    reason: format!("{} resolves outside the packages directory", id),
                },
            };
        }

        let mut path = self.config.package_dir(&id);
        let mut fetched = false;

        if !fs::exists(&path.join(MANIFEST_FILE)) {
            match self
                .fetcher
                .fetch(&id, &self.config.registry, &release_dir)
                .await
            {
                Ok(package) => {
                    lock.record(&id, &self.config.registry, package.digest);
                    path = package.path;
                    fetched = true;
                }
                Err(e) => {
                    warn!("Failed to fetch {}: {:#}", id, e);
                    return PackageReport {
                        source: spec.to_string(),
                        path: None,
                        fetched: false,
                        status: PackageStatus::FetchFailed {
                            reason: format!("{e:#}"),
                        },
                    };
                }
            }
        }

        let outcome = scanner::scan(&path, &mut self.cache);
        PackageReport {
            source: spec.to_string(),
            path: Some(path),
            fetched,
            status: PackageStatus::Scanned(outcome),
        }
    }

    /// Report of the last `init` run
    pub fn report(&self) -> &InitReport {
        &self.report
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn cache(&self) -> &CanonicalCache {
        &self.cache
    }

    /// All known packages, sorted by name
    pub fn packages(&self) -> Vec<&PackageInfo> {
        self.cache.packages().collect()
    }

    /// Structured search over the cache
    pub fn search_entries(&self, criteria: &SearchCriteria) -> Vec<&IndexEntry> {
        self.cache.search(criteria)
    }

    /// Preferred entry for a canonical URL
    pub fn resolve(&self, url: &str) -> Option<&IndexEntry> {
        self.cache.resolve(url)
    }

    /// Load the resource file behind an index entry
    pub fn read_resource(&self, entry: &IndexEntry) -> Result<serde_json::Value> {
        let filename = entry
            .filename
            .as_deref()
            .with_context(|| format!("Index entry {:?} has no filename", entry.url))?;

        let path = resource_path(&entry.package.path, filename).with_context(|| {
            format!(
                "Resource file {} not found in package {}",
                filename, entry.package.id
            )
        })?;

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Release the cache
    pub fn destroy(self) {
        info!(
            "Releasing canonical cache ({} packages, {} entries)",
            self.cache.package_count(),
            self.cache.len()
        );
    }
}

/// Find a resource file in a package root or its examples directory
fn resource_path(package_root: &Path, filename: &str) -> Option<PathBuf> {
    [
        package_root.join(filename),
        package_root.join(EXAMPLES_DIR).join(filename),
    ]
    .into_iter()
    .find(|p| p.is_file())
}
