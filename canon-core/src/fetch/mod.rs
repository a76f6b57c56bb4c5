//! Package fetching
//!
//! The manager only needs packages to appear on disk; how they get there
//! is up to a [`PackageFetcher`]. [`RegistryFetcher`] downloads gzip
//! tarballs from an HTTP registry (feature `registry`).

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::package::PackageIdentity;

#[cfg(feature = "registry")]
mod registry;

#[cfg(feature = "registry")]
pub use registry::{extract_package, RegistryFetcher};

/// What a successful fetch produced
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    /// Package root containing `package.json`
    pub path: PathBuf,
    /// `sha256:<hex>` digest of the downloaded archive, if one was downloaded
    pub digest: Option<String>,
}

/// Materializes a package release under a local directory
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    /// Fetch `id` from `registry` into `release_dir`
    ///
    /// On success the returned path holds the package root. Implementations
    /// must leave no half-written package root behind on failure.
    async fn fetch(
        &self,
        id: &PackageIdentity,
        registry: &str,
        release_dir: &Path,
    ) -> Result<FetchedPackage>;
}

/// Fetcher used when no registry support is compiled in
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFetcher;

#[async_trait]
impl PackageFetcher for NoFetcher {
    async fn fetch(
        &self,
        id: &PackageIdentity,
        _registry: &str,
        _release_dir: &Path,
    ) -> Result<FetchedPackage> {
        anyhow::bail!(
            "Cannot fetch {}: registry feature is not enabled. Rebuild with --features registry",
            id
        )
    }
}
