//! HTTP registry fetcher
//!
//! Downloads `{registry}/{name}/{version}` as a gzip tarball, records its
//! digest and unpacks it into the release directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use super::{FetchedPackage, PackageFetcher};
use crate::fs::MANIFEST_FILE;
use crate::package::PackageIdentity;

/// Root directory name inside registry tarballs
const PACKAGE_ROOT: &str = "package";

/// Fetches packages from an HTTP package registry
pub struct RegistryFetcher {
    client: reqwest::Client,
}

impl RegistryFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("canon/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Download URL for a package release
    pub fn tarball_url(registry: &str, id: &PackageIdentity) -> String {
        format!(
            "{}/{}/{}",
            registry.trim_end_matches('/'),
            id.name,
            id.version
        )
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/tar+gzip")
            .send()
            .await
            .with_context(|| format!("Failed to download {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Download failed: HTTP {} for {}", response.status(), url);
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read download response")?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl PackageFetcher for RegistryFetcher {
    async fn fetch(
        &self,
        id: &PackageIdentity,
        registry: &str,
        release_dir: &Path,
    ) -> Result<FetchedPackage> {
        let url = Self::tarball_url(registry, id);
        tracing::info!("Downloading {} from {}", id, url);

        let bytes = self.download(&url).await?;
        let digest = format!("sha256:{:x}", Sha256::digest(&bytes));

        let release_dir = release_dir.to_path_buf();
        let path = tokio::task::spawn_blocking(move || extract_package(&bytes, &release_dir))
            .await
            .context("Extraction task panicked")??;

        tracing::info!("Installed {} to {}", id, path.display());

        Ok(FetchedPackage {
            path,
            digest: Some(digest),
        })
    }
}

/// Unpack a package tarball into `release_dir`
///
/// The archive is staged in a temporary directory next to `release_dir` and
/// only moved into place once a package root with a manifest was found.
/// Returns the package root (`release_dir/package`).
pub fn extract_package(bytes: &[u8], release_dir: &Path) -> Result<PathBuf> {
    if release_dir
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        anyhow::bail!(
            "Refusing to install into {}: path leaves its parent directory",
            release_dir.display()
        );
    }

    let parent = release_dir
        .parent()
        .context("Release directory has no parent")?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .context("Failed to create staging directory")?;

    let gz_decoder = flate2::read::GzDecoder::new(Cursor::new(bytes));
    let mut archive = tar::Archive::new(gz_decoder);
    archive
        .unpack(staging.path())
        .context("Failed to extract package tarball")?;

    let staged_root = find_package_root(staging.path())?;

    if release_dir.exists() {
        std::fs::remove_dir_all(release_dir)
            .with_context(|| format!("Failed to remove {}", release_dir.display()))?;
    }
    std::fs::create_dir_all(release_dir)?;

    let package_root = release_dir.join(PACKAGE_ROOT);
    std::fs::rename(&staged_root, &package_root).with_context(|| {
        format!(
            "Failed to move package into place: {}",
            package_root.display()
        )
    })?;

    Ok(package_root)
}

/// Locate the directory holding `package.json` in an unpacked archive
fn find_package_root(staging: &Path) -> Result<PathBuf> {
    let conventional = staging.join(PACKAGE_ROOT);
    if conventional.join(MANIFEST_FILE).is_file() {
        return Ok(conventional);
    }

    // Some archives use a different single root directory
    std::fs::read_dir(staging)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.is_dir() && p.join(MANIFEST_FILE).is_file())
        .with_context(|| format!("No {MANIFEST_FILE} found in package tarball"))
}
