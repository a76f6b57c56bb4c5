//! Package lock file management (<working_dir>/canon.lock)
//!
//! Records which packages were fetched into the working directory, from
//! which registry and with which tarball digest.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::package::PackageIdentity;

/// Lock file name inside the working directory
pub const LOCK_FILE: &str = "canon.lock";

/// The lock file tracks fetched packages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageLock {
    /// API version for schema compatibility
    pub api_version: String,
    /// When this lock file was last updated
    pub generated: String,
    /// Fetched packages
    pub installed: Vec<LockedPackage>,
}

/// A fetched package entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
    /// Registry the package was fetched from
    pub registry: String,
    /// `sha256:<hex>` digest of the downloaded tarball
    pub digest: Option<String>,
    pub installed_at: String,
}

impl Default for PackageLock {
    fn default() -> Self {
        Self {
            api_version: "canon/v1".to_string(),
            generated: chrono::Utc::now().to_rfc3339(),
            installed: Vec::new(),
        }
    }
}

impl PackageLock {
    /// Load lock file from a path, or an empty lock if it does not exist
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save lock file to a path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut lock = self.clone();
        lock.generated = chrono::Utc::now().to_rfc3339();

        let content = serde_yaml_ng::to_string(&lock)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Add or replace the record for a package release
    pub fn record(&mut self, id: &PackageIdentity, registry: &str, digest: Option<String>) {
        self.remove(id);

        self.installed.push(LockedPackage {
            name: id.name.clone(),
            version: id.version.clone(),
            registry: registry.to_string(),
            digest,
            installed_at: chrono::Utc::now().to_rfc3339(),
        });
    }

    /// Remove the record for a package release
    pub fn remove(&mut self, id: &PackageIdentity) {
        self.installed
            .retain(|e| !(e.name == id.name && e.version == id.version));
    }

    /// Look up the record for a package release
    pub fn get(&self, id: &PackageIdentity) -> Option<&LockedPackage> {
        self.installed
            .iter()
            .find(|e| e.name == id.name && e.version == id.version)
    }
}
