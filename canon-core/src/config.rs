//! Manager configuration
//!
//! Lists the packages to make available, where they live locally and which
//! registry serves the missing ones. Loaded from YAML (or JSON, by file
//! extension) or built in code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::package::PackageIdentity;

/// Default package registry URL
pub const DEFAULT_REGISTRY_URL: &str = "https://packages.fhir.org";

/// Configuration consumed by [`crate::CanonicalManager`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig {
    /// Package identifiers (`name@version` or `name#version`) to ensure present
    #[serde(default)]
    pub packages: Vec<String>,

    /// Local cache root
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Base URL of the remote package source
    #[serde(default = "default_registry")]
    pub registry: String,

    /// Package directories scanned in place, never fetched
    #[serde(default)]
    pub local_packages: Vec<PathBuf>,
}

fn default_registry() -> String {
    DEFAULT_REGISTRY_URL.to_string()
}

fn default_working_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "canon", "canon")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .or_else(|| dirs::cache_dir().map(|d| d.join("canon")))
        .unwrap_or_else(|| PathBuf::from(".canon"))
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            working_dir: default_working_dir(),
            registry: default_registry(),
            local_packages: Vec::new(),
        }
    }
}

impl ManagerConfig {
    /// Configuration rooted at a specific working directory
    pub fn with_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config: Self = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        } else {
            serde_yaml_ng::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the registry URL shape
    pub fn validate(&self) -> Result<()> {
        if !self.registry.starts_with("http://") && !self.registry.starts_with("https://") {
            anyhow::bail!(
                "Registry URL must start with http:// or https:// (got '{}')",
                self.registry
            );
        }
        Ok(())
    }

    /// Add a package identifier
    pub fn add_package(&mut self, spec: impl Into<String>) -> &mut Self {
        self.packages.push(spec.into());
        self
    }

    /// Local directory a package is materialized into
    ///
    /// Registry tarballs unpack into a `package/` root, so the package files
    /// live one level below the per-release directory.
    pub fn package_dir(&self, id: &PackageIdentity) -> PathBuf {
        self.release_dir(id).join("package")
    }

    /// Per-release directory under [`Self::packages_root`]
    pub fn release_dir(&self, id: &PackageIdentity) -> PathBuf {
        self.packages_root().join(id.dir_name())
    }

    /// `<working_dir>/packages`, the only place fetched releases are written
    pub fn packages_root(&self) -> PathBuf {
        self.working_dir.join("packages")
    }

    /// Lock file location
    pub fn lock_path(&self) -> PathBuf {
        self.working_dir.join(crate::lock::LOCK_FILE)
    }
}
