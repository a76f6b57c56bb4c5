//! Package identity and manifest parsing (package.json)
//!
//! A package is a versioned bundle of resource definitions on disk. Its
//! `package.json` declares the name, version, canonical base URL and the
//! spec versions it supports.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ScanError;
use crate::fs::MANIFEST_FILE;

/// Name and version of one package release
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
}

impl PackageIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse `name@version` or `name#version`
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let (name, version) = spec
            .rsplit_once('#')
            .or_else(|| spec.rsplit_once('@'))
            .with_context(|| format!("Package '{spec}' must be written as name@version"))?;

        check_segment(spec, "name", name)?;
        check_segment(spec, "version", version)?;

        Ok(Self::new(name, version))
    }

    /// Whether name and version are each usable as part of one directory name
    pub fn is_path_safe(&self) -> bool {
        is_safe_segment(&self.name) && is_safe_segment(&self.version)
    }

    /// Directory name used for this package under the working directory
    pub fn dir_name(&self) -> String {
        format!("{}#{}", self.name, self.version)
    }
}

fn check_segment(spec: &str, field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        anyhow::bail!("Package '{}' has an empty {}", spec, field);
    }
    if !is_safe_segment(value) {
        anyhow::bail!("Package '{}' has an invalid {} '{}'", spec, field, value);
    }
    Ok(())
}

/// A value that stays a single directory name component when joined
fn is_safe_segment(value: &str) -> bool {
    !value.is_empty()
        && !value.contains("..")
        && !value
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for PackageIdentity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A scanned package as held by the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub id: PackageIdentity,

    /// Absolute package root directory
    pub path: PathBuf,

    /// Canonical base URL prefix, if declared
    pub canonical: Option<String>,

    /// Supported spec versions in declaration order, without duplicates
    pub fhir_versions: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared dependencies, name to version
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageInfo {
    /// Build package info from a parsed manifest found at `path`
    pub fn from_manifest(manifest: &PackageManifest, path: &Path) -> Self {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        let mut fhir_versions: Vec<String> = Vec::with_capacity(manifest.fhir_versions.len());
        for version in &manifest.fhir_versions {
            if !fhir_versions.contains(version) {
                fhir_versions.push(version.clone());
            }
        }

        Self {
            id: manifest.identity(),
            path,
            canonical: manifest.canonical.clone(),
            fhir_versions,
            description: manifest.description.clone(),
            dependencies: manifest.dependencies.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn version(&self) -> &str {
        &self.id.version
    }
}

/// Package manifest (package.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Package name (e.g., "hl7.fhir.r4.core")
    pub name: String,

    /// Package version
    pub version: String,

    /// Canonical base URL shared by the package's resources
    #[serde(default)]
    pub canonical: Option<String>,

    /// Supported spec versions
    #[serde(default)]
    pub fhir_versions: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Declared dependencies, name to version
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Load the manifest from a package root directory
    pub fn from_dir(dir: &Path) -> Result<Self, ScanError> {
        Self::from_file(&dir.join(MANIFEST_FILE))
    }

    /// Load the manifest from a file path
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ScanError::ManifestUnreadable {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_json(&content).map_err(|source| ScanError::ManifestMalformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a manifest from a JSON string
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(&self.name, &self.version)
    }
}
