//! Index file parsing and ingestion (.index.json)
//!
//! The hidden index file enumerates a lightweight descriptor for every
//! resource a package provides, so the cache can be built without opening
//! each resource file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::cache::CanonicalCache;
use crate::error::ScanError;
use crate::fs::INDEX_FILE;
use crate::package::{PackageInfo, PackageManifest};

/// A parsed index file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Index format version
    #[serde(default, rename = "index-version")]
    pub index_version: Option<u32>,

    /// Resource descriptors in file order
    #[serde(default)]
    pub files: Vec<ResourceDescriptor>,
}

/// One resource as listed in an index file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default, rename = "type")]
    pub type_name: Option<String>,

    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub resource_type: Option<String>,

    #[serde(default)]
    pub id: Option<String>,

    /// File name of the resource, relative to the indexed directory
    #[serde(default)]
    pub filename: Option<String>,
}

/// An indexed resource attributed to its package
///
/// Fields are copied verbatim from the descriptor. `package` is the package
/// info that was current in the cache when the entry was ingested.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub kind: Option<String>,
    pub version: Option<String>,
    pub resource_type: Option<String>,
    pub id: Option<String>,
    pub filename: Option<String>,
    pub package: Arc<PackageInfo>,
}

impl IndexEntry {
    pub fn from_descriptor(descriptor: ResourceDescriptor, package: Arc<PackageInfo>) -> Self {
        Self {
            url: descriptor.url,
            type_name: descriptor.type_name,
            kind: descriptor.kind,
            version: descriptor.version,
            resource_type: descriptor.resource_type,
            id: descriptor.id,
            filename: descriptor.filename,
            package,
        }
    }
}

impl IndexManifest {
    /// Load the index file from a directory
    pub fn from_dir(dir: &Path) -> Result<Self, ScanError> {
        let path = dir.join(INDEX_FILE);
        let content =
            std::fs::read_to_string(&path).map_err(|source| ScanError::ManifestUnreadable {
                path: path.clone(),
                source,
            })?;

        serde_json::from_str(&content)
            .map_err(|source| ScanError::ManifestMalformed { path, source })
    }
}

/// Ingest the index file in `directory` into the cache
///
/// Entries are attributed to the package registered under the manifest's
/// name. The file is parsed in full before anything is appended, so a
/// malformed index leaves the cache untouched. Returns the number of
/// entries appended.
pub fn process(
    directory: &Path,
    manifest: &PackageManifest,
    cache: &mut CanonicalCache,
) -> Result<usize, ScanError> {
    let package = cache
        .package(&manifest.name)
        .cloned()
        .ok_or_else(|| ScanError::PackageNotRegistered {
            name: manifest.name.clone(),
        })?;

    let index = IndexManifest::from_dir(directory)?;
    let count = index.files.len();
    let index_version = index
        .index_version
        .map_or_else(|| "unset".to_string(), |v| v.to_string());

    cache.extend_entries(
        index
            .files
            .into_iter()
            .map(|descriptor| IndexEntry::from_descriptor(descriptor, Arc::clone(&package))),
    );

    tracing::debug!(
        "Indexed {} entries for {} from {} (index-version {})",
        count,
        package.id,
        directory.display(),
        index_version
    );

    Ok(count)
}
