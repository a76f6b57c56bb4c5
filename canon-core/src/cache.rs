//! Canonical cache
//!
//! In-memory store of every scanned package and every index entry. Entries
//! are kept in ingest order and never deduplicated: when a canonical URL is
//! published in several versions or vendored into several packages, all of
//! them stay visible and precedence is decided at query time.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::index::IndexEntry;
use crate::package::PackageInfo;

/// Structured search filter
///
/// Every field is optional; an omitted field imposes no constraint. Supplied
/// fields compare by exact string equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    /// Canonical URL
    #[serde(default)]
    pub url: Option<String>,

    /// Resource type name (the descriptor's `type`)
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,

    #[serde(default)]
    pub kind: Option<String>,

    /// The entry's own resource version
    #[serde(default)]
    pub version: Option<String>,

    /// Owning package name
    #[serde(default)]
    pub package: Option<String>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Check whether an entry satisfies every supplied criterion
    pub fn matches(&self, entry: &IndexEntry) -> bool {
        field_matches(&self.url, &entry.url)
            && field_matches(&self.type_name, &entry.type_name)
            && field_matches(&self.kind, &entry.kind)
            && field_matches(&self.version, &entry.version)
            && self
                .package
                .as_deref()
                .map_or(true, |name| entry.package.name() == name)
    }
}

fn field_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => actual.as_deref() == Some(wanted.as_str()),
    }
}

/// All known packages and index entries
#[derive(Debug, Default)]
pub struct CanonicalCache {
    packages: BTreeMap<String, Arc<PackageInfo>>,
    entries: Vec<IndexEntry>,
}

impl CanonicalCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a package, keyed by name
    ///
    /// Entries ingested earlier keep pointing at the package info that was
    /// current when they were added.
    pub fn register_package(&mut self, info: PackageInfo) -> Arc<PackageInfo> {
        let info = Arc::new(info);
        if let Some(previous) = self
            .packages
            .insert(info.id.name.clone(), Arc::clone(&info))
        {
            if *previous != *info {
                tracing::debug!(
                    "Replaced package {} ({} -> {})",
                    info.id.name,
                    previous.path.display(),
                    info.path.display()
                );
            }
        }
        info
    }

    /// Get the current package info for a name
    pub fn package(&self, name: &str) -> Option<&Arc<PackageInfo>> {
        self.packages.get(name)
    }

    /// All packages, sorted by name
    pub fn packages(&self) -> impl Iterator<Item = &PackageInfo> {
        self.packages.values().map(|info| info.as_ref())
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Append entries in the given order
    pub fn extend_entries(&mut self, entries: impl IntoIterator<Item = IndexEntry>) {
        self.entries.extend(entries);
    }

    /// All entries in ingest order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every package and entry
    pub fn clear(&mut self) {
        self.packages.clear();
        self.entries.clear();
    }

    /// Find every entry matching the criteria, in ingest order
    pub fn search(&self, criteria: &SearchCriteria) -> Vec<&IndexEntry> {
        self.entries
            .iter()
            .filter(|entry| criteria.matches(entry))
            .collect()
    }

    /// Resolve a canonical URL to its preferred entry
    ///
    /// The highest version wins: numeric versions compare as semver (short
    /// forms padded with zeros) and outrank free-form ones, which compare as
    /// strings. A versioned entry outranks an unversioned one.
    /// Ties go to the entry ingested first.
    pub fn resolve(&self, url: &str) -> Option<&IndexEntry> {
        let mut best: Option<&IndexEntry> = None;

        for entry in self.entries.iter().filter(|e| has_url(e, url)) {
            best = match best {
                Some(current)
                    if compare_versions(entry.version.as_deref(), current.version.as_deref())
                        != Ordering::Greater =>
                {
                    Some(current)
                }
                _ => Some(entry),
            };
        }

        best
    }

    /// Resolve a canonical URL at an exact resource version
    pub fn resolve_version(&self, url: &str, version: &str) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|entry| has_url(entry, url) && entry.version.as_deref() == Some(version))
    }

    /// Distinct versions published for a canonical URL, in ingest order
    pub fn versions_of(&self, url: &str) -> Vec<&str> {
        let mut versions: Vec<&str> = Vec::new();
        for version in self
            .entries
            .iter()
            .filter(|e| has_url(e, url))
            .filter_map(|e| e.version.as_deref())
        {
            if !versions.contains(&version) {
                versions.push(version);
            }
        }
        versions
    }
}

fn has_url(entry: &IndexEntry, url: &str) -> bool {
    entry.url.as_deref() == Some(url)
}

/// Sort key for a resource version
///
/// Versions that read as semver once padded to three numeric parts
/// (`10.0` becomes `10.0.0`) outrank free-form text, which orders as plain
/// strings.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum VersionKey<'a> {
    Text(&'a str),
    Semver(semver::Version),
}

impl<'a> VersionKey<'a> {
    fn new(version: &'a str) -> Self {
        let split = version
            .find(|c| c == '-' || c == '+')
            .unwrap_or(version.len());
        let (core, suffix) = version.split_at(split);

        let parts: Vec<&str> = core.split('.').collect();
        let numeric = parts.len() <= 3
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
        if !numeric {
            return VersionKey::Text(version);
        }

        let mut padded = parts.join(".");
        for _ in parts.len()..3 {
            padded.push_str(".0");
        }
        padded.push_str(suffix);

        match semver::Version::parse(&padded) {
            Ok(parsed) => VersionKey::Semver(parsed),
            Err(_) => VersionKey::Text(version),
        }
    }
}

/// Order two optional resource versions
fn compare_versions(a: Option<&str>, b: Option<&str>) -> Ordering {
    a.map(VersionKey::new).cmp(&b.map(VersionKey::new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageIdentity;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn package(name: &str, version: &str) -> PackageInfo {
        PackageInfo {
            id: PackageIdentity::new(name, version),
            path: PathBuf::from(format!("/packages/{name}")),
            canonical: None,
            fhir_versions: vec!["4.0.1".to_string()],
            description: None,
            dependencies: Default::default(),
        }
    }

    fn entry(
        package: &Arc<PackageInfo>,
        url: &str,
        type_name: &str,
        kind: &str,
        version: Option<&str>,
    ) -> IndexEntry {
        IndexEntry {
            url: Some(url.to_string()),
            type_name: Some(type_name.to_string()),
            kind: Some(kind.to_string()),
            version: version.map(str::to_string),
            resource_type: Some("StructureDefinition".to_string()),
            id: None,
            filename: None,
            package: Arc::clone(package),
        }
    }

    fn sample_cache() -> CanonicalCache {
        let mut cache = CanonicalCache::new();
        let pkg = cache.register_package(package("core", "1.0.0"));
        cache.extend_entries([
            entry(&pkg, "A", "X", "resource", None),
            entry(&pkg, "B", "Y", "resource", None),
            entry(&pkg, "A", "X", "logical", None),
        ]);
        cache
    }

    fn urls_and_kinds<'a>(entries: &[&'a IndexEntry]) -> Vec<(&'a str, &'a str)> {
        entries
            .iter()
            .map(|e| (e.url.as_deref().unwrap(), e.kind.as_deref().unwrap()))
            .collect()
    }

    #[test]
    fn test_search_by_type() {
        let cache = sample_cache();
        let results = cache.search(&SearchCriteria::new().with_type("X"));
        assert_eq!(
            urls_and_kinds(&results),
            vec![("A", "resource"), ("A", "logical")]
        );
    }

    #[test]
    fn test_search_by_kind() {
        let cache = sample_cache();
        let results = cache.search(&SearchCriteria::new().with_kind("resource"));
        assert_eq!(
            urls_and_kinds(&results),
            vec![("A", "resource"), ("B", "resource")]
        );
    }

    #[test]
    fn test_search_by_type_and_kind() {
        let cache = sample_cache();
        let results = cache.search(&SearchCriteria::new().with_type("X").with_kind("logical"));
        assert_eq!(urls_and_kinds(&results), vec![("A", "logical")]);
    }

    #[test]
    fn test_search_empty_criteria_returns_everything() {
        let cache = sample_cache();
        assert_eq!(cache.search(&SearchCriteria::default()).len(), 3);
    }

    #[test]
    fn test_search_no_match_is_empty() {
        let cache = sample_cache();
        assert!(cache
            .search(&SearchCriteria::new().with_type("Z"))
            .is_empty());
    }

    #[test]
    fn test_search_is_case_sensitive() {
        let cache = sample_cache();
        assert!(cache
            .search(&SearchCriteria::new().with_kind("Resource"))
            .is_empty());
    }

    #[test]
    fn test_version_criterion_skips_unversioned_entries() {
        let mut cache = CanonicalCache::new();
        let pkg = cache.register_package(package("core", "1.0.0"));
        cache.extend_entries([
            entry(&pkg, "A", "X", "resource", None),
            entry(&pkg, "A", "X", "resource", Some("2.0.0")),
        ]);

        let results = cache.search(&SearchCriteria::new().with_version("2.0.0"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_search_by_package() {
        let mut cache = CanonicalCache::new();
        let core = cache.register_package(package("core", "1.0.0"));
        let ext = cache.register_package(package("ext", "0.1.0"));
        cache.extend_entries([
            entry(&core, "A", "X", "resource", Some("1.0.0")),
            entry(&ext, "A", "X", "resource", Some("1.0.0")),
            entry(&core, "B", "Y", "resource", None),
        ]);

        let results = cache.search(&SearchCriteria::new().with_url("A"));
        assert_eq!(results.len(), 2, "duplicate canonicals are not collapsed");

        let results = cache.search(&SearchCriteria::new().with_url("A").with_package("ext"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].package.name(), "ext");
    }

    #[test]
    fn test_resolve_prefers_highest_version() {
        let mut cache = CanonicalCache::new();
        let pkg = cache.register_package(package("core", "1.0.0"));
        cache.extend_entries([
            entry(&pkg, "A", "X", "resource", Some("1.2.0")),
            entry(&pkg, "A", "X", "resource", Some("1.10.0")),
            entry(&pkg, "A", "X", "resource", None),
            entry(&pkg, "A", "X", "resource", Some("1.9.0")),
        ]);

        let resolved = cache.resolve("A").unwrap();
        assert_eq!(resolved.version.as_deref(), Some("1.10.0"));

        assert_eq!(cache.versions_of("A"), vec!["1.2.0", "1.10.0", "1.9.0"]);
        assert!(cache.resolve("missing").is_none());
    }

    #[test]
    fn test_resolve_mixed_version_forms_ignores_ingest_order() {
        let orders = [
            ["1.10.0", "1.9", "1.9.0"],
            ["1.9.0", "1.9", "1.10.0"],
            ["1.9", "1.10.0", "1.9.0"],
        ];
        for order in orders {
            let mut cache = CanonicalCache::new();
            let pkg = cache.register_package(package("core", "1.0.0"));
            cache.extend_entries(
                order
                    .iter()
                    .map(|v| entry(&pkg, "A", "X", "resource", Some(*v))),
            );
            assert_eq!(
                cache.resolve("A").unwrap().version.as_deref(),
                Some("1.10.0"),
                "order {order:?}"
            );
        }

        let mut cache = CanonicalCache::new();
        let pkg = cache.register_package(package("core", "1.0.0"));
        cache.extend_entries([
            entry(&pkg, "B", "X", "resource", Some("9.0.0")),
            entry(&pkg, "B", "X", "resource", Some("10.0")),
        ]);
        assert_eq!(cache.resolve("B").unwrap().version.as_deref(), Some("10.0"));
    }

    #[test]
    fn test_resolve_ties_go_to_first_ingested() {
        let mut cache = CanonicalCache::new();
        let core = cache.register_package(package("core", "1.0.0"));
        let ext = cache.register_package(package("ext", "0.1.0"));
        cache.extend_entries([
            entry(&core, "A", "X", "resource", Some("4.0.1")),
            entry(&ext, "A", "X", "resource", Some("4.0.1")),
        ]);

        assert_eq!(cache.resolve("A").unwrap().package.name(), "core");

        let pinned = cache.resolve_version("A", "4.0.1").unwrap();
        assert_eq!(pinned.package.name(), "core");
        assert!(cache.resolve_version("A", "5.0.0").is_none());
    }

    #[test]
    fn test_non_semver_versions_compare_as_strings() {
        assert_eq!(compare_versions(Some("r4"), Some("r5")), Ordering::Less);
        assert_eq!(compare_versions(Some("1.0.0"), None), Ordering::Greater);
        assert_eq!(compare_versions(None, None), Ordering::Equal);
        assert_eq!(compare_versions(Some("1.9"), Some("1.9.0")), Ordering::Equal);
        assert_eq!(compare_versions(Some("4.0.1"), Some("r5")), Ordering::Greater);
        assert_eq!(
            compare_versions(Some("5.0.0-ballot"), Some("5.0")),
            Ordering::Less
        );
    }

    #[test]
    fn test_register_package_replaces_by_name() {
        let mut cache = CanonicalCache::new();
        cache.register_package(package("core", "1.0.0"));
        cache.register_package(package("core", "2.0.0"));

        assert_eq!(cache.package_count(), 1);
        assert_eq!(cache.package("core").unwrap().version(), "2.0.0");
    }

    #[test]
    fn test_packages_sorted_by_name() {
        let mut cache = CanonicalCache::new();
        cache.register_package(package("zeta", "1.0.0"));
        cache.register_package(package("alpha", "1.0.0"));

        let names: Vec<&str> = cache.packages().map(|p| p.name()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_clear() {
        let mut cache = sample_cache();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.package_count(), 0);
    }
}
