//! Canon - canonical resource index and package cache
//!
//! Packages on disk carry a `package.json` manifest and a hidden
//! `.index.json` listing the resources they provide. This crate scans
//! those packages into a [`CanonicalCache`] and answers structured
//! queries against it.
//!
//! # Architecture
//!
//! ```text
//! CanonicalManager
//!     │
//!     ├── PackageFetcher      ← materializes missing packages (registry)
//!     │
//!     ├── scanner::scan       ← package.json + .index.json (+ examples/)
//!     │       │
//!     │       ▼
//!     │   index::process      ← appends IndexEntry values
//!     │
//!     └── CanonicalCache      ← packages by name, entries in ingest order
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fs;
pub mod index;
pub mod lock;
pub mod manager;
pub mod package;
pub mod scanner;

pub use cache::{CanonicalCache, SearchCriteria};
pub use config::{ManagerConfig, DEFAULT_REGISTRY_URL};
pub use error::ScanError;
pub use fetch::PackageFetcher;
pub use index::{IndexEntry, IndexManifest, ResourceDescriptor};
pub use lock::{LockedPackage, PackageLock};
pub use manager::{CanonicalManager, InitReport, PackageReport, PackageStatus};
pub use package::{PackageIdentity, PackageInfo, PackageManifest};
pub use scanner::ScanOutcome;
