//! Scan error types
//!
//! Everything that can go wrong while reading a package directory. These
//! never escape [`crate::scanner::scan`]; they are carried inside
//! [`crate::scanner::ScanOutcome`] so callers can count partial failures.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while scanning a package or processing an index file
#[derive(Error, Debug)]
pub enum ScanError {
    /// A manifest or index file is missing or could not be read
    #[error("Failed to read {path}")]
    ManifestUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest or index file is not valid JSON for its schema
    #[error("Failed to parse {path}")]
    ManifestMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A package directory could not be probed
    #[error("Package directory is not accessible: {path}")]
    DirectoryInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Index entries were offered for a package the cache does not know
    #[error("Package '{name}' is not registered in the cache")]
    PackageNotRegistered { name: String },
}

impl ScanError {
    /// The file or directory this error is about, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            ScanError::ManifestUnreadable { path, .. }
            | ScanError::ManifestMalformed { path, .. }
            | ScanError::DirectoryInaccessible { path, .. } => Some(path),
            ScanError::PackageNotRegistered { .. } => None,
        }
    }

    /// Render the error together with its source chain
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_includes_source() {
        let err = ScanError::ManifestUnreadable {
            path: PathBuf::from("/tmp/pkg/package.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };

        let rendered = err.chain();
        assert!(rendered.starts_with("Failed to read /tmp/pkg/package.json"));
        assert!(rendered.ends_with("no such file"));
        assert_eq!(err.path(), Some(std::path::Path::new("/tmp/pkg/package.json")));
    }

    #[test]
    fn test_unregistered_has_no_path() {
        let err = ScanError::PackageNotRegistered {
            name: "hl7.fhir.r4.core".to_string(),
        };
        assert!(err.path().is_none());
        assert_eq!(
            err.to_string(),
            "Package 'hl7.fhir.r4.core' is not registered in the cache"
        );
    }
}
