//! Error types for the PSI core.
//!
//! Four kinds of failure cross the library boundary: bad parameters, witness
//! store I/O, empty inputs, and wire-format violations. Cryptographic
//! non-matches (noise overflow, match rate below threshold) are not errors;
//! they are reported as absent elements in the intersection.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PsiError>;

/// Errors surfaced by the PSI core.
#[derive(Debug)]
pub enum PsiError {
    /// Unsupported ring dimension, modulus incompatible with the NTT, or a
    /// tree depth that would overflow 63 layers.
    Config(String),
    /// The witness store could not be opened, read, or written.
    Store {
        /// Path of the store file involved.
        path: PathBuf,
        /// What the store was doing when it failed.
        detail: String,
        /// Underlying I/O error, when one exists.
        source: Option<io::Error>,
    },
    /// An operation that requires data was handed an empty set.
    EmptyInput(&'static str),
    /// Cross-boundary parameter or ciphertext bytes failed shape checks.
    Serialization(String),
}

impl PsiError {
    pub(crate) fn store(
        path: impl Into<PathBuf>,
        detail: impl Into<String>,
        source: io::Error,
    ) -> Self {
        PsiError::Store {
            path: path.into(),
            detail: detail.into(),
            source: Some(source),
        }
    }

    pub(crate) fn store_corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        PsiError::Store {
            path: path.into(),
            detail: detail.into(),
            source: None,
        }
    }
}

impl fmt::Display for PsiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PsiError::Config(msg) => write!(f, "invalid parameters: {msg}"),
            PsiError::Store { path, detail, .. } => {
                write!(f, "witness store {}: {}", path.display(), detail)
            }
            PsiError::EmptyInput(what) => write!(f, "empty input: {what}"),
            PsiError::Serialization(msg) => write!(f, "serialization: {msg}"),
        }
    }
}

impl std::error::Error for PsiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PsiError::Store { source, .. } => source.as_ref().map(|e| e as _),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_cause() {
        let err = PsiError::store(
            "/tmp/tree.db",
            "write node",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/tree.db"));
        assert!(msg.contains("write node"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_config_display() {
        let err = PsiError::Config("ring dimension 100 unsupported".into());
        assert!(err.to_string().contains("ring dimension 100"));
        assert!(std::error::Error::source(&err).is_none());
    }
}
