use thiserror::Error;

/// Unified error type for semver-store operations
#[derive(Error, Debug)]
pub enum SemverStoreError {
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    #[error("No pre-release to finalize: {0} is already a final version")]
    NoPrereleaseToFinalize(String),

    #[error("Concurrent modification: version changed on every one of {attempts} attempts")]
    ConcurrentModification { attempts: usize },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in semver-store
pub type Result<T> = std::result::Result<T, SemverStoreError>;

impl SemverStoreError {
    /// Create an invalid version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        SemverStoreError::InvalidVersion(msg.into())
    }

    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        SemverStoreError::InvalidConfiguration(msg.into())
    }

    /// Create a storage error with context
    pub fn storage(msg: impl Into<String>) -> Self {
        SemverStoreError::StorageUnavailable(msg.into())
    }
}

impl From<git2::Error> for SemverStoreError {
    fn from(err: git2::Error) -> Self {
        SemverStoreError::StorageUnavailable(format!("git: {}", err.message()))
    }
}

impl From<toml::de::Error> for SemverStoreError {
    fn from(err: toml::de::Error) -> Self {
        SemverStoreError::InvalidConfiguration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SemverStoreError::config("bucket is required");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: bucket is required"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SemverStoreError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_from_git2_is_storage_failure() {
        let err: SemverStoreError = git2::Error::from_str("connection refused").into();
        assert!(matches!(err, SemverStoreError::StorageUnavailable(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_from_toml_is_configuration_failure() {
        let toml_err = toml::from_str::<toml::Value>("bucket = ").unwrap_err();
        let err: SemverStoreError = toml_err.into();
        assert!(matches!(err, SemverStoreError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_concurrent_modification_reports_attempts() {
        let err = SemverStoreError::ConcurrentModification { attempts: 12 };
        assert!(err.to_string().contains("12 attempts"));
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (SemverStoreError::version("x"), "Invalid version"),
            (SemverStoreError::config("x"), "Invalid configuration"),
            (SemverStoreError::storage("x"), "Storage unavailable"),
            (SemverStoreError::UnknownDriver("x".into()), "Unknown driver"),
            (
                SemverStoreError::NoPrereleaseToFinalize("1.0.0".into()),
                "No pre-release to finalize",
            ),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }
}
