use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory and the user config directory
pub const CONFIG_FILE_NAME: &str = "semver-store.toml";

/// Region used for the object-storage driver when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Source configuration: which backend holds the version and how to reach it.
///
/// The record is flat; each driver reads the fields it understands and the
/// backend selector validates that the required ones are present.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Source {
    /// Backend kind: `s3` (default when empty), `gcs` or `git`
    pub driver: String,

    /// Version used when nothing has been stored yet; `0.0.0` when empty
    pub initial_version: String,

    // Object storage (s3) and managed storage (gcs)
    pub bucket: String,
    pub key: String,

    // s3
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub region_name: String,
    pub endpoint: String,
    pub disable_ssl: bool,
    pub server_side_encryption: String,
    pub use_v2_signing: bool,

    // gcs
    pub json_key: String,

    // git
    pub uri: String,
    pub branch: String,
    pub file: String,
    pub private_key: String,
    pub username: String,
    pub password: String,
    pub git_user: String,
    pub commit_message: String,

    // s3 and git
    pub skip_ssl_verification: bool,
}

impl Source {
    /// Parse a source from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Region to use for s3, falling back to [`DEFAULT_REGION`]
    pub fn region(&self) -> &str {
        if self.region_name.is_empty() {
            DEFAULT_REGION
        } else {
            &self.region_name
        }
    }
}

/// Loads the source configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `semver-store.toml` in current directory
/// 3. `semver-store.toml` in user config directory
/// 4. Default (empty) source if no file found
///
/// # Returns
/// * `Ok(Source)` - Loaded or default source
/// * `Err` - If a file exists but cannot be read or parsed
pub fn load_source(config_path: Option<&str>) -> Result<Source> {
    match find_config_file(config_path) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading source configuration");
            Source::from_toml(&fs::read_to_string(path)?)
        }
        None => {
            tracing::debug!("no configuration file found, using defaults");
            Ok(Source::default())
        }
    }
}

fn find_config_file(config_path: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = config_path {
        return Some(PathBuf::from(path));
    }

    let local = Path::new(".").join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SemverStoreError;

    #[test]
    fn test_source_from_partial_toml_uses_defaults() {
        let source = Source::from_toml(
            r#"
bucket = "versions"
key = "app/version"
"#,
        )
        .unwrap();

        assert_eq!(source.bucket, "versions");
        assert_eq!(source.key, "app/version");
        assert_eq!(source.driver, "");
        assert_eq!(source.initial_version, "");
        assert!(!source.disable_ssl);
    }

    #[test]
    fn test_source_region_default() {
        let source = Source::default();
        assert_eq!(source.region(), "us-east-1");

        let source = Source {
            region_name: "eu-west-1".to_string(),
            ..Source::default()
        };
        assert_eq!(source.region(), "eu-west-1");
    }

    #[test]
    fn test_source_rejects_unknown_fields() {
        let err = Source::from_toml("bukket = \"typo\"").unwrap_err();
        assert!(matches!(err, SemverStoreError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_source_rejects_wrong_types() {
        let err = Source::from_toml("disable_ssl = \"yes\"").unwrap_err();
        assert!(matches!(err, SemverStoreError::InvalidConfiguration(_)));
    }
}
