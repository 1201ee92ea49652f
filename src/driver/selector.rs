//! Backend selection
//!
//! # Overview
//!
//! Maps a [Source] configuration to a ready [Driver]. The pure `*_spec`
//! functions validate and normalise the flat configuration record for one
//! backend; [from_source] then connects the matching store and wraps it in a
//! [StoreDriver].

use super::{Driver, StoreDriver};
use crate::config::Source;
use crate::domain::SemanticVersion;
use crate::error::{SemverStoreError, Result};
use crate::store::gcs::GcsSpec;
use crate::store::git::GitSpec;
use crate::store::s3::{S3Credentials, S3Spec};
use crate::store::{GcsStore, GitStore, S3Store};
use std::fmt;
use tracing::debug;

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    S3,
    Gcs,
    Git,
}

impl DriverKind {
    /// Resolve the `driver` field; empty means object storage
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim() {
            "" | "s3" => Ok(DriverKind::S3),
            "gcs" => Ok(DriverKind::Gcs),
            "git" => Ok(DriverKind::Git),
            other => Err(SemverStoreError::UnknownDriver(other.to_string())),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::S3 => write!(f, "s3"),
            DriverKind::Gcs => write!(f, "gcs"),
            DriverKind::Git => write!(f, "git"),
        }
    }
}

/// Build the driver described by `source`
///
/// # Arguments
/// * `source` - Source configuration
///
/// # Returns
/// * `Ok(Box<dyn Driver>)` - Driver bound to the configured backend
/// * `Err(UnknownDriver)` - `driver` names no supported backend
/// * `Err(InvalidConfiguration)` - Required fields are missing or invalid
pub fn from_source(source: &Source) -> Result<Box<dyn Driver>> {
    let kind = DriverKind::parse(&source.driver)?;
    let initial = initial_version(source)?;

    debug!(driver = %kind, initial = %initial, "selecting driver");

    let driver: Box<dyn Driver> = match kind {
        DriverKind::S3 => Box::new(StoreDriver::new(S3Store::connect(s3_spec(source)?)?, initial)),
        DriverKind::Gcs => Box::new(StoreDriver::new(GcsStore::connect(gcs_spec(source)?)?, initial)),
        DriverKind::Git => Box::new(StoreDriver::new(GitStore::open(git_spec(source)?)?, initial)),
    };

    Ok(driver)
}

/// The configured initial version, `0.0.0` when empty
pub fn initial_version(source: &Source) -> Result<SemanticVersion> {
    if source.initial_version.trim().is_empty() {
        return Ok(SemanticVersion::default());
    }

    SemanticVersion::parse(&source.initial_version).map_err(|e| {
        SemverStoreError::config(format!(
            "invalid initial version ({}): {}",
            source.initial_version, e
        ))
    })
}

pub fn s3_spec(source: &Source) -> Result<S3Spec> {
    require("bucket", &source.bucket)?;
    require("key", &source.key)?;

    if source.use_v2_signing {
        return Err(SemverStoreError::config(
            "use_v2_signing is not supported; requests are signed with SigV4",
        ));
    }

    let credentials = match (
        source.access_key_id.is_empty(),
        source.secret_access_key.is_empty(),
    ) {
        (true, true) => None,
        (false, false) => Some(S3Credentials {
            access_key_id: source.access_key_id.clone(),
            secret_access_key: source.secret_access_key.clone(),
            session_token: non_empty(&source.session_token),
        }),
        _ => {
            return Err(SemverStoreError::config(
                "access_key_id and secret_access_key must be given together",
            ))
        }
    };

    Ok(S3Spec {
        bucket: source.bucket.clone(),
        key: source.key.clone(),
        region: source.region().to_string(),
        endpoint: non_empty(&source.endpoint),
        credentials,
        disable_ssl: source.disable_ssl,
        skip_ssl_verification: source.skip_ssl_verification,
        server_side_encryption: non_empty(&source.server_side_encryption),
    })
}

pub fn gcs_spec(source: &Source) -> Result<GcsSpec> {
    require("bucket", &source.bucket)?;
    require("key", &source.key)?;

    Ok(GcsSpec {
        bucket: source.bucket.clone(),
        key: source.key.clone(),
        json_key: non_empty(&source.json_key),
        endpoint: non_empty(&source.endpoint),
    })
}

pub fn git_spec(source: &Source) -> Result<GitSpec> {
    require("uri", &source.uri)?;
    require("branch", &source.branch)?;
    require("file", source.file.trim_matches('/'))?;

    if source.username.is_empty() != source.password.is_empty() {
        return Err(SemverStoreError::config(
            "username and password must be given together",
        ));
    }

    Ok(GitSpec {
        uri: source.uri.clone(),
        branch: source.branch.clone(),
        file: source.file.trim_matches('/').to_string(),
        private_key: non_empty(&source.private_key),
        username: non_empty(&source.username),
        password: non_empty(&source.password),
        git_user: non_empty(&source.git_user),
        commit_message: non_empty(&source.commit_message),
        skip_ssl_verification: source.skip_ssl_verification,
    })
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(SemverStoreError::config(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
