//! Version storage abstraction layer
//!
//! This module provides a trait-based abstraction over the places a version
//! can live, allowing every backend to share one read-modify-write protocol.
//!
//! # Overview
//!
//! The primary abstraction is the [VersionStore] trait: read the current value
//! together with a concurrency token, then write back only if the token still
//! matches. The concrete implementations include:
//!
//! - [s3::S3Store]: an object in an S3 bucket, token = ETag
//! - [gcs::GcsStore]: an object in a Google Cloud Storage bucket, token = generation
//! - [git::GitStore]: a file on a git branch, token = branch head commit
//! - [memory::MemoryStore]: an in-process value for testing
//!
//! # Usage
//!
//! Callers normally go through [crate::driver::StoreDriver], which wraps a
//! store and implements the retrying bump on top of it.
//!
//! ```rust
//! # use semver_store::store::{VersionStore, WriteOutcome};
//! # use semver_store::domain::{Bump, SemanticVersion};
//! # fn example<S: VersionStore>(store: &S) -> semver_store::Result<()> {
//! let snapshot = store.read()?;
//! let current = snapshot.version.unwrap_or_default();
//! let next = Bump::Patch.apply(&current)?;
//! match store.write_if(&next, &snapshot.token)? {
//!     WriteOutcome::Written => println!("stored {}", next),
//!     WriteOutcome::Conflict => println!("someone else got there first"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod gcs;
pub mod git;
pub mod memory;
pub mod s3;
pub mod tls;

pub use gcs::GcsStore;
pub use git::GitStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

use crate::domain::SemanticVersion;
use crate::error::Result;
use std::fmt;

/// Current stored value and the token observed with it
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// The stored version, or `None` if nothing has been written yet
    pub version: Option<SemanticVersion>,
    /// Opaque marker that changes whenever the stored value changes
    pub token: T,
}

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was stored
    Written,
    /// The stored value changed since the token was read; nothing was written
    Conflict,
}

/// Storage for a single version value with a conditional-write primitive
///
/// ## Concurrency
///
/// Implementations must assume another process may write at any time. The
/// conditional write is the only mutual exclusion available: `write_if` has
/// to reject the write when the backend-native token differs from `expected`,
/// including the "nothing stored yet" case.
///
/// ## Error Handling
///
/// Transport and authentication failures are returned as
/// [crate::error::SemverStoreError::StorageUnavailable]. A lost race is not an
/// error: it is reported as [WriteOutcome::Conflict].
///
/// ## Implementations
///
/// - [S3Store](s3::S3Store)
/// - [GcsStore](gcs::GcsStore)
/// - [GitStore](git::GitStore)
/// - [MemoryStore](memory::MemoryStore)
pub trait VersionStore: Send {
    /// Backend-native concurrency token (ETag, generation, commit id, ...)
    type Token: Clone + fmt::Debug + Send;

    /// Read the current value and its token
    ///
    /// # Returns
    /// * `Ok(Snapshot)` - The stored version (if any) and the token to pass to `write_if`
    /// * `Err` - If storage cannot be reached or holds an invalid version
    fn read(&self) -> Result<Snapshot<Self::Token>>;

    /// Store `version` only if the stored value still carries `expected`
    ///
    /// # Returns
    /// * `Ok(WriteOutcome::Written)` - The version was stored
    /// * `Ok(WriteOutcome::Conflict)` - The stored value changed since `expected` was read
    /// * `Err` - If storage cannot be reached
    fn write_if(&self, version: &SemanticVersion, expected: &Self::Token) -> Result<WriteOutcome>;

    /// Store `version` regardless of what is currently stored
    fn write(&self, version: &SemanticVersion) -> Result<()>;
}
