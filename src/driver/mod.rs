//! The uniform driver contract and the shared read-modify-write protocol
//!
//! Every backend is a [VersionStore]; [StoreDriver] turns any store into a
//! [Driver] so the bump retry loop exists exactly once.

pub mod selector;

pub use selector::from_source;

use crate::domain::{Bump, SemanticVersion};
use crate::error::{SemverStoreError, Result};
use crate::store::{VersionStore, WriteOutcome};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Maximum number of read-apply-write attempts for a single bump
pub const MAX_RETRIES: usize = 12;

/// Operations the CLI performs against the stored version
pub trait Driver: Send {
    /// Atomically advance the stored version by `rule` and return the new version
    ///
    /// Fails with `ConcurrentModification` when every attempt lost a race.
    fn bump(&self, rule: &Bump) -> Result<SemanticVersion>;

    /// Overwrite the stored version unconditionally (last writer wins)
    fn set(&self, version: &SemanticVersion) -> Result<()>;

    /// Versions that are new relative to `cursor`
    ///
    /// * `None` - the current version (or the initial version if nothing is stored)
    /// * `Some(cursor)` - the current version if its precedence is `>= cursor`
    ///   (build metadata ignored), otherwise nothing
    fn check(&self, cursor: Option<&SemanticVersion>) -> Result<Vec<SemanticVersion>>;
}

/// [Driver] implementation over any [VersionStore]
pub struct StoreDriver<S> {
    store: S,
    initial_version: SemanticVersion,
    max_attempts: usize,
}

impl<S: VersionStore> StoreDriver<S> {
    /// Wrap `store`, using `initial_version` while nothing is stored
    pub fn new(store: S, initial_version: SemanticVersion) -> Self {
        Self::with_max_attempts(store, initial_version, MAX_RETRIES)
    }

    /// Same as [StoreDriver::new] with an explicit attempt ceiling
    pub fn with_max_attempts(store: S, initial_version: SemanticVersion, max_attempts: usize) -> Self {
        StoreDriver {
            store,
            initial_version,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl<S: VersionStore> Driver for StoreDriver<S> {
    fn bump(&self, rule: &Bump) -> Result<SemanticVersion> {
        for attempt in 1..=self.max_attempts {
            // Every attempt re-reads: the token must come from the read that
            // immediately precedes the conditional write.
            let snapshot = self.store.read()?;
            let current = snapshot
                .version
                .unwrap_or_else(|| self.initial_version.clone());
            let next = rule.apply(&current)?;

            debug!(attempt, %current, %next, token = ?snapshot.token, "attempting bump");

            match self.store.write_if(&next, &snapshot.token)? {
                WriteOutcome::Written => {
                    info!(%current, %next, %rule, attempt, "bumped version");
                    return Ok(next);
                }
                WriteOutcome::Conflict => {
                    debug!(attempt, "version changed since it was read, retrying");
                }
            }
        }

        Err(SemverStoreError::ConcurrentModification {
            attempts: self.max_attempts,
        })
    }

    fn set(&self, version: &SemanticVersion) -> Result<()> {
        self.store.write(version)?;
        info!(%version, "set version");
        Ok(())
    }

    fn check(&self, cursor: Option<&SemanticVersion>) -> Result<Vec<SemanticVersion>> {
        let snapshot = self.store.read()?;

        let versions = match (snapshot.version, cursor) {
            (None, None) => vec![self.initial_version.clone()],
            (None, Some(_)) => Vec::new(),
            (Some(current), None) => vec![current],
            (Some(current), Some(cursor)) if current.precedence(cursor) != Ordering::Less => {
                vec![current]
            }
            (Some(_), Some(_)) => Vec::new(),
        };

        debug!(cursor = ?cursor.map(ToString::to_string), found = versions.len(), "checked version");
        Ok(versions)
    }
}
