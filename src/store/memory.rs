use crate::domain::SemanticVersion;
use crate::error::Result;
use crate::store::{Snapshot, VersionStore, WriteOutcome};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-process version store for testing without remote storage
///
/// Clones share the same underlying value, so several drivers built from
/// clones behave like independent processes racing on one remote object.
/// The token is a revision counter that starts at 0 for an empty store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    contents: Option<String>,
    revision: u64,
    forced_conflicts: usize,
    conflicts: usize,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `version`
    pub fn with_version(version: &SemanticVersion) -> Self {
        Self::with_contents(version.to_string())
    }

    /// Create a store holding raw text, which need not be a valid version
    pub fn with_contents(contents: impl Into<String>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            state.contents = Some(contents.into());
            state.revision = 1;
        }
        store
    }

    /// Make the next `n` conditional writes report a conflict
    pub fn fail_next_writes(&self, n: usize) {
        self.lock().forced_conflicts = n;
    }

    /// Number of conditional writes rejected so far
    pub fn conflicts(&self) -> usize {
        self.lock().conflicts
    }

    /// Raw stored text
    pub fn contents(&self) -> Option<String> {
        self.lock().contents.clone()
    }

    /// Current revision (the token a fresh read would return)
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VersionStore for MemoryStore {
    type Token = u64;

    fn read(&self) -> Result<Snapshot<u64>> {
        let state = self.lock();
        let version = state
            .contents
            .as_deref()
            .map(SemanticVersion::parse)
            .transpose()?;

        Ok(Snapshot {
            version,
            token: state.revision,
        })
    }

    fn write_if(&self, version: &SemanticVersion, expected: &u64) -> Result<WriteOutcome> {
        let mut state = self.lock();

        if state.forced_conflicts > 0 {
            state.forced_conflicts -= 1;
            state.conflicts += 1;
            return Ok(WriteOutcome::Conflict);
        }

        if state.revision != *expected {
            state.conflicts += 1;
            return Ok(WriteOutcome::Conflict);
        }

        state.contents = Some(version.to_string());
        state.revision += 1;
        Ok(WriteOutcome::Written)
    }

    fn write(&self, version: &SemanticVersion) -> Result<()> {
        let mut state = self.lock();
        state.contents = Some(version.to_string());
        state.revision += 1;
        Ok(())
    }
}
