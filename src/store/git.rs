use crate::domain::SemanticVersion;
use crate::driver::MAX_RETRIES;
use crate::error::{SemverStoreError, Result};
use crate::store::{Snapshot, VersionStore, WriteOutcome};
use git2::{
    CertificateCheckStatus, Commit, Cred, CredentialType, ErrorCode, FetchOptions, FetchPrune,
    FileMode, ObjectType, Oid, PushOptions, RemoteCallbacks, Repository, Signature, Tree,
};
use regex::Regex;
use std::cell::RefCell;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::TempDir;
use tracing::{debug, info};

const REMOTE_NAME: &str = "origin";
const DEFAULT_AUTHOR_NAME: &str = "semver-store";
const DEFAULT_AUTHOR_EMAIL: &str = "semver-store@localhost";
pub const DEFAULT_COMMIT_MESSAGE: &str = "bump to %version%";

/// libgit2 keeps asking for credentials while the server rejects them
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Push statuses that mean the branch moved underneath us
const RACE_STATUSES: &[&str] = &[
    "non-fast-forward",
    "fetch first",
    "stale info",
    "cannot lock ref",
    "failed to update ref",
];

/// Validated settings for the version-control driver
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GitSpec {
    pub uri: String,
    pub branch: String,
    /// Path of the version file inside the repository, `/`-separated
    pub file: String,
    /// PEM-encoded SSH private key
    pub private_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Commit identity as `Name <email>`
    pub git_user: Option<String>,
    /// Commit message template with `%version%` and `%file%` placeholders
    pub commit_message: Option<String>,
    pub skip_ssl_verification: bool,
}

/// Commit author/committer identity
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    /// Parse `Name <email>`, falling back to the default identity when absent
    pub fn parse(git_user: Option<&str>) -> Result<Self> {
        let Some(text) = git_user.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Identity {
                name: DEFAULT_AUTHOR_NAME.to_string(),
                email: DEFAULT_AUTHOR_EMAIL.to_string(),
            });
        };

        let pattern = Regex::new(r"^(.+?)\s*<([^<>]*)>$")
            .map_err(|e| SemverStoreError::config(e.to_string()))?;
        let captures = pattern.captures(text).ok_or_else(|| {
            SemverStoreError::config(format!(
                "git_user must look like 'Name <email>', got '{}'",
                text
            ))
        })?;

        Ok(Identity {
            name: captures[1].to_string(),
            email: captures[2].to_string(),
        })
    }

    fn signature(&self) -> Result<Signature<'static>> {
        Ok(Signature::now(&self.name, &self.email)?)
    }
}

/// Version stored as a file on a git branch, guarded by the branch head
///
/// Every read fetches the branch into a private scratch repository. A write
/// commits on top of the head that was read and pushes without force, so a
/// push that is not a fast-forward means another writer got there first.
pub struct GitStore {
    // Declared before `_workdir` so the repository is closed before its
    // directory is removed.
    repo: Mutex<Repository>,
    _workdir: TempDir,
    spec: GitSpec,
    author: Identity,
}

impl GitStore {
    /// Prepare a scratch repository for `spec`; nothing is fetched yet
    pub fn open(spec: GitSpec) -> Result<Self> {
        let author = Identity::parse(spec.git_user.as_deref())?;
        let workdir = tempfile::Builder::new()
            .prefix("semver-store-git-")
            .tempdir()?;
        let repo = Repository::init_bare(workdir.path())?;
        repo.remote(REMOTE_NAME, &spec.uri)?;

        debug!(uri = %spec.uri, branch = %spec.branch, workdir = %workdir.path().display(), "prepared scratch repository");

        Ok(GitStore {
            repo: Mutex::new(repo),
            _workdir: workdir,
            spec,
            author,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.spec.branch)
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", REMOTE_NAME, self.spec.branch)
    }

    fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        let mut attempts = 0;

        callbacks.credentials(move |_url, username_from_url, allowed_types| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str(
                    "authentication failed: credentials were rejected",
                ));
            }

            let username = self
                .spec
                .username
                .as_deref()
                .or(username_from_url)
                .unwrap_or("git");

            if allowed_types.contains(CredentialType::SSH_KEY) {
                if let Some(key) = &self.spec.private_key {
                    return Cred::ssh_key_from_memory(username, None, key, None);
                }
                if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                    return Ok(cred);
                }
            }

            if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let (Some(user), Some(password)) = (&self.spec.username, &self.spec.password) {
                    return Cred::userpass_plaintext(user, password);
                }
            }

            Cred::default()
        });

        if self.spec.skip_ssl_verification {
            callbacks.certificate_check(|_cert, _host| Ok(CertificateCheckStatus::CertificateOk));
        }

        callbacks
    }

    /// Fetch the branch and return its head, or `None` if it does not exist
    fn fetch(&self, repo: &Repository) -> Result<Option<Oid>> {
        let mut remote = repo.find_remote(REMOTE_NAME)?;
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.callbacks());
        options.prune(FetchPrune::On);

        let refspec = format!("+{}:{}", self.branch_ref(), self.tracking_ref());
        remote
            .fetch(&[refspec.as_str()], Some(&mut options), None)
            .map_err(|e| {
                SemverStoreError::storage(format!(
                    "failed to fetch {} from {}: {}",
                    self.spec.branch,
                    self.spec.uri,
                    e.message()
                ))
            })?;

        match repo.find_reference(&self.tracking_ref()) {
            Ok(reference) => Ok(reference.target()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_file(&self, repo: &Repository, head: Oid) -> Result<Option<SemanticVersion>> {
        let tree = repo.find_commit(head)?.tree()?;
        let entry = match tree.get_path(Path::new(&self.spec.file)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let object = entry.to_object(repo)?;
        let blob = object.as_blob().ok_or_else(|| {
            SemverStoreError::storage(format!("'{}' is not a file", self.spec.file))
        })?;
        let text = std::str::from_utf8(blob.content())
            .map_err(|_| SemverStoreError::version("stored version is not valid UTF-8"))?;

        Ok(Some(SemanticVersion::parse(text)?))
    }

    fn commit_message(&self, version: &SemanticVersion) -> String {
        self.spec
            .commit_message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_COMMIT_MESSAGE)
            .replace("%version%", &version.to_string())
            .replace("%file%", &self.spec.file)
    }

    /// Commit `version` on top of `parent` and point the local branch at it
    ///
    /// Returns `None` when the file already holds exactly this content.
    fn commit_version(
        &self,
        repo: &Repository,
        version: &SemanticVersion,
        parent: Option<Oid>,
    ) -> Result<Option<Oid>> {
        let parent = parent.map(|oid| repo.find_commit(oid)).transpose()?;
        let base_tree = parent.as_ref().map(Commit::tree).transpose()?;

        let blob = repo.blob(format!("{}\n", version).as_bytes())?;
        let path: Vec<&str> = self
            .spec
            .file
            .split('/')
            .filter(|part| !part.is_empty())
            .collect();
        let tree_oid = upsert_blob(repo, base_tree.as_ref(), &path, blob)?;

        if base_tree.as_ref().map(Tree::id) == Some(tree_oid) {
            return Ok(None);
        }

        let tree = repo.find_tree(tree_oid)?;
        let signature = self.author.signature()?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let commit = repo.commit(
            None,
            &signature,
            &signature,
            &self.commit_message(version),
            &tree,
            &parents,
        )?;

        repo.reference(&self.branch_ref(), commit, true, "semver-store: commit version")?;
        Ok(Some(commit))
    }

    /// Push the local branch without force
    fn push(&self, repo: &Repository) -> Result<WriteOutcome> {
        let mut remote = repo.find_remote(REMOTE_NAME)?;
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        let mut callbacks = self.callbacks();
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                *rejection.borrow_mut() = Some(format!("{}: {}", refname, status));
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let refspec = format!("{0}:{0}", self.branch_ref());
        match remote.push(&[refspec.as_str()], Some(&mut options)) {
            Ok(()) => {}
            Err(e) if e.code() == ErrorCode::NotFastForward => {
                debug!(branch = %self.spec.branch, reason = e.message(), "push rejected");
                return Ok(WriteOutcome::Conflict);
            }
            Err(e) => {
                return Err(SemverStoreError::storage(format!(
                    "failed to push {} to {}: {}",
                    self.spec.branch,
                    self.spec.uri,
                    e.message()
                )))
            }
        }

        match rejection.take() {
            None => Ok(WriteOutcome::Written),
            Some(reason) if is_race(&reason) => {
                debug!(branch = %self.spec.branch, %reason, "push rejected by remote");
                Ok(WriteOutcome::Conflict)
            }
            Some(reason) => Err(SemverStoreError::storage(format!(
                "remote rejected push: {}",
                reason
            ))),
        }
    }
}

impl VersionStore for GitStore {
    type Token = Option<Oid>;

    fn read(&self) -> Result<Snapshot<Option<Oid>>> {
        let repo = self.lock();
        let head = self.fetch(&repo)?;
        let version = match head {
            Some(oid) => self.read_file(&repo, oid)?,
            None => None,
        };

        Ok(Snapshot {
            version,
            token: head,
        })
    }

    fn write_if(&self, version: &SemanticVersion, expected: &Option<Oid>) -> Result<WriteOutcome> {
        let repo = self.lock();
        match self.commit_version(&repo, version, *expected)? {
            Some(commit) => {
                debug!(%commit, %version, "committed version");
                self.push(&repo)
            }
            None => Ok(WriteOutcome::Written),
        }
    }

    fn write(&self, version: &SemanticVersion) -> Result<()> {
        let repo = self.lock();

        // A forced push would discard other writers' history, so an
        // unconditional write commits on the latest head and retries races.
        for attempt in 1..=MAX_RETRIES {
            let head = self.fetch(&repo)?;
            if self.commit_version(&repo, version, head)?.is_none() {
                info!(%version, "version file already up to date");
                return Ok(());
            }

            match self.push(&repo)? {
                WriteOutcome::Written => return Ok(()),
                WriteOutcome::Conflict => debug!(attempt, "branch moved while setting version, retrying"),
            }
        }

        Err(SemverStoreError::ConcurrentModification {
            attempts: MAX_RETRIES,
        })
    }
}

fn is_race(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    RACE_STATUSES.iter().any(|status| reason.contains(status))
}

/// Write `blob` at `path` below `base`, creating intermediate trees as needed
fn upsert_blob(repo: &Repository, base: Option<&Tree<'_>>, path: &[&str], blob: Oid) -> Result<Oid> {
    let (name, rest) = path
        .split_first()
        .ok_or_else(|| SemverStoreError::config("git file path is empty"))?;
    let mut builder = repo.treebuilder(base)?;

    if rest.is_empty() {
        builder.insert(*name, blob, FileMode::Blob.into())?;
    } else {
        let subtree = match base.and_then(|tree| tree.get_name(name)) {
            Some(entry) if entry.kind() == Some(ObjectType::Tree) => Some(repo.find_tree(entry.id())?),
            _ => None,
        };
        let child = upsert_blob(repo, subtree.as_ref(), rest, blob)?;
        builder.insert(*name, child, FileMode::Tree.into())?;
    }

    Ok(builder.write()?)
}
