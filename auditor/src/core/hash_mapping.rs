//! Content hashes of audited files, keyed by project, commit and plugin.
//!
//! Layout of the persisted store:
//!
//! ```text
//! {project: {commit_key: {plugin_identity: {relative_path: sha256_hex}}}}
//! ```
//!
//! The `fallback` commit key holds the most recent successful session of every
//! plugin. A commit key seen for the first time starts as a copy of it, so a
//! new commit only re-audits files whose content actually changed.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Commit key used when there is no commit, and the baseline for new keys.
pub const FALLBACK: &str = "fallback";
/// Prefix marking sessions recorded on a dirty working tree.
pub const UNCOMMITTED: &str = "uncommitted";

/// Relative path to hex digest.
pub type FileHashes = BTreeMap<String, String>;
/// Plugin identity to file hashes.
pub type CommitEntry = BTreeMap<String, FileHashes>;
/// Commit key to commit entry.
pub type ProjectEntry = BTreeMap<String, CommitEntry>;

/// Resolve the commit key for a cached run.
///
/// `commit` is the current commit hash, if any. A dirty tree gets its own
/// `uncommitted-` key so its hashes never masquerade as the commit's.
pub fn commit_key(commit: Option<&str>, clean: bool) -> String {
    let base = commit.unwrap_or(FALLBACK);
    if clean {
        base.to_string()
    } else {
        format!("{UNCOMMITTED}-{base}")
    }
}

/// The whole persisted cache, for every project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashStore {
    projects: BTreeMap<String, ProjectEntry>,
}

impl HashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn project(&self, project: &str) -> Option<&ProjectEntry> {
        self.projects.get(project)
    }

    /// Stored hashes for one plugin identity under one commit key.
    pub fn hashes(&self, project: &str, commit: &str, identity: &str) -> Option<&FileHashes> {
        self.projects.get(project)?.get(commit)?.get(identity)
    }

    /// Drop commit keys of `project` that are no longer reachable.
    ///
    /// `fallback` and `uncommitted-*` keys are always kept. Returns the number
    /// of keys removed.
    pub fn retain_commits(&mut self, project: &str, reachable: &HashSet<String>) -> usize {
        let Some(entry) = self.projects.get_mut(project) else {
            return 0;
        };
        let before = entry.len();
        entry.retain(|key, _| {
            key == FALLBACK || key.starts_with(UNCOMMITTED) || reachable.contains(key)
        });
        before - entry.len()
    }
}

/// One cached session: the view of a single `(project, commit, identity)`
/// cell, plus the store it came from.
#[derive(Debug, Clone)]
pub struct HashMapping {
    store: HashStore,
    project: String,
    commit: String,
    identity: String,
    session: FileHashes,
}

impl HashMapping {
    /// Open a session, seeding an unseen commit key from `fallback`.
    pub fn open(
        mut store: HashStore,
        project: impl Into<String>,
        commit: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        let project = project.into();
        let commit = commit.into();
        let identity = identity.into();

        let entry = store.projects.entry(project.clone()).or_default();
        if !entry.contains_key(&commit) {
            let seed = entry.get(FALLBACK).cloned().unwrap_or_default();
            entry.insert(commit.clone(), seed);
        }
        let session = entry
            .get(&commit)
            .and_then(|c| c.get(&identity))
            .cloned()
            .unwrap_or_default();

        Self {
            store,
            project,
            commit,
            identity,
            session,
        }
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn session(&self) -> &FileHashes {
        &self.session
    }

    /// True if `path` was recorded with exactly `hash`.
    pub fn matches(&self, path: &str, hash: &str) -> bool {
        self.session.get(path).is_some_and(|stored| stored == hash)
    }

    /// Record the hash of `path`, or forget it when the file no longer exists.
    pub fn save_hash(&mut self, path: impl Into<String>, hash: Option<String>) {
        let path = path.into();
        match hash {
            Some(hash) => {
                self.session.insert(path, hash);
            }
            None => {
                self.session.remove(&path);
            }
        }
    }

    /// Fold the session back into the store.
    ///
    /// The commit entry for this identity becomes the session, and `fallback`
    /// becomes a copy of the whole commit entry.
    pub fn into_store(mut self) -> HashStore {
        let entry = self.store.projects.entry(self.project).or_default();
        let commit = entry.entry(self.commit).or_default();
        commit.insert(self.identity, self.session);
        let baseline = commit.clone();
        entry.insert(FALLBACK.to_string(), baseline);
        self.store
    }
}
