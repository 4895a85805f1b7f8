//! On-disk cache layout, file hashing and garbage collection.
//!
//! Everything lives under `<root>/<cache.dir>/<crate version>/`, so a new
//! release never reads hashes recorded by an older one.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::core::hash_mapping::HashStore;
use crate::io::git::Vcs;
use crate::io::json_store;

const CACHEDIR_TAG: &str = "Signature: 8a477f597d28d172789f06886806bc55\n\
# This file is a cache directory tag created by auditor.\n\
# For information about cache directory tags see https://bford.info/cachedir/\n";

/// Locations of the persisted stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    /// `<root>/<cache.dir>`, tagged and ignored.
    pub root: PathBuf,
    /// Version-specific directory holding the stores.
    pub dir: PathBuf,
    /// Hash store.
    pub files: PathBuf,
    /// Durations record.
    pub durations: PathBuf,
}

impl CachePaths {
    pub fn new(project_root: &Path, cache_dir: &Path) -> Self {
        let root = project_root.join(cache_dir);
        let dir = root.join(env!("CARGO_PKG_VERSION"));
        Self {
            files: dir.join("files.json"),
            durations: dir.join("durations.json"),
            root,
            dir,
        }
    }

    /// Create the cache directory with a `CACHEDIR.TAG` and a `.gitignore`.
    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create directory {}", self.dir.display()))?;
        write_if_missing(&self.root.join("CACHEDIR.TAG"), CACHEDIR_TAG)?;
        write_if_missing(&self.root.join(".gitignore"), "*\n")?;
        Ok(())
    }
}

fn write_if_missing(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

pub fn read_store(paths: &CachePaths) -> HashStore {
    json_store::read_or_default(&paths.files)
}

pub fn write_store(paths: &CachePaths, store: &HashStore) -> Result<()> {
    json_store::write(&paths.files, store)
}

/// SHA-256 of the file content, hex encoded. `None` if the file is gone.
pub fn hash_file(path: &Path) -> Result<Option<String>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    let digest = Sha256::digest(&bytes);
    Ok(Some(hex::encode(digest)))
}

/// Remove commit keys of `project` that no longer exist in the repository.
pub fn collect_garbage(paths: &CachePaths, project: &str, vcs: &dyn Vcs) -> Result<usize> {
    if !paths.files.exists() {
        return Ok(0);
    }
    let mut store = read_store(paths);
    let reachable: HashSet<String> = vcs.rev_list_all()?.into_iter().collect();
    let removed = store.retain_commits(project, &reachable);
    if removed > 0 {
        info!(removed, "dropped cache entries for unreachable commits");
        write_store(paths, &store)?;
    } else {
        debug!("no unreachable commits in cache");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash_mapping::HashMapping;
    use crate::test_support::FakeVcs;

    #[test]
    fn create_tags_and_ignores_cache_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = CachePaths::new(temp.path(), Path::new(".auditor_cache"));
        paths.create().expect("create");
        let tag = fs::read_to_string(paths.root.join("CACHEDIR.TAG")).expect("tag");
        assert!(tag.starts_with("Signature: 8a477f597d28d172789f06886806bc55"));
        assert_eq!(
            fs::read_to_string(paths.root.join(".gitignore")).expect("ignore"),
            "*\n"
        );
        assert!(paths.dir.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn hash_file_is_sha256_hex() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("a.txt");
        fs::write(&path, "abc").expect("write");
        assert_eq!(
            hash_file(&path).expect("hash").as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(hash_file(&temp.path().join("gone")).expect("hash"), None);
    }

    #[test]
    fn garbage_collection_drops_unreachable_commits() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = CachePaths::new(temp.path(), Path::new(".cache"));
        let mut store = HashStore::new();
        for commit in ["old", "head"] {
            store = HashMapping::open(store, "demo", commit, "fmt").into_store();
        }
        write_store(&paths, &store).expect("write");

        let vcs = FakeVcs::new();
        vcs.set_commits(&["head"]);
        assert_eq!(collect_garbage(&paths, "demo", &vcs).expect("gc"), 1);

        let reloaded = read_store(&paths);
        assert!(reloaded.hashes("demo", "old", "fmt").is_none());
        assert!(reloaded.hashes("demo", "head", "fmt").is_some());
    }
}
