//! Ordered, de-duplicated set of tracked files.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use regex::Regex;

/// Files the plugins operate on, in VCS listing order.
///
/// Cache strategies temporarily remove entries; [`FileIndex::snapshot`] and
/// [`FileIndex::restore`] bracket those mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIndex {
    paths: Vec<PathBuf>,
}

/// Saved index contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    paths: Vec<PathBuf>,
}

impl Snapshot {
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Append `path` unless it is already present. Returns true if added.
    pub fn append(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }
        self.paths.push(path);
        true
    }

    pub fn extend<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.append(path);
        }
    }

    /// Remove `path`. Returns true if it was present.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() != before
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Collapse each file to its top-level segment under `root`.
    ///
    /// `root/src/a.rs` and `root/src/b.rs` both become `root/src`; files at the
    /// top level stay as they are. Order of first appearance is kept.
    pub fn reduce(&self, root: &Path) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut reduced = Vec::new();
        for path in &self.paths {
            let top = match path.strip_prefix(root).ok().and_then(first_normal) {
                Some(first) => root.join(first),
                None => path.clone(),
            };
            if seen.insert(top.clone()) {
                reduced.push(top);
            }
        }
        reduced
    }

    /// String arguments for handing the index to an external tool.
    pub fn args(&self, root: &Path, reduce: bool) -> Vec<String> {
        let paths = if reduce {
            self.reduce(root)
        } else {
            self.paths.clone()
        };
        paths
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            paths: self.paths.clone(),
        }
    }

    /// Put the snapshot entries back in their original order, followed by any
    /// entry appended since the snapshot was taken.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        let appended: Vec<PathBuf> = self
            .paths
            .drain(..)
            .filter(|p| !snapshot.paths.contains(p))
            .collect();
        self.paths = snapshot.paths.clone();
        self.extend(appended);
    }
}

impl<'a> IntoIterator for &'a FileIndex {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

fn first_normal(rel: &Path) -> Option<&Path> {
    match rel.components().next()? {
        Component::Normal(part) => Some(Path::new(part)),
        _ => None,
    }
}

/// Rules deciding which VCS-listed files enter the index.
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    /// Matched against every path component and against the file stem.
    pub exclude: Vec<String>,
    /// Allowed extensions without the dot. Empty admits every file.
    pub extensions: Vec<String>,
    /// Relative paths matching this pattern are skipped.
    pub pattern: Option<Regex>,
}

impl IndexFilter {
    /// True if the repository-relative path `rel` belongs in the index.
    pub fn admits(&self, rel: &Path) -> bool {
        let excluded_part = rel.components().any(|c| match c {
            Component::Normal(part) => self
                .exclude
                .iter()
                .any(|e| part.to_str() == Some(e.as_str())),
            _ => false,
        });
        if excluded_part {
            return false;
        }
        if let Some(stem) = rel.file_stem()
            && self.exclude.iter().any(|e| stem.to_str() == Some(e.as_str()))
        {
            return false;
        }
        if !self.extensions.is_empty() {
            let ext = rel.extension().and_then(|e| e.to_str()).unwrap_or_default();
            if !self.extensions.iter().any(|allowed| allowed == ext) {
                return false;
            }
        }
        if let Some(pattern) = &self.pattern
            && pattern.is_match(&rel.to_string_lossy())
        {
            return false;
        }
        true
    }
}
