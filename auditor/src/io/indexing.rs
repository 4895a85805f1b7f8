//! Populating the file index from version control.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::file_index::{FileIndex, IndexFilter};
use crate::error::Error;
use crate::io::git::Vcs;

/// Fill `index` with every tracked file under `root` that `filter` admits.
///
/// Only regular files enter the index. Tracked directories (submodule
/// gitlinks, symlinks to directories) are skipped. Fails with
/// [`Error::RemovedFiles`] when a tracked path is missing from disk, which
/// usually means a deletion that was not staged.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn populate(
    index: &mut FileIndex,
    vcs: &dyn Vcs,
    root: &Path,
    filter: &IndexFilter,
) -> Result<()> {
    let mut missing = Vec::new();
    for rel in vcs.ls_files()? {
        let rel = PathBuf::from(rel);
        if !filter.admits(&rel) {
            continue;
        }
        let path = root.join(&rel);
        if path.is_file() {
            index.append(path);
        } else if path.exists() {
            debug!(path = %rel.display(), "skipping tracked path that is not a file");
        } else {
            missing.push(rel);
        }
    }
    if !missing.is_empty() {
        return Err(Error::RemovedFiles { paths: missing }.into());
    }
    debug!(files = index.len(), "indexed tracked files");
    Ok(())
}
