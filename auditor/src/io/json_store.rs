//! JSON files under the cache directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Read a JSON document, falling back to `T::default()`.
///
/// A missing file is the normal first-run case. An unreadable or corrupt file
/// is logged and treated as empty so a damaged cache only costs a re-audit.
pub fn read_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(err) => {
            warn!(path = %path.display(), err = %err, "unreadable store, starting empty");
            return T::default();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "corrupt store, starting empty");
            T::default()
        }
    }
}

/// Atomically write pretty JSON to disk (temp file + rename).
pub fn write<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize store json")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("store path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp store {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace store {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn missing_and_corrupt_files_read_as_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("files.json");
        let missing: BTreeMap<String, u32> = read_or_default(&path);
        assert!(missing.is_empty());

        fs::write(&path, "{ not json").expect("write");
        let corrupt: BTreeMap<String, u32> = read_or_default(&path);
        assert!(corrupt.is_empty());
    }

    #[test]
    fn write_creates_parents_and_leaves_no_temp_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/dir/files.json");
        let value = BTreeMap::from([("a".to_string(), 1u32)]);
        write(&path, &value).expect("write");

        let loaded: BTreeMap<String, u32> = read_or_default(&path);
        assert_eq!(loaded, value);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
