//! Discovery of plugin files in a plugin directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::plugin::command::CommandPlugin;
use crate::plugin::registry::Registry;

/// Site-wide plugin directory (`<config dir>/auditor/plugins`), if the
/// platform has a config directory.
pub fn site_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(env!("CARGO_PKG_NAME")).join("plugins"))
}

/// Plugin files in `dir`, sorted by file name.
///
/// Files whose name starts with `_` or `.` are private and skipped.
pub fn plugin_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read directory {}", dir.display()))?
            .path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('_') || name.starts_with('.') {
            continue;
        }
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// One load pass: every plugin file in `dir`, registered into a fresh
/// registry so duplicates within the pass conflict.
///
/// `dir` is resolved against `root` when relative.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_dir(dir: &Path, root: &Path) -> Result<Registry> {
    let dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    };
    let mut pass = Registry::new();
    for path in plugin_files(&dir)? {
        let (name, plugin) = CommandPlugin::from_file(&path)?;
        pass.register(name, plugin.into_plugin())
            .with_context(|| format!("register {}", path.display()))?;
    }
    debug!(plugins = pass.len(), "loaded plugin directory");
    Ok(pass)
}
