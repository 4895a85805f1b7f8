//! Project configuration stored in `.auditor.toml` at the project root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the project root.
pub const CONFIG_FILE: &str = ".auditor.toml";

/// Auditor configuration (TOML).
///
/// Missing fields default to the values of [`Config::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub audit: AuditConfig,
    pub indexing: IndexingConfig,
    pub clean: CleanConfig,
    pub plugins: PluginsConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuditConfig {
    /// Plugins run by `auditor audit`, in order.
    pub plugins: Vec<String>,
    /// Stop at the first failing plugin.
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexingConfig {
    /// Path components or file stems to leave out of the file index.
    pub exclude: Vec<String>,
    /// File extensions to keep (without the dot). Empty keeps everything.
    pub extensions: Vec<String>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude: vec!["target".to_string()],
            extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CleanConfig {
    /// Patterns `auditor clean` never removes (`git clean -e`).
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PluginsConfig {
    /// Directories scanned for plugin files, relative to the project root.
    pub dirs: Vec<PathBuf>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dirs: vec![PathBuf::from(".auditor/plugins")],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory, relative to the project root.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".auditor_cache"),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.audit.plugins.iter().any(|name| name.trim().is_empty()) {
            return Err(anyhow!("audit.plugins must not contain empty names"));
        }
        if self.audit.plugins.iter().any(|name| name == "audit") {
            return Err(anyhow!("audit.plugins must not contain 'audit' itself"));
        }
        if self.cache.dir.as_os_str().is_empty() {
            return Err(anyhow!("cache.dir must be a non-empty path"));
        }
        if self.cache.dir.is_absolute() {
            return Err(anyhow!("cache.dir must be relative to the project root"));
        }
        if self.indexing.extensions.iter().any(|ext| ext.starts_with('.')) {
            return Err(anyhow!("indexing.extensions are given without the leading dot"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `Config::default()`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Render the configuration as TOML.
pub fn render_config(cfg: &Config) -> Result<String> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    Ok(buf)
}
