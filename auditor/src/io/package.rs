//! Resolving the name of the audited package.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::Error;

/// `[package] name` from `<root>/Cargo.toml`.
pub fn package_name(root: &Path) -> Result<String> {
    let manifest = root.join("Cargo.toml");
    let not_found = || Error::PackageNotFound {
        path: root.to_path_buf(),
    };
    if !manifest.exists() {
        return Err(not_found().into());
    }
    let contents =
        fs::read_to_string(&manifest).with_context(|| format!("read {}", manifest.display()))?;
    let value: toml::Table =
        toml::from_str(&contents).with_context(|| format!("parse {}", manifest.display()))?;
    value
        .get("package")
        .and_then(|package| package.get("name"))
        .and_then(|name| name.as_str())
        .map(str::to_string)
        .ok_or_else(|| not_found().into())
}
