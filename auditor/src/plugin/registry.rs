//! Name-keyed plugin registry.
//!
//! Built once at start-up (built-ins, then plugin directories) and read-only
//! while plugins run.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::error::Error;
use crate::io::process::Subprocesses;
use crate::plugin::{Plugin, loader};

/// A plugin bound to its registered name.
#[derive(Debug)]
pub struct Registered {
    name: String,
    plugin: Plugin,
    subprocesses: Subprocesses,
}

impl Registered {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin(&self) -> &Plugin {
        &self.plugin
    }

    pub fn subprocesses(&self) -> &Subprocesses {
        &self.subprocesses
    }

    /// Cache and durations key: type name plus registered name, so two
    /// registrations of one type never share hashes.
    pub fn identity(&self) -> String {
        format!("{}::{}", self.plugin.base().type_name(), self.name)
    }

    /// First line of the plugin's description.
    pub fn about(&self) -> &str {
        self.plugin.base().about().lines().next().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    plugins: BTreeMap<String, Registered>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` under `name`.
    ///
    /// Fails with [`Error::NameConflict`] if the name is taken.
    pub fn register(&mut self, name: impl Into<String>, plugin: Plugin) -> Result<()> {
        let name = name.into();
        match self.plugins.entry(name.clone()) {
            Entry::Occupied(_) => Err(Error::NameConflict {
                plugin: plugin.base().type_name().to_string(),
                name,
            }
            .into()),
            Entry::Vacant(slot) => {
                debug!(%name, kind = plugin.kind(), "registered plugin");
                let subprocesses = Subprocesses::new(plugin.base().exe());
                slot.insert(Registered {
                    name,
                    plugin,
                    subprocesses,
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&Registered> {
        self.plugins.get(name).ok_or_else(|| {
            Error::NotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn registered(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }

    /// Registered plugins, sorted by name.
    pub fn mapping(&self) -> impl Iterator<Item = (&str, &Registered)> {
        self.plugins.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Load plugin files from each directory in turn.
    ///
    /// Each directory is one load pass: a name declared twice within a pass is
    /// a [`Error::NameConflict`], while a later pass replaces names registered
    /// before it. Returns the number of plugins loaded.
    pub fn load(&mut self, dirs: &[PathBuf], root: &Path) -> Result<usize> {
        let mut loaded = 0;
        for dir in dirs {
            let pass = loader::load_dir(dir, root)?;
            loaded += pass.len();
            for (name, entry) in pass.plugins {
                if self.plugins.insert(name.clone(), entry).is_some() {
                    info!(%name, dir = %dir.display(), "plugin overrides an earlier registration");
                }
            }
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::{RecordingAudit, declared_plugin};

    #[test]
    fn duplicate_name_is_a_conflict() {
        let mut registry = Registry::new();
        registry
            .register("fmt", Plugin::Audit(Box::new(RecordingAudit::passing())))
            .expect("first");
        let err = registry
            .register("fmt", Plugin::Audit(Box::new(RecordingAudit::passing())))
            .expect_err("second");
        assert_eq!(
            err.to_string(),
            "plugin name conflict at RecordingAudit: 'fmt'"
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let err = Registry::new().get("lint").expect_err("missing");
        assert_eq!(err.to_string(), "no plugin named `lint` found");
    }

    #[test]
    fn registered_names_are_sorted() {
        let mut registry = Registry::new();
        for name in ["test", "fmt", "clippy"] {
            registry
                .register(name, Plugin::Audit(Box::new(RecordingAudit::passing())))
                .expect("register");
        }
        assert_eq!(registry.registered(), vec!["clippy", "fmt", "test"]);
        assert_eq!(
            registry.get("fmt").expect("fmt").identity(),
            "RecordingAudit::fmt"
        );
    }

    #[test]
    fn later_pass_overrides_and_same_pass_conflicts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let site = temp.path().join("site");
        let project = temp.path().join("project");
        fs::create_dir_all(&site).expect("mkdir");
        fs::create_dir_all(&project).expect("mkdir");
        fs::write(site.join("fmt.toml"), declared_plugin("audit", "site fmt")).expect("write");
        fs::write(project.join("fmt.toml"), declared_plugin("audit", "project fmt")).expect("write");

        let mut registry = Registry::new();
        let loaded = registry
            .load(&[site.clone(), project.clone()], temp.path())
            .expect("load");
        assert_eq!(loaded, 2);
        assert_eq!(registry.get("fmt").expect("fmt").about(), "project fmt");

        fs::write(
            project.join("other.toml"),
            format!("name = \"fmt\"\n{}", declared_plugin("audit", "dup")),
        )
        .expect("write");
        let err = Registry::new()
            .load(&[project], temp.path())
            .expect_err("conflict");
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NameConflict { name, .. }) if name == "fmt"
        ));
    }
}
