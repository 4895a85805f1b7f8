//! Plugin shapes and the per-invocation [`Run`] handle.
//!
//! A plugin is one of six shapes, each a trait with the hooks that shape
//! needs. [`Plugin`] is the closed sum over them; the dispatcher matches on it
//! to pick the execution contract.
//!
//! | Shape | Hooks | Contract |
//! |---|---|---|
//! | [`Audit`] | `audit` | files wrapper, failure is an error |
//! | [`Fix`] | `audit`, `fix` | files wrapper, `fix` runs on failure with `--fix` |
//! | [`Action`] | `action` | env scope and error translation only |
//! | [`Parametrize`] | `plugins` | runs other plugins in order |
//! | [`Write`] | `path`, `required`, `write` | reports created / updated / up to date |
//! | [`FixFile`] | `audit`, `fail_condition`, `fix` | per-file audit and fix |

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::context::{Context, Flags};
use crate::io::process::{Subprocess, Subprocesses};

pub mod builtins;
pub mod cache;
pub mod command;
pub mod dispatch;
pub mod loader;
pub mod registry;
pub mod wrapper;

pub use registry::{Registered, Registry};

/// Cache strategy declared by a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Caching {
    #[default]
    Off,
    /// Skip files whose hash is unchanged. With `all`, any change re-runs
    /// every file.
    Files { all: bool },
    /// Track a single file, relative to the project root.
    File(PathBuf),
}

/// Attributes shared by every shape.
pub trait PluginBase {
    /// One-line description shown by `auditor modules`.
    fn about(&self) -> &str {
        ""
    }

    /// External executables this plugin calls.
    fn exe(&self) -> Vec<String> {
        Vec::new()
    }

    /// Environment overrides active only while the plugin runs.
    fn env(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn caching(&self) -> Caching {
        Caching::Off
    }

    /// Name used in conflict messages and cache keys.
    fn type_name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

pub trait Audit: PluginBase {
    fn audit(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32>;
}

pub trait Fix: PluginBase {
    fn audit(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32>;
    fn fix(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32>;
}

pub trait Action: PluginBase {
    fn action(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32>;
}

pub trait Parametrize: PluginBase {
    /// Names of the plugins to run, in order.
    fn plugins(&self) -> Vec<String>;
}

pub trait Write: PluginBase {
    /// File the plugin produces.
    fn path(&self, ctx: &Context) -> Result<PathBuf>;

    /// Prerequisite; the plugin is skipped when it is configured and absent.
    fn required(&self, _ctx: &Context) -> Option<PathBuf> {
        None
    }

    fn write(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32>;
}

/// Per-file audit with an optional per-file fix.
///
/// `audit` records its verdict internally; `fail_condition` reports it for the
/// file just audited (`None` counts as passing).
pub trait FixFile: PluginBase {
    fn audit(&self, ctx: &mut Context, run: &Run<'_>, file: &Path) -> Result<()>;
    fn fail_condition(&self) -> Option<bool>;
    fn fix(&self, ctx: &mut Context, run: &Run<'_>, file: &Path) -> Result<()>;
}

/// A registered plugin instance.
pub enum Plugin {
    Audit(Box<dyn Audit>),
    Fix(Box<dyn Fix>),
    Action(Box<dyn Action>),
    Parametrize(Box<dyn Parametrize>),
    Write(Box<dyn Write>),
    FixFile(Box<dyn FixFile>),
}

impl Plugin {
    pub fn base(&self) -> &dyn PluginBase {
        match self {
            Self::Audit(p) => p.as_ref(),
            Self::Fix(p) => p.as_ref(),
            Self::Action(p) => p.as_ref(),
            Self::Parametrize(p) => p.as_ref(),
            Self::Write(p) => p.as_ref(),
            Self::FixFile(p) => p.as_ref(),
        }
    }

    /// Shape name as accepted by the registry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Audit(_) => "Audit",
            Self::Fix(_) => "Fix",
            Self::Action(_) => "Action",
            Self::Parametrize(_) => "Parametrize",
            Self::Write(_) => "Write",
            Self::FixFile(_) => "FixFile",
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(self.kind())
            .field(&self.base().type_name())
            .finish()
    }
}

/// Per-invocation handle passed to every hook.
#[derive(Debug, Clone, Copy)]
pub struct Run<'a> {
    /// Registered name of the running plugin.
    pub name: &'a str,
    pub flags: Flags,
    /// Positional arguments given after the module name.
    pub args: &'a [String],
    pub subprocesses: &'a Subprocesses,
    registry: &'a Registry,
}

impl<'a> Run<'a> {
    pub fn new(
        name: &'a str,
        flags: Flags,
        args: &'a [String],
        subprocesses: &'a Subprocesses,
        registry: &'a Registry,
    ) -> Self {
        Self {
            name,
            flags,
            args,
            subprocesses,
            registry,
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// The subprocess for `exe`, which must be listed in the plugin's `exe()`.
    pub fn subprocess(&self, exe: &str) -> Result<&'a Subprocess> {
        self.subprocesses
            .get(exe)
            .ok_or_else(|| anyhow!("plugin '{}' does not declare executable '{exe}'", self.name))
    }

    /// Invoke another registered plugin with the same flags.
    pub fn invoke(&self, ctx: &mut Context, name: &str) -> Result<i32> {
        self.invoke_with(ctx, name, self.flags)
    }

    pub fn invoke_with(&self, ctx: &mut Context, name: &str, flags: Flags) -> Result<i32> {
        dispatch::invoke(self.registry, ctx, name, flags, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl PluginBase for Probe {}

    #[test]
    fn type_name_defaults_to_the_struct_name() {
        assert_eq!(Probe.type_name(), "Probe");
        assert_eq!(short_type_name("a::b::Thing<c::D>"), "Thing");
    }
}
