//! Plugins declared in TOML files, backed by one external command.
//!
//! ```toml
//! kind = "fix"
//! about = "Format code with rustfmt."
//! exe = "cargo"
//! args = ["fmt", "--", "--check"]
//! fix-args = ["fmt"]
//! ```
//!
//! Arguments may use `{root}`, `{package}` and (for `fix-file`) `{file}`.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context as _, Result, anyhow, bail};
use serde::Deserialize;

use crate::context::Context;
use crate::error::Error;
use crate::io::package::package_name;
use crate::io::process::CallOptions;
use crate::plugin::{
    Action, Audit, Caching, Fix, FixFile, Parametrize, Plugin, PluginBase, Run, Write,
};

/// Shape named by the `kind` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Audit,
    Fix,
    Action,
    Parametrize,
    Write,
    FixFile,
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "audit" => Ok(Self::Audit),
            "fix" => Ok(Self::Fix),
            "action" => Ok(Self::Action),
            "parametrize" => Ok(Self::Parametrize),
            "write" => Ok(Self::Write),
            "fixfile" => Ok(Self::FixFile),
            _ => Err(Error::invalid_kind(s)),
        }
    }
}

/// Which tracked files are appended to `args`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileArgs {
    #[default]
    None,
    All,
    /// Top-level directories and files only.
    Reduce,
}

/// Contents of a plugin file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct CommandSpec {
    /// Registered name; defaults to the file stem.
    pub name: Option<String>,
    pub kind: String,
    pub about: String,
    pub exe: Option<String>,
    pub args: Vec<String>,
    pub fix_args: Vec<String>,
    pub files: FileArgs,
    pub env: BTreeMap<String, String>,
    pub cache: bool,
    pub cache_all: bool,
    pub cache_file: Option<PathBuf>,
    pub plugins: Vec<String>,
    pub path: Option<PathBuf>,
    pub required: Option<PathBuf>,
}

impl CommandSpec {
    fn validate(&self, kind: Kind) -> Result<()> {
        if kind != Kind::Parametrize && self.exe.as_deref().is_none_or(|e| e.trim().is_empty()) {
            bail!("`exe` is required for kind '{}'", self.kind);
        }
        match kind {
            Kind::Parametrize if self.plugins.is_empty() => {
                bail!("`plugins` must list at least one plugin")
            }
            Kind::Write if self.path.is_none() => bail!("`path` is required for kind 'write'"),
            Kind::Fix | Kind::FixFile if self.fix_args.is_empty() => {
                bail!("`fix-args` is required for kind '{}'", self.kind)
            }
            _ => Ok(()),
        }
    }
}

/// A declared plugin. One type serves every shape; [`CommandPlugin::into_plugin`]
/// picks the variant from `kind`.
#[derive(Debug)]
pub struct CommandPlugin {
    spec: CommandSpec,
    kind: Kind,
    label: String,
    /// Verdict of the last `FixFile::audit` call.
    last_failed: Cell<Option<bool>>,
}

impl CommandPlugin {
    /// Parse and validate a plugin file.
    pub fn from_file(path: &Path) -> Result<(String, Self)> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let spec: CommandSpec =
            toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("plugin file without a name: {}", path.display()))?;
        let name = spec.name.clone().unwrap_or(stem);
        let plugin = Self::new(spec)?;
        Ok((name, plugin))
    }

    pub fn new(spec: CommandSpec) -> Result<Self> {
        let kind: Kind = spec.kind.parse()?;
        spec.validate(kind)?;
        let label = format!("{kind:?}Command");
        Ok(Self {
            spec,
            kind,
            label,
            last_failed: Cell::new(None),
        })
    }

    pub fn into_plugin(self) -> Plugin {
        match self.kind {
            Kind::Audit => Plugin::Audit(Box::new(self)),
            Kind::Fix => Plugin::Fix(Box::new(self)),
            Kind::Action => Plugin::Action(Box::new(self)),
            Kind::Parametrize => Plugin::Parametrize(Box::new(self)),
            Kind::Write => Plugin::Write(Box::new(self)),
            Kind::FixFile => Plugin::FixFile(Box::new(self)),
        }
    }

    fn exe_name(&self) -> Result<&str> {
        self.spec
            .exe
            .as_deref()
            .ok_or_else(|| anyhow!("plugin declares no executable"))
    }

    /// Expand placeholders and append the selected tracked files.
    fn command_args(
        &self,
        ctx: &Context,
        run: &Run<'_>,
        base: &[String],
        file: Option<&Path>,
    ) -> Result<Vec<String>> {
        let mut args = Vec::with_capacity(base.len());
        for arg in base {
            args.push(expand(arg, ctx, file)?);
        }
        match self.spec.files {
            FileArgs::None => {}
            FileArgs::All => args.extend(ctx.files.args(&ctx.root, false)),
            FileArgs::Reduce => args.extend(ctx.files.args(&ctx.root, true)),
        }
        args.extend(run.args.iter().cloned());
        Ok(args)
    }

    fn call(
        &self,
        ctx: &mut Context,
        run: &Run<'_>,
        base: &[String],
        options: CallOptions,
    ) -> Result<i32> {
        let args = self.command_args(ctx, run, base, None)?;
        let subprocess = run.subprocess(self.exe_name()?)?;
        let options = CallOptions {
            suppress: options.suppress || run.flags.suppress,
            ..options
        };
        Ok(subprocess.call(ctx, args, options)?.returncode)
    }

    fn resolve(ctx: &Context, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            ctx.root.join(path)
        }
    }
}

fn expand(arg: &str, ctx: &Context, file: Option<&Path>) -> Result<String> {
    let mut out = arg.replace("{root}", &ctx.root.to_string_lossy());
    if out.contains("{package}") {
        out = out.replace("{package}", &package_name(&ctx.root)?);
    }
    if let Some(file) = file {
        out = out.replace("{file}", &file.to_string_lossy());
    }
    Ok(out)
}

impl PluginBase for CommandPlugin {
    fn about(&self) -> &str {
        &self.spec.about
    }

    fn exe(&self) -> Vec<String> {
        self.spec.exe.iter().cloned().collect()
    }

    fn env(&self) -> BTreeMap<String, String> {
        self.spec.env.clone()
    }

    fn caching(&self) -> Caching {
        if let Some(file) = &self.spec.cache_file {
            return Caching::File(file.clone());
        }
        if self.spec.cache || self.spec.cache_all {
            return Caching::Files {
                all: self.spec.cache_all,
            };
        }
        Caching::Off
    }

    fn type_name(&self) -> &str {
        &self.label
    }
}

impl Audit for CommandPlugin {
    fn audit(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32> {
        self.call(ctx, run, &self.spec.args, CallOptions::default())
    }
}

impl Fix for CommandPlugin {
    fn audit(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32> {
        self.call(ctx, run, &self.spec.args, CallOptions::default())
    }

    fn fix(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32> {
        self.call(ctx, run, &self.spec.fix_args, CallOptions::default())
    }
}

impl Action for CommandPlugin {
    fn action(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32> {
        self.call(ctx, run, &self.spec.args, CallOptions::default())
    }
}

impl Parametrize for CommandPlugin {
    fn plugins(&self) -> Vec<String> {
        self.spec.plugins.clone()
    }
}

impl Write for CommandPlugin {
    fn path(&self, ctx: &Context) -> Result<PathBuf> {
        let path = self
            .spec
            .path
            .as_deref()
            .ok_or_else(|| anyhow!("write plugin declares no path"))?;
        Ok(Self::resolve(ctx, path))
    }

    fn required(&self, ctx: &Context) -> Option<PathBuf> {
        self.spec
            .required
            .as_deref()
            .map(|path| Self::resolve(ctx, path))
    }

    fn write(&self, ctx: &mut Context, run: &Run<'_>) -> Result<i32> {
        let args = self.command_args(ctx, run, &self.spec.args, None)?;
        let subprocess = run.subprocess(self.exe_name()?)?;
        let done = subprocess.call(ctx, args, CallOptions::capture())?;
        let path = self.path(ctx)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, done.stdout).with_context(|| format!("write {}", path.display()))?;
        Ok(done.returncode)
    }
}

impl FixFile for CommandPlugin {
    fn audit(&self, ctx: &mut Context, run: &Run<'_>, file: &Path) -> Result<()> {
        let args = self.command_args(ctx, run, &self.spec.args, Some(file))?;
        let subprocess = run.subprocess(self.exe_name()?)?;
        let done = subprocess.call(ctx, args, CallOptions::suppress())?;
        self.last_failed.set(Some(done.returncode != 0));
        Ok(())
    }

    fn fail_condition(&self) -> Option<bool> {
        self.last_failed.get()
    }

    fn fix(&self, ctx: &mut Context, run: &Run<'_>, file: &Path) -> Result<()> {
        let args = self.command_args(ctx, run, &self.spec.fix_args, Some(file))?;
        let subprocess = run.subprocess(self.exe_name()?)?;
        subprocess.call(ctx, args, CallOptions::default())?;
        Ok(())
    }
}
