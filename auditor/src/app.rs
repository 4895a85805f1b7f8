//! Start-up wiring: configuration, file index, cache directory and registry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context as _, Result};
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::context::{Context, Flags};
use crate::core::file_index::IndexFilter;
use crate::exit_codes;
use crate::io::cache_store::collect_garbage;
use crate::io::config::{CONFIG_FILE, Config, load_config};
use crate::io::console::Console;
use crate::io::git::{Git, Vcs};
use crate::io::indexing::populate;
use crate::plugin::Registry;
use crate::plugin::builtins::{register_builtins, render_modules};
use crate::plugin::dispatch::invoke;
use crate::plugin::loader::site_dir;

/// Module run when none is given.
pub const DEFAULT_MODULE: &str = "modules";

/// What to run, as parsed from the command line.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub module: Option<String>,
    pub args: Vec<String>,
    pub flags: Flags,
    /// Regex of repository-relative paths to leave out of the index.
    pub exclude: Option<String>,
    /// Config file; defaults to `.auditor.toml` in the project root.
    pub rcfile: Option<PathBuf>,
}

/// Build the context and registry for a project rooted at `root`.
///
/// `interrupt` becomes the context's interrupt flag, so a SIGINT during the
/// git calls made here is already reported as an interruption.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn bootstrap(
    root: &Path,
    options: &Options,
    vcs: Box<dyn Vcs>,
    console: Console,
    interrupt: Arc<AtomicBool>,
) -> Result<(Context, Registry)> {
    let rcfile = options
        .rcfile
        .clone()
        .unwrap_or_else(|| root.join(CONFIG_FILE));
    let config = load_config(&rcfile)?;
    let mut ctx = Context::new(root, config, vcs, console).with_interrupt(interrupt);

    let filter = index_filter(&ctx.config, options.exclude.as_deref())?;
    let mut files = std::mem::take(&mut ctx.files);
    let indexed = populate(&mut files, ctx.vcs(), &ctx.root, &filter);
    ctx.interruptible(indexed)?;
    ctx.files = files;

    ctx.paths.create()?;
    if let Err(err) = collect_garbage(&ctx.paths, &ctx.project, ctx.vcs()) {
        ctx.check_interrupted()?;
        warn!(err = %format!("{err:#}"), "cache garbage collection failed");
    }

    let registry = build_registry(&ctx)?;
    debug!(plugins = registry.len(), files = ctx.files.len(), "bootstrapped");
    Ok((ctx, registry))
}

/// Production entry: git in the current directory, output to the terminal.
pub fn bootstrap_cwd(
    options: &Options,
    interrupt: Arc<AtomicBool>,
) -> Result<(Context, Registry)> {
    let root = std::env::current_dir().context("resolve current directory")?;
    let vcs = Box::new(Git::new(&root));
    bootstrap(&root, options, vcs, Console::stdio(), interrupt)
}

fn index_filter(config: &Config, exclude: Option<&str>) -> Result<IndexFilter> {
    let pattern = exclude
        .map(|re| Regex::new(re).with_context(|| format!("invalid --exclude pattern '{re}'")))
        .transpose()?;
    Ok(IndexFilter {
        exclude: config.indexing.exclude.clone(),
        extensions: config.indexing.extensions.clone(),
        pattern,
    })
}

/// Built-ins first, then the site plugin directory, then the project's.
fn build_registry(ctx: &Context) -> Result<Registry> {
    let mut registry = Registry::new();
    register_builtins(&mut registry)?;
    let mut dirs: Vec<PathBuf> = site_dir().into_iter().collect();
    dirs.extend(ctx.config.plugins.dirs.iter().cloned());
    registry.load(&dirs, &ctx.root)?;
    Ok(registry)
}

/// Run the requested module and return the process exit code.
///
/// An unknown module is reported together with the list of plugins.
pub fn run(ctx: &mut Context, registry: &Registry, options: &Options) -> Result<i32> {
    let module = options.module.as_deref().unwrap_or(DEFAULT_MODULE);
    if let Err(err) = registry.get(module) {
        ctx.console.err(err.to_string());
        ctx.console.out(render_modules(registry));
        return Ok(exit_codes::FAILED);
    }
    let returncode = invoke(registry, ctx, module, options.flags, &options.args)?;
    Ok(if returncode == 0 {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}
