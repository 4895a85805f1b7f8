//! Runtime state shared by every plugin invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::core::env::Environment;
use crate::core::file_index::FileIndex;
use crate::error::Error;
use crate::io::cache_store::CachePaths;
use crate::io::config::Config;
use crate::io::console::Console;
use crate::io::git::Vcs;

/// Flags of one invocation, passed down to nested invocations unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// Let Fix and FixFile plugins repair what their audit found.
    pub fix: bool,
    /// Tool failures return their exit code instead of raising.
    pub suppress: bool,
    /// Bypass the hash cache.
    pub no_cache: bool,
    /// Run `clean` before the audit.
    pub clean: bool,
    /// Record and report wall-clock time per plugin.
    pub timed: bool,
}

/// Everything a plugin may read or mutate while it runs.
#[derive(Debug)]
pub struct Context {
    /// Project root; tools run here and cache keys are relative to it.
    pub root: PathBuf,
    /// Project name, the first level of the cache stores.
    pub project: String,
    pub files: FileIndex,
    pub env: Environment,
    pub config: Config,
    pub paths: CachePaths,
    pub console: Console,
    vcs: Box<dyn Vcs>,
    interrupt: Arc<AtomicBool>,
}

impl Context {
    pub fn new(
        root: impl Into<PathBuf>,
        config: Config,
        vcs: Box<dyn Vcs>,
        console: Console,
    ) -> Self {
        let root = root.into();
        let project = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        let paths = CachePaths::new(&root, &config.cache.dir);
        Self {
            root,
            project,
            files: FileIndex::new(),
            env: Environment::new(),
            config,
            paths,
            console,
            vcs,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn vcs(&self) -> &dyn Vcs {
        self.vcs.as_ref()
    }

    /// Flag set by the SIGINT handler.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Share an externally registered interrupt flag.
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn check_interrupted(&self) -> Result<()> {
        if self.interrupt.load(Ordering::SeqCst) {
            return Err(Error::Interrupted.into());
        }
        Ok(())
    }

    /// Report a failed step as an interruption when SIGINT arrived meanwhile.
    ///
    /// A killed child (`git`, usually) fails with its own error; the flag is
    /// what tells the two apart.
    pub fn interruptible<T>(&self, result: Result<T>) -> Result<T> {
        result.or_else(|err| {
            self.check_interrupted()?;
            Err(err)
        })
    }

    /// `path` relative to the project root with `/` separators, the key used
    /// in the hash store.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
