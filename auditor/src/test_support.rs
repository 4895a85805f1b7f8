//! Test-only helpers: scratch projects, a scripted VCS and recording plugins.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use tempfile::TempDir;

use crate::context::Context;
use crate::core::file_index::IndexFilter;
use crate::error::CalledProcessError;
use crate::io::config::Config;
use crate::io::console::Console;
use crate::io::git::{GitOptions, GitOutput, Vcs};
use crate::io::indexing::populate;
use crate::plugin::{Audit, Caching, Fix, FixFile, PluginBase, Run};

#[derive(Debug, Default)]
struct VcsState {
    files: Vec<String>,
    commit: Option<String>,
    clean: bool,
    commits: Vec<String>,
    runs: Vec<Vec<String>>,
    broken: bool,
}

/// Scripted [`Vcs`]. Clones share state, so a test can keep a handle while
/// the context owns another.
#[derive(Debug, Clone)]
pub struct FakeVcs {
    state: Rc<RefCell<VcsState>>,
}

impl Default for FakeVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeVcs {
    /// A clean repository with no commits and no files.
    pub fn new() -> Self {
        let state = VcsState {
            clean: true,
            ..VcsState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn set_files(&self, files: &[&str]) {
        self.state.borrow_mut().files = files.iter().map(|f| f.to_string()).collect();
    }

    pub fn add_file(&self, file: &str) {
        let mut state = self.state.borrow_mut();
        if !state.files.iter().any(|f| f == file) {
            state.files.push(file.to_string());
        }
    }

    pub fn set_commit(&self, commit: Option<&str>) {
        self.state.borrow_mut().commit = commit.map(str::to_string);
    }

    pub fn set_clean(&self, clean: bool) {
        self.state.borrow_mut().clean = clean;
    }

    pub fn set_commits(&self, commits: &[&str]) {
        self.state.borrow_mut().commits = commits.iter().map(|c| c.to_string()).collect();
    }

    /// Make every repository query fail, as when git is killed mid-call.
    pub fn set_broken(&self, broken: bool) {
        self.state.borrow_mut().broken = broken;
    }

    fn query<T>(&self, command: &str, read: impl FnOnce(&VcsState) -> T) -> Result<T> {
        let state = self.state.borrow();
        if state.broken {
            anyhow::bail!("{command} failed: terminated by signal");
        }
        Ok(read(&state))
    }

    /// Arguments of every [`Vcs::run`] call so far.
    pub fn runs(&self) -> Vec<Vec<String>> {
        self.state.borrow().runs.clone()
    }
}

impl Vcs for FakeVcs {
    fn ls_files(&self) -> Result<Vec<String>> {
        self.query("git ls-files", |state| state.files.clone())
    }

    fn commit_hash(&self) -> Result<Option<String>> {
        self.query("git rev-parse HEAD", |state| state.commit.clone())
    }

    fn is_clean(&self) -> Result<bool> {
        self.query("git status --short", |state| state.clean)
    }

    fn rev_list_all(&self) -> Result<Vec<String>> {
        self.query("git rev-list --all", |state| state.commits.clone())
    }

    fn run(&self, args: &[String], _options: GitOptions) -> Result<GitOutput> {
        self.state.borrow_mut().runs.push(args.to_vec());
        Ok(GitOutput::default())
    }
}

/// Writer appending to a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.bytes.borrow_mut().clear();
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A scratch project directory with a fake VCS and captured console output.
#[derive(Debug)]
pub struct TestProject {
    dir: TempDir,
    vcs: FakeVcs,
    out: SharedBuffer,
    err: SharedBuffer,
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
            vcs: FakeVcs::new(),
            out: SharedBuffer::default(),
            err: SharedBuffer::default(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn vcs(&self) -> &FakeVcs {
        &self.vcs
    }

    /// Write a file and mark it as tracked.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        self.vcs.add_file(rel);
        path
    }

    /// A fresh context with the file index populated from the fake VCS.
    pub fn context(&self) -> Context {
        self.context_with(Config::default())
    }

    pub fn context_with(&self, config: Config) -> Context {
        let console = Console::new(Box::new(self.out.clone()), Box::new(self.err.clone()));
        let mut ctx = Context::new(self.root(), config, Box::new(self.vcs.clone()), console);
        let mut files = std::mem::take(&mut ctx.files);
        populate(&mut files, ctx.vcs(), &ctx.root, &IndexFilter::default()).expect("populate");
        ctx.files = files;
        ctx
    }

    pub fn stdout(&self) -> String {
        self.out.contents()
    }

    pub fn stderr(&self) -> String {
        self.err.contents()
    }

    /// Forget captured output.
    pub fn clear_output(&self) {
        self.out.clear();
        self.err.clear();
    }
}

/// Contents of a plugin file declaring `kind` with an `about` line.
pub fn declared_plugin(kind: &str, about: &str) -> String {
    format!("kind = \"{kind}\"\nabout = \"{about}\"\nexe = \"true\"\nfix-args = []\n")
}

#[derive(Debug, Default)]
struct Recorded {
    /// Index contents seen by each `audit` call.
    seen: Vec<Vec<PathBuf>>,
    fixes: usize,
}

#[derive(Debug, Clone)]
enum Outcome {
    Code(i32),
    Tool(String),
}

/// Audit (and Fix) plugin recording what it was given. Clones share records.
#[derive(Debug, Clone)]
pub struct RecordingAudit {
    outcome: Outcome,
    caching: Caching,
    env: BTreeMap<String, String>,
    records: Rc<RefCell<Recorded>>,
}

impl RecordingAudit {
    pub fn passing() -> Self {
        Self::returning(0)
    }

    pub fn returning(code: i32) -> Self {
        Self {
            outcome: Outcome::Code(code),
            caching: Caching::Off,
            env: BTreeMap::new(),
            records: Rc::default(),
        }
    }

    /// Fails the way a tool exiting with status 1 does.
    pub fn failing_tool(command: &str) -> Self {
        Self {
            outcome: Outcome::Tool(command.to_string()),
            ..Self::passing()
        }
    }

    pub fn with_caching(mut self, caching: Caching) -> Self {
        self.caching = caching;
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.records.borrow().seen.len()
    }

    /// Root-relative index contents seen by each call.
    pub fn seen(&self, root: &Path) -> Vec<Vec<String>> {
        self.records
            .borrow()
            .seen
            .iter()
            .map(|files| {
                files
                    .iter()
                    .map(|f| f.strip_prefix(root).unwrap_or(f).to_string_lossy().into_owned())
                    .collect()
            })
            .collect()
    }

    pub fn fixes(&self) -> usize {
        self.records.borrow().fixes
    }

    fn record(&self, ctx: &Context) -> Result<i32> {
        self.records
            .borrow_mut()
            .seen
            .push(ctx.files.iter().cloned().collect());
        match &self.outcome {
            Outcome::Code(code) => Ok(*code),
            Outcome::Tool(command) => Err(CalledProcessError {
                returncode: 1,
                command: format!("{}{command}", ctx.env.render_prefix()),
            }
            .into()),
        }
    }
}

impl PluginBase for RecordingAudit {
    fn env(&self) -> BTreeMap<String, String> {
        self.env.clone()
    }

    fn caching(&self) -> Caching {
        self.caching.clone()
    }
}

impl Audit for RecordingAudit {
    fn audit(&self, ctx: &mut Context, _run: &Run<'_>) -> Result<i32> {
        self.record(ctx)
    }
}

impl Fix for RecordingAudit {
    fn audit(&self, ctx: &mut Context, _run: &Run<'_>) -> Result<i32> {
        self.record(ctx)
    }

    fn fix(&self, _ctx: &mut Context, _run: &Run<'_>) -> Result<i32> {
        self.records.borrow_mut().fixes += 1;
        Ok(0)
    }
}

/// FixFile plugin failing for a fixed set of file names.
#[derive(Debug, Clone, Default)]
pub struct RecordingFixFile {
    failing: Vec<String>,
    verdict: Rc<RefCell<Option<bool>>>,
    audited: Rc<RefCell<Vec<String>>>,
    fixed: Rc<RefCell<Vec<String>>>,
}

impl RecordingFixFile {
    pub fn failing_for(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    /// File names passed to `audit`, in order.
    pub fn audited(&self) -> Vec<String> {
        self.audited.borrow().clone()
    }

    /// File names passed to `fix`, in order.
    pub fn fixed(&self) -> Vec<String> {
        self.fixed.borrow().clone()
    }
}

fn file_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl PluginBase for RecordingFixFile {}

impl FixFile for RecordingFixFile {
    fn audit(&self, _ctx: &mut Context, _run: &Run<'_>, file: &Path) -> Result<()> {
        let name = file_name(file);
        *self.verdict.borrow_mut() = Some(self.failing.contains(&name));
        self.audited.borrow_mut().push(name);
        Ok(())
    }

    fn fail_condition(&self) -> Option<bool> {
        *self.verdict.borrow()
    }

    fn fix(&self, _ctx: &mut Context, _run: &Run<'_>, file: &Path) -> Result<()> {
        self.fixed.borrow_mut().push(file_name(file));
        Ok(())
    }
}
