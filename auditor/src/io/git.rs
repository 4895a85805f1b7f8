//! Git adapter for file discovery and commit identity.
//!
//! The cache is keyed by commit and the file index is built from tracked
//! files, so we keep a small, explicit wrapper around `git` subprocess calls
//! behind the [`Vcs`] trait.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::error::Error;

/// Options for [`Vcs::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GitOptions {
    /// Capture stdout instead of inheriting the terminal.
    pub capture: bool,
    /// Return the exit code instead of failing on non-zero status.
    pub suppress: bool,
}

/// Result of [`Vcs::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub code: i32,
    pub stdout: String,
}

/// Version-control operations the auditor depends on.
///
/// Every operation fails with [`Error::NotARepository`] outside a repository.
pub trait Vcs: std::fmt::Debug {
    /// Tracked files, relative to the repository root.
    fn ls_files(&self) -> Result<Vec<String>>;

    /// Current commit hash, or `None` before the first commit.
    fn commit_hash(&self) -> Result<Option<String>>;

    /// True when `git status --short` reports nothing.
    fn is_clean(&self) -> Result<bool>;

    /// Every commit reachable from any ref.
    fn rev_list_all(&self) -> Result<Vec<String>>;

    /// Run an arbitrary subcommand.
    fn run(&self, args: &[String], options: GitOptions) -> Result<GitOutput>;
}

/// [`Vcs`] backed by the `git` executable, run in `workdir`.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(self.failure(args, &output));
        }
        Ok(output)
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }

    fn failure(&self, args: &[&str], output: &Output) -> anyhow::Error {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_a_repository(&stderr) {
            return Error::NotARepository {
                path: self.workdir.clone(),
            }
            .into();
        }
        anyhow!("git {} failed: {}", args.join(" "), stderr.trim())
    }
}

impl Vcs for Git {
    fn ls_files(&self) -> Result<Vec<String>> {
        let out = self.run_capture(&["ls-files"])?;
        Ok(out
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    #[instrument(skip_all)]
    fn commit_hash(&self) -> Result<Option<String>> {
        let output = self.output(&["rev-parse", "HEAD"])?;
        if output.status.success() {
            let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
            debug!(commit = %hash, "resolved commit");
            return Ok(Some(hash));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_a_repository(&stderr) {
            return Err(Error::NotARepository {
                path: self.workdir.clone(),
            }
            .into());
        }
        debug!("no commit yet");
        Ok(None)
    }

    fn is_clean(&self) -> Result<bool> {
        let status = self.run_capture(&["status", "--short"])?;
        Ok(status.trim().is_empty())
    }

    fn rev_list_all(&self) -> Result<Vec<String>> {
        let output = self.output(&["rev-list", "--all"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_a_repository(&stderr) {
                return Err(self.failure(&["rev-list", "--all"], &output));
            }
            // An empty repository has no refs to list.
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    #[instrument(skip_all, fields(args = %args.join(" ")))]
    fn run(&self, args: &[String], options: GitOptions) -> Result<GitOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.workdir).stdin(Stdio::null());
        if !options.capture {
            cmd.stdout(Stdio::inherit());
        }
        let output = cmd
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        let code = output.status.code().unwrap_or(1);
        if !output.status.success() && !options.suppress {
            let borrowed: Vec<&str> = args.iter().map(String::as_str).collect();
            return Err(self.failure(&borrowed, &output));
        }
        Ok(GitOutput {
            code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        })
    }
}

fn is_not_a_repository(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("not a git repository")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("git");
        assert!(status.success(), "git {args:?}");
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"]);
        git(dir, &["config", "user.email", "auditor@example.com"]);
        git(dir, &["config", "user.name", "auditor"]);
        git(dir, &["config", "commit.gpgsign", "false"]);
    }

    #[test]
    fn outside_repository_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = Git::new(temp.path()).ls_files().expect_err("not a repo");
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotARepository { .. })
        ));
    }

    #[test]
    fn tracks_commits_and_cleanliness() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_repo(temp.path());
        let repo = Git::new(temp.path());
        assert_eq!(repo.commit_hash().expect("hash"), None);
        assert!(repo.rev_list_all().expect("rev-list").is_empty());

        std::fs::write(temp.path().join("a.txt"), "a").expect("write");
        assert!(!repo.is_clean().expect("clean"));
        git(temp.path(), &["add", "a.txt"]);
        git(temp.path(), &["commit", "-q", "-m", "init"]);

        assert!(repo.is_clean().expect("clean"));
        assert_eq!(repo.ls_files().expect("ls-files"), vec!["a.txt"]);
        let head = repo.commit_hash().expect("hash").expect("head");
        assert_eq!(repo.rev_list_all().expect("rev-list"), vec![head]);
    }
}
