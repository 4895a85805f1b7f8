//! Error taxonomy shared by the registry, the execution wrapper and the CLI.
//!
//! Plumbing code returns `anyhow::Result`; callers that need to react to a
//! specific failure classify it with `err.downcast_ref::<Error>()`.

use std::path::PathBuf;

use thiserror::Error;

/// Shape names accepted by the registry, in declaration order.
pub const VALID_KINDS: [&str; 6] = ["Audit", "Fix", "Action", "Parametrize", "Write", "FixFile"];

/// Failures with a defined meaning for the auditor.
#[derive(Debug, Error)]
pub enum Error {
    /// A plugin audit failed. The orchestrator recovers from this one.
    #[error("{command}: returned non-zero exit status {returncode}")]
    Audit { command: String, returncode: i32 },

    /// Two plugins registered under the same name.
    #[error("plugin name conflict at {plugin}: '{name}'")]
    NameConflict { plugin: String, name: String },

    /// A plugin declared a shape that is not one of [`VALID_KINDS`].
    #[error("can only register one of the following: {valid}; not {invalid}")]
    InvalidKind { valid: String, invalid: String },

    #[error("no plugin named `{name}` found")]
    NotFound { name: String },

    #[error("not a git repository: {}", .path.display())]
    NotARepository { path: PathBuf },

    #[error("unable to determine the audited package in {}", .path.display())]
    PackageNotFound { path: PathBuf },

    #[error("{exe}: command not found")]
    CommandNotFound { exe: String },

    /// Tracked files that are missing from disk at indexing time.
    #[error("Failed: removed files might not be staged ({})\ntry running git add", display_paths(.paths))]
    RemovedFiles { paths: Vec<PathBuf> },

    #[error("Interrupted")]
    Interrupted,
}

impl Error {
    pub fn invalid_kind(invalid: impl Into<String>) -> Self {
        Self::InvalidKind {
            valid: VALID_KINDS.join(", "),
            invalid: invalid.into(),
        }
    }
}

/// Raw failure of an external tool, before the execution wrapper translates it
/// into [`Error::Audit`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command '{command}' returned non-zero exit status {returncode}")]
pub struct CalledProcessError {
    pub returncode: i32,
    /// Full command line, prefixed with any scoped environment variables.
    pub command: String,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// True if `err` is an [`Error::Audit`].
pub fn is_audit_error(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::Audit { .. }))
}

/// True if `err` carries [`Error::Interrupted`] anywhere in its chain.
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<Error>(), Some(Error::Interrupted)))
}
