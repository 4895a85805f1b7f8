//! Execution contracts applied around plugin hooks.
//!
//! Every hook runs inside the plugin's environment scope. Tool failures
//! ([`CalledProcessError`]) are translated into [`Error::Audit`] naming the
//! full command line. The files wrapper adds the "no files" short-circuit and
//! the success or failure report for file-oriented shapes.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{CalledProcessError, Error};
use crate::io::cache_store::hash_file;
use crate::messages;
use crate::plugin::{Action, Audit, Fix, FixFile, Run, Write};

/// Outcome of an audit step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Passed,
    /// The hook returned a non-zero code (`command` is `None`) or a tool it
    /// ran exited non-zero.
    Failed {
        returncode: i32,
        command: Option<String>,
    },
}

/// Classify a hook result. Errors other than tool failures pass through.
pub fn check(result: Result<i32>) -> Result<Check> {
    match result {
        Ok(0) => Ok(Check::Passed),
        Ok(returncode) => Ok(Check::Failed {
            returncode,
            command: None,
        }),
        Err(err) => match err.downcast::<CalledProcessError>() {
            Ok(called) => Ok(Check::Failed {
                returncode: called.returncode,
                command: Some(called.command),
            }),
            Err(err) => Err(err),
        },
    }
}

/// Turn a failed check into the hook's final result: a returned code stays a
/// code, a tool failure becomes [`Error::Audit`].
fn settle(check: Check) -> Result<i32> {
    match check {
        Check::Passed => Ok(0),
        Check::Failed {
            returncode,
            command: None,
        } => Ok(returncode),
        Check::Failed {
            returncode,
            command: Some(command),
        } => Err(Error::Audit {
            command,
            returncode,
        }
        .into()),
    }
}

/// Translate a tool failure without interpreting the return code.
pub fn translate<T>(result: Result<T>) -> Result<T> {
    result.map_err(|err| match err.downcast::<CalledProcessError>() {
        Ok(called) => Error::Audit {
            command: called.command,
            returncode: called.returncode,
        }
        .into(),
        Err(err) => err,
    })
}

/// Short-circuit on an empty index and report the outcome of `body`.
pub fn files(ctx: &mut Context, body: impl FnOnce(&mut Context) -> Result<i32>) -> Result<i32> {
    if ctx.files.is_empty() {
        ctx.console.out(messages::NO_FILES_FOUND);
        return Ok(0);
    }
    let len = ctx.files.len();
    let result = body(ctx);
    match &result {
        Ok(0) => ctx.console.out(messages::success_files(len)),
        Ok(returncode) => ctx.console.err(messages::failed(*returncode)),
        Err(err) => {
            if let Some(Error::Audit { returncode, .. }) = err.downcast_ref::<Error>() {
                ctx.console.err(messages::failed(*returncode));
            }
        }
    }
    result
}

pub fn audit(ctx: &mut Context, plugin: &dyn Audit, run: &Run<'_>) -> Result<i32> {
    let _scope = ctx.env.scoped(&plugin.env());
    settle(check(plugin.audit(ctx, run))?)
}

/// Audit, then fix on failure when `--fix` is set.
pub fn fix(ctx: &mut Context, plugin: &dyn Fix, run: &Run<'_>) -> Result<i32> {
    let _scope = ctx.env.scoped(&plugin.env());
    match check(plugin.audit(ctx, run))? {
        Check::Passed => Ok(0),
        Check::Failed { returncode, .. } if run.flags.fix => {
            debug!(plugin = run.name, returncode, "audit failed, fixing");
            settle(check(plugin.fix(ctx, run))?)
        }
        failed => settle(failed),
    }
}

pub fn action(ctx: &mut Context, plugin: &dyn Action, run: &Run<'_>) -> Result<i32> {
    let _scope = ctx.env.scoped(&plugin.env());
    translate(plugin.action(ctx, run))
}

/// Audit every existing tracked file.
///
/// With `--fix`, each failing file is fixed as it is met. Without it, failing
/// files are collected and one [`Error::Audit`] naming all of them is raised
/// after every file has been audited.
pub fn fix_file(ctx: &mut Context, plugin: &dyn FixFile, run: &Run<'_>) -> Result<i32> {
    let _scope = ctx.env.scoped(&plugin.env());
    let files: Vec<PathBuf> = ctx.files.iter().filter(|p| p.is_file()).cloned().collect();
    let mut failed = Vec::new();
    for file in &files {
        ctx.check_interrupted()?;
        translate(plugin.audit(ctx, run, file))?;
        if plugin.fail_condition().unwrap_or(false) {
            if run.flags.fix {
                debug!(file = %file.display(), "fixing");
                translate(plugin.fix(ctx, run, file))?;
            } else {
                failed.push(ctx.relative(file));
            }
        }
    }
    if failed.is_empty() {
        return Ok(0);
    }
    warn!(plugin = run.name, failed = failed.len(), "files failed audit");
    Err(Error::Audit {
        command: format!("{} {}", run.name, failed.join(" ")),
        returncode: 1,
    }
    .into())
}

/// Outcome of a write, from the target's hash before and after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    UpToDate,
    Updated,
}

impl WriteOutcome {
    pub fn from_hashes(before: Option<&str>, after: Option<&str>) -> Self {
        match (before, after) {
            (None, _) => Self::Created,
            (Some(before), Some(after)) if before == after => Self::UpToDate,
            _ => Self::Updated,
        }
    }
}

/// Run a write hook and report what happened to its target.
pub fn write(ctx: &mut Context, plugin: &dyn Write, run: &Run<'_>) -> Result<i32> {
    if let Some(required) = plugin.required(ctx)
        && !required.exists()
    {
        debug!(plugin = run.name, required = %required.display(), "prerequisite missing, skipping");
        return Ok(0);
    }
    let path = plugin.path(ctx)?;
    let before = hash_file(&path)?;
    let returncode = {
        let _scope = ctx.env.scoped(&plugin.env());
        translate(plugin.write(ctx, run))?
    };
    let after = hash_file(&path)?;
    let display = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    match WriteOutcome::from_hashes(before.as_deref(), after.as_deref()) {
        WriteOutcome::Created => {
            ctx.console.out(messages::created(&display));
            if path.starts_with(&ctx.root) && after.is_some() {
                ctx.files.append(path);
            }
        }
        WriteOutcome::UpToDate => ctx.console.out(messages::up_to_date(&display)),
        WriteOutcome::Updated => ctx.console.out(messages::updated(&display)),
    }
    Ok(returncode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_classifies_codes_and_tool_failures() {
        assert_eq!(check(Ok(0)).expect("check"), Check::Passed);
        assert_eq!(
            check(Ok(2)).expect("check"),
            Check::Failed {
                returncode: 2,
                command: None
            }
        );
        let tool = anyhow::Error::new(CalledProcessError {
            returncode: 1,
            command: "cargo fmt --check".to_string(),
        });
        assert_eq!(
            check(Err(tool)).expect("check"),
            Check::Failed {
                returncode: 1,
                command: Some("cargo fmt --check".to_string())
            }
        );
        assert!(check(Err(anyhow::anyhow!("spawn failed"))).is_err());
    }

    #[test]
    fn settle_raises_only_for_tool_failures() {
        assert_eq!(
            settle(Check::Failed {
                returncode: 3,
                command: None
            })
            .expect("code"),
            3
        );
        let err = settle(Check::Failed {
            returncode: 1,
            command: Some("cargo clippy".to_string()),
        })
        .expect_err("audit error");
        assert_eq!(err.to_string(), "cargo clippy: returned non-zero exit status 1");
    }

    #[test]
    fn write_outcome_from_hashes() {
        assert_eq!(WriteOutcome::from_hashes(None, Some("a")), WriteOutcome::Created);
        assert_eq!(
            WriteOutcome::from_hashes(Some("a"), Some("a")),
            WriteOutcome::UpToDate
        );
        assert_eq!(
            WriteOutcome::from_hashes(Some("a"), Some("b")),
            WriteOutcome::Updated
        );
    }
}
