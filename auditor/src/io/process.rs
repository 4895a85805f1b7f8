//! External tool invocation.
//!
//! Tools run in the project root with the scoped environment overlay applied.
//! There is no timeout: a tool that hangs hangs the run.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::process::{Command, Stdio};

use anyhow::{Context as _, Result};
use tracing::{debug, error, instrument};

use crate::context::Context;
use crate::error::{CalledProcessError, Error};

/// How a single call treats output and failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Collect stdout into [`Completed::stdout`] instead of the terminal.
    pub capture: bool,
    /// Discard stdout.
    pub devnull: bool,
    /// Return a non-zero exit code instead of raising [`CalledProcessError`].
    pub suppress: bool,
}

impl CallOptions {
    pub fn capture() -> Self {
        Self {
            capture: true,
            ..Self::default()
        }
    }

    pub fn suppress() -> Self {
        Self {
            suppress: true,
            ..Self::default()
        }
    }
}

/// Finished tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completed {
    pub returncode: i32,
    /// Captured stdout; empty unless [`CallOptions::capture`] was set.
    pub stdout: String,
}

/// Handle to one external executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subprocess {
    exe: String,
}

impl Subprocess {
    pub fn new(exe: impl Into<String>) -> Self {
        Self { exe: exe.into() }
    }

    pub fn exe(&self) -> &str {
        &self.exe
    }

    /// Run the executable with `args`.
    ///
    /// A missing executable is [`Error::CommandNotFound`]; a non-zero exit is
    /// [`CalledProcessError`] unless `options.suppress` is set. If SIGINT
    /// arrived while the tool ran, the call fails with [`Error::Interrupted`].
    #[instrument(skip_all, fields(exe = %self.exe))]
    pub fn call<I, S>(&self, ctx: &Context, args: I, options: CallOptions) -> Result<Completed>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect();
        let command = render(&ctx.env.render_prefix(), &self.exe, &args);
        debug!(%command, "calling");

        let mut cmd = Command::new(&self.exe);
        cmd.args(&args)
            .current_dir(&ctx.root)
            .envs(ctx.env.vars())
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit());
        if options.capture {
            cmd.stdout(Stdio::piped());
        } else if options.devnull {
            cmd.stdout(Stdio::null());
        } else {
            cmd.stdout(Stdio::inherit());
        }

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                error!(exe = %self.exe, "command not found");
                return Err(Error::CommandNotFound {
                    exe: self.exe.clone(),
                }
                .into());
            }
            Err(err) => return Err(err).with_context(|| format!("spawn {command}")),
        };
        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for {command}"))?;
        ctx.check_interrupted()?;

        // Killed by a signal: report the conventional shell status.
        let returncode = output.status.code().unwrap_or(128 + signal_of(&output.status));
        if returncode != 0 && !options.suppress {
            error!(%command, returncode, "returned non-zero exit status");
            return Err(CalledProcessError {
                returncode,
                command,
            }
            .into());
        }
        Ok(Completed {
            returncode,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(unix)]
fn signal_of(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(0)
}

#[cfg(not(unix))]
fn signal_of(_status: &std::process::ExitStatus) -> i32 {
    0
}

fn render(prefix: &str, exe: &str, args: &[String]) -> String {
    let mut command = format!("{prefix}{exe}");
    for arg in args {
        command.push(' ');
        command.push_str(arg);
    }
    command
}

/// Subprocesses of one plugin, keyed by executable name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subprocesses {
    by_exe: BTreeMap<String, Subprocess>,
}

impl Subprocesses {
    pub fn new<I, S>(exes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let by_exe = exes
            .into_iter()
            .map(Into::into)
            .map(|exe: String| (exe.clone(), Subprocess::new(exe)))
            .collect();
        Self { by_exe }
    }

    pub fn get(&self, exe: &str) -> Option<&Subprocess> {
        self.by_exe.get(exe)
    }

    pub fn len(&self) -> usize {
        self.by_exe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_exe.is_empty()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::test_support::TestProject;

    fn sh(script: &str) -> [String; 2] {
        ["-c".to_string(), script.to_string()]
    }

    #[test]
    fn non_zero_exit_raises_called_process_error() {
        let project = TestProject::new();
        let ctx = project.context();
        let err = Subprocess::new("sh")
            .call(&ctx, sh("exit 3"), CallOptions::default())
            .expect_err("exit 3");
        let called = err.downcast_ref::<CalledProcessError>().expect("called");
        assert_eq!(called.returncode, 3);
        assert_eq!(called.command, "sh -c exit 3");
    }

    #[test]
    fn suppress_returns_the_exit_code() {
        let project = TestProject::new();
        let ctx = project.context();
        let done = Subprocess::new("sh")
            .call(&ctx, sh("exit 4"), CallOptions::suppress())
            .expect("suppressed");
        assert_eq!(done.returncode, 4);
    }

    #[test]
    fn missing_executable_is_command_not_found() {
        let project = TestProject::new();
        let ctx = project.context();
        let err = Subprocess::new("auditor-no-such-tool")
            .call(&ctx, ["--version"], CallOptions::default())
            .expect_err("missing");
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::CommandNotFound { exe }) if exe == "auditor-no-such-tool"
        ));
    }

    #[test]
    fn scoped_env_reaches_the_tool_and_the_error_message() {
        let project = TestProject::new();
        let ctx = project.context();
        let overrides = BTreeMap::from([("AUDITOR_PROBE".to_string(), "on".to_string())]);
        let _scope = ctx.env.scoped(&overrides);

        let done = Subprocess::new("sh")
            .call(&ctx, sh("printf %s \"$AUDITOR_PROBE\""), CallOptions::capture())
            .expect("capture");
        assert_eq!(done.stdout, "on");

        let err = Subprocess::new("sh")
            .call(&ctx, sh("exit 1"), CallOptions::default())
            .expect_err("exit 1");
        let called = err.downcast_ref::<CalledProcessError>().expect("called");
        assert_eq!(called.command, "AUDITOR_PROBE=on sh -c exit 1");
    }

    #[test]
    fn runs_in_project_root() {
        let project = TestProject::new();
        let ctx = project.context();
        let done = Subprocess::new("pwd")
            .call(&ctx, Vec::<String>::new(), CallOptions::capture())
            .expect("pwd");
        let reported = std::fs::canonicalize(done.stdout.trim()).expect("canonical");
        let expected = std::fs::canonicalize(project.root()).expect("canonical");
        assert_eq!(reported, expected);
    }
}
