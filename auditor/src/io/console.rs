//! Report output.
//!
//! Plugin results go through a [`Console`] rather than straight to the process
//! streams so tests can capture exactly what a user would see.

use std::io::{self, Write};

use tracing::warn;

pub struct Console {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl Console {
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self { out, err }
    }

    /// Console bound to the process stdout and stderr.
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Print a line to stdout.
    pub fn out(&mut self, line: impl AsRef<str>) {
        if let Err(err) = writeln!(self.out, "{}", line.as_ref()).and_then(|()| self.out.flush()) {
            warn!(err = %err, "failed to write report line");
        }
    }

    /// Print a line to stderr.
    pub fn err(&mut self, line: impl AsRef<str>) {
        if let Err(err) = writeln!(self.err, "{}", line.as_ref()).and_then(|()| self.err.flush()) {
            warn!(err = %err, "failed to write report line");
        }
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}
