//! Plugin-driven project auditor.
//!
//! `auditor <MODULE>` runs one registered plugin; `auditor audit` runs the
//! plugins configured in `.auditor.toml`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use auditor::app::{self, Options};
use auditor::context::Flags;
use auditor::error::is_interrupted;
use auditor::{exit_codes, logging, messages};
use clap::{ArgAction, Parser};

#[derive(Parser)]
#[command(
    name = "auditor",
    version,
    about = "Audit a project with plugin-driven developer tools"
)]
struct Cli {
    /// Plugin to run (`modules` lists them).
    module: Option<String>,

    /// Extra arguments handed to the plugin's tool, after `--`.
    #[arg(last = true)]
    args: Vec<String>,

    /// Fix what the audit finds, where the plugin supports it.
    #[arg(short, long, env = "AUDITOR_FIX")]
    fix: bool,

    /// Report tool failures by exit code instead of aborting.
    #[arg(short, long, env = "AUDITOR_SUPPRESS")]
    suppress: bool,

    /// Ignore the hash cache and audit every file.
    #[arg(short, long, env = "AUDITOR_NO_CACHE")]
    no_cache: bool,

    /// Run `clean` before `audit`.
    #[arg(short, long, env = "AUDITOR_CLEAN")]
    clean: bool,

    /// Record and print how long each plugin takes.
    #[arg(short, long, env = "AUDITOR_TIMED")]
    timed: bool,

    /// Increase diagnostic output (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Regex of repository-relative paths to leave out of the file index.
    #[arg(long, value_name = "REGEX")]
    exclude: Option<String>,

    /// Config file to use instead of `.auditor.toml`.
    #[arg(long, value_name = "PATH")]
    rcfile: Option<PathBuf>,
}

impl Cli {
    fn options(self) -> Options {
        Options {
            module: self.module,
            args: self.args,
            flags: Flags {
                fix: self.fix,
                suppress: self.suppress,
                no_cache: self.no_cache,
                clean: self.clean,
                timed: self.timed,
            },
            exclude: self.exclude,
            rcfile: self.rcfile,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli.options()) {
        Ok(code) => std::process::exit(code),
        Err(err) if is_interrupted(&err) => {
            eprintln!("{}", messages::INTERRUPTED);
            std::process::exit(exit_codes::INTERRUPTED);
        }
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run(options: Options) -> Result<i32> {
    let interrupt = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupt))
        .context("install SIGINT handler")?;
    let (mut ctx, registry) = app::bootstrap_cwd(&options, interrupt)?;
    app::run(&mut ctx, &registry, &options)
}
