//! Plugin lookup and invocation.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::context::{Context, Flags};
use crate::io::durations::Record;
use crate::messages;
use crate::plugin::{Parametrize, Plugin, Registered, Registry, Run, cache, wrapper};

/// Invoke the plugin registered as `name`.
///
/// Returns the plugin's exit status; failures the plugin raises (for example
/// [`crate::error::Error::Audit`]) propagate as errors.
#[instrument(skip_all, fields(plugin = name))]
pub fn invoke(
    registry: &Registry,
    ctx: &mut Context,
    name: &str,
    flags: Flags,
    args: &[String],
) -> Result<i32> {
    ctx.check_interrupted()?;
    let entry = registry.get(name)?;
    let run = Run::new(entry.name(), flags, args, entry.subprocesses(), registry);
    if flags.timed {
        return timed(ctx, entry, &run);
    }
    call(ctx, entry, &run)
}

fn call(ctx: &mut Context, entry: &Registered, run: &Run<'_>) -> Result<i32> {
    cache::cached(ctx, entry, run, |ctx| match entry.plugin() {
        Plugin::Audit(p) => wrapper::files(ctx, |ctx| wrapper::audit(ctx, p.as_ref(), run)),
        Plugin::Fix(p) => wrapper::files(ctx, |ctx| wrapper::fix(ctx, p.as_ref(), run)),
        Plugin::FixFile(p) => wrapper::files(ctx, |ctx| wrapper::fix_file(ctx, p.as_ref(), run)),
        Plugin::Action(p) => wrapper::action(ctx, p.as_ref(), run),
        Plugin::Write(p) => wrapper::write(ctx, p.as_ref(), run),
        Plugin::Parametrize(p) => parametrize(ctx, p.as_ref(), run),
    })
}

/// Run each member with a banner. A non-zero member makes the composite
/// return 1; an error from a member stops the composite. Members apply their
/// own environment, not the composite's.
fn parametrize(ctx: &mut Context, plugin: &dyn Parametrize, run: &Run<'_>) -> Result<i32> {
    let mut returncode = 0;
    for name in plugin.plugins() {
        ctx.console.out(messages::banner(&name));
        if run.invoke(ctx, &name)? != 0 {
            returncode = 1;
        }
    }
    Ok(returncode)
}

/// Record the wall-clock time of the call, whatever its outcome.
fn timed(ctx: &mut Context, entry: &Registered, run: &Run<'_>) -> Result<i32> {
    let identity = entry.identity();
    let started = Instant::now();
    let result = call(ctx, entry, run);

    let path = ctx.paths.durations.clone();
    let mut record = Record::load(&path);
    let elapsed = record.push(&ctx.project, &identity, started.elapsed());
    let average = record.average(&ctx.project, &identity).unwrap_or(elapsed);
    match record.write(&path) {
        Ok(()) => debug!(%identity, elapsed, "recorded duration"),
        // Keep the plugin's own failure as the reported one.
        Err(err) if result.is_err() => warn!(err = %format!("{err:#}"), "failed to record duration"),
        Err(err) => return Err(err),
    }
    ctx.console.out(messages::timed(run.name, elapsed, average));
    result
}
