//! Hash-cache strategies wrapped around a plugin call.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::context::Context;
use crate::core::hash_mapping::{HashMapping, commit_key};
use crate::error::is_audit_error;
use crate::io::cache_store::{hash_file, read_store, write_store};
use crate::messages;
use crate::plugin::{Caching, Registered, Run};

/// Run `body` under the plugin's cache strategy.
pub fn cached(
    ctx: &mut Context,
    entry: &Registered,
    run: &Run<'_>,
    body: impl FnOnce(&mut Context) -> Result<i32>,
) -> Result<i32> {
    if run.flags.no_cache {
        return body(ctx);
    }
    match entry.plugin().base().caching() {
        Caching::Off => body(ctx),
        // An empty index is reported by the execution wrapper.
        Caching::Files { .. } | Caching::File(_) if ctx.files.is_empty() => body(ctx),
        Caching::Files { all } => {
            let mapping = open(ctx, entry)?;
            files(ctx, mapping, all, body)
        }
        Caching::File(file) => {
            let mapping = open(ctx, entry)?;
            let path = ctx.root.join(file);
            single_file(ctx, mapping, &path, body)
        }
    }
}

fn open(ctx: &Context, entry: &Registered) -> Result<HashMapping> {
    let commit = ctx.interruptible(ctx.vcs().commit_hash())?;
    let clean = ctx.interruptible(ctx.vcs().is_clean())?;
    let key = commit_key(commit.as_deref(), clean);
    debug!(commit = %key, identity = %entry.identity(), "opened hash mapping");
    Ok(HashMapping::open(
        read_store(&ctx.paths),
        ctx.project.clone(),
        key,
        entry.identity(),
    ))
}

/// Whole-index strategy.
///
/// Unchanged files are removed from the index for the duration of the call;
/// with `all`, a single change keeps every file. The index is restored
/// whatever the outcome.
#[instrument(skip_all, fields(all))]
pub fn files(
    ctx: &mut Context,
    mut mapping: HashMapping,
    all: bool,
    body: impl FnOnce(&mut Context) -> Result<i32>,
) -> Result<i32> {
    let snapshot = ctx.files.snapshot();
    let result = (|| -> Result<i32> {
        for path in snapshot.paths() {
            let hash = hash_file(path)?;
            let hit = hash
                .as_deref()
                .is_some_and(|hash| mapping.matches(&ctx.relative(path), hash));
            if hit {
                ctx.files.remove(path);
            } else if all {
                ctx.files.restore(&snapshot);
                break;
            }
        }
        if ctx.files.is_empty() {
            ctx.console.out(messages::NO_FILES_CHANGED);
            return Ok(0);
        }
        debug!(changed = ctx.files.len(), total = snapshot.paths().len(), "running on changed files");

        let returncode = body(ctx)?;
        if returncode == 0 {
            let ran: Vec<_> = ctx.files.iter().cloned().collect();
            for path in &ran {
                mapping.save_hash(ctx.relative(path), hash_file(path)?);
            }
            write_store(&ctx.paths, &mapping.into_store())?;
        }
        Ok(returncode)
    })();
    ctx.files.restore(&snapshot);
    result
}

/// Single-file strategy.
///
/// The plugin always runs. A failed audit still records the file's hash, a
/// clean run on an unchanged file is reported as such and not recorded.
#[instrument(skip_all, fields(file = %path.display()))]
pub fn single_file(
    ctx: &mut Context,
    mut mapping: HashMapping,
    path: &Path,
    body: impl FnOnce(&mut Context) -> Result<i32>,
) -> Result<i32> {
    let rel = ctx.relative(path);
    let result = body(ctx);
    match &result {
        Err(err) if is_audit_error(err) => {
            mapping.save_hash(rel, hash_file(path)?);
            write_store(&ctx.paths, &mapping.into_store())?;
        }
        Err(_) => {}
        Ok(0) => {
            let hash = hash_file(path)?;
            if hash
                .as_deref()
                .is_some_and(|hash| mapping.matches(&rel, hash))
            {
                ctx.console.out(messages::NO_FILE_CHANGED);
            } else {
                mapping.save_hash(rel, hash);
                write_store(&ctx.paths, &mapping.into_store())?;
            }
        }
        Ok(_) => {
            mapping.save_hash(rel, hash_file(path)?);
            write_store(&ctx.paths, &mapping.into_store())?;
        }
    }
    result
}
