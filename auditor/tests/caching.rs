//! Hash-cache behavior across repeated runs.
//!
//! Each test drives the dispatcher with a recording plugin against a scratch
//! project and a scripted VCS, then inspects what the plugin was given and what
//! the cache recorded.

use std::path::PathBuf;

use auditor::context::{Context, Flags};
use auditor::core::hash_mapping::FALLBACK;
use auditor::io::cache_store::read_store;
use auditor::plugin::dispatch::invoke;
use auditor::plugin::{Caching, Plugin, Registry};
use auditor::test_support::{RecordingAudit, TestProject};

fn registry(name: &str, plugin: &RecordingAudit) -> Registry {
    let mut registry = Registry::new();
    registry
        .register(name, Plugin::Audit(Box::new(plugin.clone())))
        .expect("register");
    registry
}

fn run(registry: &Registry, ctx: &mut Context, name: &str) -> i32 {
    invoke(registry, ctx, name, Flags::default(), &[]).expect("invoke")
}

fn project_with(files: &[&str]) -> TestProject {
    let project = TestProject::new();
    for rel in files {
        project.write(rel, &format!("// {rel}\n"));
    }
    project.vcs().set_commit(Some("c1"));
    project
}

/// A second run over unchanged files does not call the plugin and does not
/// touch the cache.
#[test]
fn unchanged_files_are_skipped_on_second_run() {
    let project = project_with(&["src/a.rs", "src/b.rs", "src/c.rs"]);
    let plugin = RecordingAudit::passing().with_caching(Caching::Files { all: false });
    let registry = registry("fmt", &plugin);
    let mut ctx = project.context();

    assert_eq!(run(&registry, &mut ctx, "fmt"), 0);
    assert_eq!(plugin.calls(), 1);
    assert!(project.stdout().contains("Success: no issues found in 3 source files"));
    let first = read_store(&ctx.paths);

    assert_eq!(run(&registry, &mut ctx, "fmt"), 0);
    assert_eq!(plugin.calls(), 1);
    assert!(
        project
            .stdout()
            .contains("No changes have been made to audited files")
    );
    assert_eq!(read_store(&ctx.paths), first);
    assert_eq!(ctx.files.len(), 3, "index restored after cached run");
}

/// Only the modified files reach the plugin.
#[test]
fn only_changed_files_are_audited() {
    let project = project_with(&["a.rs", "b.rs", "c.rs", "d.rs"]);
    let plugin = RecordingAudit::passing().with_caching(Caching::Files { all: false });
    let registry = registry("lint", &plugin);
    let mut ctx = project.context();
    run(&registry, &mut ctx, "lint");

    project.write("b.rs", "changed\n");
    project.write("d.rs", "changed\n");
    project.clear_output();
    run(&registry, &mut ctx, "lint");

    let seen = plugin.seen(project.root());
    assert_eq!(seen[1], vec!["b.rs", "d.rs"]);
    assert!(project.stdout().contains("Success: no issues found in 2 source files"));
}

/// With `cache_all`, one change sends the whole index to the plugin.
#[test]
fn cache_all_reruns_every_file_on_any_change() {
    let project = project_with(&["a.rs", "b.rs", "c.rs"]);
    let plugin = RecordingAudit::passing().with_caching(Caching::Files { all: true });
    let registry = registry("test", &plugin);
    let mut ctx = project.context();
    run(&registry, &mut ctx, "test");

    project.write("b.rs", "changed\n");
    run(&registry, &mut ctx, "test");

    let seen = plugin.seen(project.root());
    assert_eq!(seen[1], vec!["a.rs", "b.rs", "c.rs"]);
}

/// A new commit starts from the last successful session.
#[test]
fn new_commit_inherits_fallback_hashes() {
    let project = project_with(&["a.rs", "b.rs"]);
    let plugin = RecordingAudit::passing().with_caching(Caching::Files { all: false });
    let registry = registry("fmt", &plugin);
    let mut ctx = project.context();
    run(&registry, &mut ctx, "fmt");

    project.vcs().set_commit(Some("c2"));
    run(&registry, &mut ctx, "fmt");

    assert_eq!(plugin.calls(), 1);
    let store = read_store(&ctx.paths);
    assert!(store.hashes(&ctx.project, FALLBACK, "RecordingAudit::fmt").is_some());
}

/// Hashes recorded on a dirty tree go to an `uncommitted-` key and leave the
/// commit's own entry alone.
#[test]
fn dirty_tree_is_isolated_from_commit_entry() {
    let project = project_with(&["a.rs"]);
    let plugin = RecordingAudit::passing().with_caching(Caching::Files { all: false });
    let registry = registry("fmt", &plugin);
    let mut ctx = project.context();
    run(&registry, &mut ctx, "fmt");
    let clean = read_store(&ctx.paths);
    let identity = "RecordingAudit::fmt";
    let committed = clean
        .hashes(&ctx.project, "c1", identity)
        .cloned()
        .expect("commit entry");

    project.vcs().set_clean(false);
    project.write("a.rs", "edited\n");
    run(&registry, &mut ctx, "fmt");

    let dirty = read_store(&ctx.paths);
    assert_eq!(dirty.hashes(&ctx.project, "c1", identity), Some(&committed));
    let uncommitted = dirty
        .hashes(&ctx.project, "uncommitted-c1", identity)
        .expect("uncommitted entry");
    assert_ne!(uncommitted, &committed);
}

/// A failing run records nothing, so the next run audits the files again.
#[test]
fn failure_is_not_cached() {
    let project = project_with(&["a.rs"]);
    let plugin = RecordingAudit::returning(1).with_caching(Caching::Files { all: false });
    let registry = registry("lint", &plugin);
    let mut ctx = project.context();

    assert_eq!(run(&registry, &mut ctx, "lint"), 1);
    assert_eq!(run(&registry, &mut ctx, "lint"), 1);
    assert_eq!(plugin.calls(), 2);
    assert!(read_store(&ctx.paths).is_empty());
    assert!(
        project
            .stderr()
            .contains("Failed: returned non-zero exit status 1")
    );
}

/// `--no-cache` always calls the plugin.
#[test]
fn no_cache_flag_bypasses_hashes() {
    let project = project_with(&["a.rs"]);
    let plugin = RecordingAudit::passing().with_caching(Caching::Files { all: false });
    let registry = registry("fmt", &plugin);
    let mut ctx = project.context();
    let flags = Flags {
        no_cache: true,
        ..Flags::default()
    };

    for _ in 0..2 {
        invoke(&registry, &mut ctx, "fmt", flags, &[]).expect("invoke");
    }
    assert_eq!(plugin.calls(), 2);
    assert!(read_store(&ctx.paths).is_empty());
}

/// Single-file strategy: the plugin runs every time, and a repeat run over
/// the same content is reported as unchanged.
#[test]
fn single_file_reports_unchanged_file() {
    let project = project_with(&["docs/index.md"]);
    let plugin =
        RecordingAudit::passing().with_caching(Caching::File(PathBuf::from("docs/index.md")));
    let registry = registry("docs", &plugin);
    let mut ctx = project.context();

    run(&registry, &mut ctx, "docs");
    assert!(
        !project
            .stdout()
            .contains("No changes have been made to audited file\n")
    );
    run(&registry, &mut ctx, "docs");

    assert_eq!(plugin.calls(), 2);
    assert!(
        project
            .stdout()
            .contains("No changes have been made to audited file\n")
    );
}

/// The index is restored after an audit error raised on the changed subset.
#[test]
fn index_is_restored_after_audit_error() {
    let project = project_with(&["a.rs", "b.rs", "c.rs"]);
    let caching = Caching::Files { all: false };
    let passing = RecordingAudit::passing().with_caching(caching.clone());
    let mut ctx = project.context();
    run(&registry("lint", &passing), &mut ctx, "lint");

    project.write("b.rs", "changed\n");
    let failing = RecordingAudit::failing_tool("cargo clippy").with_caching(caching);
    let err = invoke(&registry("lint", &failing), &mut ctx, "lint", Flags::default(), &[])
        .expect_err("audit error");

    assert_eq!(err.to_string(), "cargo clippy: returned non-zero exit status 1");
    assert_eq!(failing.seen(project.root()), vec![vec!["b.rs"]]);
    assert_eq!(ctx.files.len(), 3);
}

/// A single-file audit failure still records the file's hash.
#[test]
fn single_file_failure_records_hash() {
    let project = project_with(&["whitelist.txt"]);
    let plugin = RecordingAudit::failing_tool("vulture")
        .with_caching(Caching::File(PathBuf::from("whitelist.txt")));
    let registry = registry("whitelist", &plugin);
    let mut ctx = project.context();

    let err = invoke(&registry, &mut ctx, "whitelist", Flags::default(), &[])
        .expect_err("audit error");
    assert_eq!(err.to_string(), "vulture: returned non-zero exit status 1");
    let store = read_store(&ctx.paths);
    let hashes = store
        .hashes(&ctx.project, "c1", "RecordingAudit::whitelist")
        .expect("entry");
    assert!(hashes.contains_key("whitelist.txt"));
}

/// An empty index short-circuits before any caching or plugin call.
#[test]
fn empty_index_reports_no_files() {
    let project = TestProject::new();
    let plugin = RecordingAudit::passing().with_caching(Caching::Files { all: false });
    let registry = registry("fmt", &plugin);
    let mut ctx = project.context();

    assert_eq!(run(&registry, &mut ctx, "fmt"), 0);
    assert_eq!(plugin.calls(), 0);
    assert_eq!(project.stdout(), "No files found\n");
}

/// With an empty index the single-file strategy records nothing.
#[test]
fn empty_index_skips_single_file_cache() {
    let project = TestProject::new();
    let plugin = RecordingAudit::passing()
        .with_caching(Caching::File(PathBuf::from("whitelist.txt")));
    let registry = registry("whitelist", &plugin);
    let mut ctx = project.context();

    assert_eq!(run(&registry, &mut ctx, "whitelist"), 0);
    assert_eq!(plugin.calls(), 0);
    assert_eq!(project.stdout(), "No files found\n");
    assert!(read_store(&ctx.paths).is_empty());
}
