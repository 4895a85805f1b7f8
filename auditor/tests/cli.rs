//! CLI tests for the `auditor` binary.
//!
//! Spawns the binary inside a scratch git repository and checks exit codes
//! and the lines it prints.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use auditor::exit_codes;

fn git(root: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(root)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?}");
}

fn repo() -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    git(temp.path(), &["init", "-q"]);
    temp
}

fn declare(root: &Path, name: &str, contents: &str) {
    let dir = root.join(".auditor/plugins");
    fs::create_dir_all(&dir).expect("plugin dir");
    fs::write(dir.join(format!("{name}.toml")), contents).expect("plugin file");
}

fn auditor(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_auditor"))
        .args(args)
        .current_dir(root)
        .env("XDG_CONFIG_HOME", root.join(".config"))
        .env_remove("AUDITOR_FIX")
        .env_remove("AUDITOR_SUPPRESS")
        .env_remove("AUDITOR_NO_CACHE")
        .env_remove("AUDITOR_CLEAN")
        .env_remove("AUDITOR_TIMED")
        .env_remove("RUST_LOG")
        .output()
        .expect("run auditor")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn modules_lists_builtin_and_declared_plugins() {
    let temp = repo();
    declare(
        temp.path(),
        "check",
        "kind = \"audit\"\nabout = \"Run the checker.\"\nexe = \"true\"\n",
    );

    let output = auditor(temp.path(), &["modules"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let out = stdout(&output);
    assert!(out.contains("available plugins:"), "{out}");
    assert!(out.contains("check"), "{out}");
    assert!(out.contains("Run the checker."), "{out}");
    assert!(out.contains("generate-rcfile"), "{out}");
}

#[test]
fn audit_with_no_tracked_files_passes() {
    let temp = repo();
    declare(temp.path(), "check", "kind = \"audit\"\nexe = \"true\"\n");

    let output = auditor(temp.path(), &["check"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("No files found"));
}

#[test]
fn failing_tool_exits_with_failure() {
    let temp = repo();
    fs::write(temp.path().join("lib.rs"), "fn f() {}\n").expect("write");
    git(temp.path(), &["add", "lib.rs"]);
    declare(temp.path(), "check", "kind = \"audit\"\nexe = \"false\"\n");

    let output = auditor(temp.path(), &["check"]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let err = stderr(&output);
    assert!(err.contains("Failed: returned non-zero exit status 1"), "{err}");
    assert!(err.contains("false: returned non-zero exit status 1"), "{err}");
}

#[test]
fn suppress_reports_failure_without_error() {
    let temp = repo();
    fs::write(temp.path().join("lib.rs"), "fn f() {}\n").expect("write");
    git(temp.path(), &["add", "lib.rs"]);
    declare(temp.path(), "check", "kind = \"audit\"\nexe = \"false\"\n");

    let output = auditor(temp.path(), &["--suppress", "check"]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let err = stderr(&output);
    assert!(err.contains("Failed: returned non-zero exit status 1"), "{err}");
    assert!(!err.contains("false: returned"), "{err}");
}

#[test]
fn unknown_module_exits_with_failure() {
    let temp = repo();

    let output = auditor(temp.path(), &["lint"]);

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(stdout(&output).contains("available plugins:"));
}

#[test]
fn generate_rcfile_prints_loadable_config() {
    let temp = repo();

    let output = auditor(temp.path(), &["generate-rcfile"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let config: toml::Table = toml::from_str(&stdout(&output)).expect("toml");
    assert!(config.get("audit").is_some());
}

/// A submodule gitlink is listed by git but is a directory, not a file.
#[test]
fn cached_audit_ignores_tracked_directories() {
    let temp = repo();
    fs::write(temp.path().join("lib.rs"), "fn f() {}\n").expect("write");
    fs::create_dir_all(temp.path().join("vendored")).expect("mkdir");
    git(temp.path(), &["add", "lib.rs"]);
    git(
        temp.path(),
        &[
            "update-index",
            "--add",
            "--cacheinfo",
            "160000,1111111111111111111111111111111111111111,vendored",
        ],
    );
    declare(
        temp.path(),
        "check",
        "kind = \"audit\"\nexe = \"true\"\ncache = true\n",
    );

    let output = auditor(temp.path(), &["check"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("no issues found in 1 source file"), "{out}");
}
