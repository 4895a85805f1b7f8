//! User-facing report lines.

pub const AUDIT_PASSED: &str = "Success: all checks have passed";
pub const AUDIT_FAILED: &str = "Failed: one or more checks have failed";
pub const AUDIT_RUNNING: &str = "running the following plugins";
pub const NO_FILES_FOUND: &str = "No files found";
pub const NO_FILES_CHANGED: &str = "No changes have been made to audited files";
pub const NO_FILE_CHANGED: &str = "No changes have been made to audited file";
pub const INTERRUPTED: &str = "Interrupted";

pub fn banner(name: &str) -> String {
    format!("\n{} {name}", env!("CARGO_PKG_NAME"))
}

pub fn failed(returncode: i32) -> String {
    format!("Failed: returned non-zero exit status {returncode}")
}

pub fn success_files(len: usize) -> String {
    format!("Success: no issues found in {len} source files")
}

pub fn created(file: &str) -> String {
    format!("created ``{file}``")
}

pub fn up_to_date(file: &str) -> String {
    format!("``{file}`` is already up to date")
}

pub fn updated(file: &str) -> String {
    format!("updated ``{file}``")
}

pub fn timed(name: &str, elapsed: f64, average: f64) -> String {
    format!("{name}: completed in {elapsed:.2}s (average {average:.2}s)")
}
