//! Stable exit codes for the auditor CLI.

/// Every invoked plugin passed.
pub const OK: i32 = 0;
/// A plugin failed, or the run aborted on a configuration/registry/VCS error.
pub const FAILED: i32 = 1;
/// The run was interrupted with SIGINT.
pub const INTERRUPTED: i32 = 130;
