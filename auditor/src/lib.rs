//! Plugin-driven project auditor.
//!
//! Runs external developer tools (formatters, linters, test runners) as
//! plugins against the files tracked by git, and skips files whose content
//! has not changed since the last passing run. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure data structures (file index, env overlay, hash mapping).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, git, external tools).
//!   Isolated behind traits where tests need fakes.
//! - **[`plugin`]**: Plugin shapes, registry, execution contracts and cache
//!   strategies, coordinating core logic with I/O.
//!
//! [`app`] wires these together for the CLI.

pub mod app;
pub mod context;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod messages;
pub mod plugin;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
