//! Side-effecting operations: filesystem, git and external tools.

pub mod cache_store;
pub mod config;
pub mod console;
pub mod durations;
pub mod git;
pub mod indexing;
pub mod json_store;
pub mod package;
pub mod process;
