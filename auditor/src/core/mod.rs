//! Pure data structures: no filesystem, process or VCS access.

pub mod env;
pub mod file_index;
pub mod hash_mapping;
