//! Command executor module.
//!
//! Runs supervisor tooling as child processes with enforced timeouts.

mod subprocess;

pub use subprocess::{SubprocessBuilder, SubprocessResult};
