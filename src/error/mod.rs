//! Error types for the servman daemon.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
