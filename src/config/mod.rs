//! Configuration module for the servman daemon.
//!
//! Handles loading and validating daemon configuration from TOML files and
//! resolving the installation layout the rest of the crate works against.

mod layout;
mod settings;

pub use layout::*;
pub use settings::*;
