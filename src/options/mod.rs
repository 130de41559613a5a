//! Option line codec.
//!
//! An instance's runtime parameters travel to the service host as a flat
//! list of `--key=value` tokens. [`render`] produces that line and
//! [`parse`] applies operator-supplied overrides back onto an instance.

mod parse;
mod render;

pub use parse::{parse, parse_into};
pub use render::render;

pub const SERVICE_LIB: &str = "--service.lib";
pub const SERVICE_CONFIG: &str = "--service.config";
pub const LOG_NAME: &str = "--log.name";
pub const LOG_TYPE: &str = "--log.type";
pub const LOG_LEVEL: &str = "--log.level";
pub const LOG_KEEP: &str = "--log.keep";
pub const LOG_SIZE: &str = "--log.size";

/// Rotation threshold substituted by the renderer when none is stored.
pub const RENDER_DEFAULT_SIZE: i64 = 80;
/// Retention substituted by the renderer when none is stored.
pub const RENDER_DEFAULT_KEEP: i64 = 7;
