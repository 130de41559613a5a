//! Input validation for operator-supplied names and paths.

mod path;
mod service_name;

pub use path::validate_relative_path;
pub use service_name::validate_instance_name;
