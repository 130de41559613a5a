//! Definition and instance registry.
//!
//! Definitions are discovered once from the definitions directory;
//! instances are loaded from the services file and rewritten in full after
//! every change. [`Registry`] ties both to the lifecycle controller and
//! enforces the create/delete invariants.

mod definitions;
mod fields;
mod instances;
#[allow(clippy::module_inception)]
mod registry;

pub use definitions::{load_definitions, parse_manifest, MANIFEST_FILE};
pub use fields::Fields;
pub use instances::{load_instances, persist_instances};
pub use registry::{Action, Registry, Target};
