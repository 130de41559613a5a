//! Upgrade orchestrator.
//!
//! Applies an uploaded zip package to the installation root: discovers
//! which definitions it replaces, stops their running instances, writes
//! the files, restarts the instances and always removes the package.

mod archive;
mod dependencies;
mod orchestrator;

pub use archive::{PackageArchive, PackageEntry};
pub use dependencies::PackageLayout;
pub use orchestrator::{UpgradeReport, UpgradeStage, UpgradeState, Upgrader};
