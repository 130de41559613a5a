//! Upgrade state machine.
//!
//! `Idle -> PackageOpened -> DependenciesResolved -> Stopping -> Extracting
//! -> Starting -> Done`, or `Failed(stage)` from any step. The staged
//! package is first moved to a name private to the run and that copy is
//! removed however the run ends.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Layout;
use crate::control::ServiceControl;
use crate::error::{DaemonError, DaemonResult, NotFoundKind};
use crate::model::Instance;
use crate::storage::remove_if_exists;

use super::archive::PackageArchive;
use super::dependencies::PackageLayout;

/// Step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeStage {
    Open,
    Resolve,
    Stop,
    Extract,
    Start,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeState {
    Idle,
    PackageOpened,
    DependenciesResolved,
    Stopping,
    Extracting,
    Starting,
    Done,
    Failed(UpgradeStage),
}

impl fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradeState::Failed(stage) => write!(f, "Failed({:?})", stage),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Outcome of a successful upgrade.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpgradeReport {
    pub package_root: String,
    /// Affected definition ids.
    pub affected: Vec<String>,
    /// Instances stopped before extraction.
    pub stopped: Vec<String>,
    /// Instances started after extraction.
    pub started: Vec<String>,
    /// Files written.
    pub extracted: usize,
}

/// Removes the claimed package and an emptied staging directory on drop.
struct StagingCleanup {
    package: PathBuf,
    staging_dir: PathBuf,
}

impl Drop for StagingCleanup {
    fn drop(&mut self) {
        if let Err(e) = remove_if_exists(&self.package) {
            warn!(path = %self.package.display(), error = %e, "Failed to delete upgrade package");
        }
        // Only succeeds when nothing else is staged.
        let _ = fs::remove_dir(&self.staging_dir);
    }
}

/// Applies the staged package to the installation root.
pub struct Upgrader<'a> {
    layout: &'a Layout,
    control: &'a dyn ServiceControl,
    state: UpgradeState,
}

impl<'a> Upgrader<'a> {
    pub fn new(layout: &'a Layout, control: &'a dyn ServiceControl) -> Self {
        Self {
            layout,
            control,
            state: UpgradeState::Idle,
        }
    }

    pub fn state(&self) -> UpgradeState {
        self.state
    }

    fn transition(&mut self, next: UpgradeState) {
        info!(from = %self.state, to = %next, "Upgrade state");
        self.state = next;
    }

    fn checked<T>(&mut self, stage: UpgradeStage, result: DaemonResult<T>) -> DaemonResult<T> {
        if let Err(e) = &result {
            error!(stage = ?stage, error = %e, "Upgrade failed");
            self.transition(UpgradeState::Failed(stage));
        }
        result
    }

    /// Run the whole pipeline against `instances`.
    pub fn run(&mut self, instances: &[Instance]) -> DaemonResult<UpgradeReport> {
        let claimed = self.claim_package();
        let package = self.checked(UpgradeStage::Open, claimed)?;
        let _cleanup = StagingCleanup {
            package: package.clone(),
            staging_dir: self.layout.staging_dir.clone(),
        };

        let opened = PackageArchive::open(&package);
        let mut archive = self.checked(UpgradeStage::Open, opened)?;
        self.transition(UpgradeState::PackageOpened);

        let resolved = archive.entries().and_then(|entries| {
            PackageLayout::resolve(
                entries.iter().map(|e| e.path.as_str()),
                &self.layout.module_suffix,
            )
        });
        let package_layout = self.checked(UpgradeStage::Resolve, resolved)?;
        self.transition(UpgradeState::DependenciesResolved);

        let targets: Vec<&Instance> = instances
            .iter()
            .filter(|i| package_layout.affected.contains(&i.id))
            .collect();
        let mut report = UpgradeReport {
            package_root: package_layout.root.clone(),
            affected: package_layout.affected.iter().cloned().collect(),
            ..UpgradeReport::default()
        };
        info!(
            root = %report.package_root,
            affected = ?report.affected,
            instances = targets.len(),
            "Upgrade dependencies resolved"
        );

        self.transition(UpgradeState::Stopping);
        let stopped = self.stop_all(&targets);
        report.stopped = self.checked(UpgradeStage::Stop, stopped)?;

        self.transition(UpgradeState::Extracting);
        let extracted = archive.extract(&package_layout.root, &self.layout.root);
        report.extracted = self.checked(UpgradeStage::Extract, extracted)?;

        self.transition(UpgradeState::Starting);
        let (started, first_error) = self.start_all(&targets);
        report.started = started;
        if let Some(e) = first_error {
            return self.checked(UpgradeStage::Start, Err(e));
        }

        self.transition(UpgradeState::Done);
        Ok(report)
    }

    /// Move the staged package out of the upload slot. A package uploaded
    /// while this run is in progress stays staged for the next one.
    fn claim_package(&self) -> DaemonResult<PathBuf> {
        let staged = self.layout.package_path();
        let claimed = staged.with_file_name(format!(".upgrade.{}.zip", Uuid::new_v4().simple()));
        fs::rename(&staged, &claimed).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DaemonError::NotFound {
                    kind: NotFoundKind::Package,
                }
            } else {
                DaemonError::Io(e)
            }
        })?;
        debug!(path = %claimed.display(), "Upgrade package claimed");
        Ok(claimed)
    }

    /// Stop every target not already stopped. The first failure aborts.
    fn stop_all(&self, targets: &[&Instance]) -> DaemonResult<Vec<String>> {
        let mut stopped = Vec::new();
        for instance in targets {
            let status = self.control.query_status(&instance.name)?;
            if status.is_stopping_or_stopped() {
                continue;
            }
            self.control.stop(&instance.name)?;
            stopped.push(instance.name.clone());
        }
        Ok(stopped)
    }

    /// Start every target not already running. Failures are collected and
    /// the remaining targets are still attempted.
    fn start_all(&self, targets: &[&Instance]) -> (Vec<String>, Option<DaemonError>) {
        let mut started = Vec::new();
        let mut first_error = None;

        for instance in targets {
            let already_up = self
                .control
                .query_status(&instance.name)
                .map(|s| s.is_starting_or_running())
                .unwrap_or(false);
            if already_up {
                continue;
            }

            match self.control.start(&instance.name) {
                Ok(()) => started.push(instance.name.clone()),
                Err(e) => {
                    warn!(service = %instance.name, error = %e, "Failed to restart service after upgrade");
                    first_error.get_or_insert(e);
                }
            }
        }

        (started, first_error)
    }
}
