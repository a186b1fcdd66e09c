//! Batch installs on background workers.

use crate::core::InstallError;
use crate::package::installer::{InstallCoordinator, InstallReport, InstallState};
use crate::retention::{SweepResult, VersionRetentionSweeper};
use splitpack_core::PackageDescriptor;
use std::io;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info};

const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Runs installs off the calling thread
pub struct InstallService {
    coordinator: Arc<InstallCoordinator>,
    sweeper: Arc<VersionRetentionSweeper>,
    max_concurrent: usize,
}

impl InstallService {
    pub fn new(coordinator: InstallCoordinator, sweeper: VersionRetentionSweeper) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            sweeper: Arc::new(sweeper),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn coordinator(&self) -> &InstallCoordinator {
        &self.coordinator
    }

    /// Install every package and report each one in input order.
    ///
    /// A failed or panicking install never stops the others.
    pub async fn install_all(
        &self,
        descriptors: &[PackageDescriptor],
        verify_signature: bool,
    ) -> Vec<InstallReport> {
        let mut reports: Vec<Option<InstallReport>> = descriptors.iter().map(|_| None).collect();
        let mut join_set = JoinSet::new();

        for (index, descriptor) in descriptors.iter().enumerate() {
            if join_set.len() >= self.max_concurrent {
                if let Some(Ok((done, report))) = join_set.join_next().await {
                    reports[done] = Some(report);
                }
            }

            let coordinator = Arc::clone(&self.coordinator);
            let descriptor = descriptor.clone();
            join_set.spawn_blocking(move || {
                (index, coordinator.install_tracked(&descriptor, verify_signature))
            });
        }

        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((done, report)) => reports[done] = Some(report),
                Err(e) => error!(error = %e, "install task failed"),
            }
        }

        let reports: Vec<InstallReport> = reports
            .into_iter()
            .zip(descriptors)
            .map(|(report, descriptor)| report.unwrap_or_else(|| aborted(descriptor)))
            .collect();

        let failed = reports.iter().filter(|r| !r.is_success()).count();
        info!(
            installed = reports.len() - failed,
            failed = failed,
            "install batch finished"
        );
        reports
    }

    /// Run the retention sweep in the background
    pub fn spawn_sweep(&self, descriptors: Vec<PackageDescriptor>) -> JoinHandle<SweepResult> {
        let sweeper = Arc::clone(&self.sweeper);
        tokio::task::spawn_blocking(move || sweeper.sweep_all(&descriptors))
    }
}

fn aborted(descriptor: &PackageDescriptor) -> InstallReport {
    let e = InstallError::Internal(io::Error::other("install task did not complete"));
    InstallReport {
        name: descriptor.name.clone(),
        version: descriptor.version.clone(),
        transitions: vec![InstallState::Requested, InstallState::Failed(e.reason())],
        result: Err(e),
    }
}
