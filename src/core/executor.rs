//! Executes a transfer plan against the transport, one file at a time.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::models::{
    Direction, ExecutionOutcome, FileEntry, FileOutcome, FileStatus, TransferPlan,
};
use crate::error::TransferError;
use crate::transport::{Transport, join_remote};

/// The endpoints one plan executes against: a single device, the remote
/// folder on it, and the local staging folder.
#[derive(Debug, Clone)]
pub struct TransferRoute {
    pub serial: String,
    pub remote_dir: String,
    pub local_dir: PathBuf,
}

pub struct TransferExecutor<'a> {
    transport: &'a dyn Transport,
    /// Bound for each individual file transfer.
    file_timeout: Duration,
}

impl<'a> TransferExecutor<'a> {
    pub fn new(transport: &'a dyn Transport, file_timeout: Duration) -> Self {
        Self {
            transport,
            file_timeout,
        }
    }

    /// Run every planned file in plan order, pulls before pushes.
    ///
    /// A failed file is recorded and execution moves on; one failure never
    /// aborts the batch. Each file is bounded by the configured timeout
    /// and a timeout is recorded as a failed file, not an error.
    pub async fn execute(&self, plan: &TransferPlan, route: &TransferRoute) -> ExecutionOutcome {
        let mut outcome = ExecutionOutcome {
            planned_pulls: plan.to_pull.len(),
            planned_pushes: plan.to_push.len(),
            files: Vec::with_capacity(plan.len()),
        };

        for entry in &plan.to_pull {
            let status = self.copy_one(entry, Direction::Pull, route).await;
            outcome.files.push(FileOutcome {
                path: entry.path.clone(),
                direction: Direction::Pull,
                status,
            });
        }

        for entry in &plan.to_push {
            let status = self.copy_one(entry, Direction::Push, route).await;
            outcome.files.push(FileOutcome {
                path: entry.path.clone(),
                direction: Direction::Push,
                status,
            });
        }

        info!(
            pulled = outcome.copied(Direction::Pull),
            planned_pulls = outcome.planned_pulls,
            pushed = outcome.copied(Direction::Push),
            planned_pushes = outcome.planned_pushes,
            "Plan execution finished"
        );

        outcome
    }

    async fn copy_one(
        &self,
        entry: &FileEntry,
        direction: Direction,
        route: &TransferRoute,
    ) -> FileStatus {
        let remote = join_remote(&route.remote_dir, &entry.path);
        let local = route.local_dir.join(&entry.path);

        debug!(file = %entry.path, ?direction, size = entry.size, "Copying file");

        let attempt = match direction {
            Direction::Pull => {
                timeout(
                    self.file_timeout,
                    self.transport.pull(&route.serial, &remote, &local),
                )
                .await
            }
            Direction::Push => {
                timeout(
                    self.file_timeout,
                    self.transport.push(&route.serial, &local, &remote),
                )
                .await
            }
        };

        match attempt {
            Ok(Ok(())) => FileStatus::Copied,
            Ok(Err(err)) => {
                warn!(file = %entry.path, error = %err, "File transfer failed");
                FileStatus::Failed(err.into())
            }
            Err(_) => {
                warn!(file = %entry.path, timeout = ?self.file_timeout, "File transfer timed out");
                FileStatus::Failed(TransferError::Timeout)
            }
        }
    }
}
