//! Post-transfer removal of confirmed-copied files on the origin device.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::core::models::{DeletionFailure, DeletionOutcome, Direction, ExecutionOutcome};
use crate::transport::{Transport, join_remote};

pub struct DeletionCoordinator<'a> {
    transport: &'a dyn Transport,
    op_timeout: Duration,
}

impl<'a> DeletionCoordinator<'a> {
    pub fn new(transport: &'a dyn Transport, op_timeout: Duration) -> Self {
        Self {
            transport,
            op_timeout,
        }
    }

    /// Delete origin copies of files whose pull outcome was `Copied`.
    ///
    /// Files that failed to copy are never touched. A failed deletion is
    /// recorded and the pass continues with the remaining files; it only
    /// runs after the transfer batch has fully finished, by construction
    /// of the call site.
    pub async fn delete_confirmed(
        &self,
        outcome: &ExecutionOutcome,
        serial: &str,
        remote_dir: &str,
    ) -> DeletionOutcome {
        let mut deletion = DeletionOutcome::default();

        let eligible = outcome
            .files
            .iter()
            .filter(|f| f.direction == Direction::Pull && f.copied());

        for file in eligible {
            deletion.eligible += 1;
            let remote = join_remote(remote_dir, &file.path);
            debug!(file = %file.path, "Deleting origin copy");

            let attempt = timeout(
                self.op_timeout,
                self.transport.delete_remote_file(serial, &remote),
            )
            .await;

            match attempt {
                Ok(Ok(())) => deletion.deleted += 1,
                Ok(Err(err)) => {
                    warn!(file = %file.path, error = %err, "Deletion failed");
                    deletion.failures.push(DeletionFailure {
                        path: file.path.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(_) => {
                    warn!(file = %file.path, "Deletion timed out");
                    deletion.failures.push(DeletionFailure {
                        path: file.path.clone(),
                        reason: "timed out".to_string(),
                    });
                }
            }
        }

        info!(
            eligible = deletion.eligible,
            deleted = deletion.deleted,
            "Origin deletion pass finished"
        );

        deletion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{FileOutcome, FileStatus};
    use crate::error::TransferError;
    use crate::transport::SimulatedTransport;

    const DIR: &str = "/sdcard/DCIM/Camera";

    fn outcome_of(files: Vec<FileOutcome>) -> ExecutionOutcome {
        ExecutionOutcome {
            planned_pulls: files.len(),
            planned_pushes: 0,
            files,
        }
    }

    fn pulled(path: &str, status: FileStatus) -> FileOutcome {
        FileOutcome {
            path: path.to_string(),
            direction: Direction::Pull,
            status,
        }
    }

    fn transport_with(files: &[&str]) -> SimulatedTransport {
        let transport = SimulatedTransport::new();
        transport.add_device("origin", "Pixel_7", "panther");
        for path in files {
            transport.add_remote_file("origin", DIR, path, 10);
        }
        transport
    }

    #[tokio::test]
    async fn deletes_only_copied_files() {
        let transport = transport_with(&["a.jpg", "b.jpg"]);
        let outcome = outcome_of(vec![
            pulled("a.jpg", FileStatus::Copied),
            pulled("b.jpg", FileStatus::Failed(TransferError::Timeout)),
        ]);

        let coordinator = DeletionCoordinator::new(&transport, Duration::from_secs(5));
        let deletion = coordinator.delete_confirmed(&outcome, "origin", DIR).await;

        assert_eq!(deletion.eligible, 1);
        assert_eq!(deletion.deleted, 1);
        assert!(deletion.completed());
        // The failed file must survive on the device.
        assert!(!transport.has_remote_file("origin", "/sdcard/DCIM/Camera/a.jpg"));
        assert!(transport.has_remote_file("origin", "/sdcard/DCIM/Camera/b.jpg"));
    }

    #[tokio::test]
    async fn deletion_failure_continues_and_flips_completed() {
        let transport = transport_with(&["a.jpg", "b.jpg", "c.jpg"]);
        transport.fail_deletes_of("b.jpg");

        let outcome = outcome_of(vec![
            pulled("a.jpg", FileStatus::Copied),
            pulled("b.jpg", FileStatus::Copied),
            pulled("c.jpg", FileStatus::Copied),
        ]);

        let coordinator = DeletionCoordinator::new(&transport, Duration::from_secs(5));
        let deletion = coordinator.delete_confirmed(&outcome, "origin", DIR).await;

        assert_eq!(deletion.eligible, 3);
        assert_eq!(deletion.deleted, 2);
        assert!(!deletion.completed());
        assert_eq!(deletion.failures.len(), 1);
        assert_eq!(deletion.failures[0].path, "b.jpg");
        // a and c were still deleted despite b failing
        assert!(!transport.has_remote_file("origin", "/sdcard/DCIM/Camera/a.jpg"));
        assert!(!transport.has_remote_file("origin", "/sdcard/DCIM/Camera/c.jpg"));
    }

    #[tokio::test]
    async fn push_outcomes_are_never_eligible() {
        let transport = transport_with(&["a.jpg"]);
        let outcome = ExecutionOutcome {
            planned_pulls: 0,
            planned_pushes: 1,
            files: vec![FileOutcome {
                path: "a.jpg".into(),
                direction: Direction::Push,
                status: FileStatus::Copied,
            }],
        };

        let coordinator = DeletionCoordinator::new(&transport, Duration::from_secs(5));
        let deletion = coordinator.delete_confirmed(&outcome, "origin", DIR).await;

        assert_eq!(deletion.eligible, 0);
        assert!(transport.has_remote_file("origin", "/sdcard/DCIM/Camera/a.jpg"));
    }
}
