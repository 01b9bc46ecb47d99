//! Folds per-file outcomes into the summary result returned to callers.

use std::path::PathBuf;

use crate::core::models::{DeletionOutcome, Direction, ExecutionOutcome, TransferResult};

/// Build the immutable summary for one transfer operation.
///
/// `all_files_synced` is computed from count equality and nowhere else, so
/// the report cannot drift from what actually happened. `delete_completed`
/// is populated only when a deletion pass ran, and can only be true when
/// every planned file copied and every eligible deletion succeeded.
pub fn aggregate(
    outcome: &ExecutionOutcome,
    folder_path: PathBuf,
    deletion: Option<&DeletionOutcome>,
) -> TransferResult {
    let pulled_count = outcome.copied(Direction::Pull);
    let pushed_count = outcome.copied(Direction::Push);
    let all_files_synced =
        pulled_count == outcome.planned_pulls && pushed_count == outcome.planned_pushes;

    TransferResult {
        to_be_pulled_count: outcome.planned_pulls,
        pulled_count,
        to_be_pushed_count: outcome.planned_pushes,
        pushed_count,
        all_files_synced,
        delete_completed: deletion.map(|d| all_files_synced && d.completed()),
        folder_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{DeletionFailure, FileOutcome, FileStatus};
    use crate::error::TransferError;

    fn copied(path: &str, direction: Direction) -> FileOutcome {
        FileOutcome {
            path: path.to_string(),
            direction,
            status: FileStatus::Copied,
        }
    }

    fn failed(path: &str, direction: Direction) -> FileOutcome {
        FileOutcome {
            path: path.to_string(),
            direction,
            status: FileStatus::Failed(TransferError::Transport("broken".into())),
        }
    }

    #[test]
    fn synced_when_counts_match_both_directions() {
        let outcome = ExecutionOutcome {
            planned_pulls: 2,
            planned_pushes: 1,
            files: vec![
                copied("a.jpg", Direction::Pull),
                copied("b.jpg", Direction::Pull),
                copied("a.jpg", Direction::Push),
            ],
        };

        let result = aggregate(&outcome, PathBuf::from("/tmp/x"), None);

        assert_eq!(result.pulled_count, 2);
        assert_eq!(result.pushed_count, 1);
        assert!(result.all_files_synced);
        assert_eq!(result.delete_completed, None);
    }

    #[test]
    fn not_synced_when_a_file_failed() {
        let outcome = ExecutionOutcome {
            planned_pulls: 3,
            planned_pushes: 0,
            files: vec![
                copied("a.jpg", Direction::Pull),
                failed("b.jpg", Direction::Pull),
                copied("c.jpg", Direction::Pull),
            ],
        };

        let result = aggregate(&outcome, PathBuf::from("/tmp/x"), None);

        assert_eq!(result.to_be_pulled_count, 3);
        assert_eq!(result.pulled_count, 2);
        assert!(!result.all_files_synced);
    }

    #[test]
    fn synced_flag_always_equals_count_equality() {
        // The flag must hold for every aggregate output, whatever the mix.
        for planned in 0..3usize {
            for copied_n in 0..=planned {
                let mut files: Vec<FileOutcome> = (0..copied_n)
                    .map(|i| copied(&format!("{i}.jpg"), Direction::Pull))
                    .collect();
                files.extend(
                    (copied_n..planned).map(|i| failed(&format!("{i}.jpg"), Direction::Pull)),
                );

                let outcome = ExecutionOutcome {
                    planned_pulls: planned,
                    planned_pushes: 0,
                    files,
                };
                let result = aggregate(&outcome, PathBuf::from("/tmp/x"), None);
                assert_eq!(
                    result.all_files_synced,
                    result.pulled_count == result.to_be_pulled_count
                        && result.pushed_count == result.to_be_pushed_count
                );
            }
        }
    }

    #[test]
    fn delete_completed_requires_full_sync() {
        // Both eligible deletions succeeded, but one transfer failed, so
        // the deletion cannot be reported complete.
        let outcome = ExecutionOutcome {
            planned_pulls: 3,
            planned_pushes: 0,
            files: vec![
                copied("a.jpg", Direction::Pull),
                copied("b.jpg", Direction::Pull),
                failed("c.jpg", Direction::Pull),
            ],
        };
        let deletion = DeletionOutcome {
            eligible: 2,
            deleted: 2,
            failures: Vec::new(),
        };

        let result = aggregate(&outcome, PathBuf::from("/tmp/x"), Some(&deletion));
        assert_eq!(result.delete_completed, Some(false));
    }

    #[test]
    fn delete_completed_false_on_deletion_failure() {
        let outcome = ExecutionOutcome {
            planned_pulls: 1,
            planned_pushes: 0,
            files: vec![copied("a.jpg", Direction::Pull)],
        };
        let deletion = DeletionOutcome {
            eligible: 1,
            deleted: 0,
            failures: vec![DeletionFailure {
                path: "a.jpg".into(),
                reason: "rm failed".into(),
            }],
        };

        let result = aggregate(&outcome, PathBuf::from("/tmp/x"), Some(&deletion));
        assert!(result.all_files_synced);
        assert_eq!(result.delete_completed, Some(false));
    }

    #[test]
    fn delete_completed_true_when_everything_succeeded() {
        let outcome = ExecutionOutcome {
            planned_pulls: 2,
            planned_pushes: 2,
            files: vec![
                copied("a.jpg", Direction::Pull),
                copied("b.jpg", Direction::Pull),
                copied("a.jpg", Direction::Push),
                copied("b.jpg", Direction::Push),
            ],
        };
        let deletion = DeletionOutcome {
            eligible: 2,
            deleted: 2,
            failures: Vec::new(),
        };

        let result = aggregate(&outcome, PathBuf::from("/tmp/x"), Some(&deletion));
        assert_eq!(result.delete_completed, Some(true));
    }
}
