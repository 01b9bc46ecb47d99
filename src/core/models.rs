use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransferError;

/// A device as reported by the transport in the latest scan.
///
/// The backup/origin role is never stored here; it is derived per
/// classification call so that an identity change is visible on the very
/// next scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub serial: String,
    pub model: String,
    pub product: String,
    pub state: DeviceState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceState {
    /// Attached and usable.
    Connected,
    Offline,
    Unauthorized,
}

impl Device {
    /// Whether this device is the configured backup device. Model and
    /// product compare case-insensitively, matching adb property casing
    /// quirks across vendors.
    pub fn matches(&self, identity: &BackupIdentity) -> bool {
        self.model.eq_ignore_ascii_case(&identity.model)
            && self.product.eq_ignore_ascii_case(&identity.product)
    }

    pub fn is_connected(&self) -> bool {
        self.state == DeviceState::Connected
    }
}

/// The (model, product) pair that identifies the durable backup device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupIdentity {
    pub model: String,
    pub product: String,
}

impl fmt::Display for BackupIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.model, self.product)
    }
}

/// Result of classifying a device snapshot against a backup identity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassifiedDevices {
    /// First device in scan order matching the backup identity, if any.
    pub backup: Option<Device>,
    /// All other connected devices, in scan order.
    pub origins: Vec<Device>,
}

impl ClassifiedDevices {
    /// Derived query, never cached separately from the snapshot.
    pub fn backup_connected(&self) -> bool {
        self.backup.is_some()
    }
}

/// One file in a directory listing: relative path, size, mtime.
///
/// Reconciliation equality is (path, size, mtime); content is never
/// hashed. Mtimes compare at second granularity since that is all the
/// device-side listing can promise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, size: u64, mtime: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            size,
            mtime,
        }
    }

    /// True when the destination copy can be considered in sync. Matching
    /// size and mtime count as synced even if bytes were to differ.
    pub fn same_version(&self, other: &FileEntry) -> bool {
        self.size == other.size && self.mtime.timestamp() == other.mtime.timestamp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Device -> local machine.
    Pull,
    /// Local machine -> device.
    Push,
}

/// The computed copy sets for one reconciliation pass.
///
/// Both sequences keep the order of the source listing they were derived
/// from, so repeated runs over an unchanged listing produce an identical
/// plan.
#[derive(Debug, Clone, Default)]
pub struct TransferPlan {
    pub to_pull: Vec<FileEntry>,
    pub to_push: Vec<FileEntry>,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.to_pull.is_empty() && self.to_push.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_pull.len() + self.to_push.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Copied,
    Failed(TransferError),
}

/// Outcome of one planned file transfer.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: String,
    pub direction: Direction,
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn copied(&self) -> bool {
        self.status == FileStatus::Copied
    }
}

/// Per-file results of executing a plan, with the planned counts the
/// results are measured against.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub planned_pulls: usize,
    pub planned_pushes: usize,
    pub files: Vec<FileOutcome>,
}

impl ExecutionOutcome {
    /// Number of files actually copied in the given direction.
    pub fn copied(&self, direction: Direction) -> usize {
        self.files
            .iter()
            .filter(|f| f.direction == direction && f.copied())
            .count()
    }

    /// Fold another outcome into this one (e.g. a push phase after a pull
    /// phase), preserving file order.
    pub fn merge(mut self, other: ExecutionOutcome) -> ExecutionOutcome {
        self.planned_pulls += other.planned_pulls;
        self.planned_pushes += other.planned_pushes;
        self.files.extend(other.files);
        self
    }
}

/// Summary of a transfer operation. Built once from per-file outcomes and
/// never mutated afterwards: a report, not state.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub to_be_pulled_count: usize,
    pub pulled_count: usize,
    pub to_be_pushed_count: usize,
    pub pushed_count: usize,
    /// Computed from count equality alone; see the aggregator.
    pub all_files_synced: bool,
    /// `Some` only when deletion was requested for this operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_completed: Option<bool>,
    /// Resolved local folder used for this operation.
    pub folder_path: PathBuf,
}

/// Per-file accounting for a confirmed-deletion pass on the origin device.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletionOutcome {
    /// Files eligible for deletion (planned for pull and actually copied).
    pub eligible: usize,
    pub deleted: usize,
    pub failures: Vec<DeletionFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletionFailure {
    pub path: String,
    pub reason: String,
}

impl DeletionOutcome {
    pub fn completed(&self) -> bool {
        self.deleted == self.eligible
    }
}
