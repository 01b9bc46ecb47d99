pub mod aggregator;
pub mod bootstrap;
pub mod deletion;
pub mod executor;
pub mod models;
pub mod planner;
pub mod registry;
pub mod session;

pub use bootstrap::{Bootstrap, BootstrapError, ReadyState};
pub use models::{
    BackupIdentity, ClassifiedDevices, DeletionOutcome, Device, DeviceState, Direction,
    ExecutionOutcome, FileEntry, FileOutcome, FileStatus, TransferPlan, TransferResult,
};
pub use registry::{DeviceRegistry, classify};
pub use session::{Session, SessionError};
