//! Transport abstraction over the debug bridge.
//!
//! The core only ever sees this trait: per-file push/pull primitives,
//! directory listings, and daemon lifecycle. Every call is fallible and
//! awaited to completion (or bounded by the caller's deadline).

use std::path::Path;

use async_trait::async_trait;

use crate::core::models::{Device, FileEntry};
use crate::error::TransportError;

pub mod adb;
pub mod simulated;

pub use adb::AdbTransport;
pub use simulated::SimulatedTransport;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Verify the transport binary is present and runnable.
    async fn check_dependencies(&self) -> Result<(), TransportError>;

    /// Start the transport daemon.
    async fn start_service(&self) -> Result<(), TransportError>;

    /// Stop the transport daemon.
    async fn stop_service(&self) -> Result<(), TransportError>;

    async fn list_devices(&self) -> Result<Vec<Device>, TransportError>;

    /// List regular files directly inside `folder` on the device, with
    /// size and mtime. A missing folder yields an empty listing.
    async fn list_remote_files(
        &self,
        serial: &str,
        folder: &str,
    ) -> Result<Vec<FileEntry>, TransportError>;

    /// List directories directly inside `folder` on the device.
    async fn list_remote_dirs(
        &self,
        serial: &str,
        folder: &str,
    ) -> Result<Vec<String>, TransportError>;

    /// List regular files directly inside the local `folder`. A missing
    /// folder yields an empty listing.
    async fn list_local_files(&self, folder: &Path) -> Result<Vec<FileEntry>, TransportError>;

    /// Copy one file device -> local. Atomic from the caller's point of
    /// view: it either fully copies or fails.
    async fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<(), TransportError>;

    /// Copy one file local -> device.
    async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<(), TransportError>;

    async fn delete_remote_file(&self, serial: &str, remote: &str) -> Result<(), TransportError>;

    /// Attach a device over TCP (`host:port`). Returns the daemon's
    /// status message verbatim.
    async fn connect(&self, endpoint: &str) -> Result<String, TransportError>;

    /// Pair with a device over TCP using a pairing code.
    async fn pair(&self, endpoint: &str, code: &str) -> Result<String, TransportError>;
}

/// Join a remote folder and a relative path with forward slashes,
/// whatever the host platform separator is.
pub fn join_remote(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    format!("{dir}/{name}")
}
