//! Fully in-memory transport for tests and dry runs.
//!
//! Devices, remote files, and the local staging area all live in a shared
//! state table, with per-file failure and hang injection so partial-failure
//! and timeout paths can be exercised without hardware.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::time::{Duration, sleep};

use crate::core::models::{Device, DeviceState, FileEntry};
use crate::error::TransportError;
use crate::transport::{Transport, join_remote};

#[derive(Debug, Clone, Copy)]
struct SimFile {
    size: u64,
    mtime: DateTime<Utc>,
}

#[derive(Default)]
struct SimState {
    devices: Vec<Device>,
    /// serial -> absolute remote path -> file
    remote: HashMap<String, BTreeMap<String, SimFile>>,
    /// serial -> absolute remote directory paths
    remote_dirs: HashMap<String, BTreeSet<String>>,
    local: BTreeMap<PathBuf, SimFile>,
    fail_transfers: HashSet<String>,
    hang_transfers: HashSet<String>,
    fail_deletes: HashSet<String>,
    deps_broken: bool,
    fail_next_scan: bool,
    service_running: bool,
}

#[derive(Default)]
pub struct SimulatedTransport {
    state: Mutex<SimState>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, serial: &str, model: &str, product: &str) {
        let mut state = self.state.lock().unwrap();
        state.devices.push(Device {
            serial: serial.to_string(),
            model: model.to_string(),
            product: product.to_string(),
            state: DeviceState::Connected,
        });
    }

    /// Seed a remote file with a fixed, deterministic mtime.
    pub fn add_remote_file(&self, serial: &str, folder: &str, name: &str, size: u64) {
        self.add_remote_file_at(serial, folder, name, size, 1_700_000_000);
    }

    pub fn add_remote_file_at(
        &self,
        serial: &str,
        folder: &str,
        name: &str,
        size: u64,
        mtime_secs: i64,
    ) {
        let mut state = self.state.lock().unwrap();
        state
            .remote
            .entry(serial.to_string())
            .or_default()
            .insert(
                join_remote(folder, name),
                SimFile {
                    size,
                    mtime: Utc.timestamp_opt(mtime_secs, 0).unwrap(),
                },
            );
    }

    pub fn add_remote_dir(&self, serial: &str, parent: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .remote_dirs
            .entry(serial.to_string())
            .or_default()
            .insert(join_remote(parent, name));
    }

    pub fn add_local_file(&self, folder: impl AsRef<Path>, name: &str, size: u64) {
        let mut state = self.state.lock().unwrap();
        state.local.insert(
            folder.as_ref().join(name),
            SimFile {
                size,
                mtime: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            },
        );
    }

    /// Every transfer of a file with this name fails.
    pub fn fail_transfers_of(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_transfers
            .insert(name.to_string());
    }

    /// Every transfer of a file with this name blocks until the caller's
    /// deadline fires.
    pub fn hang_transfers_of(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .hang_transfers
            .insert(name.to_string());
    }

    pub fn fail_deletes_of(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_deletes
            .insert(name.to_string());
    }

    pub fn break_dependencies(&self) {
        self.state.lock().unwrap().deps_broken = true;
    }

    pub fn fail_next_scan(&self) {
        self.state.lock().unwrap().fail_next_scan = true;
    }

    pub fn has_remote_file(&self, serial: &str, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .remote
            .get(serial)
            .is_some_and(|files| files.contains_key(path))
    }

    pub fn has_local_file(&self, path: impl AsRef<Path>) -> bool {
        self.state.lock().unwrap().local.contains_key(path.as_ref())
    }

    pub fn service_running(&self) -> bool {
        self.state.lock().unwrap().service_running
    }

    fn require_device(&self, serial: &str) -> Result<(), TransportError> {
        let state = self.state.lock().unwrap();
        if state.devices.iter().any(|d| d.serial == serial) {
            Ok(())
        } else {
            Err(TransportError::DeviceNotFound(serial.to_string()))
        }
    }

    /// Apply hang/fail injection for the file name, outside the lock.
    async fn injected_fault(&self, name: &str) -> Result<(), TransportError> {
        let (hang, fail) = {
            let state = self.state.lock().unwrap();
            (
                state.hang_transfers.contains(name),
                state.fail_transfers.contains(name),
            )
        };
        if hang {
            sleep(Duration::from_secs(3600)).await;
        }
        if fail {
            return Err(TransportError::Command(format!(
                "injected failure for '{name}'"
            )));
        }
        Ok(())
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn check_dependencies(&self) -> Result<(), TransportError> {
        if self.state.lock().unwrap().deps_broken {
            return Err(TransportError::Unavailable(
                "simulated dependencies missing".into(),
            ));
        }
        Ok(())
    }

    async fn start_service(&self) -> Result<(), TransportError> {
        self.state.lock().unwrap().service_running = true;
        Ok(())
    }

    async fn stop_service(&self) -> Result<(), TransportError> {
        self.state.lock().unwrap().service_running = false;
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_scan {
            state.fail_next_scan = false;
            return Err(TransportError::Command("injected scan failure".into()));
        }
        Ok(state.devices.clone())
    }

    async fn list_remote_files(
        &self,
        serial: &str,
        folder: &str,
    ) -> Result<Vec<FileEntry>, TransportError> {
        self.require_device(serial)?;
        let state = self.state.lock().unwrap();
        let prefix = format!("{}/", folder.trim_end_matches('/'));

        let files = state
            .remote
            .get(serial)
            .map(|files| {
                files
                    .iter()
                    .filter_map(|(path, file)| {
                        let rel = path.strip_prefix(&prefix)?;
                        if rel.contains('/') {
                            return None;
                        }
                        Some(FileEntry::new(rel, file.size, file.mtime))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(files)
    }

    async fn list_remote_dirs(
        &self,
        serial: &str,
        folder: &str,
    ) -> Result<Vec<String>, TransportError> {
        self.require_device(serial)?;
        let state = self.state.lock().unwrap();
        let prefix = format!("{}/", folder.trim_end_matches('/'));

        let dirs = state
            .remote_dirs
            .get(serial)
            .map(|dirs| {
                dirs.iter()
                    .filter_map(|path| {
                        let rel = path.strip_prefix(&prefix)?;
                        if rel.contains('/') {
                            return None;
                        }
                        Some(rel.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(dirs)
    }

    async fn list_local_files(&self, folder: &Path) -> Result<Vec<FileEntry>, TransportError> {
        let state = self.state.lock().unwrap();
        let files = state
            .local
            .iter()
            .filter(|(path, _)| path.parent() == Some(folder))
            .filter_map(|(path, file)| {
                let name = path.file_name()?.to_str()?;
                Some(FileEntry::new(name, file.size, file.mtime))
            })
            .collect();
        Ok(files)
    }

    async fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<(), TransportError> {
        self.require_device(serial)?;
        self.injected_fault(file_name(remote)).await?;

        let mut state = self.state.lock().unwrap();
        let file = state
            .remote
            .get(serial)
            .and_then(|files| files.get(remote))
            .copied()
            .ok_or_else(|| TransportError::Command(format!("no such remote file: {remote}")))?;
        state.local.insert(local.to_path_buf(), file);
        Ok(())
    }

    async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<(), TransportError> {
        self.require_device(serial)?;
        self.injected_fault(file_name(remote)).await?;

        let mut state = self.state.lock().unwrap();
        let file = state
            .local
            .get(local)
            .copied()
            .ok_or_else(|| {
                TransportError::Command(format!("no such local file: {}", local.display()))
            })?;
        state
            .remote
            .entry(serial.to_string())
            .or_default()
            .insert(remote.to_string(), file);
        Ok(())
    }

    async fn delete_remote_file(
        &self,
        serial: &str,
        remote: &str,
    ) -> Result<(), TransportError> {
        self.require_device(serial)?;
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes.contains(file_name(remote)) {
            return Err(TransportError::Command(format!(
                "injected delete failure for '{remote}'"
            )));
        }
        state
            .remote
            .get_mut(serial)
            .and_then(|files| files.remove(remote))
            .ok_or_else(|| TransportError::Command(format!("no such remote file: {remote}")))?;
        Ok(())
    }

    async fn connect(&self, endpoint: &str) -> Result<String, TransportError> {
        Ok(format!("connected to {endpoint}"))
    }

    async fn pair(&self, endpoint: &str, _code: &str) -> Result<String, TransportError> {
        Ok(format!("Successfully paired to {endpoint}"))
    }
}
