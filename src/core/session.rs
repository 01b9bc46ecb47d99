//! Orchestrates scans, reconciliation passes, and deletion for the
//! user-visible operations. Owns the device registry and the readiness
//! state machine; all I/O goes through the transport held by the context.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::context::AppContext;
use crate::core::aggregator::aggregate;
use crate::core::bootstrap::{Bootstrap, BootstrapError};
use crate::core::deletion::DeletionCoordinator;
use crate::core::executor::{TransferExecutor, TransferRoute};
use crate::core::models::{
    ClassifiedDevices, DeletionOutcome, Device, Direction, TransferResult,
};
use crate::core::planner;
use crate::core::registry::DeviceRegistry;
use crate::error::TransportError;
use crate::transport::join_remote;

/// Folder under device storage that photo sync reconciles.
const PHOTOS_SUBDIR: &str = "DCIM/Camera";
/// Destination folder for plain file pushes.
const DOCUMENTS_SUBDIR: &str = "Documents";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("device '{0}' is not in the current snapshot")]
    DeviceNotFound(String),

    #[error("backup device {0} is not connected")]
    BackupUnavailable(crate::core::models::BackupIdentity),

    #[error("no origin device is connected")]
    NoOriginDevice,

    #[error("multiple origin devices are connected; a serial must be chosen")]
    AmbiguousOrigin,

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct Session {
    ctx: AppContext,
    registry: DeviceRegistry,
    bootstrap: Bootstrap,
}

impl Session {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            registry: DeviceRegistry::new(),
            bootstrap: Bootstrap::new(),
        }
    }

    /// Run the full readiness flow: dependencies, service, first scan.
    /// Returns the number of devices found.
    pub async fn initialize(&mut self) -> Result<usize, SessionError> {
        let transport = self.ctx.transport.clone();
        let deadline = self.ctx.config.scan_timeout();

        self.bootstrap.check_dependencies(transport.as_ref()).await?;
        self.bootstrap
            .start_service(transport.as_ref(), deadline)
            .await?;
        let count = self
            .bootstrap
            .scan(transport.as_ref(), &mut self.registry, deadline)
            .await?;
        Ok(count)
    }

    /// Refresh the device snapshot.
    pub async fn rescan(&mut self) -> Result<usize, SessionError> {
        let transport = self.ctx.transport.clone();
        let count = self
            .bootstrap
            .scan(
                transport.as_ref(),
                &mut self.registry,
                self.ctx.config.scan_timeout(),
            )
            .await?;
        Ok(count)
    }

    pub fn devices(&self) -> &[Device] {
        self.registry.devices()
    }

    /// Classify the current snapshot against the configured identity.
    pub fn classified(&self) -> ClassifiedDevices {
        self.registry.classify(&self.ctx.config.backup_identity())
    }

    pub fn backup_connected(&self) -> bool {
        self.classified().backup_connected()
    }

    /// Reconcile one device folder down to the local staging directory.
    pub async fn backup_folder(
        &self,
        serial: &str,
        folder: &str,
    ) -> Result<TransferResult, SessionError> {
        let device = self.require_connected(serial)?;
        let remote_dir = join_remote(&self.ctx.config.device_storage, folder);
        let local_dir = self.ctx.config.backup_root.join(folder);

        let span = info_span!(
            "backup_folder",
            op = %Uuid::now_v7(),
            device = %device.serial,
            folder = %folder,
        );

        async {
            let transport = self.ctx.transport.as_ref();
            let list_deadline = self.ctx.config.scan_timeout();

            let source = self
                .timed(list_deadline, transport.list_remote_files(&device.serial, &remote_dir))
                .await?;
            let dest = self
                .timed(list_deadline, transport.list_local_files(&local_dir))
                .await?;

            let plan = planner::plan(&source, &dest, Direction::Pull);
            info!(to_pull = plan.to_pull.len(), "Backup plan computed");

            let route = TransferRoute {
                serial: device.serial.clone(),
                remote_dir,
                local_dir: local_dir.clone(),
            };
            let executor =
                TransferExecutor::new(transport, self.ctx.config.transfer_timeout());
            let outcome = executor.execute(&plan, &route).await;

            Ok(aggregate(&outcome, local_dir, None))
        }
        .instrument(span)
        .await
    }

    /// Move photos from an origin device to the backup device through the
    /// local staging folder: pull what the staging copy is missing, then
    /// push what the backup device is missing, then optionally delete
    /// confirmed-copied originals.
    pub async fn sync_photos(
        &self,
        origin_serial: Option<&str>,
        delete_origin: bool,
    ) -> Result<(TransferResult, Option<DeletionOutcome>), SessionError> {
        let classified = self.classified();
        let backup = classified
            .backup
            .clone()
            .ok_or_else(|| SessionError::BackupUnavailable(self.ctx.config.backup_identity()))?;
        let origin = select_origin(&classified, origin_serial)?;

        let photos_dir = join_remote(&self.ctx.config.device_storage, PHOTOS_SUBDIR);
        let staging = self
            .ctx
            .config
            .backup_root
            .join("photos")
            .join(origin.model.replace(['/', '\\'], "_"));

        let span = info_span!(
            "sync_photos",
            op = %Uuid::now_v7(),
            origin = %origin.serial,
            backup = %backup.serial,
            delete_origin,
        );

        async {
            let transport = self.ctx.transport.as_ref();
            let list_deadline = self.ctx.config.scan_timeout();
            let executor =
                TransferExecutor::new(transport, self.ctx.config.transfer_timeout());

            // Pull phase: origin -> staging.
            let origin_listing = self
                .timed(list_deadline, transport.list_remote_files(&origin.serial, &photos_dir))
                .await?;
            let staged = self
                .timed(list_deadline, transport.list_local_files(&staging))
                .await?;
            let pull_plan = planner::plan(&origin_listing, &staged, Direction::Pull);
            info!(to_pull = pull_plan.to_pull.len(), "Pull plan computed");

            let pull_route = TransferRoute {
                serial: origin.serial.clone(),
                remote_dir: photos_dir.clone(),
                local_dir: staging.clone(),
            };
            let pull_outcome = executor.execute(&pull_plan, &pull_route).await;

            // Push phase: staging -> backup, planned from the refreshed
            // staging listing so it covers earlier runs' leftovers too.
            let staged_after = self
                .timed(list_deadline, transport.list_local_files(&staging))
                .await?;
            let backup_listing = self
                .timed(list_deadline, transport.list_remote_files(&backup.serial, &photos_dir))
                .await?;
            let push_plan = planner::plan(&staged_after, &backup_listing, Direction::Push);
            info!(to_push = push_plan.to_push.len(), "Push plan computed");

            let push_route = TransferRoute {
                serial: backup.serial.clone(),
                remote_dir: photos_dir.clone(),
                local_dir: staging.clone(),
            };
            let push_outcome = executor.execute(&push_plan, &push_route).await;

            let outcome = pull_outcome.merge(push_outcome);

            // Deletion strictly after the whole batch, and only for files
            // confirmed copied off the origin.
            let deletion = if delete_origin {
                let coordinator =
                    DeletionCoordinator::new(transport, self.ctx.config.transfer_timeout());
                Some(
                    coordinator
                        .delete_confirmed(&outcome, &origin.serial, &photos_dir)
                        .await,
                )
            } else {
                None
            };

            let result = aggregate(&outcome, staging.clone(), deletion.as_ref());
            Ok((result, deletion))
        }
        .instrument(span)
        .await
    }

    /// Push local files into the device Documents folder. Returns
    /// (planned, transferred) counts; per-file failures are logged and
    /// skipped, matching the transfer policy elsewhere.
    pub async fn push_files(
        &self,
        serial: &str,
        files: &[PathBuf],
    ) -> Result<(usize, usize), SessionError> {
        let device = self.require_connected(serial)?;
        let documents = join_remote(&self.ctx.config.device_storage, DOCUMENTS_SUBDIR);
        let transport = self.ctx.transport.as_ref();
        let deadline = self.ctx.config.transfer_timeout();

        let mut transferred = 0usize;
        for file in files {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(file = %file.display(), "Skipping file without a usable name");
                continue;
            };
            let remote = join_remote(&documents, name);

            match timeout(deadline, transport.push(&device.serial, file, &remote)).await {
                Ok(Ok(())) => transferred += 1,
                Ok(Err(err)) => {
                    tracing::warn!(file = %file.display(), error = %err, "Push failed")
                }
                Err(_) => tracing::warn!(file = %file.display(), "Push timed out"),
            }
        }

        Ok((files.len(), transferred))
    }

    /// List candidate top-level folders on device storage.
    pub async fn list_folders(&self, serial: &str) -> Result<Vec<String>, SessionError> {
        let device = self.require_connected(serial)?;
        let folders = self
            .timed(
                self.ctx.config.scan_timeout(),
                self.ctx
                    .transport
                    .list_remote_dirs(&device.serial, &self.ctx.config.device_storage),
            )
            .await?;
        Ok(folders)
    }

    /// Attach a device over wireless adb. Returns the transport's message.
    pub async fn connect(&self, endpoint: &str) -> Result<String, SessionError> {
        let message = self
            .timed(
                self.ctx.config.scan_timeout(),
                self.ctx.transport.connect(endpoint),
            )
            .await?;
        Ok(message)
    }

    /// Pair with a device over wireless adb.
    pub async fn pair(&self, endpoint: &str, code: &str) -> Result<String, SessionError> {
        let message = self
            .timed(
                self.ctx.config.scan_timeout(),
                self.ctx.transport.pair(endpoint, code),
            )
            .await?;
        Ok(message)
    }

    /// Stop the transport daemon.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.ctx.transport.stop_service().await?;
        Ok(())
    }

    fn require_connected(&self, serial: &str) -> Result<Device, SessionError> {
        self.registry
            .find(serial)
            .filter(|d| d.is_connected())
            .cloned()
            .ok_or_else(|| SessionError::DeviceNotFound(serial.to_string()))
    }

    async fn timed<T>(
        &self,
        deadline: Duration,
        fut: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        match timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(deadline)),
        }
    }
}

fn select_origin(
    classified: &ClassifiedDevices,
    serial: Option<&str>,
) -> Result<Device, SessionError> {
    match serial {
        Some(wanted) => classified
            .origins
            .iter()
            .find(|d| d.serial == wanted)
            .cloned()
            .ok_or_else(|| SessionError::DeviceNotFound(wanted.to_string())),
        None => match classified.origins.as_slice() {
            [] => Err(SessionError::NoOriginDevice),
            [only] => Ok(only.clone()),
            _ => Err(SessionError::AmbiguousOrigin),
        },
    }
}
