//! Device snapshot ownership and backup/origin classification.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::core::models::{BackupIdentity, ClassifiedDevices, Device};
use crate::error::TransportError;
use crate::transport::Transport;

/// Classify a device list against the configured backup identity.
///
/// The first connected device matching the identity (in scan order) is the
/// backup device; every other connected device is an origin. Pure over its
/// inputs: a changed identity is reflected on the very next call.
pub fn classify(devices: &[Device], identity: &BackupIdentity) -> ClassifiedDevices {
    let mut classified = ClassifiedDevices::default();

    for device in devices.iter().filter(|d| d.is_connected()) {
        if classified.backup.is_none() && device.matches(identity) {
            classified.backup = Some(device.clone());
        } else {
            classified.origins.push(device.clone());
        }
    }

    classified
}

/// Holds the current device snapshot.
///
/// Single-writer: only [`scan`](DeviceRegistry::scan) mutates the
/// snapshot, and it either replaces it wholesale or resets it to empty on
/// failure. There is no incremental patching, so stale entries cannot
/// survive a rescan.
#[derive(Default)]
pub struct DeviceRegistry {
    snapshot: Vec<Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[Device] {
        &self.snapshot
    }

    /// Look up a device by serial in the latest snapshot.
    pub fn find(&self, serial: &str) -> Option<&Device> {
        self.snapshot.iter().find(|d| d.serial == serial)
    }

    /// Classify the current snapshot. Derived on every call, never cached.
    pub fn classify(&self, identity: &BackupIdentity) -> ClassifiedDevices {
        classify(&self.snapshot, identity)
    }

    /// Replace the snapshot with a fresh device scan, bounded by
    /// `deadline`. On any failure the snapshot is reset to empty so a
    /// half-scanned state can never be observed.
    pub async fn scan(
        &mut self,
        transport: &dyn Transport,
        deadline: Duration,
    ) -> Result<usize, TransportError> {
        let scanned = match timeout(deadline, transport.list_devices()).await {
            Ok(Ok(devices)) => devices,
            Ok(Err(err)) => {
                warn!(error = %err, "Device scan failed");
                self.snapshot.clear();
                return Err(err);
            }
            Err(_) => {
                warn!(?deadline, "Device scan timed out");
                self.snapshot.clear();
                return Err(TransportError::Timeout(deadline));
            }
        };

        info!(devices = scanned.len(), "Device scan complete");
        self.snapshot = scanned;
        Ok(self.snapshot.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::DeviceState;

    fn device(serial: &str, model: &str, product: &str) -> Device {
        Device {
            serial: serial.to_string(),
            model: model.to_string(),
            product: product.to_string(),
            state: DeviceState::Connected,
        }
    }

    fn identity() -> BackupIdentity {
        BackupIdentity {
            model: "Pixel_5".into(),
            product: "redfin".into(),
        }
    }

    #[test]
    fn single_match_becomes_backup_rest_origins() {
        let devices = vec![
            device("s1", "Galaxy_S10", "beyond1"),
            device("s2", "Pixel_5", "redfin"),
            device("s3", "Pixel_7", "panther"),
        ];

        let classified = classify(&devices, &identity());

        assert_eq!(classified.backup.as_ref().unwrap().serial, "s2");
        let origins: Vec<&str> = classified.origins.iter().map(|d| d.serial.as_str()).collect();
        assert_eq!(origins, vec!["s1", "s3"]);
    }

    #[test]
    fn no_match_means_no_backup_and_all_origins() {
        let devices = vec![
            device("s1", "Galaxy_S10", "beyond1"),
            device("s2", "Pixel_7", "panther"),
        ];

        let classified = classify(&devices, &identity());

        assert!(classified.backup.is_none());
        assert!(!classified.backup_connected());
        assert_eq!(classified.origins.len(), 2);
    }

    #[test]
    fn first_match_in_scan_order_wins() {
        let devices = vec![
            device("first", "Pixel_5", "redfin"),
            device("second", "Pixel_5", "redfin"),
        ];

        let classified = classify(&devices, &identity());

        assert_eq!(classified.backup.as_ref().unwrap().serial, "first");
        assert_eq!(classified.origins.len(), 1);
        assert_eq!(classified.origins[0].serial, "second");
    }

    #[test]
    fn identity_match_is_case_insensitive() {
        let devices = vec![device("s1", "pixel_5", "REDFIN")];
        let classified = classify(&devices, &identity());
        assert!(classified.backup_connected());
    }

    #[test]
    fn disconnected_devices_are_ignored() {
        let mut offline = device("s1", "Pixel_5", "redfin");
        offline.state = DeviceState::Unauthorized;
        let devices = vec![offline, device("s2", "Pixel_7", "panther")];

        let classified = classify(&devices, &identity());

        assert!(classified.backup.is_none());
        assert_eq!(classified.origins.len(), 1);
    }

    #[test]
    fn classification_reflects_identity_change() {
        let devices = vec![device("s1", "Pixel_7", "panther")];

        assert!(classify(&devices, &identity()).backup.is_none());

        let new_identity = BackupIdentity {
            model: "Pixel_7".into(),
            product: "panther".into(),
        };
        assert!(classify(&devices, &new_identity).backup_connected());
    }
}
