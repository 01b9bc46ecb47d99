//! Readiness state machine for the adb transport and device snapshot.
//!
//! `Uninitialized -> DependenciesReady -> ServiceRunning -> DevicesScanned
//! -> Ready`. All transitions are one-directional except `DevicesScanned`,
//! which rescans loop back through. Dependency or service failures are
//! fatal to the flow and surfaced to the caller; they are never retried
//! here.

use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::info;

use crate::core::registry::DeviceRegistry;
use crate::error::TransportError;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Uninitialized,
    DependenciesReady,
    ServiceRunning,
    DevicesScanned,
    Ready,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("{operation} is not valid in the {state:?} state")]
    OutOfOrder {
        operation: &'static str,
        state: ReadyState,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Drives the transport from cold start to a usable device snapshot.
///
/// Being `Ready` says nothing about the backup device specifically; the
/// system can be ready with zero classified devices. "Backup connected"
/// is a query on the snapshot, not a state.
pub struct Bootstrap {
    state: ReadyState,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrap {
    pub fn new() -> Self {
        Self {
            state: ReadyState::Uninitialized,
        }
    }

    pub fn state(&self) -> ReadyState {
        self.state
    }

    /// Verify the transport binary is usable. Failure is fatal and leaves
    /// the machine in `Uninitialized`.
    pub async fn check_dependencies(
        &mut self,
        transport: &dyn Transport,
    ) -> Result<(), BootstrapError> {
        if self.state != ReadyState::Uninitialized {
            return Err(BootstrapError::OutOfOrder {
                operation: "check_dependencies",
                state: self.state,
            });
        }

        transport.check_dependencies().await?;
        self.state = ReadyState::DependenciesReady;
        info!("Transport dependencies ready");
        Ok(())
    }

    /// Start the transport daemon, bounded by `deadline`. Failure is
    /// fatal to the flow.
    pub async fn start_service(
        &mut self,
        transport: &dyn Transport,
        deadline: Duration,
    ) -> Result<(), BootstrapError> {
        if self.state != ReadyState::DependenciesReady {
            return Err(BootstrapError::OutOfOrder {
                operation: "start_service",
                state: self.state,
            });
        }

        match timeout(deadline, transport.start_service()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => return Err(TransportError::Timeout(deadline).into()),
        }

        self.state = ReadyState::ServiceRunning;
        info!("Transport service running");
        Ok(())
    }

    /// Scan devices into the registry. Valid from `ServiceRunning` and
    /// re-entrant afterwards; a failed scan leaves the machine in
    /// `DevicesScanned` with an empty snapshot, and another scan may be
    /// attempted.
    pub async fn scan(
        &mut self,
        transport: &dyn Transport,
        registry: &mut DeviceRegistry,
        deadline: Duration,
    ) -> Result<usize, BootstrapError> {
        if self.state < ReadyState::ServiceRunning {
            return Err(BootstrapError::OutOfOrder {
                operation: "scan",
                state: self.state,
            });
        }

        self.state = ReadyState::DevicesScanned;
        let count = registry.scan(transport, deadline).await?;
        self.state = ReadyState::Ready;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimulatedTransport;

    const DEADLINE: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn full_flow_reaches_ready() {
        let transport = SimulatedTransport::new();
        transport.add_device("s1", "Pixel_5", "redfin");

        let mut bootstrap = Bootstrap::new();
        let mut registry = DeviceRegistry::new();

        bootstrap.check_dependencies(&transport).await.unwrap();
        assert_eq!(bootstrap.state(), ReadyState::DependenciesReady);

        bootstrap.start_service(&transport, DEADLINE).await.unwrap();
        assert_eq!(bootstrap.state(), ReadyState::ServiceRunning);

        let count = bootstrap
            .scan(&transport, &mut registry, DEADLINE)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(bootstrap.state(), ReadyState::Ready);
    }

    #[tokio::test]
    async fn scan_is_reentrant_once_ready() {
        let transport = SimulatedTransport::new();
        let mut bootstrap = Bootstrap::new();
        let mut registry = DeviceRegistry::new();

        bootstrap.check_dependencies(&transport).await.unwrap();
        bootstrap.start_service(&transport, DEADLINE).await.unwrap();
        bootstrap
            .scan(&transport, &mut registry, DEADLINE)
            .await
            .unwrap();

        transport.add_device("s1", "Pixel_5", "redfin");
        let count = bootstrap
            .scan(&transport, &mut registry, DEADLINE)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(bootstrap.state(), ReadyState::Ready);
    }

    #[tokio::test]
    async fn scan_before_service_is_rejected() {
        let transport = SimulatedTransport::new();
        let mut bootstrap = Bootstrap::new();
        let mut registry = DeviceRegistry::new();

        let err = bootstrap
            .scan(&transport, &mut registry, DEADLINE)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::OutOfOrder { .. }));
    }

    #[tokio::test]
    async fn missing_dependencies_are_fatal() {
        let transport = SimulatedTransport::new();
        transport.break_dependencies();

        let mut bootstrap = Bootstrap::new();
        let err = bootstrap.check_dependencies(&transport).await.unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Transport(TransportError::Unavailable(_))
        ));
        assert_eq!(bootstrap.state(), ReadyState::Uninitialized);
    }

    #[tokio::test]
    async fn failed_scan_empties_snapshot_and_allows_retry() {
        let transport = SimulatedTransport::new();
        transport.add_device("s1", "Pixel_5", "redfin");

        let mut bootstrap = Bootstrap::new();
        let mut registry = DeviceRegistry::new();

        bootstrap.check_dependencies(&transport).await.unwrap();
        bootstrap.start_service(&transport, DEADLINE).await.unwrap();
        bootstrap
            .scan(&transport, &mut registry, DEADLINE)
            .await
            .unwrap();
        assert_eq!(registry.devices().len(), 1);

        transport.fail_next_scan();
        assert!(
            bootstrap
                .scan(&transport, &mut registry, DEADLINE)
                .await
                .is_err()
        );
        assert!(registry.devices().is_empty());
        assert_eq!(bootstrap.state(), ReadyState::DevicesScanned);

        // Next scan succeeds again.
        let count = bootstrap
            .scan(&transport, &mut registry, DEADLINE)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(bootstrap.state(), ReadyState::Ready);
    }
}
