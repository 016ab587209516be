//! The host collaborator.
//!
//! The dashboard never checks whether a host process exists before talking
//! to it.  Instead it is handed one [`HostLink`] at construction time; when
//! no host is reachable that link is a [`NullHost`], whose commands quietly
//! do nothing.
//!
//! # Overview
//!
//! - [`HostLink`] – the trait every host transport implements.
//! - [`NullHost`] – the offline implementation.
//! - [`WsHostLink`][crate::ws_host::WsHostLink] – WebSocket transport to a
//!   real host process.
//! - [`SimulatedHost`][crate::sim_host::SimulatedHost] – in-process
//!   synthetic rig.

use async_trait::async_trait;
use ardeidae_types::{ArdeidaeError, CalibrationSnapshot};

/// Outbound command surface of the host process.
///
/// # Contract
///
/// * `is_available` – the availability probe.  `false` means every command
///   is a no-op.
/// * `start_sensors` – ask the host to start streaming.  Safe to call more
///   than once; the host is responsible for idempotency.
/// * `set_offset_coordinates` – persist a calibration baseline on the host.
#[async_trait]
pub trait HostLink: Send + Sync {
    /// Whether a host process is attached.
    fn is_available(&self) -> bool;

    /// Forward a start request to the host.
    async fn start_sensors(&self) -> Result<(), ArdeidaeError>;

    /// Push a calibration baseline to the host.
    async fn set_offset_coordinates(&self, offsets: CalibrationSnapshot) -> Result<(), ArdeidaeError>;
}

/// Host link used when no host process is reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

#[async_trait]
impl HostLink for NullHost {
    fn is_available(&self) -> bool {
        false
    }

    async fn start_sensors(&self) -> Result<(), ArdeidaeError> {
        Ok(())
    }

    async fn set_offset_coordinates(&self, _offsets: CalibrationSnapshot) -> Result<(), ArdeidaeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn null_host_commands_are_silent_noops() {
        let host: Arc<dyn HostLink> = Arc::new(NullHost);
        assert!(!host.is_available());
        assert!(host.start_sensors().await.is_ok());
        assert!(host.start_sensors().await.is_ok());
        assert!(host
            .set_offset_coordinates(CalibrationSnapshot::new(1.0, 2.0, 3.0))
            .await
            .is_ok());
    }
}
