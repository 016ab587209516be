//! In-process synthetic sensor rig.
//!
//! [`SimulatedHost`] behaves like a host process without any hardware: once
//! sensors are started it prints the usual pairing log lines and then streams
//! slowly wandering angles and a distance reading onto the bus.  Offsets
//! pushed to it are echoed back as `offset*` telemetry, the way a real host
//! reports a persisted baseline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ardeidae_types::{
    AddressedMessage, ArdeidaeError, CalibrationSnapshot, Event, EventPayload,
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bus::{EventBus, Topic};
use crate::host::HostLink;

const SOURCE: &str = "ardeidae-middleware::sim_host";

/// Default sample period (50 Hz).
const DEFAULT_PERIOD: Duration = Duration::from_millis(20);

/// Log lines printed when sensors start, in order.
const BOOT_LINES: [&str; 3] = [
    "\x1b[34m[ble]\x1b[0m scanning for SR pius",
    "\x1b[34m[ble]\x1b[0m subscribing to 0000ffe4-0000-1000-8000-00805f9a34fb",
    "\x1b[1;32mRing connected\x1b[0m",
];

/// Synthetic host that generates telemetry on a timer.
pub struct SimulatedHost {
    bus: Arc<EventBus>,
    period: Duration,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedHost {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_period(bus, DEFAULT_PERIOD)
    }

    /// Create a rig that emits one sample set every `period`.
    pub fn with_period(bus: Arc<EventBus>, period: Duration) -> Self {
        Self {
            bus,
            period: period.max(Duration::from_millis(1)),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// `true` once [`start_sensors`][HostLink::start_sensors] has run.
    pub fn is_streaming(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn publish_telemetry(bus: &EventBus, address: &str, value: f64) {
        let _ = bus.publish_to(
            Topic::Telemetry,
            Event::new(
                SOURCE,
                EventPayload::Telemetry(AddressedMessage::new(address, vec![value])),
            ),
        );
    }
}

/// One synthetic sample set at time `t` seconds.
fn sample(t: f64) -> [(&'static str, f64); 4] {
    [
        ("/accelerometer/angx", 30.0 * (0.5 * t).sin()),
        ("/accelerometer/angy", 20.0 * (0.3 * t).cos()),
        ("/accelerometer/angz", 10.0 * (0.2 * t).sin()),
        ("/distance", 20.0 + 25.0 * (0.7 * t).sin()),
    ]
}

#[async_trait]
impl HostLink for SimulatedHost {
    fn is_available(&self) -> bool {
        true
    }

    async fn start_sensors(&self) -> Result<(), ArdeidaeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("simulated sensors already streaming");
            return Ok(());
        }
        info!(period_ms = self.period.as_millis() as u64, "starting simulated sensors");

        for line in BOOT_LINES {
            let _ = self.bus.publish_to(
                Topic::HostLog,
                Event::new(SOURCE, EventPayload::HostLog(line.to_string())),
            );
        }

        let bus = Arc::clone(&self.bus);
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut t = 0.0_f64;
            loop {
                ticker.tick().await;
                for (address, value) in sample(t) {
                    Self::publish_telemetry(&bus, address, value);
                }
                t += period.as_secs_f64();
            }
        });

        let mut guard = self
            .task
            .lock()
            .map_err(|e| ArdeidaeError::Channel(format!("simulator task lock poisoned: {e}")))?;
        *guard = Some(handle);
        Ok(())
    }

    async fn set_offset_coordinates(&self, offsets: CalibrationSnapshot) -> Result<(), ArdeidaeError> {
        debug!(?offsets, "simulated host persisting offsets");
        Self::publish_telemetry(&self.bus, "/accelerometer/offsetx", offsets.x);
        Self::publish_telemetry(&self.bus, "/accelerometer/offsety", offsets.y);
        Self::publish_telemetry(&self.bus, "/accelerometer/offsetz", offsets.z);
        Ok(())
    }
}

impl Drop for SimulatedHost {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}
