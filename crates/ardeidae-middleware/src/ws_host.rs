//! WebSocket host transport.
//!
//! [`WsHostLink`] connects to the host process as a WebSocket client:
//!
//! * **Inbound** – `osc` and `log` frames are decoded and published on
//!   [`Topic::Telemetry`][crate::bus::Topic::Telemetry] and
//!   [`Topic::HostLog`][crate::bus::Topic::HostLog].
//! * **Outbound** – [`HostLink`] commands are encoded and queued to a single
//!   writer task, so callers never wait on the socket.
//!
//! [`WsHostLink::probe`] is the availability probe used at boot: it returns
//! a connected link, or a [`NullHost`] when the host cannot be reached in
//! time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ardeidae_types::{ArdeidaeError, CalibrationSnapshot, HostFrame};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::codec;
use crate::host::{HostLink, NullHost};

const SOURCE: &str = "ardeidae-middleware::ws_host";

/// Host link over a WebSocket connection.
pub struct WsHostLink {
    url: String,
    outbound: mpsc::UnboundedSender<HostFrame>,
    connected: Arc<AtomicBool>,
}

impl WsHostLink {
    /// Connect to the host at `url` and start relaying its frames onto `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`ArdeidaeError::Transport`] when the handshake fails.
    pub async fn connect(url: &str, bus: Arc<EventBus>) -> Result<Self, ArdeidaeError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ArdeidaeError::Transport(format!("connect to {url}: {e}")))?;
        info!(url, "connected to host process");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<HostFrame>();
        let connected = Arc::new(AtomicBool::new(true));
        let connected_flag = Arc::clone(&connected);
        let peer = url.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    // ── Outbound: dashboard → host ─────────────────────────
                    frame = outbound_rx.recv() => {
                        let Some(frame) = frame else {
                            let _ = ws_tx.close().await;
                            break;
                        };
                        match codec::encode(&frame) {
                            Ok(json) => {
                                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to encode host command"),
                        }
                    }
                    // ── Inbound: host → bus ────────────────────────────────
                    msg = ws_rx.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => codec::route_text(&bus, SOURCE, text.as_str()),
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                warn!(peer = %peer, error = %e, "host connection error");
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
            connected_flag.store(false, Ordering::SeqCst);
            warn!(peer = %peer, "host link closed; dashboard continues with last known state");
        });

        Ok(Self {
            url: url.to_string(),
            outbound,
            connected,
        })
    }

    /// Try to connect within `timeout`; fall back to [`NullHost`].
    pub async fn probe(url: &str, bus: Arc<EventBus>, timeout: Duration) -> Arc<dyn HostLink> {
        match tokio::time::timeout(timeout, Self::connect(url, bus)).await {
            Ok(Ok(link)) => Arc::new(link),
            Ok(Err(e)) => {
                warn!(error = %e, "host unavailable; running offline");
                Arc::new(NullHost)
            }
            Err(_) => {
                warn!(url, ?timeout, "host probe timed out; running offline");
                Arc::new(NullHost)
            }
        }
    }

    fn send(&self, frame: HostFrame) -> Result<(), ArdeidaeError> {
        if !self.connected.load(Ordering::SeqCst) {
            debug!(url = %self.url, ?frame, "host link closed; command dropped");
            return Err(ArdeidaeError::HostUnavailable);
        }
        debug!(url = %self.url, ?frame, "queueing host command");
        self.outbound
            .send(frame)
            .map_err(|e| ArdeidaeError::Channel(format!("host writer stopped: {e}")))
    }
}

#[async_trait]
impl HostLink for WsHostLink {
    fn is_available(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn start_sensors(&self) -> Result<(), ArdeidaeError> {
        self.send(HostFrame::StartSensors)
    }

    async fn set_offset_coordinates(&self, offsets: CalibrationSnapshot) -> Result<(), ArdeidaeError> {
        self.send(HostFrame::SetOffsetCoordinates {
            x: offsets.x,
            y: offsets.y,
            z: offsets.z,
        })
    }
}
