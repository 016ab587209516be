//! [`CockpitServer`] – HTTP + WebSocket server for the dashboard page.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`CockpitServer::with_port`]).
//!
//! * Regular HTTP requests → 200 OK with the embedded dashboard HTML.
//! * WebSocket upgrades → bridge between the [`EventBus`] and the page.
//!
//! Messages pushed to the page carry a `type` tag:
//!
//! | `type` | Sent when |
//! |---|---|
//! | `snapshot` | right after the socket opens: every log entry and the indicators |
//! | `log` | an entry was appended (with the indicators at that moment) |
//! | `status` | the indicators changed without a new entry |
//! | `orientation` | on open, then on every new orientation snapshot |
//! | `frame` | a view rendered a frame |
//!
//! Log colours are resolved to CSS colour names here, so the page only
//! assigns them.

use std::net::SocketAddr;
use std::sync::Arc;

use ardeidae_middleware::{EventBus, Topic};
use ardeidae_runtime::DashboardHandle;
use ardeidae_types::{
    ArdeidaeError, Color, Event, EventPayload, LogEntry, OperatorCommand, OrientationSnapshot,
    StatusIndicators, StyledSegment, ViewFrame,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// Default TCP port for the cockpit HTTP/WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

/// The compiled-in dashboard page (HTML + CSS + JS).
const DASHBOARD_HTML: &str = include_str!("dashboard.html");

/// Largest upstream message accepted from a browser.
const MAX_UPSTREAM_BYTES: usize = 4 * 1024;

const SOURCE: &str = "ardeidae-cockpit::server";

/// Message pushed to the page.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Downstream<'a> {
    Snapshot {
        entries: Vec<PageEntry<'a>>,
        status: StatusIndicators,
    },
    Log {
        entry: PageEntry<'a>,
        status: StatusIndicators,
    },
    Status(StatusIndicators),
    Orientation(&'a OrientationSnapshot),
    Frame(&'a ViewFrame),
}

impl<'a> Downstream<'a> {
    /// The page message for a bus event, if the page shows it.
    fn from_event(event: &'a Event) -> Option<Self> {
        match &event.payload {
            EventPayload::Frame(frame) => Some(Downstream::Frame(frame)),
            EventPayload::LogAppended { entry, status } => Some(Downstream::Log {
                entry: PageEntry::from(entry),
                status: *status,
            }),
            EventPayload::StatusChanged(status) => Some(Downstream::Status(*status)),
            _ => None,
        }
    }
}

/// A log entry as the page renders it.
#[derive(Debug, Serialize)]
struct PageEntry<'a> {
    index: usize,
    segments: Vec<PageSegment<'a>>,
}

#[derive(Debug, Serialize)]
struct PageSegment<'a> {
    text: &'a str,
    color: Option<&'static str>,
    background: Option<&'static str>,
    bold: bool,
    underline: bool,
}

impl<'a> From<&'a LogEntry> for PageEntry<'a> {
    fn from(entry: &'a LogEntry) -> Self {
        Self {
            index: entry.index,
            segments: entry.segments.iter().map(PageSegment::from).collect(),
        }
    }
}

impl<'a> From<&'a StyledSegment> for PageSegment<'a> {
    fn from(segment: &'a StyledSegment) -> Self {
        let style = segment.style;
        Self {
            text: &segment.text,
            color: style.foreground.map(Color::css_name),
            background: style.background.map(Color::css_name),
            bold: style.bold,
            underline: style.underline,
        }
    }
}

// ---------------------------------------------------------------------------
// CockpitServer
// ---------------------------------------------------------------------------

/// Serves the dashboard page and bridges the [`EventBus`] to every
/// connected browser.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use ardeidae_middleware::EventBus;
/// use ardeidae_cockpit::CockpitServer;
///
/// #[tokio::main]
/// async fn main() {
///     let bus = Arc::new(EventBus::default());
///     CockpitServer::new(Arc::clone(&bus))
///         .run()
///         .await
///         .expect("cockpit server failed");
/// }
/// ```
pub struct CockpitServer {
    bus: Arc<EventBus>,
    port: u16,
    feeds: Feeds,
}

/// Optional state sources beyond the bus, cloned into every connection.
#[derive(Clone, Default)]
struct Feeds {
    orientation: Option<watch::Receiver<OrientationSnapshot>>,
    dashboard: Option<DashboardHandle>,
}

impl CockpitServer {
    /// Create a server backed by `bus` on the [`DEFAULT_PORT`].
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            port: DEFAULT_PORT,
            feeds: Feeds::default(),
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Also stream orientation snapshots to the page (builder-style).
    pub fn with_orientation(mut self, orientation: watch::Receiver<OrientationSnapshot>) -> Self {
        self.feeds.orientation = Some(orientation);
        self
    }

    /// Greet every new page with the log so far and the current indicators
    /// (builder-style).
    pub fn with_dashboard(mut self, dashboard: DashboardHandle) -> Self {
        self.feeds.dashboard = Some(dashboard);
        self
    }

    /// Bind the configured port and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ArdeidaeError::Transport`] if the listener cannot bind.
    pub async fn run(self) -> Result<(), ArdeidaeError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ArdeidaeError::Transport(format!("cockpit bind error on {addr}: {e}")))?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ArdeidaeError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "cockpit listening on http://localhost:{}", addr.port());
        }

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let bus = Arc::clone(&self.bus);
                    let feeds = self.feeds.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, bus, feeds).await {
                            warn!(%peer, error = %e, "cockpit client error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "cockpit accept error"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    bus: Arc<EventBus>,
    feeds: Feeds,
) -> Result<(), ArdeidaeError> {
    // `peek` leaves the request in the socket for the WebSocket handshake.
    let mut buf = [0u8; 1024];
    let n = stream
        .peek(&mut buf)
        .await
        .map_err(|e| ArdeidaeError::Transport(format!("peek error from {peer}: {e}")))?;

    let header_preview = String::from_utf8_lossy(&buf[..n]);
    let is_ws_upgrade = header_preview.lines().any(|line| {
        let line = line.to_lowercase();
        line.starts_with("upgrade:") && line.contains("websocket")
    });

    if is_ws_upgrade {
        handle_ws(stream, peer, bus, feeds).await
    } else {
        serve_html(stream).await
    }
}

// ---------------------------------------------------------------------------
// Plain HTTP: serve the embedded page
// ---------------------------------------------------------------------------

async fn serve_html(mut stream: TcpStream) -> Result<(), ArdeidaeError> {
    let body = DASHBOARD_HTML;
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    );
    stream
        .write_all(response.as_bytes())
        .await
        .map_err(|e| ArdeidaeError::Transport(format!("HTTP write error: {e}")))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// WebSocket: EventBus bridge
// ---------------------------------------------------------------------------

fn encode(message: &Downstream<'_>) -> Option<String> {
    serde_json::to_string(message)
        .map_err(|e| warn!(error = %e, "cockpit serialization error"))
        .ok()
}

async fn handle_ws(
    stream: TcpStream,
    peer: SocketAddr,
    bus: Arc<EventBus>,
    feeds: Feeds,
) -> Result<(), ArdeidaeError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ArdeidaeError::Transport(format!("WS handshake from {peer}: {e}")))?;
    debug!(%peer, "cockpit client connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    // Subscribe before taking the snapshot so no entry falls in between.
    let mut frames_rx = bus.subscribe_to(Topic::Frames);
    let mut dashboard_rx = bus.subscribe_to(Topic::Dashboard);
    let mut orientation_live = feeds.orientation.is_some();
    // Stand-in receiver when no orientation feed was configured; its branch
    // stays disabled.
    let (_idle_tx, idle_rx) = watch::channel(OrientationSnapshot::default());
    let mut orientation = feeds.orientation.unwrap_or(idle_rx);

    // Entries below this index were already in the snapshot.
    let mut next_index = 0;
    let mut greeting = Vec::new();
    if let Some(dashboard) = &feeds.dashboard {
        match dashboard.snapshot().await {
            Ok(snapshot) => {
                next_index = snapshot.entries.len();
                greeting.extend(encode(&Downstream::Snapshot {
                    entries: snapshot.entries.iter().map(PageEntry::from).collect(),
                    status: snapshot.status,
                }));
            }
            Err(e) => debug!(%peer, error = %e, "no dashboard snapshot for new client"),
        }
    }
    if orientation_live {
        let current = *orientation.borrow_and_update();
        greeting.extend(encode(&Downstream::Orientation(&current)));
    }
    for json in greeting {
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            debug!(%peer, "cockpit client left during greeting");
            return Ok(());
        }
    }

    loop {
        let outbound = tokio::select! {
            // ── Downstream: EventBus → browser ─────────────────────────────
            result = frames_rx.recv() => match result {
                Ok(event) => Downstream::from_event(&event).and_then(|m| encode(&m)),
                Err(RecvError::Lagged(n)) => {
                    debug!(%peer, skipped = n, "cockpit client lagged on frames");
                    None
                }
                Err(RecvError::Closed) => break,
            },
            result = dashboard_rx.recv() => match result {
                Ok(Event { payload: EventPayload::LogAppended { ref entry, .. }, .. }) if entry.index < next_index => None,
                Ok(event) => Downstream::from_event(&event).and_then(|m| encode(&m)),
                Err(RecvError::Lagged(n)) => {
                    warn!(%peer, skipped = n, "cockpit client lagged on log entries");
                    None
                }
                Err(RecvError::Closed) => break,
            },
            changed = orientation.changed(), if orientation_live => match changed {
                Ok(()) => {
                    let snapshot = *orientation.borrow_and_update();
                    encode(&Downstream::Orientation(&snapshot))
                }
                Err(_) => {
                    orientation_live = false;
                    None
                }
            },
            // ── Upstream: browser → EventBus ────────────────────────────────
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_upstream_message(text.as_str(), &bus);
                    None
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                _ => None,
            },
        };

        if let Some(json) = outbound {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    }

    debug!(%peer, "cockpit client disconnected");
    Ok(())
}

// ---------------------------------------------------------------------------
// Upstream message parser
// ---------------------------------------------------------------------------

/// Parse an upstream message from the page and publish the matching
/// [`OperatorCommand`] on [`Topic::Operator`].
///
/// | Message | Command |
/// |---|---|
/// | `{"op":"calibrate"}` | [`OperatorCommand::Calibrate`] |
/// | `{"op":"startSensors"}` | [`OperatorCommand::StartSensors`] |
///
/// Anything else is silently ignored.
pub(crate) fn handle_upstream_message(text: &str, bus: &Arc<EventBus>) -> Option<OperatorCommand> {
    if text.len() > MAX_UPSTREAM_BYTES {
        return None;
    }
    let json = serde_json::from_str::<Value>(text).ok()?;

    let command = match json.get("op").and_then(|op| op.as_str())? {
        "calibrate" => OperatorCommand::Calibrate,
        "startSensors" => OperatorCommand::StartSensors,
        _ => return None,
    };

    let _ = bus.publish_to(
        Topic::Operator,
        Event::new(SOURCE, EventPayload::Operator(command)),
    );
    Some(command)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
