//! `ardeidae-cockpit` – The Dashboard Web UI Server
//!
//! Boots a lightweight HTTP + WebSocket server (default port `8080`) that:
//!
//! 1. **Serves** the embedded dashboard page (HTML/CSS/JS) at every
//!    non-WebSocket HTTP path.
//!
//! 2. **Bridges** the [`EventBus`] to every connected browser tab: rendered
//!    view frames, formatted log entries, status indicator changes and
//!    (when configured) orientation snapshots stream to the page as JSON.
//!    With a [`DashboardHandle`] attached, a page that connects late or
//!    reconnects first receives the whole log and the current indicators.
//!
//! 3. **Accepts** upstream operator commands from the page:
//!    - `{"op":"calibrate"}` → [`OperatorCommand::Calibrate`]
//!    - `{"op":"startSensors"}` → [`OperatorCommand::StartSensors`]
//!
//! Log text reaches the page only as structured segments; the page builds
//! its DOM with `textContent`, never from markup.
//!
//! [`EventBus`]: ardeidae_middleware::EventBus
//! [`DashboardHandle`]: ardeidae_runtime::DashboardHandle
//! [`OperatorCommand::Calibrate`]: ardeidae_types::OperatorCommand::Calibrate
//! [`OperatorCommand::StartSensors`]: ardeidae_types::OperatorCommand::StartSensors

pub mod server;

pub use server::{CockpitServer, DEFAULT_PORT};
