//! `ardeidae-runtime` – The Live Dashboard
//!
//! Wires the pure core logic to the bus and the clock.
//!
//! # Modules
//!
//! - [`pipeline`] – [`DashboardPipeline`][pipeline::DashboardPipeline]:
//!   a single task owning readings, calibration and the event log.  It
//!   consumes host telemetry, host log lines and operator commands, and
//!   publishes immutable
//!   [`OrientationSnapshot`][ardeidae_types::OrientationSnapshot]s through a
//!   `watch` channel.  [`DashboardHandle`][pipeline::DashboardHandle] is the
//!   command surface used by the REPL.
//! - [`render_loop`] – [`spawn_view`][render_loop::spawn_view]:
//!   one frame task per scene view, decoupled from telemetry arrival, with
//!   an explicit stop contract on [`ViewHandle`][render_loop::ViewHandle].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export.

pub mod pipeline;
pub mod render_loop;
pub mod telemetry;

pub use pipeline::{DashboardHandle, DashboardPipeline, DashboardSnapshot, PipelineConfig};
pub use render_loop::{BusSceneView, SceneView, ViewConfig, ViewHandle, spawn_view};
pub use telemetry::{TracerProviderGuard, init_tracing};
