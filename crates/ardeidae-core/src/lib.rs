//! `ardeidae-core` – Telemetry Ingestion & Calibration
//!
//! The synchronous heart of the dashboard.  Nothing in this crate performs
//! I/O or awaits anything; every operation is O(1) (or O(n) in the length of
//! a single log line) so the async pipeline in `ardeidae-runtime` can call
//! it directly from its event loop.
//!
//! # Modules
//!
//! - [`log_format`] – [`format_line`][log_format::format_line]:
//!   converts terminal-style text with embedded SGR escape sequences into
//!   structured [`StyledSegment`][ardeidae_types::StyledSegment]s.  Never
//!   produces markup.
//! - [`normalizer`] – [`TelemetryNormalizer`][normalizer::TelemetryNormalizer]:
//!   dispatches [`AddressedMessage`][ardeidae_types::AddressedMessage]s by
//!   address into the current angle, host offset, and distance slots.
//! - [`calibration`] – [`CalibrationState`][calibration::CalibrationState]:
//!   holds the active baseline (local snapshot or host-pushed offsets) and
//!   derives calibrated angles from the current readings.
//! - [`log_stream`] – [`EventLogStream`][log_stream::EventLogStream]:
//!   the append-only event log with auto-follow viewport and the monotonic
//!   connection flag.

pub mod calibration;
pub mod log_format;
pub mod log_stream;
pub mod normalizer;

pub use calibration::CalibrationState;
pub use log_format::format_line;
pub use log_stream::{EventLogStream, LogViewport, DEFAULT_CONNECT_MARKER};
pub use normalizer::{Reading, TelemetryNormalizer, DISTANCE_MAX};
