//! Host wire codec.
//!
//! The host speaks JSON text frames tagged by `kind`:
//!
//! ```text
//! host → dashboard  {"kind":"osc","address":"/accelerometer/angx","value":[12.5]}
//! host → dashboard  {"kind":"log","line":"\u001b[32mRing connected\u001b[0m"}
//! dashboard → host  {"kind":"startSensors"}
//! dashboard → host  {"kind":"setOffsetCoordinates","x":1.0,"y":2.0,"z":3.0}
//! ```
//!
//! [`decode`] rejects oversized or malformed frames; [`route_inbound`] turns
//! an inbound frame into a bus event.

use ardeidae_types::{AddressedMessage, ArdeidaeError, Event, EventPayload, HostFrame};
use tracing::debug;

use crate::bus::{EventBus, Topic};

/// Maximum byte length of a single host frame.
///
/// Frames longer than this are rejected before they are parsed.
pub const MAX_HOST_FRAME_BYTES: usize = 64 * 1024; // 64 KiB

/// Parse one inbound text frame.
pub fn decode(text: &str) -> Result<HostFrame, ArdeidaeError> {
    if text.len() > MAX_HOST_FRAME_BYTES {
        return Err(ArdeidaeError::Serialization(format!(
            "host frame of {} bytes exceeds the limit of {}",
            text.len(),
            MAX_HOST_FRAME_BYTES
        )));
    }
    serde_json::from_str(text).map_err(|e| ArdeidaeError::Serialization(e.to_string()))
}

/// Serialise one outbound frame.
pub fn encode(frame: &HostFrame) -> Result<String, ArdeidaeError> {
    serde_json::to_string(frame).map_err(|e| ArdeidaeError::Serialization(e.to_string()))
}

/// Publish an inbound frame on the matching topic.
///
/// `source` names the transport (e.g. `"ardeidae-middleware::ws_host"`).
/// Command frames travelling the wrong way are ignored.
pub fn route_inbound(bus: &EventBus, source: &str, frame: HostFrame) -> Result<usize, ArdeidaeError> {
    match frame {
        HostFrame::Osc { address, value } => bus.publish_to(
            Topic::Telemetry,
            Event::new(source, EventPayload::Telemetry(AddressedMessage { address, value })),
        ),
        HostFrame::Log { line } => bus.publish_to(
            Topic::HostLog,
            Event::new(source, EventPayload::HostLog(line)),
        ),
        other => {
            debug!(?other, "ignoring command frame received from host");
            Ok(0)
        }
    }
}

/// Decode `text` and route it; undecodable frames are dropped.
pub fn route_text(bus: &EventBus, source: &str, text: &str) {
    match decode(text) {
        Ok(frame) => {
            let _ = route_inbound(bus, source, frame);
        }
        Err(e) => debug!(error = %e, "dropping undecodable host frame"),
    }
}
