//! `ardeidae-middleware` – Host Plumbing
//!
//! Routes asynchronous data between the host process, the dashboard
//! pipeline, and the presentation surfaces without caring about its
//! meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`host`] – The [`HostLink`] trait: the single injected collaborator for
//!   every outbound host command, plus the [`NullHost`] used when no host is
//!   reachable.
//! - [`codec`] – JSON codec for [`HostFrame`][ardeidae_types::HostFrame]s and
//!   routing of inbound frames onto the bus.
//! - [`ws_host`] – [`WsHostLink`]: talks to the host process over a
//!   WebSocket, with a bounded availability probe.
//! - [`sim_host`] – [`SimulatedHost`]: a synthetic sensor rig for demos and
//!   headless tests.

pub mod bus;
pub mod codec;
pub mod host;
pub mod sim_host;
pub mod ws_host;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use host::{HostLink, NullHost};
pub use sim_host::SimulatedHost;
pub use ws_host::WsHostLink;
