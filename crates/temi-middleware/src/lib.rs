//! `temi-middleware` – streams, facade and transport.
//!
//! Moves data between the robot and remote clients without caring about
//! its meaning.
//!
//! # Modules
//!
//! - [`stream`] – [`StreamAdapter`]: one native event source exposed as
//!   cancellable, bounded [`EventStream`]s.
//! - [`registry`] – [`EventSourceRegistry`]: an adapter for every source.
//! - [`facade`] – [`TemiBridge`]: dispatch, subscriptions, host lifecycle
//!   and teardown behind a single handle.
//! - [`protocol`] – the `op`-tagged JSON frames spoken over WebSocket.
//! - [`ws_transport`] – [`WsTransport`]: the WebSocket server.

pub mod facade;
pub mod protocol;
pub mod registry;
pub mod stream;
pub mod ws_transport;

pub use facade::{BridgeConfig, TemiBridge};
pub use protocol::{CallResult, ClientFrame, ServerFrame};
pub use registry::EventSourceRegistry;
pub use stream::{DEFAULT_CAPACITY, EventStream, StreamAdapter, SubscriptionHandle};
pub use ws_transport::WsTransport;
