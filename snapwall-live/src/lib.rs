//! # snapwall-live
//!
//! Async runtime side of a Snapwall client: the reconnecting WebSocket
//! transport, the JSON wire protocol, cancellable drivers, the HTTP
//! collaborator client and the display session that wires all of it to the
//! state machines in `snapwall-core`.
//!
//! - **`protocol`** — `ServerMessage` / `ClientMessage` JSON frames.
//! - **`backoff`** — reconnect attempt counter and exponential delays.
//! - **`connection`** — `RealtimeConnection`: connect, heartbeat, retry, teardown.
//! - **`driver`** — `PeriodicDriver`, a cancellable fixed-period callback.
//! - **`api`** — `GET /events/:id` and WebSocket URL construction.
//! - **`prefetch`** — HTTP image warm-up behind the `Prefetch` seam.
//! - **`display`** — `DisplaySession`, the display surface's composition root.

pub mod api;
pub mod backoff;
pub mod connection;
pub mod display;
pub mod driver;
pub mod prefetch;
pub mod protocol;

pub use api::{websocket_url, ApiError, EventApi};
pub use backoff::{CloseOutcome, ReconnectPolicy, ReconnectSupervisor};
pub use connection::{ConnectionConfig, ConnectionError, ConnectionState, RealtimeConnection};
pub use display::{DisplayConfig, DisplaySession, Dispatch, PlaybackAuthority, Wall};
pub use driver::PeriodicDriver;
pub use prefetch::HttpPrefetcher;
pub use protocol::{
    ClientMessage, OutgoingMessage, PhotoSubmission, ProtocolError, Role, ServerMessage,
};
