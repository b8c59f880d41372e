//! Progress Stream Service
//!
//! The per-cycle duplex channel client: connection lifecycle, heartbeat,
//! event dispatch, and automatic reconnection with exponential backoff.
//!
//! ## Architecture
//! - `reconnect.rs` - Backoff policy and consecutive-failure accounting
//! - `stream.rs` - WebSocket client task and the observer handle

pub mod reconnect;
pub mod stream;

pub use reconnect::{ReconnectPolicy, ReconnectState};
pub use stream::{
    ProgressStreamHandle, StreamConfig, StreamController, StreamStatus, StreamUpdate,
};
