//! Network Layer
//!
//! WebSocket client for one table room, plus the wire protocol and the
//! reconnect policy it runs on.

pub mod backoff;
pub mod client;
pub mod config;
pub mod protocol;

pub use backoff::ReconnectPolicy;
pub use client::{ClientError, TableClient};
pub use config::{generate_user_id, ConfigError, SyncConfig};
pub use protocol::{AckState, ClientFrame, ProtocolError, SequenceId, ServerFrame, TableRequest};
