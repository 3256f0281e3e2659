//! # PloGenius Table Sync
//!
//! Realtime client for a PloGenius poker table. Keeps one WebSocket open to
//! the game authority, folds its snapshots and events into a local table
//! view, acknowledges sequenced frames and forwards player actions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PLOGENIUS TABLE SYNC                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  table/          - Local table model (no I/O)                │
//! │  ├── snapshot.rs - Authoritative snapshot + seat decoding    │
//! │  ├── actions.rs  - Action kinds and the permitted set        │
//! │  ├── log.rs      - Bounded, timestamped message log          │
//! │  └── state.rs    - Frame reducer and connection hooks        │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── protocol.rs - Wire frames                               │
//! │  ├── backoff.rs  - Reconnect policy                          │
//! │  ├── config.rs   - Endpoint and tuning                       │
//! │  └── client.rs   - TableClient + connection task             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//!
//! The connection task is the only writer of the socket. Inbound frames go
//! through [`TableState::apply_text`], which returns the acknowledgment to
//! write back. The presentation layer reads [`TableClient::state`] or
//! watches [`TableClient::subscribe`] for changes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod network;
pub mod table;

// Re-export commonly used types
pub use network::backoff::ReconnectPolicy;
pub use network::client::{ClientError, TableClient};
pub use network::config::{ConfigError, SyncConfig};
pub use network::protocol::{ClientFrame, ProtocolError, SequenceId, ServerFrame};
pub use table::actions::{ActionKind, ActionSet};
pub use table::log::{LogEntry, MessageLog};
pub use table::snapshot::{PlayerSeat, Street, TableSnapshot};
pub use table::state::{
    ConnectionState, FrameOutcome, TableState, MSG_CONNECTED, MSG_RECONNECTING, MSG_YOUR_TURN,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
