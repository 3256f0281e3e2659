//! Table Model
//!
//! Local view of the table: snapshots, permitted actions, the message log
//! and the reducer that folds authority frames into them. No I/O here.

pub mod actions;
pub mod log;
pub mod snapshot;
pub mod state;

pub use actions::{ActionKind, ActionSet, UnknownAction};
pub use log::{LogEntry, MessageLog, DEFAULT_LOG_CAPACITY};
pub use snapshot::{PlayerSeat, SnapshotError, Street, TableSnapshot};
pub use state::{
    ActionRejected, ConnectionState, FrameOutcome, TableState, MSG_CONNECTED, MSG_RECONNECTING,
    MSG_YOUR_TURN,
};
