//! Table State
//!
//! Everything the presentation layer sees: connection status, the latest
//! snapshot, the permitted action set and the message log. Inbound frames
//! are folded in here with no I/O; the returned acknowledgment is written
//! by the connection task.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::network::protocol::{ClientFrame, SequenceId, ServerFrame};
use crate::table::actions::{ActionKind, ActionSet};
use crate::table::log::MessageLog;
use crate::table::snapshot::{snake_to_camel, TableSnapshot};

/// Log line appended when the socket opens.
pub const MSG_CONNECTED: &str = "Connected to the poker table.";
/// Log line appended when the socket drops and a retry is scheduled.
pub const MSG_RECONNECTING: &str = "Disconnected from the poker table. Trying to reconnect...";
/// Log line appended when the authority asks us to act.
pub const MSG_YOUR_TURN: &str = "It's your turn. Please select an action.";

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket, possibly waiting on a reconnect timer.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Socket open.
    Connected,
    /// Reconnect attempts exhausted. Terminal until the next `connect()`.
    Failed,
}

/// Result of folding one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameOutcome {
    /// Acknowledgment to write back, if the frame carried a sequence id.
    pub ack: Option<ClientFrame>,
    /// Whether visible state changed.
    pub changed: bool,
}

/// Local contract violations on submit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionRejected {
    /// Action not in the permitted set.
    #[error("action {action} is not permitted (permitted: {permitted})")]
    NotPermitted {
        /// Rejected action.
        action: ActionKind,
        /// Set at the time of the attempt.
        permitted: ActionSet,
    },
}

/// Client-side view of one table.
#[derive(Debug, Clone, Default)]
pub struct TableState {
    connection: ConnectionState,
    snapshot: Option<TableSnapshot>,
    permitted: ActionSet,
    /// Highest snapshot id applied on the current connection.
    last_applied: Option<SequenceId>,
    log: MessageLog,
    /// Connection task allowed to drive the hooks; 0 means none.
    epoch: u64,
}

impl TableState {
    /// Empty state with a message log of the given capacity.
    pub fn new(log_capacity: usize) -> Self {
        Self {
            log: MessageLog::with_capacity(log_capacity),
            ..Default::default()
        }
    }

    /// Connection status.
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Is the socket open.
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Latest snapshot, if any has arrived.
    pub fn snapshot(&self) -> Option<&TableSnapshot> {
        self.snapshot.as_ref()
    }

    /// Actions the client may submit now.
    pub fn permitted(&self) -> &ActionSet {
        &self.permitted
    }

    /// Highest applied snapshot id on this connection.
    pub fn last_applied(&self) -> Option<&SequenceId> {
        self.last_applied.as_ref()
    }

    /// Message log.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Hand the hooks to connection task `epoch`. Any older task is ignored from now on.
    pub(crate) fn set_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
    }

    /// Decode and fold one inbound text frame.
    /// Undecodable frames are logged and dropped.
    pub fn apply_text(&mut self, text: &str) -> FrameOutcome {
        match ServerFrame::from_json(text) {
            Ok(frame) => self.apply(frame),
            Err(e) => {
                warn!("Dropping inbound frame: {}", e);
                debug!("Dropped frame body: {}", text);
                FrameOutcome::default()
            }
        }
    }

    /// Fold one decoded inbound frame.
    pub fn apply(&mut self, frame: ServerFrame) -> FrameOutcome {
        let ack = frame.ack_id().map(ClientFrame::ack);

        let changed = match frame {
            ServerFrame::GameState { game_state, id } => self.apply_snapshot(game_state, id),
            ServerFrame::Sync { id } => {
                debug!("Sync {}", id);
                false
            }
            ServerFrame::PrivateHand { player, hand } => self.apply_private_hand(&player, hand),
            ServerFrame::RequestAction { valid_actions } => {
                self.permitted = ActionSet::from_wire(&valid_actions);
                info!("Action requested: {}", self.permitted);
                self.log.push(MSG_YOUR_TURN);
                true
            }
            ServerFrame::Error { message } => {
                warn!("Authority error: {}", message);
                self.log.push(format!("Error: {}", message));
                true
            }
        };

        FrameOutcome { ack, changed }
    }

    fn apply_snapshot(&mut self, snapshot: TableSnapshot, id: SequenceId) -> bool {
        if let Some(last) = &self.last_applied {
            if id.is_after(last) == Some(false) {
                warn!("Ignoring stale snapshot {} (last applied {})", id, last);
                return false;
            }
        }

        debug!("Applying snapshot {}: {}", id, snapshot);
        self.snapshot = Some(snapshot);
        self.last_applied = Some(id);
        true
    }

    fn apply_private_hand(&mut self, player: &str, hand: Vec<String>) -> bool {
        let Some(snapshot) = self.snapshot.as_mut() else {
            warn!("Private hand for {} before any snapshot, dropping", player);
            return false;
        };

        let seat = snake_to_camel(player);
        if snapshot.merge_hand(&seat, hand) {
            debug!("Merged private hand for {}", seat);
            true
        } else {
            warn!("Private hand for unknown seat {}, dropping", player);
            false
        }
    }

    /// Check `action` against the permitted set.
    pub fn check_action(&self, action: ActionKind) -> Result<(), ActionRejected> {
        if self.permitted.contains(action) {
            Ok(())
        } else {
            Err(ActionRejected::NotPermitted {
                action,
                permitted: self.permitted.clone(),
            })
        }
    }

    /// Check `action` against the permitted set and clear it.
    pub fn take_action(&mut self, action: ActionKind) -> Result<(), ActionRejected> {
        self.check_action(action)?;
        self.permitted.clear();
        Ok(())
    }

    // =========================================================================
    // CONNECTION HOOKS
    // =========================================================================

    /// A connect attempt started.
    pub fn on_connecting(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    /// The socket opened. Sequence ids restart with the new connection.
    pub fn on_open(&mut self) {
        self.connection = ConnectionState::Connected;
        self.last_applied = None;
        self.log.push(MSG_CONNECTED);
    }

    /// The socket closed under us. Sends are refused until the next open.
    pub fn on_session_ended(&mut self) {
        self.connection = ConnectionState::Disconnected;
        self.permitted.clear();
    }

    /// The socket dropped; a reconnect fires after `retry_in`.
    pub fn on_lost(&mut self, retry_in: Duration) {
        self.on_session_ended();
        debug!("Reconnecting in {:?}", retry_in);
        self.log.push(MSG_RECONNECTING);
    }

    /// Reconnect policy exhausted.
    pub fn on_gave_up(&mut self, attempts: u32) {
        self.connection = ConnectionState::Failed;
        self.permitted.clear();
        self.log.push(format!(
            "Unable to reach the poker table after {} reconnect attempts. Giving up.",
            attempts
        ));
    }

    /// Deliberate teardown finished.
    pub fn on_closed(&mut self) {
        if self.connection != ConnectionState::Failed {
            self.connection = ConnectionState::Disconnected;
        }
        self.permitted.clear();
    }
}
