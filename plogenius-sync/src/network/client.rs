//! Table Sync Client
//!
//! Owned WebSocket client for one table room. A background task holds the
//! socket: it folds inbound frames into the shared [`TableState`], writes
//! acknowledgments, drains the outbound queue and reconnects with backoff
//! when the authority goes away. The handle never blocks the caller.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use crate::network::backoff::ReconnectPolicy;
use crate::network::config::SyncConfig;
use crate::network::protocol::ClientFrame;
use crate::table::actions::ActionKind;
use crate::table::snapshot::TableSnapshot;
use crate::table::state::{ActionRejected, ConnectionState, TableState};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Action outside the permitted set.
    #[error("{0}")]
    ActionNotPermitted(#[from] ActionRejected),

    /// No open connection to send on.
    #[error("not connected to the poker table")]
    NotConnected,

    /// Outbound queue full.
    #[error("outgoing queue is full")]
    QueueFull,

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Handles to a running connection task.
struct Link {
    outgoing: mpsc::Sender<ClientFrame>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

/// Realtime sync client for one table.
///
/// Dropping the client closes its connection.
pub struct TableClient {
    config: SyncConfig,
    state: Arc<watch::Sender<TableState>>,
    link: Option<Link>,
    /// Last epoch handed to a connection task.
    epoch: u64,
}

impl TableClient {
    /// Create a disconnected client. No I/O happens until [`connect`](Self::connect).
    pub fn new(config: SyncConfig) -> Self {
        let (state, _) = watch::channel(TableState::new(config.log_capacity));

        Self {
            config,
            state: Arc::new(state),
            link: None,
            epoch: 0,
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// This client's identifier.
    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    /// Current table state. Don't hold the guard across an `.await`.
    pub fn state(&self) -> watch::Ref<'_, TableState> {
        self.state.borrow()
    }

    /// Change notifications for the presentation layer.
    pub fn subscribe(&self) -> watch::Receiver<TableState> {
        self.state.subscribe()
    }

    /// Connection status.
    pub fn connection(&self) -> ConnectionState {
        self.state.borrow().connection()
    }

    /// Copy of the latest snapshot.
    pub fn snapshot(&self) -> Option<TableSnapshot> {
        self.state.borrow().snapshot().cloned()
    }

    /// Is a connection task running.
    pub fn is_active(&self) -> bool {
        self.link.as_ref().is_some_and(|link| !link.task.is_finished())
    }

    /// Open the connection on the current Tokio runtime.
    ///
    /// No-op while a connection task is already running.
    pub fn connect(&mut self) {
        if self.is_active() {
            debug!("connect() while already active, ignoring");
            return;
        }

        let (outgoing_tx, outgoing_rx) = mpsc::channel(self.config.outgoing_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // A task from an earlier connect() may still be winding down
        self.epoch += 1;
        let epoch = self.epoch;
        self.state.send_if_modified(|state| {
            state.set_epoch(epoch);
            false
        });

        let task = ConnectionTask {
            epoch,
            endpoint: self.config.endpoint(),
            policy: self.config.reconnect.clone(),
            state: self.state.clone(),
            outgoing: outgoing_rx,
            shutdown_rx,
            rng: StdRng::from_entropy(),
        };

        self.link = Some(Link {
            outgoing: outgoing_tx,
            shutdown_tx,
            task: tokio::spawn(task.run()),
        });
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn disconnect(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };

        info!("Disconnecting from {}", self.config.endpoint());
        let _ = link.shutdown_tx.send(());
        self.state.send_modify(|state| {
            state.set_epoch(0);
            state.on_closed();
        });
    }

    /// Close the connection and wait for the connection task to finish.
    pub async fn shutdown(mut self) {
        if let Some(link) = self.link.take() {
            let _ = link.shutdown_tx.send(());
            if let Err(e) = link.task.await {
                error!("Connection task failed: {}", e);
            }
        }
        self.state.send_modify(|state| {
            state.set_epoch(0);
            state.on_closed();
        });
    }

    /// Submit `action` for `actor_id`.
    ///
    /// Fails fast if the action is not currently permitted or the socket is
    /// not open. On success the permitted set is cleared without waiting
    /// for the authority.
    pub fn submit_action(&self, action: ActionKind, actor_id: &str) -> Result<(), ClientError> {
        let frame = ClientFrame::player_action(action, actor_id, &self.config.room);
        let mut result = Ok(());

        self.state.send_if_modified(|state| {
            result = self.try_submit(state, action, frame);
            result.is_ok()
        });

        match &result {
            Ok(()) => info!("Submitted {} for {}", action, actor_id),
            Err(e) => warn!("Rejected {} for {}: {}", action, actor_id, e),
        }
        result
    }

    /// Ask the authority to deal a new hand.
    pub fn request_new_hand(&self, actor_id: &str) -> Result<(), ClientError> {
        let frame = ClientFrame::start_hand(actor_id, &self.config.room);
        let result = self.enqueue(&self.state.borrow(), frame);

        match &result {
            Ok(()) => info!("Requested new hand for {}", actor_id),
            Err(e) => warn!("Cannot request new hand: {}", e),
        }
        result
    }

    /// Check, send and clear as one step under the state lock.
    fn try_submit(
        &self,
        state: &mut TableState,
        action: ActionKind,
        frame: ClientFrame,
    ) -> Result<(), ClientError> {
        state.check_action(action)?;
        self.enqueue(state, frame)?;
        state.take_action(action)?;
        Ok(())
    }

    fn enqueue(&self, state: &TableState, frame: ClientFrame) -> Result<(), ClientError> {
        if !state.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let link = self.link.as_ref().ok_or(ClientError::NotConnected)?;

        link.outgoing.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ClientError::QueueFull,
            TrySendError::Closed(_) => ClientError::NotConnected,
        })
    }
}

impl Drop for TableClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// How a session ended.
enum SessionEnd {
    /// Deliberate teardown.
    Shutdown,
    /// Unexpected closure.
    Lost,
}

/// Background task owning the socket.
struct ConnectionTask {
    /// Matches `TableState::epoch` while this task is the client's current one.
    epoch: u64,
    endpoint: String,
    policy: ReconnectPolicy,
    state: Arc<watch::Sender<TableState>>,
    outgoing: mpsc::Receiver<ClientFrame>,
    shutdown_rx: broadcast::Receiver<()>,
    rng: StdRng,
}

impl ConnectionTask {
    /// Connect, run sessions and reconnect until shutdown or give-up.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn run(mut self) {
        // Consecutive failures since the last successful open
        let mut failures: u32 = 0;

        loop {
            self.modify(TableState::on_connecting);
            info!("Connecting to {}...", self.endpoint);

            let connected = tokio::select! {
                result = connect_async(self.endpoint.as_str()) => result,
                _ = self.shutdown_rx.recv() => {
                    debug!("Shutdown during connect");
                    break;
                }
            };

            match connected {
                Ok((socket, _response)) => {
                    failures = 0;
                    self.discard_stale();
                    self.modify(TableState::on_open);
                    info!("WebSocket connected!");

                    if let SessionEnd::Shutdown = self.run_session(socket).await {
                        break;
                    }
                    self.modify(TableState::on_session_ended);
                }
                Err(e) => {
                    warn!("Failed to connect: {}", e);
                }
            }

            failures += 1;
            let Some(delay) = self.policy.delay_for(failures, &mut self.rng) else {
                let attempts = failures - 1;
                error!("Giving up after {} reconnect attempts", attempts);
                self.modify(|s| s.on_gave_up(attempts));
                break;
            };

            warn!("Connection lost, retry {} in {:?}", failures, delay);
            self.modify(|s| s.on_lost(delay));

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown_rx.recv() => {
                    debug!("Shutdown cancelled pending reconnect");
                    break;
                }
            }
        }

        self.modify(TableState::on_closed);
        info!("Connection task ended");
    }

    /// Mutate shared state only while this task is current. Returns whether
    /// subscribers were notified.
    fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut TableState) -> bool,
    {
        let epoch = self.epoch;
        self.state.send_if_modified(|state| {
            if state.epoch() != epoch {
                debug!("Superseded task {} skipping state update", epoch);
                return false;
            }
            f(state)
        })
    }

    fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut TableState),
    {
        self.update(|state| {
            f(state);
            true
        });
    }

    /// Pump one open socket until it closes or we are told to stop.
    async fn run_session(&mut self, socket: Socket) -> SessionEnd {
        let (mut write, mut read) = socket.split();

        loop {
            tokio::select! {
                inbound = read.next() => {
                    let text = match inbound {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                            Ok(text) => text,
                            Err(_) => {
                                warn!("Dropping non-UTF-8 binary frame");
                                continue;
                            }
                        },
                        Some(Ok(Message::Close(frame))) => {
                            info!("Server closed connection: {:?}", frame);
                            return SessionEnd::Lost;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            error!("WebSocket read error: {}", e);
                            return SessionEnd::Lost;
                        }
                        None => {
                            info!("Connection closed");
                            return SessionEnd::Lost;
                        }
                    };

                    let mut ack = None;
                    self.update(|state| {
                        let outcome = state.apply_text(&text);
                        ack = outcome.ack;
                        outcome.changed
                    });

                    if let Some(frame) = ack {
                        if let Err(e) = write_frame(&mut write, &frame).await {
                            error!("Failed to send ack: {}", e);
                            return SessionEnd::Lost;
                        }
                    }
                }
                outbound = self.outgoing.recv() => {
                    let Some(frame) = outbound else {
                        let _ = write.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    };

                    debug!("Sending {}", frame.kind());
                    if let Err(e) = write_frame(&mut write, &frame).await {
                        error!("Failed to send {}: {}", frame.kind(), e);
                        return SessionEnd::Lost;
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    debug!("Closing connection");
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            }
        }
    }

    /// Drop requests queued for a connection that no longer exists.
    fn discard_stale(&mut self) {
        let mut dropped = 0;
        while self.outgoing.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Discarded {} requests queued while disconnected", dropped);
        }
    }
}

async fn write_frame(write: &mut SocketSink, frame: &ClientFrame) -> Result<(), ClientError> {
    let text = frame.to_json()?;
    write.send(Message::Text(text)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TableClient {
        TableClient::new(SyncConfig::new("127.0.0.1", 1))
    }

    fn offer(client: &TableClient, actions: &str) {
        let text = format!(r#"{{"type":"request_action","valid_actions":{}}}"#, actions);
        client.state.send_modify(|s| {
            s.apply_text(&text);
        });
    }

    fn task_with_queue(capacity: usize) -> (ConnectionTask, mpsc::Sender<ClientFrame>) {
        let (outgoing_tx, outgoing) = mpsc::channel(capacity);
        let (_, shutdown_rx) = broadcast::channel(1);
        let (state, _) = watch::channel(TableState::default());

        let task = ConnectionTask {
            epoch: 1,
            endpoint: "ws://127.0.0.1:1/ws/poker/table1/".to_string(),
            policy: ReconnectPolicy::default(),
            state: Arc::new(state),
            outgoing,
            shutdown_rx,
            rng: StdRng::seed_from_u64(1),
        };
        (task, outgoing_tx)
    }

    #[test]
    fn test_new_client_is_idle() {
        let client = client();
        assert_eq!(client.connection(), ConnectionState::Disconnected);
        assert!(!client.is_active());
        assert!(client.snapshot().is_none());
        assert!(client.state().log().is_empty());
    }

    #[test]
    fn test_submit_rejects_unpermitted_action() {
        let client = client();
        offer(&client, r#"["check","bet"]"#);

        let err = client.submit_action(ActionKind::Call, "player42").unwrap_err();
        assert!(matches!(err, ClientError::ActionNotPermitted(_)));
        assert_eq!(client.state().permitted().len(), 2);
    }

    #[test]
    fn test_submit_while_disconnected_keeps_permitted_set() {
        let client = client();
        offer(&client, r#"["call"]"#);

        let err = client.submit_action(ActionKind::Call, "player42").unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        assert!(client.state().permitted().contains(ActionKind::Call));
    }

    #[test]
    fn test_request_new_hand_while_disconnected() {
        let client = client();
        assert!(matches!(client.request_new_hand("player42"), Err(ClientError::NotConnected)));
    }

    #[test]
    fn test_disconnect_without_connect() {
        let mut client = client();
        client.disconnect();
        assert_eq!(client.connection(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_independent_instances() {
        let a = client();
        let b = client();
        offer(&a, r#"["fold"]"#);

        assert_eq!(a.state().permitted().len(), 1);
        assert!(b.state().permitted().is_empty());
    }

    #[tokio::test]
    async fn test_full_queue_rejects_and_keeps_permitted_set() {
        let mut client = client();
        let (outgoing, _held) = mpsc::channel(1);
        let (shutdown_tx, _) = broadcast::channel(1);
        client.link = Some(Link {
            outgoing,
            shutdown_tx,
            task: tokio::spawn(async {}),
        });
        client.state.send_modify(|s| {
            s.on_connecting();
            s.on_open();
        });
        offer(&client, r#"["call"]"#);

        client.request_new_hand("player42").unwrap();
        let err = client.submit_action(ActionKind::Call, "player42").unwrap_err();
        assert!(matches!(err, ClientError::QueueFull));
        assert!(client.state().permitted().contains(ActionKind::Call));
    }

    #[test]
    fn test_discard_stale_drops_queued_frames() {
        let (mut task, tx) = task_with_queue(4);
        tx.try_send(ClientFrame::start_hand("player42", "table1")).unwrap();
        tx.try_send(ClientFrame::player_action(ActionKind::Fold, "player42", "table1")).unwrap();

        task.discard_stale();
        assert!(task.outgoing.try_recv().is_err());
    }

    #[test]
    fn test_superseded_task_leaves_state_alone() {
        let (task, _tx) = task_with_queue(1);
        task.state.send_modify(|s| {
            s.set_epoch(2);
            s.on_connecting();
            s.on_open();
        });

        task.modify(TableState::on_closed);
        assert!(task.state.borrow().is_connected());

        task.state.send_modify(|s| s.set_epoch(1));
        task.modify(TableState::on_closed);
        assert!(!task.state.borrow().is_connected());
    }
}
