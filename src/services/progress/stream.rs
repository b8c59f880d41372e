//! Progress Stream Client
//!
//! One duplex channel per cycle. A spawned task owns the connection, the
//! heartbeat timer, and the reconnect timer; observers hold a
//! `ProgressStreamHandle` with a status watch, an event feed, and the
//! last-received stats snapshot.
//!
//! Lifecycle contract:
//! - status is `connecting` until the server's `connected` message arrives;
//! - a `ping` goes out every heartbeat interval; a missing `pong` is not a
//!   failure signal (only transport close/error triggers reconnection);
//! - `error` messages are surfaced but never close the channel;
//! - `cycle_complete` is terminal: the channel closes deliberately and no
//!   further state-mutating message is processed for the cycle;
//! - transport loss reconnects with exponential backoff up to the attempt
//!   cap, after which the failure is terminal until a manual `reconnect()`;
//! - manual `disconnect()` suppresses auto-reconnect and cancels both
//!   timers; the flag is checked before every attempt so a timer that has
//!   already fired cannot reconnect afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use uat_pilot_core::progress::{
    AgentEvent, ClientMessage, CycleOutcome, ProgressStats, ServerMessage, StreamEnvelope,
    TestEvent,
};

use crate::services::notify::{NotificationHub, ToastLevel};

use super::reconnect::{ReconnectPolicy, ReconnectState};

// ---------------------------------------------------------------------------
// Configuration & observer types
// ---------------------------------------------------------------------------

/// Stream client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Interval between client pings (default: 30s)
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Connection status visible to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Connecting,
    Connected,
    Reconnecting,
    /// Deliberate close: cycle complete or manual disconnect
    Disconnected,
    /// Reconnect attempts exhausted; requires manual `reconnect()`
    Failed,
}

/// Events delivered to the stream's consumer.
#[derive(Debug, Clone)]
pub enum StreamUpdate {
    Status(StreamStatus),
    TestStarted(TestEvent),
    TestPassed(TestEvent),
    TestFailed(TestEvent),
    AgentStarted(AgentEvent),
    AgentStopped(AgentEvent),
    Stats(ProgressStats),
    CycleComplete(CycleOutcome),
    /// Informational server-side error; the channel stays open
    ServerError { message: String },
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct StreamShared {
    status: watch::Sender<StreamStatus>,
    stats: Mutex<ProgressStats>,
    manual_disconnect: AtomicBool,
    terminal: AtomicBool,
    /// Highest applied sequence number, tracked across reconnects
    last_seq: Mutex<Option<u64>>,
    /// Token of the currently running connection task; replaced on manual
    /// reconnect so remote teardown always reaches the live task
    cancel: Mutex<CancellationToken>,
}

impl StreamShared {
    fn set_status(&self, tx: &mpsc::UnboundedSender<StreamUpdate>, status: StreamStatus) {
        let changed = *self.status.borrow() != status;
        self.status.send_replace(status);
        if changed {
            let _ = tx.send(StreamUpdate::Status(status));
        }
    }

    fn replace_stats(&self, stats: &ProgressStats) {
        let mut guard = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = stats.clone();
    }

    fn current_cancel(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn install_cancel(&self, token: CancellationToken) {
        let mut guard = self
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = token;
    }
}

/// Remote teardown handle for a stream, independent of the consumer handle.
/// Used by the stream registry to cancel a cycle's timers without owning
/// its event receiver.
#[derive(Clone)]
pub struct StreamController {
    shared: Arc<StreamShared>,
}

impl StreamController {
    pub fn status(&self) -> StreamStatus {
        *self.shared.status.borrow()
    }

    /// Suppress auto-reconnect and cancel the live connection task.
    pub fn shutdown(&self) {
        self.shared.manual_disconnect.store(true, Ordering::SeqCst);
        self.shared.current_cancel().cancel();
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Observer handle for one cycle's progress channel.
///
/// Single logical consumer per cycle: the handle owns the event receiver.
/// Dropping the handle cancels the connection task and its timers.
pub struct ProgressStreamHandle {
    cycle_id: String,
    ws_url: String,
    config: StreamConfig,
    notifications: Option<Arc<NotificationHub>>,
    shared: Arc<StreamShared>,
    updates_tx: mpsc::UnboundedSender<StreamUpdate>,
    updates: mpsc::UnboundedReceiver<StreamUpdate>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProgressStreamHandle {
    /// Open the channel for a cycle and start the connection task.
    pub fn connect(
        ws_url: impl Into<String>,
        cycle_id: impl Into<String>,
        config: StreamConfig,
        notifications: Option<Arc<NotificationHub>>,
        initial_stats: Option<ProgressStats>,
    ) -> Self {
        let (status_tx, _) = watch::channel(StreamStatus::Connecting);
        let (updates_tx, updates) = mpsc::unbounded_channel();

        let shared = Arc::new(StreamShared {
            status: status_tx,
            stats: Mutex::new(initial_stats.unwrap_or_default()),
            manual_disconnect: AtomicBool::new(false),
            terminal: AtomicBool::new(false),
            last_seq: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        });

        let mut handle = Self {
            cycle_id: cycle_id.into(),
            ws_url: ws_url.into(),
            config,
            notifications,
            shared,
            updates_tx,
            updates,
            cancel: CancellationToken::new(),
            task: None,
        };
        handle.spawn();
        handle
    }

    fn spawn(&mut self) {
        self.shared.install_cancel(self.cancel.clone());
        let task = tokio::spawn(run_loop(
            self.ws_url.clone(),
            self.cycle_id.clone(),
            self.config.clone(),
            self.shared.clone(),
            self.updates_tx.clone(),
            self.cancel.clone(),
            self.notifications.clone(),
        ));
        self.task = Some(task);
    }

    pub fn cycle_id(&self) -> &str {
        &self.cycle_id
    }

    /// Remote teardown handle (for the stream registry).
    pub fn controller(&self) -> StreamController {
        StreamController {
            shared: self.shared.clone(),
        }
    }

    /// Current connection status.
    pub fn status(&self) -> StreamStatus {
        *self.shared.status.borrow()
    }

    /// Watch the status across changes.
    pub fn subscribe_status(&self) -> watch::Receiver<StreamStatus> {
        self.shared.status.subscribe()
    }

    /// Last-received stats snapshot (last-write-wins).
    pub fn stats(&self) -> ProgressStats {
        self.shared
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Whether `cycle_complete` was received.
    pub fn is_terminal(&self) -> bool {
        self.shared.terminal.load(Ordering::SeqCst)
    }

    /// Receive the next update, or `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<StreamUpdate> {
        self.updates.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<StreamUpdate> {
        self.updates.try_recv().ok()
    }

    /// Deliberately close the channel, suppressing any auto-reconnect and
    /// cancelling both the heartbeat and any pending reconnect timer.
    pub async fn disconnect(&mut self) {
        self.shared.manual_disconnect.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.shared
            .set_status(&self.updates_tx, StreamStatus::Disconnected);
    }

    /// Manually reconnect: clears the manual-disconnect flag, resets the
    /// attempt counter, and starts a fresh connection task. A no-op after
    /// `cycle_complete`.
    pub async fn reconnect(&mut self) {
        if self.is_terminal() {
            tracing::warn!(
                "ignoring reconnect for completed cycle {}",
                self.cycle_id
            );
            return;
        }

        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }

        self.shared.manual_disconnect.store(false, Ordering::SeqCst);
        self.cancel = CancellationToken::new();
        // The fresh run loop starts with a zeroed attempt counter.
        self.spawn();
    }
}

impl Drop for ProgressStreamHandle {
    fn drop(&mut self) {
        // Teardown must not leak the heartbeat or reconnect timer.
        self.shared.manual_disconnect.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

enum ConnectionOutcome {
    /// `cycle_complete` received; channel closed deliberately
    Terminal,
    /// Cancelled via the token (manual disconnect or teardown)
    Cancelled,
    /// Transport-level loss; candidate for auto-reconnect
    Lost(String),
}

async fn run_loop(
    ws_url: String,
    cycle_id: String,
    config: StreamConfig,
    shared: Arc<StreamShared>,
    updates_tx: mpsc::UnboundedSender<StreamUpdate>,
    cancel: CancellationToken,
    notifications: Option<Arc<NotificationHub>>,
) {
    let mut reconnect = ReconnectState::new(config.reconnect.clone());

    loop {
        // Checked before every attempt: a reconnect timer that fired just
        // after a manual disconnect must not reconnect.
        if shared.manual_disconnect.load(Ordering::SeqCst) {
            shared.set_status(&updates_tx, StreamStatus::Disconnected);
            return;
        }

        let status = if reconnect.attempts() == 0 {
            StreamStatus::Connecting
        } else {
            StreamStatus::Reconnecting
        };
        shared.set_status(&updates_tx, status);

        let outcome = run_connection(
            &ws_url,
            &cycle_id,
            &config,
            &shared,
            &updates_tx,
            &cancel,
            &mut reconnect,
        )
        .await;

        match outcome {
            ConnectionOutcome::Terminal | ConnectionOutcome::Cancelled => {
                shared.set_status(&updates_tx, StreamStatus::Disconnected);
                return;
            }
            ConnectionOutcome::Lost(reason) => {
                tracing::warn!("progress stream for cycle {} lost: {}", cycle_id, reason);
                if shared.manual_disconnect.load(Ordering::SeqCst) {
                    shared.set_status(&updates_tx, StreamStatus::Disconnected);
                    return;
                }

                match reconnect.next_delay() {
                    Some(delay) => {
                        // Visible immediately, not only once the timer fires.
                        shared.set_status(&updates_tx, StreamStatus::Reconnecting);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.cancelled() => {
                                shared.set_status(&updates_tx, StreamStatus::Disconnected);
                                return;
                            }
                        }
                    }
                    None => {
                        shared.set_status(&updates_tx, StreamStatus::Failed);
                        let message = format!(
                            "Connection to cycle {} failed after {} attempts; reconnect manually",
                            cycle_id,
                            reconnect.attempts()
                        );
                        tracing::error!("{}", message);
                        if let Some(hub) = &notifications {
                            hub.push(ToastLevel::Error, message);
                        }
                        return;
                    }
                }
            }
        }
    }
}

async fn run_connection(
    ws_url: &str,
    cycle_id: &str,
    config: &StreamConfig,
    shared: &StreamShared,
    updates_tx: &mpsc::UnboundedSender<StreamUpdate>,
    cancel: &CancellationToken,
    reconnect: &mut ReconnectState,
) -> ConnectionOutcome {
    let ws = tokio::select! {
        result = tokio_tungstenite::connect_async(ws_url) => match result {
            Ok((ws, _)) => ws,
            Err(e) => return ConnectionOutcome::Lost(format!("connect failed: {}", e)),
        },
        _ = cancel.cancelled() => return ConnectionOutcome::Cancelled,
    };

    let (mut sink, mut stream) = ws.split();

    let period = config.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return ConnectionOutcome::Cancelled;
            }
            _ = heartbeat.tick() => {
                let ping = serde_json::to_string(&ClientMessage::Ping).unwrap_or_default();
                if sink.send(Message::Text(ping)).await.is_err() {
                    return ConnectionOutcome::Lost("heartbeat send failed".to_string());
                }
            }
            message = stream.next() => match message {
                None => return ConnectionOutcome::Lost("channel closed".to_string()),
                Some(Err(e)) => return ConnectionOutcome::Lost(e.to_string()),
                Some(Ok(Message::Text(text))) => {
                    if apply_message(&text, cycle_id, shared, updates_tx, reconnect) {
                        let _ = sink.send(Message::Close(None)).await;
                        return ConnectionOutcome::Terminal;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) => {
                    return ConnectionOutcome::Lost("server closed the channel".to_string());
                }
                Some(Ok(_)) => {} // binary and pong frames carry nothing here
            }
        }
    }
}

/// Apply one incoming message. Returns `true` when the cycle is complete and
/// the connection should close deliberately.
fn apply_message(
    text: &str,
    cycle_id: &str,
    shared: &StreamShared,
    updates_tx: &mpsc::UnboundedSender<StreamUpdate>,
    reconnect: &mut ReconnectState,
) -> bool {
    let envelope: StreamEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            // Parse failures are dropped; they must not crash the channel.
            tracing::warn!("dropping malformed message on cycle {}: {}", cycle_id, e);
            return false;
        }
    };

    // Sequence guard: discard state-mutating messages older than the last
    // applied one (replays across reconnects). Arrival order is the
    // fallback for messages without a sequence number.
    if envelope.message.is_state_mutating() {
        if let Some(seq) = envelope.seq {
            let mut guard = shared
                .last_seq
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(last) = *guard {
                if seq <= last {
                    tracing::debug!(
                        "dropping stale message on cycle {} (seq {} <= {})",
                        cycle_id,
                        seq,
                        last
                    );
                    return false;
                }
            }
            *guard = Some(seq);
        }
    }

    match envelope.message {
        ServerMessage::Connected { cycle_id: server_cycle } => {
            if server_cycle != cycle_id {
                tracing::warn!(
                    "connected message names cycle {} on channel for {}",
                    server_cycle,
                    cycle_id
                );
            }
            reconnect.reset();
            shared.set_status(updates_tx, StreamStatus::Connected);
        }
        ServerMessage::TestStarted(event) => {
            let _ = updates_tx.send(StreamUpdate::TestStarted(event));
        }
        ServerMessage::TestPassed(event) => {
            let _ = updates_tx.send(StreamUpdate::TestPassed(event));
        }
        ServerMessage::TestFailed(event) => {
            let _ = updates_tx.send(StreamUpdate::TestFailed(event));
        }
        ServerMessage::AgentStarted(event) => {
            let _ = updates_tx.send(StreamUpdate::AgentStarted(event));
        }
        ServerMessage::AgentStopped(event) => {
            let _ = updates_tx.send(StreamUpdate::AgentStopped(event));
        }
        ServerMessage::ProgressStats(stats) => {
            shared.replace_stats(&stats);
            let _ = updates_tx.send(StreamUpdate::Stats(stats));
        }
        ServerMessage::CycleComplete(outcome) => {
            if let Some(stats) = &outcome.stats {
                shared.replace_stats(stats);
            }
            shared.terminal.store(true, Ordering::SeqCst);
            let _ = updates_tx.send(StreamUpdate::CycleComplete(outcome));
            return true;
        }
        ServerMessage::Error { message } => {
            // Informational: surface without closing the channel.
            tracing::warn!("server error on cycle {}: {}", cycle_id, message);
            let _ = updates_tx.send(StreamUpdate::ServerError { message });
        }
        ServerMessage::Pong => {
            tracing::trace!("pong on cycle {}", cycle_id);
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
