//! Progress Stream Integration Tests
//!
//! Drives the stream client against an in-process WebSocket server:
//! handshake, stats overwrite, terminal completion, informational errors,
//! reconnection with backoff, manual disconnect, and sequence replay.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};

use uat_pilot::services::notify::NotificationHub;
use uat_pilot::services::plan::PlanStage;
use uat_pilot::services::progress::{
    ProgressStreamHandle, ReconnectPolicy, StreamConfig, StreamStatus, StreamUpdate,
};
use uat_pilot::state::AppState;
use uat_pilot_core::progress::{CycleOutcome, ProgressStats, ServerMessage, StreamEnvelope};
use uat_pilot_core::BlockerConfig;

use super::support::{init_tracing, make_plan, spawn_ws_server, ws_base, FakeBackend, MemoryStore, Step};

fn fast_config() -> StreamConfig {
    StreamConfig {
        heartbeat_interval: Duration::from_secs(30),
        reconnect: ReconnectPolicy {
            max_attempts: 5,
            base_interval_ms: 10,
        },
    }
}

fn connected(cycle_id: &str) -> StreamEnvelope {
    StreamEnvelope::new(ServerMessage::Connected {
        cycle_id: cycle_id.to_string(),
    })
}

fn stats(passed: u32) -> ProgressStats {
    ProgressStats {
        total_tests: 40,
        passed,
        failed: 2,
        running: 3,
        pending: 40 - passed - 2 - 3,
        active_agents: 3,
    }
}

fn stats_envelope(seq: Option<u64>, passed: u32) -> StreamEnvelope {
    StreamEnvelope {
        seq,
        message: ServerMessage::ProgressStats(stats(passed)),
    }
}

async fn wait_for_status(handle: &ProgressStreamHandle, want: StreamStatus) {
    let mut rx = handle.subscribe_status();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if *rx.borrow() == want {
                return;
            }
            rx.changed().await.expect("status channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for status {:?}", want));
}

async fn next_update(handle: &mut ProgressStreamHandle) -> StreamUpdate {
    tokio::time::timeout(Duration::from_secs(5), handle.recv())
        .await
        .expect("timed out waiting for update")
        .expect("update channel closed")
}

#[tokio::test]
async fn test_handshake_then_deliberate_disconnect() {
    init_tracing();
    let (addr, server) = spawn_ws_server(vec![vec![
        Step::Send(connected("cycle-1")),
        Step::Hold,
    ]])
    .await;

    let mut handle = ProgressStreamHandle::connect(
        format!("{}/uat/ws/cycle-1", ws_base(addr)),
        "cycle-1",
        fast_config(),
        None,
        None,
    );

    wait_for_status(&handle, StreamStatus::Connected).await;

    handle.disconnect().await;
    assert_eq!(handle.status(), StreamStatus::Disconnected);
    server.abort();
}

#[tokio::test]
async fn test_stats_overwrite_last_write_wins() {
    let (addr, server) = spawn_ws_server(vec![vec![
        Step::Send(connected("cycle-1")),
        Step::Send(stats_envelope(None, 10)),
        Step::Send(stats_envelope(None, 35)),
        Step::Hold,
    ]])
    .await;

    let mut handle = ProgressStreamHandle::connect(
        format!("{}/uat/ws/cycle-1", ws_base(addr)),
        "cycle-1",
        fast_config(),
        None,
        Some(stats(0)),
    );

    // Drain updates until the second snapshot arrives.
    let mut seen = 0;
    while seen < 2 {
        if let StreamUpdate::Stats(_) = next_update(&mut handle).await {
            seen += 1;
        }
    }

    // Fully overwritten, not accumulated.
    assert_eq!(handle.stats(), stats(35));

    handle.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn test_cycle_complete_is_terminal() {
    let final_stats = ProgressStats {
        total_tests: 40,
        passed: 38,
        failed: 2,
        running: 0,
        pending: 0,
        active_agents: 0,
    };
    let (addr, server) = spawn_ws_server(vec![vec![
        Step::Send(connected("cycle-1")),
        Step::Send(StreamEnvelope::new(ServerMessage::CycleComplete(
            CycleOutcome {
                stats: Some(final_stats.clone()),
                message: Some("done".to_string()),
            },
        ))),
        // Anything after completion must not be processed.
        Step::Send(stats_envelope(None, 1)),
        Step::Hold,
    ]])
    .await;

    let mut handle = ProgressStreamHandle::connect(
        format!("{}/uat/ws/cycle-1", ws_base(addr)),
        "cycle-1",
        fast_config(),
        None,
        None,
    );

    loop {
        match next_update(&mut handle).await {
            StreamUpdate::CycleComplete(outcome) => {
                assert_eq!(outcome.message.as_deref(), Some("done"));
                break;
            }
            _ => continue,
        }
    }

    wait_for_status(&handle, StreamStatus::Disconnected).await;
    assert!(handle.is_terminal());
    assert_eq!(handle.stats(), final_stats);

    // Reconnect after completion is a no-op.
    handle.reconnect().await;
    assert_eq!(handle.status(), StreamStatus::Disconnected);
    server.abort();
}

#[tokio::test]
async fn test_server_error_is_informational() {
    let (addr, server) = spawn_ws_server(vec![vec![
        Step::Send(connected("cycle-1")),
        Step::Send(StreamEnvelope::new(ServerMessage::Error {
            message: "agent 2 restarted".to_string(),
        })),
        Step::Send(stats_envelope(None, 12)),
        Step::Hold,
    ]])
    .await;

    let mut handle = ProgressStreamHandle::connect(
        format!("{}/uat/ws/cycle-1", ws_base(addr)),
        "cycle-1",
        fast_config(),
        None,
        None,
    );

    let mut saw_error = false;
    loop {
        match next_update(&mut handle).await {
            StreamUpdate::ServerError { message } => {
                assert!(message.contains("agent 2"));
                saw_error = true;
            }
            StreamUpdate::Stats(_) => break,
            _ => continue,
        }
    }

    // The error arrived before the stats and did not close the channel.
    assert!(saw_error);
    assert_eq!(handle.status(), StreamStatus::Connected);

    handle.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn test_malformed_frame_is_dropped_not_fatal() {
    let (addr, server) = spawn_ws_server(vec![vec![
        Step::Send(connected("cycle-1")),
        Step::SendRaw("{definitely not json".to_string()),
        Step::Send(stats_envelope(None, 7)),
        Step::Hold,
    ]])
    .await;

    let mut handle = ProgressStreamHandle::connect(
        format!("{}/uat/ws/cycle-1", ws_base(addr)),
        "cycle-1",
        fast_config(),
        None,
        None,
    );

    loop {
        if let StreamUpdate::Stats(stats) = next_update(&mut handle).await {
            assert_eq!(stats.passed, 7);
            break;
        }
    }
    assert_eq!(handle.status(), StreamStatus::Connected);

    handle.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn test_auto_reconnect_after_transport_loss() {
    init_tracing();
    let (addr, server) = spawn_ws_server(vec![
        vec![Step::Send(connected("cycle-1")), Step::Close],
        vec![
            Step::Send(connected("cycle-1")),
            Step::Send(stats_envelope(None, 20)),
            Step::Hold,
        ],
    ])
    .await;

    let mut handle = ProgressStreamHandle::connect(
        format!("{}/uat/ws/cycle-1", ws_base(addr)),
        "cycle-1",
        fast_config(),
        None,
        None,
    );

    // Stats only arrive on the second connection.
    loop {
        if let StreamUpdate::Stats(stats) = next_update(&mut handle).await {
            assert_eq!(stats.passed, 20);
            break;
        }
    }
    assert_eq!(handle.status(), StreamStatus::Connected);

    handle.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn test_sequence_replay_across_reconnect_is_discarded() {
    let (addr, server) = spawn_ws_server(vec![
        vec![
            Step::Send(connected("cycle-1")),
            Step::Send(stats_envelope(Some(5), 25)),
            Step::Close,
        ],
        vec![
            Step::Send(connected("cycle-1")),
            // Replay of an older snapshot after reconnect.
            Step::Send(stats_envelope(Some(4), 10)),
            Step::Send(stats_envelope(Some(6), 30)),
            Step::Hold,
        ],
    ])
    .await;

    let mut handle = ProgressStreamHandle::connect(
        format!("{}/uat/ws/cycle-1", ws_base(addr)),
        "cycle-1",
        fast_config(),
        None,
        None,
    );

    let mut stats_seen = Vec::new();
    while stats_seen.len() < 2 {
        if let StreamUpdate::Stats(stats) = next_update(&mut handle).await {
            stats_seen.push(stats.passed);
        }
    }

    // The stale seq-4 replay never surfaced.
    assert_eq!(stats_seen, vec![25, 30]);
    assert_eq!(handle.stats().passed, 30);

    handle.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn test_manual_disconnect_suppresses_auto_reconnect() {
    let (addr, server) = spawn_ws_server(vec![vec![
        Step::Send(connected("cycle-1")),
        Step::Close,
    ]])
    .await;

    let config = StreamConfig {
        heartbeat_interval: Duration::from_secs(30),
        reconnect: ReconnectPolicy {
            max_attempts: 5,
            base_interval_ms: 200,
        },
    };
    let mut handle = ProgressStreamHandle::connect(
        format!("{}/uat/ws/cycle-1", ws_base(addr)),
        "cycle-1",
        config,
        None,
        None,
    );

    wait_for_status(&handle, StreamStatus::Connected).await;
    // The server drops the connection; the client enters its backoff wait.
    wait_for_status(&handle, StreamStatus::Reconnecting).await;

    // Disconnecting during the backoff cancels the pending timer.
    handle.disconnect().await;
    assert_eq!(handle.status(), StreamStatus::Disconnected);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(handle.status(), StreamStatus::Disconnected);
    server.abort();
}

#[tokio::test]
async fn test_exhausted_attempts_fail_and_notify() {
    // Bind a port, then drop the listener so every connect is refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let hub = Arc::new(NotificationHub::new());
    let config = StreamConfig {
        heartbeat_interval: Duration::from_secs(30),
        reconnect: ReconnectPolicy {
            max_attempts: 2,
            base_interval_ms: 5,
        },
    };
    let handle = ProgressStreamHandle::connect(
        format!("ws://{}/uat/ws/cycle-1", addr),
        "cycle-1",
        config,
        Some(hub.clone()),
        None,
    );

    wait_for_status(&handle, StreamStatus::Failed).await;

    let toasts = hub.active();
    assert_eq!(toasts.len(), 1);
    assert!(toasts[0].message.contains("cycle-1"));
    assert!(toasts[0].message.contains("2 attempts"));
}

#[tokio::test]
async fn test_manual_reconnect_recovers_failed_stream() {
    // First: no server at all, so attempts exhaust quickly.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = StreamConfig {
        heartbeat_interval: Duration::from_secs(30),
        reconnect: ReconnectPolicy {
            max_attempts: 1,
            base_interval_ms: 5,
        },
    };
    let mut handle = ProgressStreamHandle::connect(
        format!("ws://{}/uat/ws/cycle-1", addr),
        "cycle-1",
        config,
        None,
        None,
    );
    wait_for_status(&handle, StreamStatus::Failed).await;

    // A server appears on the same port; manual reconnect resets the
    // attempt budget and recovers.
    let listener = loop {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => break listener,
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    };
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
        let text = serde_json::to_string(&StreamEnvelope::new(ServerMessage::Connected {
            cycle_id: "cycle-1".to_string(),
        }))
        .unwrap();
        let _ = ws
            .send(tokio_tungstenite::tungstenite::Message::Text(text))
            .await;
        while let Some(Ok(_)) = ws.next().await {}
    });

    handle.reconnect().await;
    wait_for_status(&handle, StreamStatus::Connected).await;

    handle.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn test_app_state_trigger_and_stream_lifecycle() {
    let (addr, server) = spawn_ws_server(vec![vec![
        Step::Send(connected("cycle-9")),
        Step::Send(stats_envelope(None, 15)),
        Step::Hold,
    ]])
    .await;

    let backend = Arc::new(FakeBackend::new());
    backend.script_plan(make_plan("cycle-9", &["login", "checkout"]));
    backend.set_trigger_cycle("cycle-9");
    *backend.progress.lock().unwrap() = stats(5);

    let state = AppState::new(
        backend.clone(),
        Arc::new(MemoryStore {
            spec: Some("# Shop".to_string()),
            ..Default::default()
        }),
        ws_base(addr),
    )
    .with_stream_config(fast_config());

    let context = state.gather_context("shop").await.unwrap();
    assert!(context.has_spec);

    let mut session = state.new_plan_session("shop");
    session.mark_ready(BlockerConfig::default()).unwrap();
    session.generate(backend.as_ref()).await.unwrap();
    session.approve(backend.as_ref()).await.unwrap();
    assert_eq!(session.stage(), PlanStage::Confirmed);

    let (response, mut handle) = state.start_execution(&session).await.unwrap();
    assert_eq!(response.cycle_id, "cycle-9");
    assert_eq!(response.agents_spawned, 3);

    // The one-shot snapshot seeded the stats before the channel was live.
    assert_eq!(handle.stats(), stats(5));

    wait_for_status(&handle, StreamStatus::Connected).await;

    // One live stream per cycle.
    let duplicate = state.open_stream("cycle-9", None);
    assert!(duplicate.is_err());

    loop {
        if let StreamUpdate::Stats(stats) = next_update(&mut handle).await {
            assert_eq!(stats.passed, 15);
            break;
        }
    }

    // Registry teardown cancels the stream's timers.
    assert!(state.close_stream("cycle-9"));
    wait_for_status(&handle, StreamStatus::Disconnected).await;
    server.abort();
}
