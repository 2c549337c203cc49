// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the upstream bridge: handshake, event
//! translation, liveness, and the bounded reconnection policy.

use std::sync::Arc;
use std::time::Duration;

use switchboard_core::StateStore;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use switchboard_bridge::{EventLogSettings, UpstreamBridge};
use switchboard_config::model::UpstreamConfig;
use switchboard_core::types::{SessionId, UpstreamEvent};
use switchboard_core::UpstreamSink;
use switchboard_test_utils::MemoryStore;

/// Token endpoint returning a grant pointing at `ws_addr`.
async fn token_server(ws_addr: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "signed_url": format!("ws://{ws_addr}/rt"),
            "token": "single-use-token",
        })))
        .mount(&server)
        .await;
    server
}

fn config(token_endpoint: String, base_ms: u64, max_attempts: u32) -> UpstreamConfig {
    UpstreamConfig {
        token_endpoint: Some(token_endpoint),
        api_key: Some("test-key".into()),
        reconnect_base_ms: base_ms,
        reconnect_multiplier: 2.0,
        reconnect_max_attempts: max_attempts,
    }
}

#[tokio::test]
async fn bridge_sends_init_then_translates_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = listener.local_addr().unwrap().to_string();
    let token = token_server(&ws_addr).await;

    // Scripted provider: read init, answer with a response, a ping, and an end.
    let provider = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let init = ws.next().await.unwrap().unwrap();
        let init: serde_json::Value =
            serde_json::from_str(init.to_text().unwrap()).unwrap();
        assert_eq!(init["type"], "conversation_init");
        assert_eq!(init["context"]["customer_name"], "Ada");

        ws.send(Message::Text(
            r#"{"type":"agent_response","text":"hello"}"#.into(),
        ))
        .await
        .unwrap();

        ws.send(Message::Text(r#"{"type":"ping","event_id":3}"#.into()))
            .await
            .unwrap();
        let pong = ws.next().await.unwrap().unwrap();
        let pong: serde_json::Value =
            serde_json::from_str(pong.to_text().unwrap()).unwrap();
        assert_eq!(pong["type"], "pong");
        assert_eq!(pong["event_id"], 3);

        ws.send(Message::Text(
            r#"{"type":"conversation_end","reason":"caller_hung_up"}"#.into(),
        ))
        .await
        .unwrap();
    });

    let store = Arc::new(MemoryStore::new());
    let (event_tx, mut event_rx) = mpsc::channel(16);
    let (bridge, _handle) = UpstreamBridge::new(
        SessionId("conv-1".into()),
        config(format!("{}/token", token.uri()), 10, 3),
        store.clone(),
        EventLogSettings::default(),
        serde_json::json!({"customer_name": "Ada"}),
        event_tx,
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let bridge_task = tokio::spawn(bridge.run(cancel));

    assert_eq!(
        event_rx.recv().await.unwrap(),
        UpstreamEvent::AgentText {
            text: "hello".into()
        }
    );
    assert_eq!(
        event_rx.recv().await.unwrap(),
        UpstreamEvent::Ended {
            reason: "caller_hung_up".into()
        }
    );

    provider.await.unwrap();
    bridge_task.await.unwrap();

    // Both directions landed in the per-conversation event log.
    let log = store.get_list("events:conv-1").await.unwrap();
    assert!(log.iter().any(|e| e["direction"] == "outbound"));
    assert!(log.iter().any(|e| e["direction"] == "inbound"));
}

/// Scenario: the upstream endpoint refuses every connection with max
/// attempts = 5. The bridge must fetch a fresh token per attempt, stop
/// after the 5th failure, and end the conversation with reason
/// `upstream_unavailable`.
#[tokio::test]
async fn reconnection_is_bounded_and_terminal() {
    // Bind then drop to get a port that refuses connections.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let token = token_server(&ws_addr).await;

    let store = Arc::new(MemoryStore::new());
    let (event_tx, mut event_rx) = mpsc::channel(16);
    let (bridge, handle) = UpstreamBridge::new(
        SessionId("conv-2".into()),
        config(format!("{}/token", token.uri()), 1, 5),
        store,
        EventLogSettings::default(),
        serde_json::json!({}),
        event_tx,
    )
    .unwrap();

    let cancel = CancellationToken::new();
    bridge.run(cancel).await;

    assert_eq!(
        event_rx.recv().await.unwrap(),
        UpstreamEvent::Error {
            message: "reconnection_failed".into()
        }
    );
    assert_eq!(
        event_rx.recv().await.unwrap(),
        UpstreamEvent::Ended {
            reason: "upstream_unavailable".into()
        }
    );
    assert!(!handle.is_connected());

    // One fresh token per attempt, none reused.
    let requests = token.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
}

/// Scenario: the provider drops the socket twice, but each stretch was
/// healthy (a frame arrived) and every reconnect succeeds. With max
/// attempts = 2, the conversation must survive both drops: only
/// consecutive failures count toward the cap.
#[tokio::test]
async fn separated_drops_do_not_accumulate_toward_the_cap() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = listener.local_addr().unwrap().to_string();
    let token = token_server(&ws_addr).await;

    let provider = tokio::spawn(async move {
        // Two healthy stretches that end in an abrupt drop.
        for _ in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _init = ws.next().await.unwrap().unwrap();
            ws.send(Message::Text(
                r#"{"type":"agent_response","text":"still here"}"#.into(),
            ))
            .await
            .unwrap();
            drop(ws);
        }
        // Third stretch ends the conversation properly.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _init = ws.next().await.unwrap().unwrap();
        ws.send(Message::Text(
            r#"{"type":"conversation_end","reason":"caller_hung_up"}"#.into(),
        ))
        .await
        .unwrap();
    });

    let store = Arc::new(MemoryStore::new());
    let (event_tx, mut event_rx) = mpsc::channel(16);
    let (bridge, _handle) = UpstreamBridge::new(
        SessionId("conv-5".into()),
        config(format!("{}/token", token.uri()), 1, 2),
        store,
        EventLogSettings::default(),
        serde_json::json!({}),
        event_tx,
    )
    .unwrap();

    let cancel = CancellationToken::new();
    bridge.run(cancel).await;
    provider.await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }
    let agent_frames = events
        .iter()
        .filter(|e| matches!(e, UpstreamEvent::AgentText { .. }))
        .count();
    assert_eq!(agent_frames, 2, "both healthy stretches delivered");
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, UpstreamEvent::Error { .. })),
        "no terminal reconnection failure: {events:?}"
    );
    assert_eq!(
        events.last(),
        Some(&UpstreamEvent::Ended {
            reason: "caller_hung_up".into()
        })
    );
}

#[tokio::test]
async fn outbound_sends_are_dropped_when_disconnected() {
    let token = token_server("127.0.0.1:1").await;
    let store = Arc::new(MemoryStore::new());
    let (event_tx, _event_rx) = mpsc::channel(16);
    let (_bridge, handle) = UpstreamBridge::new(
        SessionId("conv-3".into()),
        config(format!("{}/token", token.uri()), 1, 1),
        store,
        EventLogSettings::default(),
        serde_json::json!({}),
        event_tx,
    )
    .unwrap();

    // Bridge never ran; the handle reports disconnected and sends are
    // silent no-ops rather than errors.
    assert!(!handle.is_connected());
    handle.send_subject_utterance("hello?").await.unwrap();
    handle.send_context_hint("note").await.unwrap();
}

#[tokio::test]
async fn teardown_cancels_the_reconnect_loop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let token = token_server(&ws_addr).await;
    let store = Arc::new(MemoryStore::new());
    let (event_tx, _event_rx) = mpsc::channel(16);
    let (bridge, _handle) = UpstreamBridge::new(
        SessionId("conv-4".into()),
        // Long backoff: cancellation must interrupt the sleep.
        config(format!("{}/token", token.uri()), 60_000, 5),
        store,
        EventLogSettings::default(),
        serde_json::json!({}),
        event_tx,
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(bridge.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("bridge did not stop on cancellation")
        .unwrap();
}
