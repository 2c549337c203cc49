// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests of the control arbiter over mock collaborators.

use std::sync::Arc;
use std::time::Duration;

use switchboard_control::{ControlArbiter, JoinRequest, LeaveRequest};
use switchboard_core::types::{
    AgentIdentity, ControlOwner, EventKind, Session, SessionId, TenantId, UpstreamEvent,
};
use switchboard_core::SwitchboardError;
use switchboard_hub::{BroadcastHub, ObserverMessage};
use switchboard_test_utils::{MemoryStore, MockRecordSink, MockTransport, MockUpstream};

struct Fixture {
    arbiter: ControlArbiter,
    store: Arc<MemoryStore>,
    hub: Arc<BroadcastHub>,
    upstream: Arc<MockUpstream>,
    transport: Arc<MockTransport>,
    session_id: SessionId,
}

async fn fixture() -> Fixture {
    fixture_with_timeout(Duration::from_secs(7200)).await
}

async fn fixture_with_timeout(inactivity_timeout: Duration) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(BroadcastHub::new(64, Duration::from_secs(30)));
    let arbiter = ControlArbiter::new(
        store.clone(),
        hub.clone(),
        64,
        inactivity_timeout,
    );
    let upstream = Arc::new(MockUpstream::new());
    let transport = Arc::new(MockTransport::new());

    let session_id = SessionId("conv-1".into());
    let session = Session::new(
        session_id.clone(),
        TenantId("tenant-a".into()),
        "+15551234567".into(),
    );
    arbiter
        .start_session(session, upstream.clone(), transport.clone())
        .await
        .unwrap();

    Fixture {
        arbiter,
        store,
        hub,
        upstream,
        transport,
        session_id,
    }
}

fn agent(id: &str) -> AgentIdentity {
    AgentIdentity {
        tenant_id: TenantId("tenant-a".into()),
        agent_id: id.into(),
        agent_name: format!("Agent {id}"),
    }
}

/// Drain everything currently buffered on an observer receiver.
fn drain(rx: &mut tokio::sync::mpsc::Receiver<ObserverMessage>) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let ObserverMessage::Event(event) = msg {
            kinds.push(event.kind);
        }
    }
    kinds
}

/// Let the actor drain its mailbox before asserting on side effects.
async fn settle(fx: &Fixture) {
    let _ = fx.arbiter.status(&fx.session_id, &agent("status-check")).await;
}

#[tokio::test]
async fn takeover_queues_messages_and_handback_replays_them() {
    let fx = fixture().await;
    let (_id, mut rx) = fx.hub.subscribe(&fx.session_id, TenantId("tenant-a".into()));
    let alice = agent("alice");

    // Under AI control: subject messages go straight upstream.
    fx.arbiter
        .subject_message(&fx.session_id, "hi, checking my order".into())
        .await
        .unwrap();
    settle(&fx).await;
    assert_eq!(fx.upstream.utterances(), vec!["hi, checking my order"]);

    let control = fx
        .arbiter
        .join(&fx.session_id, &alice, JoinRequest::default())
        .await
        .unwrap();
    assert!(control.is_active());

    // Under human control: subject messages are held, not forwarded.
    fx.arbiter
        .subject_message(&fx.session_id, "are you still there?".into())
        .await
        .unwrap();
    fx.arbiter
        .subject_message(&fx.session_id, "hello??".into())
        .await
        .unwrap();
    settle(&fx).await;
    assert_eq!(fx.upstream.utterances().len(), 1, "no forwarding while human holds control");

    let queue = fx.arbiter.queue(&fx.session_id, &alice).await.unwrap();
    assert_eq!(queue.len(), 2);
    assert!(queue.iter().all(|m| !m.processed));

    // Human replies go out through the subject transport.
    let receipt = fx
        .arbiter
        .send_as_human(&fx.session_id, &alice, "Hi, this is Alice".into())
        .await
        .unwrap();
    assert!(!receipt.delivery_id.is_empty());
    assert_eq!(fx.transport.sent()[0].body, "Hi, this is Alice");
    assert_eq!(fx.transport.sent()[0].subject_id, "+15551234567");

    // Handback replays the unprocessed queue and passes the summary on.
    let ended = fx
        .arbiter
        .leave(
            &fx.session_id,
            &alice,
            LeaveRequest {
                summary: Some("customer asked about order A-100".into()),
                next_steps: None,
            },
        )
        .await
        .unwrap();
    assert!(!ended.is_active());
    assert_eq!(
        fx.upstream.utterances(),
        vec!["hi, checking my order", "are you still there?", "hello??"]
    );
    assert_eq!(fx.upstream.hints().len(), 1);
    assert!(fx.upstream.hints()[0].contains("order A-100"));

    // Back under AI control: forwarding resumes.
    fx.arbiter
        .subject_message(&fx.session_id, "thanks!".into())
        .await
        .unwrap();
    settle(&fx).await;
    assert_eq!(fx.upstream.utterances().len(), 4);

    let kinds = drain(&mut rx);
    assert!(kinds.contains(&EventKind::HumanControlStarted));
    assert!(kinds.contains(&EventKind::CustomerMessageReceived));
    assert!(kinds.contains(&EventKind::HumanMessageSent));
    assert!(kinds.contains(&EventKind::HumanControlEnded));
}

#[tokio::test]
async fn concurrent_joins_have_exactly_one_winner() {
    let fx = fixture().await;
    let alice = agent("alice");
    let bob = agent("bob");

    let (a, b) = tokio::join!(
        fx.arbiter.join(&fx.session_id, &alice, JoinRequest::default()),
        fx.arbiter.join(&fx.session_id, &bob, JoinRequest::default()),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1, "exactly one join must win the race");
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(
        loser,
        Err(SwitchboardError::AlreadyUnderControl { .. })
    ));

    let status = fx.arbiter.status(&fx.session_id, &alice).await.unwrap();
    assert!(status.under_control);
    assert_eq!(status.session.control_owner, ControlOwner::Human);
}

#[tokio::test]
async fn join_aborts_when_persistence_fails() {
    let fx = fixture().await;
    fx.store.set_fail_writes(true);

    let err = fx
        .arbiter
        .join(&fx.session_id, &agent("alice"), JoinRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::Persistence { .. }));

    fx.store.set_fail_writes(false);
    let status = fx
        .arbiter
        .status(&fx.session_id, &agent("alice"))
        .await
        .unwrap();
    assert!(!status.under_control, "failed join must leave AI in control");
    assert_eq!(status.session.control_owner, ControlOwner::Ai);

    // The conversation keeps flowing after the aborted takeover.
    fx.arbiter
        .subject_message(&fx.session_id, "still here".into())
        .await
        .unwrap();
    settle(&fx).await;
    assert_eq!(fx.upstream.utterances(), vec!["still here"]);
}

#[tokio::test]
async fn mark_processed_is_idempotent() {
    let fx = fixture().await;
    let alice = agent("alice");
    fx.arbiter
        .join(&fx.session_id, &alice, JoinRequest::default())
        .await
        .unwrap();
    fx.arbiter
        .subject_message(&fx.session_id, "first".into())
        .await
        .unwrap();
    fx.arbiter
        .subject_message(&fx.session_id, "second".into())
        .await
        .unwrap();

    let queue = fx.arbiter.queue(&fx.session_id, &alice).await.unwrap();
    let ids: Vec<String> = queue.iter().map(|m| m.id.clone()).collect();

    let first = fx
        .arbiter
        .mark_processed(&fx.session_id, &alice, ids.clone())
        .await
        .unwrap();
    assert_eq!(first, 2);

    // Replaying the same ids changes nothing further.
    let again = fx
        .arbiter
        .mark_processed(&fx.session_id, &alice, ids)
        .await
        .unwrap();
    assert_eq!(again, 2);

    let status = fx.arbiter.status(&fx.session_id, &alice).await.unwrap();
    assert_eq!(status.control.unwrap().messages_handled, 2);

    // Processed messages are not replayed on handback.
    fx.arbiter
        .leave(&fx.session_id, &alice, LeaveRequest::default())
        .await
        .unwrap();
    assert!(fx.upstream.utterances().is_empty());
}

#[tokio::test]
async fn cross_tenant_commands_are_denied() {
    let fx = fixture().await;
    let intruder = AgentIdentity {
        tenant_id: TenantId("tenant-b".into()),
        agent_id: "mallory".into(),
        agent_name: "Mallory".into(),
    };

    let err = fx
        .arbiter
        .join(&fx.session_id, &intruder, JoinRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::CrossTenantAccess { .. }));

    let err = fx
        .arbiter
        .status(&fx.session_id, &intruder)
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::CrossTenantAccess { .. }));
}

#[tokio::test]
async fn leave_by_non_holder_is_rejected() {
    let fx = fixture().await;
    fx.arbiter
        .join(&fx.session_id, &agent("alice"), JoinRequest::default())
        .await
        .unwrap();

    let err = fx
        .arbiter
        .leave(&fx.session_id, &agent("bob"), LeaveRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::NotUnderControl { .. }));

    let status = fx.arbiter.status(&fx.session_id, &agent("alice")).await.unwrap();
    assert!(status.under_control, "holder keeps control");
}

#[tokio::test]
async fn send_as_human_without_join_is_rejected() {
    let fx = fixture().await;
    let err = fx
        .arbiter
        .send_as_human(&fx.session_id, &agent("alice"), "hello".into())
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::NotUnderControl { .. }));
    assert!(fx.transport.sent().is_empty(), "nothing may reach the subject");
}

#[tokio::test]
async fn inactivity_sweep_evicts_silent_agent() {
    let fx = fixture_with_timeout(Duration::ZERO).await;
    let (_id, mut rx) = fx.hub.subscribe(&fx.session_id, TenantId("tenant-a".into()));
    let alice = agent("alice");
    fx.arbiter
        .join(&fx.session_id, &alice, JoinRequest::default())
        .await
        .unwrap();
    fx.arbiter
        .subject_message(&fx.session_id, "anyone?".into())
        .await
        .unwrap();

    fx.arbiter.sweep_once().await;
    settle(&fx).await;

    let status = fx.arbiter.status(&fx.session_id, &alice).await.unwrap();
    assert!(!status.under_control);
    // Eviction behaves like a handback: held messages reach the AI.
    assert_eq!(fx.upstream.utterances(), vec!["anyone?"]);

    let kinds = drain(&mut rx);
    assert!(kinds.contains(&EventKind::HumanControlEnded));
}

#[tokio::test]
async fn inactivity_sweep_ends_idle_session_with_no_agent_attached() {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(BroadcastHub::new(64, Duration::from_secs(30)));
    let arbiter = ControlArbiter::new(store, hub.clone(), 64, Duration::from_secs(7200))
        .with_session_idle_timeout(Duration::ZERO);
    let upstream = Arc::new(MockUpstream::new());

    let session_id = SessionId("conv-idle".into());
    let session = Session::new(
        session_id.clone(),
        TenantId("tenant-a".into()),
        "+15551234567".into(),
    );
    let bridge_cancel = arbiter
        .start_session(session, upstream, Arc::new(MockTransport::new()))
        .await
        .unwrap();
    let (_id, mut rx) = hub.subscribe(&session_id, TenantId("tenant-a".into()));

    // Nobody joined and the upstream went silent. The sweep must not
    // leave this session running forever.
    arbiter.sweep_once().await;
    for _ in 0..50 {
        if !arbiter.is_active(&session_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!arbiter.is_active(&session_id), "idle session still running");
    assert!(bridge_cancel.is_cancelled(), "bridge must be torn down");

    let kinds = drain(&mut rx);
    assert!(kinds.contains(&EventKind::ConversationEnded));
}

#[tokio::test]
async fn upstream_end_tears_the_session_down() {
    let fx = fixture().await;
    let (_id, mut rx) = fx.hub.subscribe(&fx.session_id, TenantId("tenant-a".into()));
    fx.arbiter
        .join(&fx.session_id, &agent("alice"), JoinRequest::default())
        .await
        .unwrap();

    fx.arbiter
        .upstream_event(&fx.session_id, UpstreamEvent::Ended { reason: "hangup".into() })
        .await
        .unwrap();

    // The actor self-removes once it finishes draining.
    for _ in 0..50 {
        if fx.arbiter.active_sessions() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(fx.arbiter.active_sessions(), 0);

    let kinds = drain(&mut rx);
    assert!(kinds.contains(&EventKind::HumanControlEnded));
    assert!(kinds.contains(&EventKind::ConversationEnded));

    let err = fx
        .arbiter
        .status(&fx.session_id, &agent("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, SwitchboardError::SessionNotFound { .. }));
}

#[tokio::test]
async fn upstream_events_are_broadcast_in_order() {
    let fx = fixture().await;
    let (_id, mut rx) = fx.hub.subscribe(&fx.session_id, TenantId("tenant-a".into()));

    fx.arbiter
        .upstream_event(&fx.session_id, UpstreamEvent::SpeechStarted)
        .await
        .unwrap();
    fx.arbiter
        .upstream_event(
            &fx.session_id,
            UpstreamEvent::AgentText { text: "How can I help?".into() },
        )
        .await
        .unwrap();
    fx.arbiter
        .upstream_event(
            &fx.session_id,
            UpstreamEvent::ToolInvoked {
                tool_call_id: "tc-1".into(),
                name: "lookup_order".into(),
                arguments: serde_json::json!({"order_id": "A-100"}),
            },
        )
        .await
        .unwrap();
    settle(&fx).await;

    let kinds = drain(&mut rx);
    let relevant: Vec<EventKind> = kinds
        .into_iter()
        .filter(|k| {
            matches!(
                k,
                EventKind::UserTranscript | EventKind::AgentResponse | EventKind::ToolCall
            )
        })
        .collect();
    assert_eq!(
        relevant,
        vec![
            EventKind::UserTranscript,
            EventKind::AgentResponse,
            EventKind::ToolCall
        ]
    );
}

#[tokio::test]
async fn record_sink_gets_events_and_failures_do_not_block() {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(BroadcastHub::new(64, Duration::from_secs(30)));
    let records = Arc::new(MockRecordSink::new());
    let arbiter = ControlArbiter::new(store, hub.clone(), 64, Duration::from_secs(7200))
        .with_record_sink(records.clone());

    let session_id = SessionId("conv-rec".into());
    let session = Session::new(
        session_id.clone(),
        TenantId("tenant-a".into()),
        "+15551234567".into(),
    );
    arbiter
        .start_session(
            session,
            Arc::new(MockUpstream::new()),
            Arc::new(MockTransport::new()),
        )
        .await
        .unwrap();

    let alice = agent("alice");
    arbiter
        .join(&session_id, &alice, JoinRequest::default())
        .await
        .unwrap();
    let kinds: Vec<EventKind> = records.recorded().iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::ConversationStarted));
    assert!(kinds.contains(&EventKind::HumanControlStarted));

    // A sink outage degrades silently: observers still hear everything.
    records.set_fail_records(true);
    let (_id, mut rx) = hub.subscribe(&session_id, TenantId("tenant-a".into()));
    arbiter
        .leave(&session_id, &alice, LeaveRequest::default())
        .await
        .unwrap();
    let kinds = drain(&mut rx);
    assert!(kinds.contains(&EventKind::HumanControlEnded));
}

mod invariants {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Join(u8),
        Leave(u8),
        Subject,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..3).prop_map(Op::Join),
            (0u8..3).prop_map(Op::Leave),
            Just(Op::Subject),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Whatever sequence of joins, leaves, and inbound messages is
        /// applied, the session record never shows human control
        /// without a control session id, and vice versa.
        #[test]
        fn control_owner_matches_control_session(ops in proptest::collection::vec(op_strategy(), 1..24)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            rt.block_on(async move {
                let fx = fixture().await;
                for op in ops {
                    match op {
                        Op::Join(n) => {
                            let _ = fx
                                .arbiter
                                .join(&fx.session_id, &agent(&format!("a{n}")), JoinRequest::default())
                                .await;
                        }
                        Op::Leave(n) => {
                            let _ = fx
                                .arbiter
                                .leave(&fx.session_id, &agent(&format!("a{n}")), LeaveRequest::default())
                                .await;
                        }
                        Op::Subject => {
                            fx.arbiter
                                .subject_message(&fx.session_id, "msg".into())
                                .await
                                .unwrap();
                        }
                    }
                    let status = fx.arbiter.status(&fx.session_id, &agent("status-check")).await.unwrap();
                    assert_eq!(
                        status.session.control_owner == ControlOwner::Human,
                        status.session.control_session_id.is_some(),
                    );
                    assert_eq!(status.under_control, status.control.is_some());
                }
            });
        }
    }
}
