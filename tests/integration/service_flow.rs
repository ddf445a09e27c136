// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]

//! End-to-end scenarios against the service facade.
//!
//! Covers the authorization gate on every write path, the task status
//! state machine, and the chat send pipeline with a reachable and an
//! unreachable generation backend.

use std::sync::Arc;
use std::time::Duration;

use parley_proto::message::Role;
use parley_proto::snapshot::StateSnapshot;
use parley_proto::task::{TaskId, TaskStatus};
use parley_server::auth::CallerId;
use parley_server::clock::ManualClock;
use parley_server::completion::{
    BackendError, CompletionClient, FALLBACK_TEXT, GenerationBackend, GenerationRequest,
    HttpBackend, LlmConfig,
};
use parley_server::error::ServiceError;
use parley_server::service::Service;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ROOT: &str = "parley-admin";

/// Backend that answers with a fixed string.
struct FixedBackend(&'static str);

impl GenerationBackend for FixedBackend {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, BackendError> {
        Ok(self.0.to_string())
    }
}

/// Backend that waits before answering, to expose interleaving.
struct SlowBackend(Duration);

impl GenerationBackend for SlowBackend {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, BackendError> {
        tokio::time::sleep(self.0).await;
        Ok("slow answer".to_string())
    }
}

fn make_service<B: GenerationBackend>(backend: B, clock: Arc<ManualClock>) -> Service<B> {
    let client = CompletionClient::new(backend, LlmConfig::default(), Duration::from_secs(5));
    Service::restore(StateSnapshot::default(), CallerId::new(ROOT), client, clock)
}

async fn grant<B: GenerationBackend>(svc: &Service<B>, user: &str) -> CallerId {
    let caller = CallerId::new(user);
    svc.add_authorized_user(&CallerId::new(ROOT), &caller)
        .await
        .expect("root grant");
    caller
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_then_complete_task() {
    let clock = Arc::new(ManualClock::new(1_000));
    let svc = make_service(FixedBackend("ok"), Arc::clone(&clock));
    let user = grant(&svc, "u").await;

    let task = svc.create_task(&user, "write report".into()).await.unwrap();
    assert_eq!(task.id.as_str(), "0");
    assert_eq!(task.status, TaskStatus::Pending);

    clock.advance(500);
    let done = svc
        .update_task_status(&user, &TaskId::from("0"), TaskStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.id, task.id);
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.created, task.created);
    assert!(done.updated > task.updated);
}

#[tokio::test]
async fn unauthorized_create_leaves_no_tasks() {
    let svc = make_service(FixedBackend("ok"), Arc::new(ManualClock::new(1)));
    let stranger = CallerId::new("stranger");

    let err = svc.create_task(&stranger, "x".into()).await.unwrap_err();
    assert_eq!(err, ServiceError::Unauthorized);
    assert_eq!(err.to_string(), "Unauthorized access");
    assert!(svc.all_tasks().await.is_empty());
}

#[tokio::test]
async fn unreachable_backend_yields_fallback_reply() {
    // Nothing listens on the discard port, so every request fails to connect.
    let backend = HttpBackend::new("http://127.0.0.1:9").unwrap();
    let svc = make_service(backend, Arc::new(ManualClock::new(1)));
    let user = grant(&svc, "u").await;

    let reply = svc.send_message(&user, "hello".into()).await.unwrap();
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, FALLBACK_TEXT);

    let history = svc.chat_history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[1].content, FALLBACK_TEXT);
}

#[tokio::test]
async fn only_root_can_grant() {
    let svc = make_service(FixedBackend("ok"), Arc::new(ManualClock::new(1)));
    let alice = grant(&svc, "alice").await;
    let bob = CallerId::new("bob");

    assert_eq!(
        svc.add_authorized_user(&alice, &bob).await.unwrap_err(),
        ServiceError::Unauthorized
    );
    assert!(!svc.gate().is_authorized(&bob).await);
    assert_eq!(
        svc.create_task(&bob, "x".into()).await.unwrap_err(),
        ServiceError::Unauthorized
    );
}

#[tokio::test]
async fn unknown_task_is_not_found_without_side_effects() {
    let svc = make_service(FixedBackend("ok"), Arc::new(ManualClock::new(1)));
    let user = grant(&svc, "u").await;
    svc.create_task(&user, "only".into()).await.unwrap();
    let before = svc.snapshot().await;

    let missing = TaskId::from("42");
    assert_eq!(
        svc.get_task(&user, &missing).await.unwrap_err(),
        ServiceError::NotFound(missing.clone())
    );
    assert_eq!(
        svc.update_task_status(&user, &missing, TaskStatus::Failed)
            .await
            .unwrap_err(),
        ServiceError::NotFound(missing)
    );
    assert_eq!(svc.snapshot().await, before);
}

#[tokio::test]
async fn every_status_transition_is_allowed() {
    let clock = Arc::new(ManualClock::new(10));
    let svc = make_service(FixedBackend("ok"), Arc::clone(&clock));
    let user = grant(&svc, "u").await;
    let task = svc.create_task(&user, "cycle".into()).await.unwrap();

    let mut last_updated = task.updated;
    for status in TaskStatus::ALL.into_iter().chain(TaskStatus::ALL.into_iter().rev()) {
        clock.advance(1);
        let t = svc.update_task_status(&user, &task.id, status).await.unwrap();
        assert_eq!(t.status, status);
        assert!(t.updated >= last_updated);
        assert_eq!(t.description, "cycle");
        assert_eq!(t.created, task.created);
        last_updated = t.updated;
    }
}

#[tokio::test]
async fn interleaved_callers_get_increasing_ids() {
    let svc = Arc::new(make_service(FixedBackend("ok"), Arc::new(ManualClock::new(1))));
    let a = grant(&*svc, "a").await;
    let b = grant(&*svc, "b").await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let svc = Arc::clone(&svc);
        let caller = if i % 2 == 0 { a.clone() } else { b.clone() };
        handles.push(tokio::spawn(async move {
            svc.create_task(&caller, format!("t{i}")).await.unwrap().id
        }));
    }
    let mut ids: Vec<u64> = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap().as_str().parse().unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn user_message_visible_while_reply_pending() {
    let svc = Arc::new(make_service(
        SlowBackend(Duration::from_millis(200)),
        Arc::new(ManualClock::new(1)),
    ));
    let user = grant(&*svc, "u").await;

    let sender = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move { svc.send_message(&user, "hi".into()).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let during = svc.chat_history().await;
    assert_eq!(during.len(), 1);
    assert_eq!(during[0].role, Role::User);

    let reply = sender.await.unwrap().unwrap();
    assert_eq!(reply.content, "slow answer");
    assert_eq!(svc.chat_history().await.len(), 2);
}

#[tokio::test]
async fn same_tick_messages_do_not_collide() {
    // The clock never moves, yet every message keeps its own key.
    let svc = make_service(FixedBackend("pong"), Arc::new(ManualClock::new(5)));
    let user = grant(&svc, "u").await;
    for _ in 0..3 {
        svc.send_message(&user, "ping".into()).await.unwrap();
    }
    let history = svc.chat_history().await;
    assert_eq!(history.len(), 6);
    assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}
