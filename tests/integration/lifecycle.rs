// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]
#![cfg(unix)]

//! Process lifecycle of the `parley-server` binary: state restored at
//! startup, saved on SIGTERM and Ctrl-C, and left alone when startup fails.

use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use parley_proto::snapshot::StateSnapshot;
use parley_proto::task::{Task, TaskId};
use parley_server::http::CALLER_HEADER;
use parley_server::persist::StateFile;
use serde_json::json;

const ROOT: &str = "root";

/// State written before the first start: `alice` is authorized, one task
/// exists, and the counter has moved past it.
fn seeded_state() -> StateSnapshot {
    let task = Task::new(TaskId::from("6"), "carry over", 1_000);
    StateSnapshot {
        messages: Vec::new(),
        tasks: vec![(task.id.clone(), task)],
        next_task_id: 7,
        authorized: vec![("alice".to_string(), true)],
    }
}

fn free_addr() -> String {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().to_string()
}

/// Launches the binary with an empty config file and no ambient overrides.
fn launch(dir: &Path, bind: &str, state: &Path) -> Child {
    let config = dir.join("config.toml");
    std::fs::write(&config, "").unwrap();
    Command::new(env!("CARGO_BIN_EXE_parley-server"))
        .arg("--config")
        .arg(&config)
        .arg("--bind")
        .arg(bind)
        .arg("--state-file")
        .arg(state)
        .arg("--admin-identity")
        .arg(ROOT)
        .arg("--backend-url")
        .arg("http://127.0.0.1:9")
        .env_remove("PARLEY_ADDR")
        .env_remove("PARLEY_STATE_FILE")
        .env_remove("PARLEY_ADMIN")
        .env_remove("PARLEY_BACKEND_URL")
        .env_remove("PARLEY_LOG")
        .env("RUST_LOG", "warn")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn parley-server")
}

async fn wait_until_ready(http: &reqwest::Client, base: &str) {
    for _ in 0..200 {
        let ready = http
            .get(format!("{base}/tasks"))
            .send()
            .await
            .is_ok_and(|resp| resp.status().is_success());
        if ready {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server at {base} never became ready");
}

fn send_signal(child: &Child, signal: &str) {
    let status = Command::new("kill")
        .arg(signal)
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(status.success(), "kill {signal} failed");
}

async fn wait_for_exit(child: &mut Child) -> ExitStatus {
    for _ in 0..200 {
        if let Some(status) = child.try_wait().unwrap() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    child.kill().ok();
    panic!("parley-server did not exit");
}

#[tokio::test]
async fn sigterm_saves_state_for_next_start() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateFile::new(dir.path().join("state.bin"));
    state.save(&seeded_state()).unwrap();

    let addr = free_addr();
    let base = format!("http://{addr}");
    let mut child = launch(dir.path(), &addr, state.path());
    let http = reqwest::Client::new();
    wait_until_ready(&http, &base).await;
    assert!(!state.path().exists(), "state file is consumed at startup");

    // Restored authorization and counter are live.
    let resp = http
        .post(format!("{base}/tasks"))
        .header(CALLER_HEADER, "alice")
        .json(&json!({ "description": "after restart" }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let created: Task = resp.json().await.unwrap();
    assert_eq!(created.id, TaskId::from("7"));
    drop(http);

    send_signal(&child, "-TERM");
    let status = wait_for_exit(&mut child).await;
    assert!(status.success(), "exit status {status}");

    let saved = state.take().unwrap().expect("state saved on SIGTERM");
    assert_eq!(saved.next_task_id, 8);
    assert_eq!(saved.authorized, vec![("alice".to_string(), true)]);
    let ids: Vec<_> = saved.tasks.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"6") && ids.contains(&"7"));
}

#[tokio::test]
async fn ctrl_c_saves_state() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateFile::new(dir.path().join("state.bin"));
    state.save(&seeded_state()).unwrap();

    let addr = free_addr();
    let mut child = launch(dir.path(), &addr, state.path());
    wait_until_ready(&reqwest::Client::new(), &format!("http://{addr}")).await;

    send_signal(&child, "-INT");
    let status = wait_for_exit(&mut child).await;
    assert!(status.success(), "exit status {status}");

    let saved = state.take().unwrap().expect("state saved on Ctrl-C");
    assert_eq!(saved, seeded_state());
}

#[tokio::test]
async fn failed_startup_leaves_state_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateFile::new(dir.path().join("state.bin"));
    state.save(&seeded_state()).unwrap();
    let before = std::fs::read(state.path()).unwrap();

    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap().to_string();
    let mut child = launch(dir.path(), &addr, state.path());

    let status = wait_for_exit(&mut child).await;
    assert!(!status.success(), "bind to an occupied port must fail");
    assert_eq!(std::fs::read(state.path()).unwrap(), before);
    drop(occupied);
}
