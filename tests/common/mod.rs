//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use roomkeeper::config::{ConfigLoader, GameConfig};
use roomkeeper::gateway::{BusGateway, MemoryGateway};
use roomkeeper::handlers::HandlerContext;
use roomkeeper::message::WireMessage;
use roomkeeper::router::Router;
use roomkeeper::store::GameStore;
use roomkeeper::timer::TimerEngine;
use serde_json::{Value, json};

/// Path to a fixture file.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Loads a fixture configuration.
pub fn load_fixture(name: &str) -> GameConfig {
    ConfigLoader::new(fixture(name))
        .load()
        .expect("fixture should load")
}

/// Raw fixture document.
pub fn fixture_document(name: &str) -> Value {
    let raw = std::fs::read_to_string(fixture(name)).expect("fixture should exist");
    serde_json::from_str(&raw).expect("fixture should be JSON")
}

/// A router over an in-memory store and gateway.
pub struct Harness {
    pub store: Arc<GameStore>,
    pub timers: Arc<TimerEngine>,
    pub gateway: Arc<MemoryGateway>,
    pub router: Router,
}

impl Harness {
    pub fn new(config: GameConfig) -> Self {
        Self::with_store(GameStore::new(config).expect("store should build"))
    }

    pub fn with_store(store: GameStore) -> Self {
        let store = Arc::new(store);
        let timers = Arc::new(TimerEngine::new(Arc::clone(&store)));
        let gateway = Arc::new(MemoryGateway::new());
        let ctx = HandlerContext::new(Arc::clone(&store), Arc::clone(&timers), "back-end");
        let router = Router::new(ctx, Arc::clone(&gateway) as Arc<dyn BusGateway>);
        Self {
            store,
            timers,
            gateway,
            router,
        }
    }

    /// Sends an envelope of `kind` from `origin`.
    pub async fn send(&self, origin: &str, kind: &str, contents: Value) {
        let payload = json!({
            "device_id": origin,
            "time_sent": "05-12-2019 09:42:10",
            "type": kind,
            "contents": contents,
        });
        self.router
            .route_payload(&serde_json::to_vec(&payload).expect("payload should encode"))
            .await;
    }

    /// Sends one instruction record from the console.
    pub async fn instruct(&self, record: Value) {
        self.send("front-end", "instruction", json!([record])).await;
    }

    /// Drains published messages as `(topic, envelope)` pairs.
    pub fn drain(&self) -> Vec<(String, WireMessage)> {
        self.gateway
            .take()
            .into_iter()
            .map(|p| {
                let message = p.message().expect("published payload should be an envelope");
                assert_eq!(p.delivery_level, 3);
                (p.topic, message)
            })
            .collect()
    }
}

/// Helper for driving the `roomkeeper` binary.
pub struct RoomKeeperProcess;

impl RoomKeeperProcess {
    fn command(args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_roomkeeper"));
        command
            .args(args)
            .env_remove("ROOMKEEPER_CONFIG")
            .env_remove("ROOMKEEPER_LOG_LEVEL");
        command
    }

    /// Runs a command to completion with empty stdin.
    pub fn spawn_command(args: &[&str]) -> Output {
        Self::command(args)
            .stdin(Stdio::null())
            .output()
            .expect("failed to run roomkeeper")
    }

    /// Spawns a long-running command with piped stdio.
    pub fn spawn_piped(args: &[&str]) -> std::process::Child {
        Self::command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn roomkeeper")
    }

    /// Runs a command feeding `input` on stdin, then closing it.
    pub fn run_with_input(args: &[&str], input: &str) -> Output {
        let mut child = Self::command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn roomkeeper");
        child
            .stdin
            .take()
            .expect("stdin should be piped")
            .write_all(input.as_bytes())
            .expect("failed to write stdin");
        child.wait_with_output().expect("failed to wait for roomkeeper")
    }
}
