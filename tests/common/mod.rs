// Mock firmware endpoint shared by the integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use krusty_motion::config::{Config, ConnectionConfig, PacingConfig, ReadMode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How the mock answers each decoded request.
#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    /// `{"id": <id>, "result": {}}` for every request.
    Ack,
    /// Never write anything.
    Silent,
    /// Reply to `objects/query` with the given buffered seconds, ack the rest.
    Toolhead { buffered: f64 },
    /// Reject any script containing `G28`.
    RejectHome,
    /// Send an unsolicited status update ahead of every ack.
    StatusThenAck,
}

pub struct MockFirmware {
    pub dir: TempDir,
    pub path: PathBuf,
    pub requests: mpsc::UnboundedReceiver<Value>,
    pub handle: JoinHandle<()>,
}

impl MockFirmware {
    pub fn start(behavior: Behavior, greeting: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printer");
        let listener = UnixListener::bind(&path).unwrap();
        let (tx, requests) = mpsc::unbounded_channel();
        let greeting = greeting.map(|g| g.as_bytes().to_vec());

        let handle = tokio::spawn(async move {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            if let Some(greeting) = greeting {
                let _ = stream.write_all(&greeting).await;
            }
            let mut pending = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                pending.extend_from_slice(&buf[..n]);
                while let Some(end) = pending.iter().position(|&b| b == 0x03) {
                    let frame: Vec<u8> = pending.drain(..=end).collect();
                    let request: Value = serde_json::from_slice(&frame[..frame.len() - 1]).unwrap();
                    if let Behavior::StatusThenAck = behavior {
                        let _ = stream.write_all(b"{\"params\":{\"status\":{}}}\x03").await;
                    }
                    if let Some(reply) = respond(behavior, &request) {
                        let mut bytes = serde_json::to_vec(&reply).unwrap();
                        bytes.push(0x03);
                        let _ = stream.write_all(&bytes).await;
                    }
                    let _ = tx.send(request);
                }
            }
        });

        Self { dir, path, requests, handle }
    }

    /// Wait for the client to hang up, then return everything it sent.
    pub async fn finish(mut self) -> Vec<Value> {
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("mock firmware did not see the client disconnect")
            .unwrap();
        let mut requests = Vec::new();
        while let Ok(request) = self.requests.try_recv() {
            requests.push(request);
        }
        requests
    }
}

fn respond(behavior: Behavior, request: &Value) -> Option<Value> {
    let id = request["id"].clone();
    match behavior {
        Behavior::Silent => None,
        Behavior::Ack | Behavior::StatusThenAck => Some(json!({ "id": id, "result": {} })),
        Behavior::Toolhead { buffered } => {
            if request["method"] == "objects/query" {
                Some(json!({
                    "id": id,
                    "result": { "eventtime": 1.0, "status": { "toolhead": {
                        "print_time": 10.0 + buffered,
                        "estimated_print_time": 10.0,
                    }}}
                }))
            } else {
                Some(json!({ "id": id, "result": {} }))
            }
        }
        Behavior::RejectHome => {
            let script = request["params"]["script"].as_str().unwrap_or_default();
            if script.contains("G28") {
                Some(json!({ "id": id, "error": { "error": "WebRequestError", "message": "homing failed" } }))
            } else {
                Some(json!({ "id": id, "result": {} }))
            }
        }
    }
}

pub fn connection(path: &Path, timeout_ms: u64, read_mode: ReadMode) -> ConnectionConfig {
    ConnectionConfig {
        socket_path: path.to_path_buf(),
        receive_timeout_ms: timeout_ms,
        read_mode,
        max_read: 4096,
    }
}

/// Config tuned for tests: short timeouts and no pacing delays.
pub fn fast_config(path: &Path, points: usize) -> Config {
    let mut config = Config::default();
    config.connection = connection(path, 200, ReadMode::Framed);
    config.circle.points = points;
    config.pacing = PacingConfig {
        home_delay_ms: 0,
        setup_delay_ms: 0,
        move_delay_ms: 0,
        ..Default::default()
    };
    config
}

pub fn scripts(requests: &[Value]) -> Vec<String> {
    requests
        .iter()
        .filter_map(|r| r["params"]["script"].as_str().map(str::to_string))
        .collect()
}
