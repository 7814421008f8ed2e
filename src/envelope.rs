//! Command envelopes exchanged with the firmware API socket.
//!
//! Every message on the wire is a compact JSON object followed by a single
//! [`TERMINATOR`] byte. There is no length prefix and no checksum; JSON string
//! escaping keeps the terminator out of message bodies.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// End-of-message marker used by the firmware in both directions.
pub const TERMINATOR: u8 = 0x03;

/// Endpoint that executes raw G-code.
pub const METHOD_GCODE_SCRIPT: &str = "run_gcode/script";

/// Endpoint that reports printer object state.
pub const METHOD_OBJECTS_QUERY: &str = "objects/query";

/// One outgoing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: i64,
    pub method: String,
    pub params: Value,
}

impl Envelope {
    /// Wrap a line of G-code for the script endpoint. The text is not inspected.
    pub fn script(gcode: &str) -> Self {
        Self::with_id(next_id(), METHOD_GCODE_SCRIPT, json!({ "script": gcode }))
    }

    /// Ask for selected fields of one printer object, e.g. `toolhead`.
    pub fn query_objects(object: &str, fields: &[&str]) -> Self {
        Self::with_id(
            next_id(),
            METHOD_OBJECTS_QUERY,
            json!({ "objects": { object: fields } }),
        )
    }

    pub fn with_id(id: i64, method: &str, params: Value) -> Self {
        Self {
            id,
            method: method.to_string(),
            params,
        }
    }

    /// G-code carried by a script envelope.
    pub fn script_text(&self) -> Option<&str> {
        self.params.get("script").and_then(Value::as_str)
    }

    /// Serialize to wire bytes, terminator included.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.push(TERMINATOR);
        Ok(bytes)
    }
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Identifier derived from wall-clock milliseconds, strictly increasing
/// within the process so replies can be matched to their request.
pub fn next_id() -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let previous = LAST_ID
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    now.max(previous + 1)
}

/// Error object returned by the firmware for a failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// A decoded inbound message. Unsolicited status pushes have no `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<FirmwareError>,
}

impl Reply {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body.trim()).ok()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Decode every JSON reply found in a chunk of received text.
///
/// Works on both a single framed body and a raw read that may hold several
/// terminated messages or a trailing fragment; fragments are skipped.
pub fn parse_replies(text: &str) -> Vec<Reply> {
    text.split(TERMINATOR as char)
        .filter(|segment| !segment.trim().is_empty())
        .filter_map(Reply::parse)
        .collect()
}
