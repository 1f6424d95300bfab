//! Supervisor ↔ worker message protocol.
//!
//! Messages are JSON-serialized and newline-delimited. Protocol messages are
//! wrapped in a single-key envelope so they never collide with application
//! traffic sharing the same channel:
//!
//! ```text
//! {"procvisor":{"act":"ready"}}
//! {"procvisor":{"act":"heartbeat"}}
//! {"procvisor":{"act":"shutdown"}}
//! ```
//!
//! Any other JSON value is an external message and is handed to the caller
//! untouched.

use serde::{Deserialize, Serialize};

/// Envelope key marking a message as internal to the supervisor protocol.
pub const ENVELOPE_KEY: &str = "procvisor";

/// Message from supervisor to worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "act", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Cooperative stop request; the worker should exit on its own.
    Shutdown,
    /// Enough of the pool is up.
    Healthy,
    /// Too few workers are up.
    Unhealthy,
}

/// Message from worker to supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "act", rename_all = "lowercase")]
pub enum WorkerMessage {
    /// Worker finished initialising (`down → up`).
    Ready,
    /// Liveness ping.
    Heartbeat,
}

/// A decoded line received from a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Protocol message.
    Internal(WorkerMessage),
    /// Anything else the worker chose to send.
    External(serde_json::Value),
}

#[derive(Serialize, Deserialize)]
struct Envelope<M> {
    #[serde(rename = "procvisor")]
    internal: M,
}

impl ControlMessage {
    /// Serialize to JSON line (with newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        encode_line(self)
    }

    /// Deserialize from JSON line. Returns `None` for non-protocol lines.
    pub fn from_line(line: &str) -> Option<Self> {
        serde_json::from_str::<Envelope<Self>>(line.trim())
            .ok()
            .map(|e| e.internal)
    }
}

impl WorkerMessage {
    /// Serialize to JSON line (with newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        encode_line(self)
    }
}

fn encode_line<M: Serialize>(msg: &M) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string(&Envelope { internal: msg })?;
    json.push('\n');
    Ok(json)
}

/// Decodes one line received from a worker.
///
/// Only a single-key envelope holding a known `act` is internal; everything
/// else, including an envelope with an unknown `act`, is an external message.
pub fn decode_line(line: &str) -> Result<Inbound, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(line.trim())?;
    let is_internal = value
        .as_object()
        .is_some_and(|o| o.len() == 1 && o.contains_key(ENVELOPE_KEY));

    if is_internal {
        if let Ok(env) = Envelope::<WorkerMessage>::deserialize(&value) {
            return Ok(Inbound::Internal(env.internal));
        }
    }
    Ok(Inbound::External(value))
}
