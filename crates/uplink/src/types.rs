use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Delay between reconnect attempts. Fixed, no backoff.
pub const RECONNECT_DELAY_MS: u64 = 500;

/// Path of the executor's realtime endpoint.
pub const SOCKET_PATH: &str = "/ws";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// The client's identity with the remote executor. The sid survives socket
/// reconnects; only a full destroy clears it.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub address: Option<String>,
    pub sid: Option<String>,
    pub state: ConnectionState,
}

impl Session {
    pub fn new() -> Self {
        Self {
            address: None,
            sid: None,
            state: ConnectionState::Disconnected,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Inbound messages from the executor, dispatched by their `type` tag.
///
/// The socket is receive-only from the client's perspective; all commands
/// travel over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Server-confirmed session id. The server is authoritative: on mismatch
    /// the client adopts the server's id.
    #[serde(rename = "welcome")]
    Welcome { sid: String },

    /// Per-node progress. -1 means indeterminate, -2 disables the bar,
    /// 0..100 is a determinate percentage.
    #[serde(rename = "progress", rename_all = "camelCase")]
    Progress { node_id: String, progress: f64 },

    #[serde(rename = "image", rename_all = "camelCase")]
    Image {
        node_id: String,
        key: String,
        data: Value,
    },

    #[serde(rename = "3d", rename_all = "camelCase")]
    ThreeD {
        node_id: String,
        key: String,
        #[serde(default)]
        data: Option<Value>,
    },

    #[serde(rename = "text", rename_all = "camelCase")]
    Text {
        node_id: String,
        key: String,
        data: Value,
    },

    #[serde(rename = "json", rename_all = "camelCase")]
    Json {
        node_id: String,
        key: String,
        data: Value,
    },

    /// Node finished executing. The server reports `time` either as a number
    /// or as a formatted string, so decoding is lenient.
    #[serde(rename = "executed", rename_all = "camelCase")]
    Executed {
        node_id: String,
        #[serde(default, deserialize_with = "lenient_f64")]
        time: f64,
        #[serde(default, deserialize_with = "lenient_f64")]
        memory: f64,
    },

    #[serde(rename = "updateValues", rename_all = "camelCase")]
    UpdateValues {
        node_id: String,
        key: String,
        value: Value,
    },

    /// Execution failed server-side. Older servers report under `error`,
    /// newer ones under `message`.
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },

    #[serde(rename = "pong")]
    Pong,
}

impl ServerEvent {
    /// Human-readable description of an error event.
    pub fn error_text(&self) -> Option<&str> {
        match self {
            ServerEvent::Error { error, message } => {
                error.as_deref().or(message.as_deref()).or(Some("unknown error"))
            }
            _ => None,
        }
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    })
}
