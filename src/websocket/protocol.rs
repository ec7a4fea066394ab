use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client -> server text frame.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub command: Option<Value>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

/// Server -> client reply frame.
#[derive(Debug, Serialize)]
pub struct ReplyFrame {
    pub id: String,
    pub payload: Value,
}

/// Server -> client unsolicited module push.
#[derive(Debug, Serialize)]
pub struct ModulePushFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub payload: Value,
}

impl ModulePushFrame {
    pub fn new(payload: Value) -> Self {
        Self {
            kind: "moduleMessage",
            payload,
        }
    }
}

/// Body of a server-initiated graceful close (code 1000).
#[derive(Debug, Serialize)]
pub struct CloseReason {
    pub reason: String,
}
