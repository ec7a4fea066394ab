use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single registered HTTP route, as declared by an instance's `register` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteReg {
    pub method: String,
    pub path: String,
    #[serde(rename = "handlerId")]
    pub handler_id: String,
    #[serde(default, rename = "requiresAuth")]
    pub requires_auth: bool,
}

/// A single registered WebSocket command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReg {
    pub name: String,
    #[serde(rename = "handlerId")]
    pub handler_id: String,
    #[serde(default)]
    pub broadcast: bool,
    #[serde(default, rename = "requiresAuth")]
    pub requires_auth: bool,
}

/// Reply carried by a `response`/`reply` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeReply {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default, rename = "contentType")]
    pub content_type: Option<String>,
    pub payload: Value,
}

/// Messages an instance may send to the core, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FromInstance {
    #[serde(rename = "register")]
    Register {
        #[serde(default)]
        routes: Vec<RouteReg>,
        #[serde(default)]
        commands: Vec<CommandReg>,
        #[serde(default, rename = "consoleSettings")]
        console_settings: Option<Value>,
    },
    #[serde(rename = "response")]
    Response {
        id: String,
        #[serde(default)]
        status: Option<u16>,
        #[serde(default, rename = "contentType")]
        content_type: Option<String>,
        payload: Value,
    },
    #[serde(rename = "reply")]
    Reply {
        #[serde(rename = "msgId")]
        msg_id: String,
        payload: Value,
        #[serde(default, rename = "contentType")]
        content_type: Option<String>,
    },
    #[serde(rename = "log")]
    Log { level: String, message: String },
    #[serde(rename = "intermoduleMessage")]
    IntermoduleMessage {
        to: String,
        id: String,
        payload: Value,
        #[serde(rename = "isResult")]
        is_result: bool,
        #[serde(default, rename = "shardKey")]
        shard_key: Option<String>,
    },
    #[serde(rename = "databaseQuery")]
    DatabaseQuery { id: String, payload: Value },
    #[serde(rename = "sendToClient")]
    SendToClient {
        #[serde(rename = "clientId")]
        client_id: String,
        payload: Value,
    },
    #[serde(rename = "broadcastToClients")]
    BroadcastToClients { payload: Value },
    #[serde(rename = "disconnectClient")]
    DisconnectClient {
        #[serde(rename = "clientId")]
        client_id: String,
    },
}

/// Messages the core may send to an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FromCore {
    #[serde(rename = "init")]
    Init {
        #[serde(rename = "instanceId")]
        instance_id: String,
        env: Value,
    },
    #[serde(rename = "invoke")]
    Invoke {
        id: String,
        #[serde(rename = "handlerId")]
        handler_id: String,
        payload: Value,
    },
    #[serde(rename = "clientConnect")]
    ClientConnect {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    #[serde(rename = "clientDisconnect")]
    ClientDisconnect {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    #[serde(rename = "mpcRequest")]
    McpRequest { id: String, payload: Value },
    #[serde(rename = "mpcResponse")]
    McpResponse { id: String, payload: Value },
    #[serde(rename = "databaseResult")]
    DatabaseResult { id: String, payload: Value },
    #[serde(rename = "databaseError")]
    DatabaseError { id: String, payload: Value },
}
