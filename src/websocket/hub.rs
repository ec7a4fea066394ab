use crate::auth::identity::identity_from_token;
use crate::auth::jwt::JwtService;
use crate::db::DbPool;
use crate::db::models::Identity;
use crate::module_plane::ModulePlane;
use crate::module_plane::ipc::FromCore;
use crate::module_plane::supervisor::ClientPush;
use crate::websocket::protocol::{ClientFrame, ModulePushFrame, ReplyFrame};
use axum::extract::ws::Message;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct ClientHandle {
    pub client_id: Uuid,
    sender: mpsc::UnboundedSender<Message>,
    identity: RwLock<Option<Identity>>,
}

impl ClientHandle {
    fn send(&self, msg: Message) {
        let _ = self.sender.send(msg);
    }
}

/// Tracks WebSocket clients, dispatches inbound frames, performs
/// self/targeted/broadcast delivery. Two indices over the same client
/// set (the invariant: `set<Client>` membership iff `map<clientId,
/// Client>` membership) — kept as a single map of handles plus a bare id
/// set so the invariant is literally checkable rather than implied.
pub struct Hub {
    clients: RwLock<HashMap<Uuid, Arc<ClientHandle>>>,
    client_ids: RwLock<HashSet<Uuid>>,
    jwt: Arc<JwtService>,
    db: DbPool,
    module_plane: ModulePlane,
}

/// Splits a WS `command` into `(moduleName, cmd)`.
/// Plain commands use the first dot-separated segment;
/// `@ns/mod.cmd` uses the namespace-then-module segment up to the first
/// dot after the slash. Anything that doesn't match either shape is
/// refused, not guessed at.
pub fn split_command(command: &str) -> Option<(String, String)> {
    if let Some(rest) = command.strip_prefix('@') {
        let slash = rest.find('/')?;
        let after_slash = &rest[slash + 1..];
        let dot = after_slash.find('.')?;
        let module = format!("@{}", &rest[..slash + 1 + dot]);
        let cmd = after_slash[dot + 1..].to_string();
        if cmd.is_empty() {
            return None;
        }
        Some((module, cmd))
    } else {
        let dot = command.find('.')?;
        let module = command[..dot].to_string();
        let cmd = command[dot + 1..].to_string();
        if module.is_empty() || cmd.is_empty() {
            return None;
        }
        Some((module, cmd))
    }
}

impl Hub {
    pub fn new(jwt: Arc<JwtService>, db: DbPool, module_plane: ModulePlane) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            client_ids: RwLock::new(HashSet::new()),
            jwt,
            db,
            module_plane,
        }
    }

    /// Registers a new connection under a fresh `clientId`, inserts into
    /// both indices as a single transaction, and fires `clientConnect`
    /// to all live instances (fire-and-forget).
    pub async fn connect(&self, sender: mpsc::UnboundedSender<Message>) -> Arc<ClientHandle> {
        let client_id = Uuid::new_v4();
        let handle = Arc::new(ClientHandle {
            client_id,
            sender,
            identity: RwLock::new(None),
        });

        {
            let mut clients = self.clients.write().expect("hub lock poisoned");
            let mut ids = self.client_ids.write().expect("hub lock poisoned");
            clients.insert(client_id, handle.clone());
            ids.insert(client_id);
        }

        self.broadcast_lifecycle(FromCore::ClientConnect {
            client_id: client_id.to_string(),
        })
        .await;

        handle
    }

    /// Removes a connection from both indices as a single transaction and
    /// fires `clientDisconnect` to all live instances.
    pub async fn disconnect(&self, client_id: Uuid) {
        {
            let mut clients = self.clients.write().expect("hub lock poisoned");
            let mut ids = self.client_ids.write().expect("hub lock poisoned");
            clients.remove(&client_id);
            ids.remove(&client_id);
        }
        self.broadcast_lifecycle(FromCore::ClientDisconnect {
            client_id: client_id.to_string(),
        })
        .await;
    }

    /// Fans a lifecycle event out to every live instance of every loaded
    /// module — `pick_instance` would apply the load balancer and reach
    /// exactly one instance per module, consuming a round-robin slot that
    /// belongs to real traffic instead.
    async fn broadcast_lifecycle(&self, msg: FromCore) {
        for (module, _) in self.module_plane.supervisor.modules_snapshot() {
            for instance in self.module_plane.supervisor.all_live_instances(&module) {
                let _ = instance.send(msg.clone()).await;
            }
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().expect("hub lock poisoned").len()
    }

    #[cfg(test)]
    pub fn indices_consistent(&self) -> bool {
        let clients = self.clients.read().expect("hub lock poisoned");
        let ids = self.client_ids.read().expect("hub lock poisoned");
        clients.len() == ids.len() && clients.keys().all(|k| ids.contains(k))
    }

    /// Handles one inbound text frame: parse, resolve command, dispatch, reply.
    pub async fn handle_frame(&self, sender_id: Uuid, raw: &str) {
        let Ok(frame) = serde_json::from_str::<ClientFrame>(raw) else {
            tracing::warn!("dropped malformed WS frame");
            return;
        };

        let Some(Value::String(command)) = frame.command else {
            return; // step 1: command must be a string
        };

        let Some((module, cmd)) = split_command(&command) else {
            return; // unparseable module/command shape: refused, not guessed
        };
        let full_name = format!("{}.{}", module, cmd);

        let Some(entry) = self.module_plane.registry.lookup_command(&full_name) else {
            return; // step 3: unknown command, drop
        };

        let request_id = frame.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut payload = frame.payload.unwrap_or(Value::Null);
        scrub_user_field(&mut payload);
        tag_socket_id(&mut payload, sender_id);

        let identity = frame
            .token
            .as_deref()
            .and_then(|token| identity_from_token(&self.db, &self.jwt, token));

        if let Some(ref identity) = identity
            && let Some(client) = self.clients.read().expect("hub lock poisoned").get(&sender_id)
        {
            *client.identity.write().expect("hub lock poisoned") = Some(identity.clone());
        }

        if let Some(ref identity) = identity
            && let Value::Object(ref mut map) = payload
        {
            map.insert("user".to_string(), serde_json::to_value(identity).unwrap_or(Value::Null));
        }

        let shard_key = identity.as_ref().map(|i| i.user_id.to_string());
        let timeout = self.module_plane.request_timeout();

        let reply = self
            .module_plane
            .invoke_http(&module, &entry.handler_id, shard_key.as_deref(), payload, timeout)
            .await;

        let reply_payload = match reply {
            Ok(r) => r.payload,
            Err(_) => return, // timeout: silent drop for WS
        };

        let target = frame.target.as_deref().unwrap_or("self");
        self.route_reply(sender_id, target, entry.broadcast, &request_id, reply_payload);
    }

    /// Reply routing table: self, a named target, or a broadcast.
    fn route_reply(&self, sender_id: Uuid, target: &str, broadcast: bool, request_id: &str, payload: Value) {
        let frame = ReplyFrame {
            id: request_id.to_string(),
            payload,
        };
        let Ok(text) = serde_json::to_string(&frame) else {
            return;
        };
        let message = Message::Text(text);

        if broadcast || target == "broadcast" {
            self.broadcast(message);
            return;
        }

        if target == "self" || target.parse::<Uuid>().ok() == Some(sender_id) {
            self.send_to_client(sender_id, message);
            return;
        }

        if let Ok(target_id) = target.parse::<Uuid>()
            && self.clients.read().expect("hub lock poisoned").contains_key(&target_id)
        {
            self.send_to_client(target_id, message);
            return;
        }

        self.send_to_client(sender_id, message);
    }

    pub fn send_to_client(&self, client_id: Uuid, message: Message) {
        if let Some(client) = self.clients.read().expect("hub lock poisoned").get(&client_id) {
            client.send(message);
        }
    }

    /// `lookup(command).broadcast == true` delivers to every client with
    /// an open socket, exactly once each.
    pub fn broadcast(&self, message: Message) {
        for client in self.clients.read().expect("hub lock poisoned").values() {
            client.send(message.clone());
        }
    }

    pub fn push_module_message(&self, client_id: Uuid, payload: Value) {
        let frame = ModulePushFrame::new(payload);
        if let Ok(text) = serde_json::to_string(&frame) {
            self.send_to_client(client_id, Message::Text(text));
        }
    }

    /// Same `moduleMessage` push, to every connected client.
    pub fn broadcast_module_message(&self, payload: Value) {
        let frame = ModulePushFrame::new(payload);
        if let Ok(text) = serde_json::to_string(&frame) {
            self.broadcast(Message::Text(text));
        }
    }

    /// Module-initiated disconnect: a graceful close frame, same code the
    /// server uses for its own shutdown path (1000). Index cleanup happens
    /// the normal way once the connection's read loop observes the close.
    pub fn disconnect_client(&self, client_id: Uuid) {
        self.send_to_client(client_id, Message::Close(None));
    }

    /// Drains module-initiated client pushes (`sendToClient`/
    /// `broadcastToClients`/`disconnectClient`) from the Instance
    /// Supervisor and applies them through this Hub — spec.md §4.7 requires
    /// these to traverse the Hub symmetrically with client-originated sends.
    pub fn spawn_client_push_forwarder(self: &Arc<Self>) {
        let hub = self.clone();
        let mut rx = hub.module_plane.supervisor.take_client_push_receiver();
        tokio::spawn(async move {
            while let Some(push) = rx.recv().await {
                match push {
                    ClientPush::SendToClient { client_id, payload } => match client_id.parse::<Uuid>() {
                        Ok(id) => hub.push_module_message(id, payload),
                        Err(_) => tracing::warn!(client_id, "sendToClient: malformed client id"),
                    },
                    ClientPush::BroadcastToClients { payload } => hub.broadcast_module_message(payload),
                    ClientPush::DisconnectClient { client_id } => match client_id.parse::<Uuid>() {
                        Ok(id) => hub.disconnect_client(id),
                        Err(_) => tracing::warn!(client_id, "disconnectClient: malformed client id"),
                    },
                }
            }
        });
    }
}

/// Scrubs any client-supplied `payload.user` so a frame cannot spoof
/// identity.
fn scrub_user_field(payload: &mut Value) {
    if let Value::Object(map) = payload {
        map.remove("user");
    }
}

/// Stamps the originating connection's id onto the invoke payload, per
/// the wire contract (`socketId` alongside `user?`).
fn tag_socket_id(payload: &mut Value, sender_id: Uuid) {
    if let Value::Object(map) = payload {
        map.insert("socketId".to_string(), Value::String(sender_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_command_splits_on_first_dot() {
        assert_eq!(split_command("fake.echo"), Some(("fake".to_string(), "echo".to_string())));
    }

    #[test]
    fn namespaced_command_splits_after_slash_then_dot() {
        assert_eq!(
            split_command("@ns/mod.cmd"),
            Some(("@ns/mod".to_string(), "cmd".to_string()))
        );
    }

    #[test]
    fn commands_with_no_separator_are_refused() {
        assert_eq!(split_command("noseparator"), None);
        assert_eq!(split_command("@ns/nodot"), None);
    }

    #[test]
    fn scrub_removes_spoofed_user() {
        let mut payload = json!({"x": 1, "user": {"userId": "attacker"}});
        scrub_user_field(&mut payload);
        assert!(payload.get("user").is_none());
        assert_eq!(payload["x"], 1);
    }
}
