use crate::db::DbPool;
use crate::db::repositories::auth as auth_repo;
use crate::module_plane::balancer::LoadBalancer;
use crate::module_plane::bus::Bus;
use crate::module_plane::correlator::Correlator;
use crate::module_plane::ipc::{FromCore, FromInstance, InvokeReply};
use crate::module_plane::manifest::Manifest;
use crate::module_plane::registry::Registry;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Starting,
    Ready,
    Dying,
    Dead,
}

impl InstanceState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => InstanceState::Starting,
            1 => InstanceState::Ready,
            2 => InstanceState::Dying,
            _ => InstanceState::Dead,
        }
    }
}

/// One running child process of a module.
pub struct Instance {
    pub module_name: String,
    pub instance_id: String,
    state: AtomicU8,
    outbound: mpsc::UnboundedSender<FromCore>,
}

impl Instance {
    pub fn state(&self) -> InstanceState {
        InstanceState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, s: InstanceState) {
        self.state.store(s as u8, Ordering::Relaxed);
    }

    pub async fn send(&self, msg: FromCore) -> Result<(), mpsc::error::SendError<FromCore>> {
        self.outbound.send(msg)
    }
}

/// A module-initiated request to touch a client connection
/// (`sendToClient`/`broadcastToClients`/`disconnectClient`), handed off
/// to whichever component owns the Connection Hub (C7) — the Instance
/// Supervisor has no notion of client connections itself.
#[derive(Debug, Clone)]
pub enum ClientPush {
    SendToClient { client_id: String, payload: Value },
    BroadcastToClients { payload: Value },
    DisconnectClient { client_id: String },
}

/// Spawns, monitors, and reaps module instances; owns the load
/// balancer (C5) needed to pick an instance for dispatch.
pub struct Supervisor {
    registry: Arc<Registry>,
    correlator: Arc<Correlator>,
    balancer: LoadBalancer,
    instances: RwLock<HashMap<String, Vec<Arc<Instance>>>>,
    pub bus: Bus,
    client_push_tx: mpsc::UnboundedSender<ClientPush>,
    client_push_rx: Mutex<Option<mpsc::UnboundedReceiver<ClientPush>>>,
    db: RwLock<Option<DbPool>>,
}

/// Picks the interpreter to run a module's entry point by file extension —
/// modules are arbitrary external processes, so the core only needs a
/// isolation for language independence), so the core only needs to know
/// how to launch each supported entry-point kind.
fn launch_command(path: &Path) -> Command {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") => {
            let mut cmd = Command::new("node");
            cmd.arg(path);
            cmd
        }
        Some("py") => {
            let mut cmd = Command::new("python3");
            cmd.arg(path);
            cmd
        }
        _ => Command::new(path),
    }
}

impl Supervisor {
    pub fn new(registry: Arc<Registry>, correlator: Arc<Correlator>) -> Self {
        let (client_push_tx, client_push_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            correlator,
            balancer: LoadBalancer::new(),
            instances: RwLock::new(HashMap::new()),
            bus: Bus::new(),
            client_push_tx,
            client_push_rx: Mutex::new(Some(client_push_rx)),
            db: RwLock::new(None),
        }
    }

    /// Hands off the receiving end of the client-push channel exactly
    /// once, to whichever component owns the Connection Hub.
    pub fn take_client_push_receiver(&self) -> mpsc::UnboundedReceiver<ClientPush> {
        self.client_push_rx
            .lock()
            .expect("supervisor lock poisoned")
            .take()
            .expect("client push receiver already taken")
    }

    /// Wires the relational store in after boot — kept separate from
    /// `new` so the Module Plane stays testable without a live database.
    pub fn attach_db(&self, pool: DbPool) {
        *self.db.write().expect("supervisor lock poisoned") = Some(pool);
    }

    /// Minimal `databaseQuery` proxy (spec.md §4.3): only the read
    /// operations the auth store already exposes through
    /// `db::repositories::auth` are reachable this way. Anything else
    /// fails explicitly per-call rather than silently.
    async fn run_database_query(&self, payload: &Value) -> Result<Value, String> {
        let op = payload
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing 'op'".to_string())?;
        if !matches!(op, "findUserByUsername" | "findUserByEmail" | "listPermissions") {
            return Err(format!("unsupported database query op: {}", op));
        }

        let pool = self
            .db
            .read()
            .expect("supervisor lock poisoned")
            .clone()
            .ok_or_else(|| "relational store not attached".to_string())?;

        match op {
            "findUserByUsername" => {
                let username = payload
                    .get("username")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "missing 'username'".to_string())?;
                let user = auth_repo::find_by_username(&pool, username).map_err(|e| e.to_string())?;
                Ok(match user {
                    Some(u) => json!({"id": u.id, "username": u.username, "email": u.email}),
                    None => Value::Null,
                })
            }
            "findUserByEmail" => {
                let email = payload
                    .get("email")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "missing 'email'".to_string())?;
                let user = auth_repo::find_by_email(&pool, email).map_err(|e| e.to_string())?;
                Ok(match user {
                    Some(u) => json!({"id": u.id, "username": u.username, "email": u.email}),
                    None => Value::Null,
                })
            }
            "listPermissions" => {
                let user_id = payload
                    .get("userId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "missing 'userId'".to_string())?;
                let uid: Uuid = user_id.parse().map_err(|_| "invalid 'userId'".to_string())?;
                let perms = auth_repo::list_permissions(&pool, uid).map_err(|e| e.to_string())?;
                Ok(json!(perms.into_iter().map(|p| p.permission).collect::<Vec<_>>()))
            }
            other => Err(format!("unsupported database query op: {}", other)),
        }
    }

    /// Loads one module in dependency order: computes the desired
    /// instance count (`multiInstance == false` caps at 1, with a
    /// warning if config asked for more) and spawns that many children.
    pub async fn load_module(self: &Arc<Self>, manifest: Manifest, configured_count: u32) {
        let count = if manifest.multi_instance {
            configured_count.max(1)
        } else {
            if configured_count > 1 {
                tracing::warn!(
                    module = %manifest.name,
                    configured = configured_count,
                    "module is not multiInstance-capable; capping at 1 instance"
                );
            }
            1
        };

        for index in 0..count {
            self.spawn_instance(manifest.clone(), index).await;
        }
    }

    async fn spawn_instance(self: &Arc<Self>, manifest: Manifest, index: u32) {
        let instance_id = format!("{}-{}", manifest.name, index);
        let entry_path = manifest.path.join(&manifest.entry_point);

        let mut command = launch_command(&entry_path);
        command
            .current_dir(&manifest.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(module = %manifest.name, error = %e, "failed to spawn instance; module skipped");
                return;
            }
        };

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let (tx, rx) = mpsc::unbounded_channel::<FromCore>();
        let instance = Arc::new(Instance {
            module_name: manifest.name.clone(),
            instance_id: instance_id.clone(),
            state: AtomicU8::new(InstanceState::Starting as u8),
            outbound: tx,
        });

        self.instances
            .write()
            .expect("supervisor lock poisoned")
            .entry(manifest.name.clone())
            .or_default()
            .push(instance.clone());

        spawn_writer(stdin, rx);
        spawn_reader(self.clone(), instance.clone(), stdout, child);

        let _ = instance
            .send(FromCore::Init {
                instance_id: instance_id.clone(),
                env: json!({}),
            })
            .await;
    }

    /// Picks a live instance of `module` via C5, using the caller's
    /// shard key if any (priority order is enforced by the caller).
    pub fn pick_instance(&self, module: &str, shard_key: Option<&str>) -> Option<Arc<Instance>> {
        let instances = self.instances.read().expect("supervisor lock poisoned");
        let list: Vec<&Arc<Instance>> = instances
            .get(module)?
            .iter()
            .filter(|i| i.state() == InstanceState::Ready || i.state() == InstanceState::Starting)
            .collect();
        if list.is_empty() {
            return None;
        }
        let index = self.balancer.pick_index(module, shard_key, list.len())?;
        Some(list[index].clone())
    }

    /// Every `Ready`/`Starting` instance of `module` — unlike
    /// `pick_instance`, this does not consume a round-robin slot; used for
    /// fan-out events (`clientConnect`/`clientDisconnect`) that must reach
    /// every instance, not just the one the load balancer would pick.
    pub fn all_live_instances(&self, module: &str) -> Vec<Arc<Instance>> {
        self.instances
            .read()
            .expect("supervisor lock poisoned")
            .get(module)
            .map(|list| {
                list.iter()
                    .filter(|i| i.state() == InstanceState::Ready || i.state() == InstanceState::Starting)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_live_instance(&self, module: &str) -> bool {
        self.instances
            .read()
            .expect("supervisor lock poisoned")
            .get(module)
            .map(|l| l.iter().any(|i| i.state() != InstanceState::Dead))
            .unwrap_or(false)
    }

    pub fn modules_snapshot(&self) -> Vec<(String, usize)> {
        self.instances
            .read()
            .expect("supervisor lock poisoned")
            .iter()
            .map(|(name, list)| (name.clone(), list.len()))
            .collect()
    }

    /// Idempotent cleanup for one dead instance: unified across
    /// exit, close, transport error, and disconnect. Removes the instance
    /// from its module's list; when the module has no instances left its
    /// routes/commands are de-registered from C4.
    fn cleanup_instance(&self, module_name: &str, instance_id: &str) {
        let mut instances = self.instances.write().expect("supervisor lock poisoned");
        if let Some(list) = instances.get_mut(module_name) {
            list.retain(|i| i.instance_id != instance_id);
            if list.is_empty() {
                instances.remove(module_name);
                self.registry.remove_module(module_name);
                tracing::info!(module = %module_name, "last instance died; routes and commands removed");
            }
        }
    }
}

fn spawn_writer(stdin: tokio::process::ChildStdin, mut rx: mpsc::UnboundedReceiver<FromCore>) {
    tokio::spawn(async move {
        let mut stdin = stdin;
        while let Some(msg) = rx.recv().await {
            let Ok(mut line) = serde_json::to_vec(&msg) else {
                continue;
            };
            line.push(b'\n');
            // A slow instance blocks this writer, never the connection hub
            // or other modules' traffic —
            // this task owns exactly one instance's stdin.
            if stdin.write_all(&line).await.is_err() {
                break;
            }
        }
    });
}

fn spawn_reader(
    supervisor: Arc<Supervisor>,
    instance: Arc<Instance>,
    stdout: tokio::process::ChildStdout,
    mut child: Child,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<FromInstance>(&line) {
                        Ok(msg) => handle_instance_message(&supervisor, &instance, msg).await,
                        Err(e) => tracing::warn!(module = %instance.module_name, error = %e, "malformed IPC frame"),
                    }
                }
                Ok(None) => break, // instance closed stdout: normal exit or close
                Err(e) => {
                    tracing::warn!(module = %instance.module_name, error = %e, "IPC transport error");
                    break;
                }
            }
        }

        instance.set_state(InstanceState::Dying);
        let _ = child.start_kill();
        let _ = child.wait().await;
        instance.set_state(InstanceState::Dead);
        supervisor.cleanup_instance(&instance.module_name, &instance.instance_id);
    });
}

async fn handle_instance_message(supervisor: &Arc<Supervisor>, instance: &Arc<Instance>, msg: FromInstance) {
    match msg {
        FromInstance::Register { routes, commands, .. } => {
            supervisor.registry.install(&instance.module_name, &routes, &commands);
            instance.set_state(InstanceState::Ready);
        }
        FromInstance::Response { id, status, content_type, payload } => {
            supervisor.correlator.complete(&id, InvokeReply { status, content_type, payload });
        }
        FromInstance::Reply { msg_id, payload, content_type } => {
            supervisor.correlator.complete(&msg_id, InvokeReply { status: None, content_type, payload });
        }
        FromInstance::Log { level, message } => {
            let module = instance.module_name.as_str();
            match level.as_str() {
                "error" => tracing::error!(target: "module", module, "{}", message),
                "warn" => tracing::warn!(target: "module", module, "{}", message),
                "debug" => tracing::debug!(target: "module", module, "{}", message),
                _ => tracing::info!(target: "module", module, "{}", message),
            }
        }
        FromInstance::IntermoduleMessage { to, id, payload, is_result, shard_key } => {
            if is_result {
                supervisor.bus.deliver_result(&id, payload).await;
            } else {
                supervisor
                    .bus
                    .forward_request(supervisor, instance.clone(), &to, id, payload, shard_key.as_deref())
                    .await;
            }
        }
        FromInstance::DatabaseQuery { id, payload } => {
            match supervisor.run_database_query(&payload).await {
                Ok(rows) => {
                    let _ = instance.send(FromCore::DatabaseResult { id, payload: rows }).await;
                }
                Err(message) => {
                    let _ = instance
                        .send(FromCore::DatabaseError { id, payload: json!({"error": message}) })
                        .await;
                }
            }
        }
        FromInstance::SendToClient { client_id, payload } => {
            let _ = supervisor.client_push_tx.send(ClientPush::SendToClient { client_id, payload });
        }
        FromInstance::BroadcastToClients { payload } => {
            let _ = supervisor.client_push_tx.send(ClientPush::BroadcastToClients { payload });
        }
        FromInstance::DisconnectClient { client_id } => {
            let _ = supervisor.client_push_tx.send(ClientPush::DisconnectClient { client_id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fake_instance(module: &str, id: &str) -> Arc<Instance> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(Instance {
            module_name: module.to_string(),
            instance_id: id.to_string(),
            state: AtomicU8::new(InstanceState::Ready as u8),
            outbound: tx,
        })
    }

    fn fresh_supervisor() -> Supervisor {
        let registry = Arc::new(Registry::new());
        let correlator = Arc::new(Correlator::new(Duration::from_secs(1)));
        Supervisor::new(registry, correlator)
    }

    #[tokio::test]
    async fn all_live_instances_returns_every_ready_instance_not_just_one() {
        let supervisor = fresh_supervisor();
        supervisor
            .instances
            .write()
            .unwrap()
            .insert("fake".to_string(), vec![fake_instance("fake", "fake-0"), fake_instance("fake", "fake-1")]);

        assert_eq!(supervisor.all_live_instances("fake").len(), 2);
        // pick_instance, by contrast, is the load-balanced single-instance path.
        assert!(supervisor.pick_instance("fake", None).is_some());
    }

    #[tokio::test]
    async fn database_query_without_attached_pool_fails_explicitly() {
        let supervisor = fresh_supervisor();
        let err = supervisor
            .run_database_query(&json!({"op": "findUserByUsername", "username": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err, "relational store not attached");
    }

    #[tokio::test]
    async fn database_query_with_unsupported_op_fails_explicitly() {
        let supervisor = fresh_supervisor();
        let err = supervisor.run_database_query(&json!({"op": "dropTables"})).await.unwrap_err();
        assert!(err.contains("unsupported database query op"));
    }
}
