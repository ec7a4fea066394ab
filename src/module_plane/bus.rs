use crate::module_plane::ipc::FromCore;
use crate::module_plane::supervisor::{Instance, Supervisor};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

/// In-process routing of module-to-module calls. Tracks which
/// instance originated each in-flight `id` so the eventual result can be
/// routed back to it — the correlator (C6) isn't reused here because the
/// round trip is instance-to-instance, not core-to-caller.
pub struct Bus {
    callers: Mutex<HashMap<String, Arc<Instance>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self {
            callers: Mutex::new(HashMap::new()),
        }
    }

    /// Forwards an `intermoduleMessage` from `caller` to its target
    /// module. Failure modes: target module not loaded, or no live
    /// instance — both get a synchronous error `mpcResponse` back to the
    /// caller instead of hanging.
    pub async fn forward_request(
        &self,
        supervisor: &Supervisor,
        caller: Arc<Instance>,
        to: &str,
        id: String,
        payload: Value,
        shard_key: Option<&str>,
    ) {
        match supervisor.pick_instance(to, shard_key) {
            Some(target) => {
                self.callers.lock().expect("bus lock poisoned").insert(id.clone(), caller);
                let _ = target.send(FromCore::McpRequest { id, payload }).await;
            }
            None => {
                let _ = caller
                    .send(FromCore::McpResponse {
                        id,
                        payload: json!({"error": format!("module '{}' is not loaded", to)}),
                    })
                    .await;
            }
        }
    }

    /// Delivers a target module's `intermoduleMessage{isResult: true}`
    /// back to whichever instance originated the matching `id`. An
    /// unknown id (already delivered, or never forwarded) is dropped.
    pub async fn deliver_result(&self, id: &str, payload: Value) {
        let caller = self.callers.lock().expect("bus lock poisoned").remove(id);
        if let Some(caller) = caller {
            let _ = caller
                .send(FromCore::McpResponse {
                    id: id.to_string(),
                    payload,
                })
                .await;
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
