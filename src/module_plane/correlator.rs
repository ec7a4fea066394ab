use crate::module_plane::ipc::InvokeReply;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// `requestId -> PendingRequest`. Exactly one of {response, timeout}
/// completes each entry; a duplicate `response` for an already-completed
/// id is silently discarded.
pub struct Correlator {
    pending: Mutex<HashMap<String, oneshot::Sender<Option<InvokeReply>>>>,
    grace: Duration,
}

impl Correlator {
    pub fn new(grace: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            grace,
        }
    }

    /// Registers a request id with an armed deadline and returns the
    /// receiving half of its reply-sink. `Ok(Some(reply))` on a matching
    /// `response`; `Ok(None)`/`Err` once the deadline fires first.
    ///
    /// Takes `self: &Arc<Self>` so the deadline timer can hold its own
    /// owning reference instead of borrowing past the call — the
    /// `Correlator` always lives behind an `Arc` via `ModulePlane`.
    pub fn register(self: &Arc<Self>, request_id: String, timeout: Duration) -> oneshot::Receiver<Option<InvokeReply>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().expect("correlator lock poisoned").insert(request_id.clone(), tx);

        let owner = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            owner.fire_timeout(&request_id);
            tokio::time::sleep(owner.grace).await;
        });

        rx
    }

    /// Fulfils a pending request. No-op (silently dropped) if
    /// the id is unknown — already completed by a timeout, or never
    /// registered.
    pub fn complete(&self, request_id: &str, reply: InvokeReply) {
        if let Some(tx) = self.pending.lock().expect("correlator lock poisoned").remove(request_id) {
            let _ = tx.send(Some(reply));
        }
    }

    fn fire_timeout(&self, request_id: &str) {
        if let Some(tx) = self.pending.lock().expect("correlator lock poisoned").remove(request_id) {
            let _ = tx.send(None);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("correlator lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn response_before_deadline_completes_with_reply() {
        let correlator = Arc::new(Correlator::new(Duration::from_millis(10)));
        let rx = correlator.register("r1".to_string(), Duration::from_secs(5));
        correlator.complete(
            "r1",
            InvokeReply {
                status: Some(200),
                content_type: None,
                payload: json!({"ok": true}),
            },
        );
        let result = rx.await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn deadline_fires_when_no_response_arrives() {
        let correlator = Arc::new(Correlator::new(Duration::from_millis(5)));
        let rx = correlator.register("r2".to_string(), Duration::from_millis(10));
        let result = rx.await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn late_response_after_timeout_is_discarded() {
        let correlator = Arc::new(Correlator::new(Duration::from_millis(5)));
        let rx = correlator.register("r3".to_string(), Duration::from_millis(10));
        let result = rx.await.unwrap();
        assert!(result.is_none());
        // A response arriving after the deadline has no pending entry to complete.
        correlator.complete(
            "r3",
            InvokeReply {
                status: Some(200),
                content_type: None,
                payload: json!({}),
            },
        );
        assert_eq!(correlator.pending_count(), 0);
    }
}
