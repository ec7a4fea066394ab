pub mod balancer;
pub mod bus;
pub mod correlator;
pub mod ipc;
pub mod manifest;
pub mod registry;
pub mod supervisor;

use crate::config::Config;
use crate::db::models::Identity;
use crate::error::{AppError, AppResult};
use correlator::Correlator;
use registry::Registry;
use std::sync::Arc;
use std::time::Duration;
use supervisor::Supervisor;

/// Top-level handle composing C1/C2/C4/C5/C6/C9. Cloned cheaply (every
/// field is itself an `Arc`-backed owner) and shared across the HTTP/WS
/// surfaces as part of `AppState`.
#[derive(Clone)]
pub struct ModulePlane {
    pub registry: Arc<Registry>,
    pub correlator: Arc<Correlator>,
    pub supervisor: Arc<Supervisor>,
    request_timeout: Duration,
    multipart_timeout: Duration,
}

impl ModulePlane {
    /// Boots the Module Plane: scans manifests (C1), topologically sorts
    /// them, then spawns instances strictly in that order (C2). A fatal
    /// boot error (cycle, missing manifest reached by traversal) aborts
    /// the whole boot — the caller should exit non-zero.
    pub async fn boot(config: &Config) -> AppResult<Self> {
        let settings = config.load_module_plane_settings();
        let scan = manifest::scan(&config.modules_root_path())
            .map_err(|e| AppError::BootFatal(format!("manifest scan failed: {}", e)))?;
        let plan = manifest::topological_sort(&scan)?;

        if !plan.skipped.is_empty() {
            for name in &plan.skipped {
                tracing::warn!(module = %name, "module skipped: unresolved dependency");
            }
        }

        let registry = Arc::new(Registry::new());
        let correlator = Arc::new(Correlator::new(Duration::from_secs(config.correlator_grace_secs)));
        let supervisor = Arc::new(Supervisor::new(registry.clone(), correlator.clone()));

        for name in &plan.sorted {
            let manifest = scan.manifests.get(name).expect("sorted name must be a scanned manifest");
            let instance_count = settings
                .load_balancing
                .get(name)
                .copied()
                .unwrap_or(1)
                .max(1);
            supervisor.load_module(manifest.clone(), instance_count).await;
        }

        Ok(Self {
            registry,
            correlator,
            supervisor,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            multipart_timeout: Duration::from_secs(config.multipart_timeout_secs),
        })
    }

    /// Wires the relational store into the Instance Supervisor for the
    /// `databaseQuery` IPC proxy — separate from `boot` so the Module
    /// Plane itself stays testable without a live database.
    pub fn attach_db(&self, pool: crate::db::DbPool) {
        self.supervisor.attach_db(pool);
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn multipart_timeout(&self) -> Duration {
        self.multipart_timeout
    }

    /// Dispatches an HTTP invocation through the load balancer, IPC transport, and correlator.
    pub async fn invoke_http(
        &self,
        module: &str,
        handler_id: &str,
        shard_key: Option<&str>,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> AppResult<ipc::InvokeReply> {
        let instance = self
            .supervisor
            .pick_instance(module, shard_key)
            .ok_or_else(|| AppError::ModuleUnavailable {
                module: module.to_string(),
            })?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let rx = self.correlator.register(request_id.clone(), timeout);

        instance
            .send(ipc::FromCore::Invoke {
                id: request_id.clone(),
                handler_id: handler_id.to_string(),
                payload,
            })
            .await
            .map_err(|_| AppError::ModuleUnavailable {
                module: module.to_string(),
            })?;

        match rx.await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) | Err(_) => Err(AppError::RequestTimeout),
        }
    }

    pub fn identity_shard_key(identity: Option<&Identity>) -> Option<String> {
        identity.map(|i| i.user_id.to_string())
    }
}
