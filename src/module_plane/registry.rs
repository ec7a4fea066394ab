use crate::module_plane::ipc::{CommandReg, RouteReg};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: String,
    pub path: String,
    pub module_name: String,
    pub handler_id: String,
    pub requires_auth: bool,
}

#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub full_name: String,
    pub module_name: String,
    pub handler_id: String,
    pub broadcast: bool,
    pub requires_auth: bool,
}

/// The process-wide HTTP route and WS command tables. Reads never
/// observe a torn view — every mutation replaces one module's slice under
/// a single write-lock acquisition.
pub struct Registry {
    routes: RwLock<HashMap<(String, String), RouteEntry>>,
    commands: RwLock<HashMap<String, CommandEntry>>,
    module_route_keys: RwLock<HashMap<String, Vec<(String, String)>>>,
    module_command_keys: RwLock<HashMap<String, Vec<String>>>,
}

/// External URL prefix for a module name: `foo` -> `/foo`, `@ns/foo` -> `/@ns/foo`.
pub fn url_prefix(module_name: &str) -> String {
    format!("/{}", module_name)
}

impl Registry {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            commands: RwLock::new(HashMap::new()),
            module_route_keys: RwLock::new(HashMap::new()),
            module_command_keys: RwLock::new(HashMap::new()),
        }
    }

    /// Installs a `register` message's routes/commands for one module
    /// instance. Idempotent per `(moduleName, path, method)` and per
    /// command name — a later registration within the same instance
    /// replaces an earlier one.
    pub fn install(&self, module_name: &str, routes: &[RouteReg], commands: &[CommandReg]) {
        let mut route_table = self.routes.write().expect("registry lock poisoned");
        let mut route_keys = self.module_route_keys.write().expect("registry lock poisoned");
        let keys = route_keys.entry(module_name.to_string()).or_default();
        for r in routes {
            let full_path = format!("{}{}", url_prefix(module_name), r.path);
            let key = (r.method.to_uppercase(), full_path.clone());
            route_table.insert(
                key.clone(),
                RouteEntry {
                    method: r.method.to_uppercase(),
                    path: full_path,
                    module_name: module_name.to_string(),
                    handler_id: r.handler_id.clone(),
                    requires_auth: r.requires_auth,
                },
            );
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let mut cmd_table = self.commands.write().expect("registry lock poisoned");
        let mut cmd_keys = self.module_command_keys.write().expect("registry lock poisoned");
        let ckeys = cmd_keys.entry(module_name.to_string()).or_default();
        for c in commands {
            let full_name = format!("{}.{}", module_name, c.name);
            cmd_table.insert(
                full_name.clone(),
                CommandEntry {
                    full_name: full_name.clone(),
                    module_name: module_name.to_string(),
                    handler_id: c.handler_id.clone(),
                    broadcast: c.broadcast,
                    requires_auth: c.requires_auth,
                },
            );
            if !ckeys.contains(&full_name) {
                ckeys.push(full_name);
            }
        }
    }

    /// Removes every route/command owned by `module_name` — called by C2
    /// cleanup once the module has no live instances left.
    pub fn remove_module(&self, module_name: &str) {
        if let Some(keys) = self.module_route_keys.write().expect("registry lock poisoned").remove(module_name) {
            let mut route_table = self.routes.write().expect("registry lock poisoned");
            for key in keys {
                route_table.remove(&key);
            }
        }
        if let Some(keys) = self.module_command_keys.write().expect("registry lock poisoned").remove(module_name) {
            let mut cmd_table = self.commands.write().expect("registry lock poisoned");
            for key in keys {
                cmd_table.remove(&key);
            }
        }
    }

    pub fn lookup_route(&self, method: &str, path: &str) -> Option<RouteEntry> {
        self.routes
            .read()
            .expect("registry lock poisoned")
            .get(&(method.to_uppercase(), path.to_string()))
            .cloned()
    }

    pub fn lookup_command(&self, full_name: &str) -> Option<CommandEntry> {
        self.commands
            .read()
            .expect("registry lock poisoned")
            .get(full_name)
            .cloned()
    }

    pub fn list_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .module_route_keys
            .read()
            .expect("registry lock poisoned")
            .keys()
            .chain(self.module_command_keys.read().expect("registry lock poisoned").keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str, handler: &str) -> RouteReg {
        RouteReg {
            method: "GET".to_string(),
            path: path.to_string(),
            handler_id: handler.to_string(),
            requires_auth: false,
        }
    }

    #[test]
    fn register_then_lookup_returns_the_registered_handler_id() {
        let registry = Registry::new();
        registry.install("fake", &[route("/ping", "h1")], &[]);
        let entry = registry.lookup_route("GET", "/fake/ping").unwrap();
        assert_eq!(entry.handler_id, "h1");
    }

    #[test]
    fn later_registration_replaces_earlier_one() {
        let registry = Registry::new();
        registry.install("fake", &[route("/ping", "h1")], &[]);
        registry.install("fake", &[route("/ping", "h2")], &[]);
        let entry = registry.lookup_route("GET", "/fake/ping").unwrap();
        assert_eq!(entry.handler_id, "h2");
    }

    #[test]
    fn remove_module_clears_its_routes_and_commands() {
        let registry = Registry::new();
        registry.install("fake", &[route("/ping", "h1")], &[]);
        registry.remove_module("fake");
        assert!(registry.lookup_route("GET", "/fake/ping").is_none());
    }
}
