//! Registry associating process identifiers with plugin implementations.
//!
//! The registry is an explicit object passed by injection — components never
//! reach for a module-level singleton. A process may register any subset of
//! the three plugins; the loader and handlers treat absence per their own
//! contracts (quiet fall-through, disabled scanning, or a surfaced
//! configuration error).

use super::types::{LoadPlugin, ProcessPlugin, ScanPlugin};
use std::collections::HashMap;
use std::sync::Arc;

/// Plugins registered for one process identifier.
#[derive(Clone, Default)]
pub struct PluginSet {
    pub on_load: Option<Arc<dyn LoadPlugin>>,
    pub on_scan: Option<Arc<dyn ScanPlugin>>,
    pub on_process: Option<Arc<dyn ProcessPlugin>>,
}

/// Keyed plugin registry.
#[derive(Default)]
pub struct PluginRegistry {
    entries: HashMap<String, PluginSet>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_load(&mut self, process_id: impl Into<String>, plugin: Arc<dyn LoadPlugin>) {
        self.entries.entry(process_id.into()).or_default().on_load = Some(plugin);
    }

    pub fn register_scan(&mut self, process_id: impl Into<String>, plugin: Arc<dyn ScanPlugin>) {
        self.entries.entry(process_id.into()).or_default().on_scan = Some(plugin);
    }

    pub fn register_process(
        &mut self,
        process_id: impl Into<String>,
        plugin: Arc<dyn ProcessPlugin>,
    ) {
        self.entries.entry(process_id.into()).or_default().on_process = Some(plugin);
    }

    pub fn load_plugin(&self, process_id: &str) -> Option<Arc<dyn LoadPlugin>> {
        self.entries.get(process_id)?.on_load.clone()
    }

    pub fn scan_plugin(&self, process_id: &str) -> Option<Arc<dyn ScanPlugin>> {
        self.entries.get(process_id)?.on_scan.clone()
    }

    pub fn process_plugin(&self, process_id: &str) -> Option<Arc<dyn ProcessPlugin>> {
        self.entries.get(process_id)?.on_process.clone()
    }

    pub fn has_scan_plugin(&self, process_id: &str) -> bool {
        self.entries
            .get(process_id)
            .is_some_and(|set| set.on_scan.is_some())
    }

    /// Process identifiers with at least one registered plugin.
    pub fn registered_processes(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}
