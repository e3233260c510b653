//! Schema loading: evaluate `on_load` and resolve the other plugins.
//!
//! The loader is the trusted boundary in front of externally supplied load
//! logic. It invokes the registered `on_load` plugin under a bounded timeout
//! with a capability-restricted context, then validates the discriminant of
//! whatever came back.
//!
//! Absence is not failure: a process with no `on_load` registration is
//! simply not a warehouse process, and a result without the schema tag means
//! "not applicable" — both exit quietly with `None`. Only an evaluation
//! error (plugin failure, timeout, unusable tagged value) is reported, and
//! even that is surfaced to the host rather than propagated as a panic.

use super::registry::PluginRegistry;
use super::types::{LoadContext, ProcessPlugin, ScanPlugin, SelectionContext};
use crate::config::EngineConfig;
use crate::errors::LoaderError;
use crate::schema::ProcessSchema;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Evaluates `on_load` plugins and resolves scan/process registrations.
pub struct PluginLoader {
    registry: Arc<PluginRegistry>,
    timeout_secs: u64,
}

impl PluginLoader {
    pub fn new(registry: Arc<PluginRegistry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            timeout_secs: config.plugin_timeout_secs,
        }
    }

    /// Evaluate the `on_load` plugin for a process and validate its result.
    ///
    /// Returns `Ok(None)` when the process has no `on_load` registration or
    /// the result lacks the warehouse-process discriminant.
    pub async fn load_schema(
        &self,
        process_id: &str,
        ctx: &LoadContext,
        process_definition: &Value,
        selection: &SelectionContext,
    ) -> Result<Option<ProcessSchema>, LoaderError> {
        let Some(plugin) = self.registry.load_plugin(process_id) else {
            tracing::debug!(process_id, "no onLoad plugin registered, not a warehouse process");
            return Ok(None);
        };

        let evaluation = timeout(
            Duration::from_secs(self.timeout_secs),
            plugin.on_load(ctx, process_definition, selection),
        )
        .await;

        let value = match evaluation {
            Err(_) => {
                tracing::error!(process_id, secs = self.timeout_secs, "onLoad evaluation timed out");
                return Err(LoaderError::Timeout {
                    secs: self.timeout_secs,
                });
            }
            Ok(Err(e)) => {
                tracing::error!(process_id, error = %e, "onLoad evaluation failed");
                return Err(LoaderError::Evaluation(e.to_string()));
            }
            Ok(Ok(value)) => value,
        };

        let schema = ProcessSchema::from_value(value)?;
        if schema.is_none() {
            tracing::debug!(process_id, "onLoad result is not a warehouse schema, falling through");
        }
        Ok(schema)
    }

    /// Resolve the registered `on_scan` plugin. `None` means scanning is
    /// disabled for this process — the scan handler surfaces that, not us.
    pub fn resolve_scan_plugin(&self, process_id: &str) -> Option<Arc<dyn ScanPlugin>> {
        self.registry.scan_plugin(process_id)
    }

    /// Resolve the registered `on_process` plugin.
    pub fn resolve_process_plugin(&self, process_id: &str) -> Option<Arc<dyn ProcessPlugin>> {
        self.registry.process_plugin(process_id)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{ActionCaller, DatasourceFetcher, KernelClient};
    use crate::plugin::types::LoadPlugin;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use serde_json::json;

    fn load_context() -> LoadContext {
        let client = Arc::new(KernelClient::new(&EngineConfig::default(), "token", "P1"));
        LoadContext {
            call_action: ActionCaller::new(Arc::clone(&client)),
            fetch_datasource: DatasourceFetcher::new(client),
        }
    }

    struct StaticLoad(Value);

    #[async_trait]
    impl LoadPlugin for StaticLoad {
        async fn on_load(
            &self,
            _ctx: &LoadContext,
            _process_definition: &Value,
            _selection: &SelectionContext,
        ) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    struct FailingLoad;

    #[async_trait]
    impl LoadPlugin for FailingLoad {
        async fn on_load(
            &self,
            _ctx: &LoadContext,
            _process_definition: &Value,
            _selection: &SelectionContext,
        ) -> Result<Value> {
            Err(anyhow!("backend open action returned garbage"))
        }
    }

    struct HangingLoad;

    #[async_trait]
    impl LoadPlugin for HangingLoad {
        async fn on_load(
            &self,
            _ctx: &LoadContext,
            _process_definition: &Value,
            _selection: &SelectionContext,
        ) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    fn schema_value() -> Value {
        json!({
            "type": "warehouseProcess",
            "titleKey": "packing.title",
            "initialData": { "lines": [], "boxCount": 1 },
            "recordId": "R1"
        })
    }

    fn loader_with(registry: PluginRegistry) -> PluginLoader {
        PluginLoader::new(Arc::new(registry), &EngineConfig::default())
    }

    #[tokio::test]
    async fn missing_registration_exits_quietly() {
        let loader = loader_with(PluginRegistry::new());
        let result = loader
            .load_schema("P1", &load_context(), &json!({}), &SelectionContext::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn tagged_schema_is_accepted() {
        let mut registry = PluginRegistry::new();
        registry.register_load("P1", Arc::new(StaticLoad(schema_value())));
        let loader = loader_with(registry);
        let schema = loader
            .load_schema("P1", &load_context(), &json!({}), &SelectionContext::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(schema.record_id, "R1");
    }

    #[tokio::test]
    async fn foreign_value_is_not_applicable() {
        let mut registry = PluginRegistry::new();
        registry.register_load("P1", Arc::new(StaticLoad(json!({ "type": "form" }))));
        let loader = loader_with(registry);
        let result = loader
            .load_schema("P1", &load_context(), &json!({}), &SelectionContext::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn evaluation_failure_is_a_loader_error() {
        let mut registry = PluginRegistry::new();
        registry.register_load("P1", Arc::new(FailingLoad));
        let loader = loader_with(registry);
        let err = loader
            .load_schema("P1", &load_context(), &json!({}), &SelectionContext::default())
            .await
            .unwrap_err();
        match err {
            LoaderError::Evaluation(msg) => assert!(msg.contains("garbage")),
            other => panic!("Expected Evaluation error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_plugin_times_out() {
        let mut registry = PluginRegistry::new();
        registry.register_load("P1", Arc::new(HangingLoad));
        let loader = loader_with(registry);
        let err = loader
            .load_schema("P1", &load_context(), &json!({}), &SelectionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Timeout { secs: 30 }));
    }

    #[test]
    fn scan_resolution_reflects_registry() {
        let registry = PluginRegistry::new();
        let loader = loader_with(registry);
        assert!(loader.resolve_scan_plugin("P1").is_none());
        assert!(loader.resolve_process_plugin("P1").is_none());
    }
}
