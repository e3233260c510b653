//! ERP kernel client — the capability proxy.
//!
//! A `KernelClient` is bound to one bearer credential and one default
//! process identifier for the lifetime of a process instance. From it the
//! engine derives the *only* two operations reachable from plugin code:
//!
//! - [`ActionCaller`] — `call_action(handler, params, options)`
//! - [`DatasourceFetcher`] — `fetch_datasource(entity, params)`
//!
//! Nothing else (no free HTTP, storage or UI access) crosses the plugin
//! boundary; this is an isolation invariant, not an optimization.

use crate::config::EngineConfig;
use crate::errors::KernelError;
use serde_json::{Value, json};
use std::sync::Arc;

/// Fixed control field injected into every action body.
const BUTTON_VALUE: &str = "DONE";

/// Per-call options for [`KernelClient::call_action`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Flatten params into the request body instead of nesting them under
    /// `_params`.
    pub top_level: bool,
    /// Optional `_entityName` body field.
    pub entity_name: Option<String>,
    /// Override the client's default process identifier for this call.
    pub process_id: Option<String>,
}

/// HTTP client for the ERP kernel and datasource endpoints.
#[derive(Debug)]
pub struct KernelClient {
    http: reqwest::Client,
    kernel_url: String,
    datasource_url: String,
    token: String,
    process_id: String,
}

impl KernelClient {
    /// Bind a client to a credential token and a default process id.
    pub fn new(config: &EngineConfig, token: impl Into<String>, process_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            kernel_url: config.kernel_url(),
            datasource_url: config.datasource_url(),
            token: token.into(),
            process_id: process_id.into(),
        }
    }

    /// Invoke an action handler on the kernel endpoint.
    ///
    /// Posts to `<kernel>?processId=<id>&_action=<handler>` with the body
    /// built by [`build_action_body`]. Non-2xx is a hard failure.
    pub async fn call_action(
        &self,
        action_handler: &str,
        params: Value,
        options: &CallOptions,
    ) -> Result<Value, KernelError> {
        let process_id = options.process_id.as_deref().unwrap_or(&self.process_id);
        let body = build_action_body(params, options);
        let response = self
            .http
            .post(&self.kernel_url)
            .query(&[("processId", process_id), ("_action", action_handler)])
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(KernelError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(KernelError::ActionCallFailed {
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(KernelError::Decode)
    }

    /// Fetch entity records from the datasource endpoint.
    pub async fn fetch_datasource(&self, entity: &str, params: Value) -> Result<Value, KernelError> {
        let response = self
            .http
            .post(&self.datasource_url)
            .bearer_auth(&self.token)
            .json(&json!({ "entity": entity, "params": params }))
            .send()
            .await
            .map_err(KernelError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(KernelError::DatasourceFailed {
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(KernelError::Decode)
    }
}

/// Build the body for an action call.
///
/// The fixed `_buttonValue: "DONE"` control field is always injected.
/// Params nest under `_params` by default, or flatten into the body when
/// `top_level` is requested.
pub fn build_action_body(params: Value, options: &CallOptions) -> Value {
    let mut body = serde_json::Map::new();
    if options.top_level {
        if let Value::Object(map) = params {
            for (k, v) in map {
                body.insert(k, v);
            }
        }
    } else {
        body.insert("_params".to_string(), params);
    }
    body.insert("_buttonValue".to_string(), json!(BUTTON_VALUE));
    if let Some(entity) = &options.entity_name {
        body.insert("_entityName".to_string(), json!(entity));
    }
    Value::Object(body)
}

/// Capability handle exposing only `call_action`. This is what scan and
/// process plugins receive.
#[derive(Debug, Clone)]
pub struct ActionCaller {
    client: Arc<KernelClient>,
}

impl ActionCaller {
    pub fn new(client: Arc<KernelClient>) -> Self {
        Self { client }
    }

    pub async fn call_action(
        &self,
        action_handler: &str,
        params: Value,
        options: &CallOptions,
    ) -> Result<Value, KernelError> {
        self.client.call_action(action_handler, params, options).await
    }
}

/// Capability handle exposing only `fetch_datasource`. Reachable from
/// `on_load` plugins alongside [`ActionCaller`].
#[derive(Debug, Clone)]
pub struct DatasourceFetcher {
    client: Arc<KernelClient>,
}

impl DatasourceFetcher {
    pub fn new(client: Arc<KernelClient>) -> Self {
        Self { client }
    }

    pub async fn fetch_datasource(&self, entity: &str, params: Value) -> Result<Value, KernelError> {
        self.client.fetch_datasource(entity, params).await
    }
}
