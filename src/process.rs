//! Process executor.
//!
//! Runs the registered `on_process` plugin against the full line/box state
//! and parses its kernel response into a structured outcome. The caller is
//! expected to have satisfied the pending-lines gate before invoking
//! `execute`; the gate itself lives in the controller.

use crate::errors::EngineError;
use crate::message::parse_kernel_message;
use crate::plugin::types::{ProcessContext, ProcessInput, ProcessPlugin};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Fallback shown when `on_process` fails or times out.
const GENERIC_FAILURE_MESSAGE: &str = "Processing failed";
/// Fallback body when the backend message parses to nothing.
const EMPTY_MESSAGE_FALLBACK: &str = "Process error";

/// Severity of a process result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Success,
    Warning,
    Error,
}

impl MessageKind {
    /// Map a backend `msgType`; absent or unrecognized values default to
    /// success.
    fn from_msg_type(msg_type: Option<&str>) -> Self {
        match msg_type {
            Some("warning") => Self::Warning,
            Some("error") => Self::Error,
            _ => Self::Success,
        }
    }
}

/// The final message surfaced after a successful process run. Produced once,
/// consumed once, then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMessage {
    pub kind: MessageKind,
    pub title: String,
    pub text: String,
    pub link_tab_id: Option<String>,
    pub link_record_id: Option<String>,
}

impl ResultMessage {
    /// Whether the message carries a navigable record reference.
    pub fn has_link(&self) -> bool {
        self.link_tab_id.is_some() && self.link_record_id.is_some()
    }
}

/// Outcome of executing `on_process`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The backend accepted the process; surface the message.
    Message(ResultMessage),
    /// The backend declared an error (`msgType == "error"`).
    Error { message: String },
}

/// Executes the `on_process` plugin for one process instance.
pub struct ProcessExecutor {
    plugin: Option<Arc<dyn ProcessPlugin>>,
    timeout_secs: u64,
}

impl ProcessExecutor {
    pub fn new(plugin: Option<Arc<dyn ProcessPlugin>>, timeout_secs: u64) -> Self {
        Self {
            plugin,
            timeout_secs,
        }
    }

    /// Run `on_process` and interpret the response.
    ///
    /// `title_fallback` (the schema title) is used when the backend message
    /// carries no title of its own.
    pub async fn execute(
        &self,
        ctx: &ProcessContext,
        input: &ProcessInput,
        title_fallback: &str,
    ) -> Result<ProcessOutcome, EngineError> {
        let Some(plugin) = self.plugin.clone() else {
            return Err(EngineError::NoProcessHandler);
        };

        let evaluation = timeout(
            Duration::from_secs(self.timeout_secs),
            plugin.on_process(ctx, input),
        )
        .await;
        let data = match evaluation {
            Err(_) => {
                tracing::error!(secs = self.timeout_secs, "onProcess timed out");
                return Err(EngineError::ProcessExecutionFailed(
                    GENERIC_FAILURE_MESSAGE.to_string(),
                ));
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "onProcess failed");
                return Err(EngineError::ProcessExecutionFailed(
                    GENERIC_FAILURE_MESSAGE.to_string(),
                ));
            }
            Ok(Ok(data)) => data,
        };

        Ok(interpret_response(&data, title_fallback))
    }
}

/// Interpret a kernel process response.
///
/// The first element of `responseActions`, if present, is the message
/// action; its `showMsgInProcessView` object carries `msgType`, `msgText`
/// and `msgTitle`.
fn interpret_response(data: &Value, title_fallback: &str) -> ProcessOutcome {
    let show_msg = data
        .get("responseActions")
        .and_then(Value::as_array)
        .and_then(|actions| actions.first())
        .and_then(|action| action.get("showMsgInProcessView"));

    let msg_type = show_msg
        .and_then(|m| m.get("msgType"))
        .and_then(Value::as_str);
    let msg_text = show_msg
        .and_then(|m| m.get("msgText"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let msg_title = show_msg
        .and_then(|m| m.get("msgTitle"))
        .and_then(Value::as_str);

    if msg_type == Some("error") {
        let message = if msg_text.is_empty() {
            "Process failed".to_string()
        } else {
            msg_text.to_string()
        };
        return ProcessOutcome::Error { message };
    }

    let parsed = parse_kernel_message(msg_text);
    let text = if parsed.text.is_empty() {
        EMPTY_MESSAGE_FALLBACK.to_string()
    } else {
        parsed.text
    };
    ProcessOutcome::Message(ResultMessage {
        kind: MessageKind::from_msg_type(msg_type),
        title: msg_title.unwrap_or(title_fallback).to_string(),
        text,
        link_tab_id: parsed.tab_id,
        link_record_id: parsed.record_id,
    })
}
