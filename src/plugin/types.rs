//! Plugin contracts and the contexts they execute against.
//!
//! Each context carries exactly the capabilities its contract allows:
//! `on_load` gets both kernel calls, `on_scan` and `on_process` get only
//! the action caller.

use crate::kernel::{ActionCaller, DatasourceFetcher};
use crate::state::Line;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Execution context for [`LoadPlugin::on_load`].
#[derive(Clone)]
pub struct LoadContext {
    pub call_action: ActionCaller,
    pub fetch_datasource: DatasourceFetcher,
}

/// The records selected in the host grid when the process was launched.
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    pub selected_records: Vec<Value>,
}

impl SelectionContext {
    pub fn new(selected_records: Vec<Value>) -> Self {
        Self { selected_records }
    }

    /// Id of the first selected record, if any — the record most `on_load`
    /// implementations operate on.
    pub fn first_record_id(&self) -> Option<&str> {
        self.selected_records
            .first()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
    }
}

/// Produces the workflow schema for a process, or any other value to signal
/// "not a warehouse process".
#[async_trait]
pub trait LoadPlugin: Send + Sync {
    async fn on_load(
        &self,
        ctx: &LoadContext,
        process_definition: &Value,
        selection: &SelectionContext,
    ) -> Result<Value>;
}

/// Execution context for [`ScanPlugin::on_scan`]: the scanned code, the
/// quantity entered by the operator, the current box, a snapshot of the
/// lines, and the action capability.
#[derive(Clone)]
pub struct ScanContext {
    pub barcode: String,
    pub qty: f64,
    pub current_box: u32,
    pub lines: Vec<Line>,
    pub call_action: ActionCaller,
}

/// A successful scan resolution: which line to update and by how much.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMatch {
    /// Field name to match a line on (e.g. `shipmentLineId`, `productId`).
    pub match_field: String,
    /// Value to match against, string-compared.
    pub match_value: String,
    /// Quantity to add to the matched line's current box.
    pub qty: f64,
    /// Backend-normalized code to record in the scan log. Falls back to the
    /// raw operator input when absent.
    pub scanned_code: Option<String>,
}

/// Outcome of a scan: a line match or a rejection. Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Match(ScanMatch),
    /// The scan failed; `message` overrides the generic fallback when set.
    Rejected { message: Option<String> },
}

impl ScanOutcome {
    pub fn rejected() -> Self {
        Self::Rejected { message: None }
    }

    pub fn rejected_with(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: Some(message.into()),
        }
    }
}

/// Maps a scanned code to a line match and quantity delta.
#[async_trait]
pub trait ScanPlugin: Send + Sync {
    async fn on_scan(&self, ctx: &ScanContext) -> Result<ScanOutcome>;
}

/// Execution context for [`ProcessPlugin::on_process`]: only the action
/// capability.
#[derive(Clone)]
pub struct ProcessContext {
    pub call_action: ActionCaller,
}

/// The full line/box state handed to `on_process` for finalization.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInput {
    pub lines: Vec<Line>,
    pub box_count: u32,
    pub record_id: String,
    pub window_id: Option<String>,
    pub calculate_weight: bool,
}

/// Finalizes the workflow against the backend. Returns the raw kernel
/// response, whose optional `responseActions` array the executor interprets.
#[async_trait]
pub trait ProcessPlugin: Send + Sync {
    async fn on_process(&self, ctx: &ProcessContext, input: &ProcessInput) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selection_context_first_record_id() {
        let selection = SelectionContext::new(vec![json!({ "id": "R1" }), json!({ "id": "R2" })]);
        assert_eq!(selection.first_record_id(), Some("R1"));
        assert_eq!(SelectionContext::default().first_record_id(), None);
        let no_id = SelectionContext::new(vec![json!({ "name": "x" })]);
        assert_eq!(no_id.first_record_id(), None);
    }

    #[test]
    fn scan_outcome_constructors() {
        assert_eq!(ScanOutcome::rejected(), ScanOutcome::Rejected { message: None });
        assert_eq!(
            ScanOutcome::rejected_with("Unknown barcode"),
            ScanOutcome::Rejected {
                message: Some("Unknown barcode".to_string())
            }
        );
    }

    #[test]
    fn process_input_serializes_camel_case() {
        let input = ProcessInput {
            lines: Vec::new(),
            box_count: 2,
            record_id: "REC".to_string(),
            window_id: Some("W1".to_string()),
            calculate_weight: true,
        };
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value["boxCount"], 2);
        assert_eq!(value["recordId"], "REC");
        assert_eq!(value["windowId"], "W1");
        assert_eq!(value["calculateWeight"], true);
    }
}
