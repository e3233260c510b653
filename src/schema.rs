//! Declarative description of a warehouse workflow instance.
//!
//! A `ProcessSchema` is produced once per process invocation by evaluating
//! the registered `on_load` plugin. It is immutable thereafter: the schema
//! tells the host what to render (title, input bar, grid columns), which
//! features are active, and carries the initial line/box data the state
//! machine starts from.
//!
//! Field names follow the backend wire format (camelCase JSON).

use crate::errors::LoaderError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminator literal a schema value must carry. Any other value returned
/// by `on_load` means "not a warehouse process".
pub const SCHEMA_TAG: &str = "warehouseProcess";

/// Elements that can appear in the top input bar, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputBarElement {
    BoxSelector,
    AddBox,
    Qty,
    Barcode,
    CheckCalculate,
}

/// Cell alignment for a grid column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Right,
    Center,
}

/// One column definition for the line grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridColumn {
    /// Field name in the line data object.
    pub field: String,
    /// Display label reference resolved by the host.
    pub label_key: String,
    /// Whether this column is editable inline.
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub align: Alignment,
    /// Whether to show this column (defaults to true).
    #[serde(default = "default_true")]
    pub visible: bool,
}

/// Feature flags controlling engine behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    /// Whether boxes can be added dynamically (default: true).
    #[serde(default = "default_true")]
    pub dynamic_boxes: bool,
    /// Whether the calculate-weight toggle is offered (default: false).
    #[serde(default)]
    pub calculate_weight: bool,
    /// Whether to keep a per-line log of scanned inputs (default: false,
    /// used in picking).
    #[serde(default)]
    pub track_scanned_inputs: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            dynamic_boxes: true,
            calculate_weight: false,
            track_scanned_inputs: false,
        }
    }
}

/// Initial line/box data returned by the backend open action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialData {
    #[serde(default)]
    pub lines: Vec<LineRecord>,
    #[serde(default = "default_box_count")]
    pub box_count: u32,
    #[serde(default)]
    pub window_id: Option<String>,
    /// Seeds the calculate-weight toggle.
    #[serde(default)]
    pub valuecheck: Option<bool>,
}

/// A raw line as delivered by the backend. Known quantity fields are typed;
/// everything else (including pre-seeded `box{N}` values) stays in `extra`
/// so scan plugins can match on arbitrary fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRecord {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub shipment_line_id: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub qty_verified: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The schema for one workflow instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSchema {
    /// Discriminator, always [`SCHEMA_TAG`].
    #[serde(rename = "type")]
    pub tag: String,
    /// Display title reference for the modal header.
    pub title_key: String,
    /// Input bar elements in render order.
    #[serde(default)]
    pub input_bar: Vec<InputBarElement>,
    /// Column definitions for the grid.
    #[serde(default)]
    pub grid_columns: Vec<GridColumn>,
    #[serde(default)]
    pub features: Features,
    pub initial_data: InitialData,
    /// The backend record this instance operates on.
    pub record_id: String,
}

fn default_true() -> bool {
    true
}

fn default_box_count() -> u32 {
    1
}

impl ProcessSchema {
    /// Interpret an `on_load` result value.
    ///
    /// Returns `Ok(None)` when the value does not carry the warehouse-process
    /// discriminant — that is "not applicable", not an error. A value with
    /// the right tag that fails validation is a loader error.
    pub fn from_value(value: Value) -> Result<Option<Self>, LoaderError> {
        match value.get("type").and_then(Value::as_str) {
            Some(tag) if tag == SCHEMA_TAG => {}
            _ => return Ok(None),
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| LoaderError::InvalidSchema(e.to_string()))
    }

    /// Whether the grid exposes an editable `qtyVerified` column instead of
    /// per-box cells (picking layout).
    pub fn has_editable_verified_column(&self) -> bool {
        self.grid_columns
            .iter()
            .any(|c| c.field == "qtyVerified" && c.editable)
    }
}
