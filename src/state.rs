//! Line/box state machine.
//!
//! Holds the mutable in-memory model for one open process instance: an
//! ordered list of lines, each with per-box quantities, plus the shared box
//! count and the currently selected box. All quantity recomputation runs
//! through the operations defined here; callers never touch derived fields
//! directly.
//!
//! Invariants, enforced after every mutation:
//! - `qty_pending = quantity - qty_verified`
//! - with dynamic boxes, `qty_verified = boxed = Σ boxes`
//! - the box count never decreases (removal is intentionally unsupported)

use crate::schema::{Features, LineRecord, ProcessSchema};
use serde::Serialize;
use serde_json::Value;

/// One entry in a line's scanned-input log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedInput {
    pub code: String,
    pub qty: f64,
}

/// One shippable unit tracked through the workflow.
///
/// Identity fields and `quantity` are immutable for the life of the line;
/// `qty_verified`, `qty_pending` and `boxed` are derived. Per-box quantities
/// live in an ordered vector indexed by box number (1-based through the
/// accessors), replacing the backend's dynamic `box{N}` attributes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub product_id: String,
    pub shipment_line_id: String,
    /// Target quantity.
    pub quantity: f64,
    pub qty_verified: f64,
    pub qty_pending: f64,
    pub boxed: f64,
    boxes: Vec<f64>,
    pub scanned_inputs: Vec<ScannedInput>,
    /// Backend fields not modeled here, kept for match-field lookup.
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

impl Line {
    /// Build a line from a backend record, seeding per-box quantities from
    /// any `box{N}` attributes the record carries.
    pub fn from_record(record: LineRecord, box_count: u32) -> Self {
        let mut boxes = vec![0.0; box_count as usize];
        for (i, slot) in boxes.iter_mut().enumerate() {
            if let Some(v) = record.extra.get(&format!("box{}", i + 1)).and_then(Value::as_f64) {
                *slot = v;
            }
        }
        let seeded: f64 = boxes.iter().sum();
        let qty_verified = if seeded != 0.0 {
            seeded
        } else {
            record.qty_verified
        };
        Self {
            product_id: record.product_id,
            shipment_line_id: record.shipment_line_id,
            quantity: record.quantity,
            qty_verified,
            qty_pending: record.quantity - qty_verified,
            boxed: seeded,
            boxes,
            scanned_inputs: Vec::new(),
            extra: record.extra,
        }
    }

    /// Quantity assigned to box `n` (1-based). Zero for out-of-range boxes.
    pub fn get_box(&self, n: u32) -> f64 {
        if n == 0 {
            return 0.0;
        }
        self.boxes.get(n as usize - 1).copied().unwrap_or(0.0)
    }

    fn set_box(&mut self, n: u32, value: f64) {
        if n == 0 {
            return;
        }
        if let Some(slot) = self.boxes.get_mut(n as usize - 1) {
            *slot = value;
        }
    }

    fn push_box(&mut self) {
        self.boxes.push(0.0);
    }

    pub fn box_quantities(&self) -> &[f64] {
        &self.boxes
    }

    /// Recompute the derived fields from the box quantities.
    fn recompute_from_boxes(&mut self) {
        let total: f64 = self.boxes.iter().sum();
        self.boxed = total;
        self.qty_verified = total;
        self.qty_pending = self.quantity - total;
    }

    /// Stringified value of a field, for scan-match comparison. Known typed
    /// fields first, then the raw backend extras.
    pub fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "productId" => Some(self.product_id.clone()),
            "shipmentLineId" => Some(self.shipment_line_id.clone()),
            "quantity" => Some(display_number(self.quantity)),
            "qtyVerified" => Some(display_number(self.qty_verified)),
            "qtyPending" => Some(display_number(self.qty_pending)),
            "boxed" => Some(display_number(self.boxed)),
            _ => self.extra.get(field).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            }),
        }
    }

    /// A line is complete when nothing is pending and something was packed
    /// or verified.
    pub fn is_complete(&self) -> bool {
        self.qty_pending == 0.0 && (self.qty_verified > 0.0 || self.boxed > 0.0)
    }

    /// A line is over when more was verified than requested.
    pub fn is_over(&self) -> bool {
        self.qty_pending < 0.0 || self.qty_verified > self.quantity
    }
}

fn display_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// The mutable model for one open process instance.
#[derive(Debug, Clone)]
pub struct LineBoxState {
    lines: Vec<Line>,
    box_count: u32,
    current_box: u32,
    features: Features,
    record_id: String,
    window_id: Option<String>,
}

impl LineBoxState {
    /// Initialize from a schema: lines from `initialData.lines`, box count
    /// clamped to at least one, current box reset to the first.
    pub fn initialize(schema: &ProcessSchema) -> Self {
        let box_count = schema.initial_data.box_count.max(1);
        let lines = schema
            .initial_data
            .lines
            .iter()
            .cloned()
            .map(|record| Line::from_record(record, box_count))
            .collect();
        Self {
            lines,
            box_count,
            current_box: 1,
            features: schema.features,
            record_id: schema.record_id.clone(),
            window_id: schema.initial_data.window_id.clone(),
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn box_count(&self) -> u32 {
        self.box_count
    }

    pub fn current_box(&self) -> u32 {
        self.current_box
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn window_id(&self) -> Option<&str> {
        self.window_id.as_deref()
    }

    /// Add one box: every line gains a zero-valued slot and the new box
    /// becomes current. No-op when dynamic boxes are disabled.
    pub fn add_box(&mut self) -> bool {
        if !self.features.dynamic_boxes {
            return false;
        }
        self.box_count += 1;
        for line in &mut self.lines {
            line.push_box();
        }
        self.current_box = self.box_count;
        true
    }

    /// Move the current-box selector, clamped to `1..=box_count`.
    pub fn select_box(&mut self, n: u32) {
        self.current_box = n.clamp(1, self.box_count);
    }

    /// Apply a validated scan: add `qty` to the current box of the first
    /// line whose `match_field` equals `match_value` (string-compared).
    ///
    /// A miss is a no-op — the scan protocol already validated the code, so
    /// no match here means stale state, not a user-facing error. Returns
    /// whether a line was updated.
    pub fn apply_scan(
        &mut self,
        match_field: &str,
        match_value: &str,
        qty: f64,
        scanned_code: &str,
    ) -> bool {
        let current_box = self.current_box;
        let track = self.features.track_scanned_inputs;
        let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.field_value(match_field).as_deref() == Some(match_value))
        else {
            return false;
        };
        let updated = line.get_box(current_box) + qty;
        line.set_box(current_box, updated);
        line.recompute_from_boxes();
        if track {
            line.scanned_inputs.push(ScannedInput {
                code: scanned_code.to_string(),
                qty,
            });
        }
        true
    }

    /// Overwrite one box cell (manual grid edit) and recompute the line.
    /// Out-of-range indices are ignored, matching the stale-edit tolerance
    /// of `apply_scan`.
    pub fn set_box_qty(&mut self, line_index: usize, box_number: u32, value: f64) {
        if box_number == 0 || box_number > self.box_count {
            return;
        }
        if let Some(line) = self.lines.get_mut(line_index) {
            line.set_box(box_number, value);
            line.recompute_from_boxes();
        }
    }

    /// Overwrite a line's verified quantity directly. Used when the grid
    /// exposes an editable `qtyVerified` column instead of per-box cells.
    ///
    /// When input tracking is on, the log grows by one entry with an empty
    /// code for a positive delta, and shrinks entry-by-entry for a negative
    /// one, never below zero entries.
    pub fn set_verified_qty(&mut self, line_index: usize, value: f64) {
        let track = self.features.track_scanned_inputs;
        let Some(line) = self.lines.get_mut(line_index) else {
            return;
        };
        let delta = value - line.qty_verified;
        line.qty_verified = value;
        line.qty_pending = line.quantity - value;
        if track {
            if delta > 0.0 {
                line.scanned_inputs.push(ScannedInput {
                    code: String::new(),
                    qty: delta,
                });
            } else if delta < 0.0 {
                let mut remaining = -delta;
                while remaining > 0.0 && !line.scanned_inputs.is_empty() {
                    line.scanned_inputs.pop();
                    remaining -= 1.0;
                }
            }
        }
    }

    /// Lines with unreconciled quantity (`qty_pending != 0`).
    pub fn pending_lines(&self) -> Vec<&Line> {
        self.lines.iter().filter(|l| l.qty_pending != 0.0).collect()
    }

    pub fn has_pending(&self) -> bool {
        self.lines.iter().any(|l| l.qty_pending != 0.0)
    }
}
