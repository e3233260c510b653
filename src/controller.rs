//! Process controller — the host-facing orchestration surface.
//!
//! One controller owns one open process instance: the immutable schema, the
//! line/box state machine, the scan handler, the process executor, and the
//! dialog/result slots the host renders from. User interaction events map
//! one-to-one onto controller methods.
//!
//! Serialization of asynchronous operations is explicit here: a single-slot
//! busy flag rejects a second scan or confirm while one is in flight with
//! `OperationInFlight`, instead of relying on the host to disable its
//! controls.

use crate::errors::{EngineError, LoaderError};
use crate::kernel::{ActionCaller, DatasourceFetcher, KernelClient};
use crate::plugin::loader::PluginLoader;
use crate::plugin::types::{LoadContext, ProcessContext, ProcessInput, SelectionContext};
use crate::process::{ProcessExecutor, ProcessOutcome, ResultMessage};
use crate::scan::{ScanFeedback, ScanHandler};
use crate::schema::ProcessSchema;
use crate::state::LineBoxState;
use serde_json::Value;
use std::sync::Arc;

/// Message shown by the pending-lines gate.
const PENDING_LINES_MESSAGE: &str = "There are lines with pending quantity to pack";

/// Confirm dialog state. A single instance is active at a time and it is
/// reset to closed on every dismissal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDialogState {
    pub open: bool,
    pub message: String,
}

impl ConfirmDialogState {
    pub fn closed() -> Self {
        Self {
            open: false,
            message: String::new(),
        }
    }
}

impl Default for ConfirmDialogState {
    fn default() -> Self {
        Self::closed()
    }
}

/// Clears the in-flight flag on drop, so an operation future dropped
/// mid-await (host-side timeout, `select!`) cannot wedge the controller.
struct BusyGuard<'a>(&'a mut bool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Controller for one open warehouse-process instance.
pub struct ProcessController {
    schema: ProcessSchema,
    state: LineBoxState,
    scan: ScanHandler,
    executor: ProcessExecutor,
    call_action: ActionCaller,
    confirm_dialog: ConfirmDialogState,
    result: Option<ResultMessage>,
    last_error: Option<String>,
    calculate_weight: bool,
    busy: bool,
}

impl ProcessController {
    /// Load the schema for `process_id` and build a controller.
    ///
    /// Returns `Ok(None)` when the process is not a warehouse process (no
    /// `on_load` registration, or its result was not applicable) — the host
    /// falls through to its normal rendering. Loader errors are surfaced to
    /// the caller but are not fatal to the host page.
    pub async fn open(
        loader: &PluginLoader,
        process_id: &str,
        kernel: Arc<KernelClient>,
        process_definition: &Value,
        selection: &SelectionContext,
    ) -> Result<Option<Self>, LoaderError> {
        let ctx = LoadContext {
            call_action: ActionCaller::new(Arc::clone(&kernel)),
            fetch_datasource: DatasourceFetcher::new(Arc::clone(&kernel)),
        };
        let Some(schema) = loader
            .load_schema(process_id, &ctx, process_definition, selection)
            .await?
        else {
            return Ok(None);
        };

        let scan = ScanHandler::new(loader.resolve_scan_plugin(process_id), loader.timeout_secs());
        let executor = ProcessExecutor::new(
            loader.resolve_process_plugin(process_id),
            loader.timeout_secs(),
        );
        Ok(Some(Self::new(
            schema,
            scan,
            executor,
            ActionCaller::new(kernel),
        )))
    }

    /// Build a controller from already-resolved parts.
    pub fn new(
        schema: ProcessSchema,
        scan: ScanHandler,
        executor: ProcessExecutor,
        call_action: ActionCaller,
    ) -> Self {
        let state = LineBoxState::initialize(&schema);
        let calculate_weight = schema.initial_data.valuecheck.unwrap_or(false);
        Self {
            schema,
            state,
            scan,
            executor,
            call_action,
            confirm_dialog: ConfirmDialogState::closed(),
            result: None,
            last_error: None,
            calculate_weight,
            busy: false,
        }
    }

    pub fn schema(&self) -> &ProcessSchema {
        &self.schema
    }

    pub fn state(&self) -> &LineBoxState {
        &self.state
    }

    pub fn confirm_dialog(&self) -> &ConfirmDialogState {
        &self.confirm_dialog
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn calculate_weight(&self) -> bool {
        self.calculate_weight
    }

    pub fn set_calculate_weight(&mut self, enabled: bool) {
        self.calculate_weight = enabled;
    }

    /// Add a box and make it current. No-op when dynamic boxes are off.
    pub fn add_box(&mut self) -> bool {
        self.state.add_box()
    }

    /// Move the box selector.
    pub fn select_box(&mut self, n: u32) {
        self.state.select_box(n);
    }

    /// Manual edit of one box cell.
    pub fn edit_box_qty(&mut self, line_index: usize, box_number: u32, value: f64) {
        self.state.set_box_qty(line_index, box_number, value);
    }

    /// Manual edit of the editable `qtyVerified` column.
    pub fn edit_verified_qty(&mut self, line_index: usize, value: f64) {
        self.state.set_verified_qty(line_index, value);
    }

    /// Validate a scanned code.
    ///
    /// Scan failures become the dismissible `last_error`; the returned
    /// feedback tells the host whether to clear its inputs. Only a
    /// concurrent operation is a hard error.
    pub async fn validate_scan(
        &mut self,
        barcode: &str,
        qty: f64,
    ) -> Result<ScanFeedback, EngineError> {
        if self.busy {
            return Err(EngineError::OperationInFlight);
        }
        self.busy = true;
        self.last_error = None;
        let _busy = BusyGuard(&mut self.busy);
        let result = self
            .scan
            .validate(&mut self.state, barcode, qty, self.call_action.clone())
            .await;
        match result {
            Ok(feedback) => Ok(feedback),
            Err(EngineError::OperationInFlight) => Err(EngineError::OperationInFlight),
            Err(e) => {
                self.last_error = Some(e.to_string());
                Ok(ScanFeedback::Ignored)
            }
        }
    }

    /// Confirm the process.
    ///
    /// The pending-lines gate runs first: if any line has nonzero pending
    /// quantity the confirm dialog opens and nothing executes. Otherwise
    /// `on_process` runs; its message lands in the one-shot result slot and
    /// failures land in `last_error`.
    pub async fn confirm(&mut self) -> Result<(), EngineError> {
        if self.busy {
            return Err(EngineError::OperationInFlight);
        }
        if self.state.has_pending() {
            self.confirm_dialog = ConfirmDialogState {
                open: true,
                message: PENDING_LINES_MESSAGE.to_string(),
            };
            return Ok(());
        }

        self.busy = true;
        self.last_error = None;
        let _busy = BusyGuard(&mut self.busy);
        let ctx = ProcessContext {
            call_action: self.call_action.clone(),
        };
        let input = ProcessInput {
            lines: self.state.lines().to_vec(),
            box_count: self.state.box_count(),
            record_id: self.state.record_id().to_string(),
            window_id: self.state.window_id().map(str::to_string),
            calculate_weight: self.calculate_weight,
        };
        let outcome = self.executor.execute(&ctx, &input, &self.schema.title_key).await;
        match outcome {
            Ok(ProcessOutcome::Message(message)) => {
                self.result = Some(message);
            }
            Ok(ProcessOutcome::Error { message }) => {
                self.last_error = Some(message);
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
            }
        }
        Ok(())
    }

    /// Acknowledge the confirm dialog. It never force-completes the
    /// process; lines stay pending.
    pub fn acknowledge_dialog(&mut self) {
        self.confirm_dialog = ConfirmDialogState::closed();
    }

    /// Dismiss the current error message.
    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Take the process result, consuming it.
    pub fn take_result(&mut self) -> Option<ResultMessage> {
        self.result.take()
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }
}
