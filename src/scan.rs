//! Scan protocol handler.
//!
//! Feeds a scanned code plus the current state into the registered `on_scan`
//! plugin, interprets the outcome, and applies matches to the line/box state
//! machine. The handler is a two-state machine (idle/processing) and must
//! return to idle on every exit path — a plugin failure can never leave the
//! host stuck in processing.
//!
//! Only one scan is in flight at a time; the controller holds the explicit
//! guard, the handler enforces it cooperatively through `&mut self`.

use crate::errors::EngineError;
use crate::kernel::ActionCaller;
use crate::plugin::types::{ScanContext, ScanOutcome, ScanPlugin};
use crate::state::LineBoxState;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Fallback shown when a plugin rejects a scan without its own message.
const WRONG_BARCODE_MESSAGE: &str = "Wrong barcode";
/// Fallback shown when the plugin itself fails or times out.
const GENERIC_FAILURE_MESSAGE: &str = "Validation failed";

/// Handler execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Processing,
}

/// What the host should do after a scan attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFeedback {
    /// Empty barcode: nothing happened.
    Ignored,
    /// A scan was validated and applied; clear the barcode input and reset
    /// the quantity to 1.
    Applied {
        /// Whether a line in the current state actually matched. A stale
        /// miss is not an error, but the host may want to know.
        matched: bool,
    },
}

/// Resets the handler to idle on drop, so a validate future dropped
/// mid-await cannot leave the handler stuck in processing.
struct IdleGuard<'a>(&'a mut ScanState);

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        *self.0 = ScanState::Idle;
    }
}

/// Two-state scan handler bound to one process instance.
pub struct ScanHandler {
    plugin: Option<Arc<dyn ScanPlugin>>,
    state: ScanState,
    timeout_secs: u64,
}

impl ScanHandler {
    /// `plugin` is the process's `on_scan` registration; `None` means
    /// scanning is disabled and every validate attempt fails with
    /// `NoScanHandler`.
    pub fn new(plugin: Option<Arc<dyn ScanPlugin>>, timeout_secs: u64) -> Self {
        Self {
            plugin,
            state: ScanState::Idle,
            timeout_secs,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_processing(&self) -> bool {
        self.state == ScanState::Processing
    }

    /// Validate a scanned code and apply the result to `state`.
    ///
    /// On a plugin rejection or failure the state machine is untouched and
    /// the error carries the message to surface inline.
    pub async fn validate(
        &mut self,
        state: &mut LineBoxState,
        barcode: &str,
        qty: f64,
        call_action: ActionCaller,
    ) -> Result<ScanFeedback, EngineError> {
        if barcode.trim().is_empty() {
            return Ok(ScanFeedback::Ignored);
        }
        let Some(plugin) = self.plugin.clone() else {
            return Err(EngineError::NoScanHandler);
        };

        self.state = ScanState::Processing;
        let _idle = IdleGuard(&mut self.state);
        let ctx = ScanContext {
            barcode: barcode.to_string(),
            qty,
            current_box: state.current_box(),
            lines: state.lines().to_vec(),
            call_action,
        };
        let outcome = timeout(Duration::from_secs(self.timeout_secs), plugin.on_scan(&ctx)).await;

        match outcome {
            Err(_) => {
                tracing::error!(barcode, secs = self.timeout_secs, "onScan timed out");
                Err(EngineError::ScanValidationFailed(
                    GENERIC_FAILURE_MESSAGE.to_string(),
                ))
            }
            Ok(Err(e)) => {
                tracing::error!(barcode, error = %e, "onScan failed");
                Err(EngineError::ScanValidationFailed(
                    GENERIC_FAILURE_MESSAGE.to_string(),
                ))
            }
            Ok(Ok(ScanOutcome::Rejected { message })) => Err(EngineError::ScanValidationFailed(
                message.unwrap_or_else(|| WRONG_BARCODE_MESSAGE.to_string()),
            )),
            Ok(Ok(ScanOutcome::Match(m))) => {
                // Record the backend-normalized code when provided, the raw
                // operator input otherwise.
                let code = m.scanned_code.as_deref().unwrap_or(barcode);
                let matched = state.apply_scan(&m.match_field, &m.match_value, m.qty, code);
                if !matched {
                    tracing::warn!(
                        field = %m.match_field,
                        value = %m.match_value,
                        "scan matched no line, state may be stale"
                    );
                }
                Ok(ScanFeedback::Applied { matched })
            }
        }
    }
}
