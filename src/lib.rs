//! packline — a headless warehouse-process engine.
//!
//! A backend-declared module describes an interactive scanning workflow
//! (box packing, pick validation, and future variants) as data plus three
//! pieces of externally supplied logic: `on_load`, `on_scan` and
//! `on_process`. This crate loads that description, executes the logic
//! behind a capability-restricted plugin boundary, and reconciles the
//! results against a live line/box quantity model.
//!
//! Flow: [`plugin::PluginLoader`] evaluates `on_load` into a
//! [`schema::ProcessSchema`]; [`state::LineBoxState`] is initialized from
//! it; each scan runs through [`scan::ScanHandler`] and mutates the state;
//! on confirm, [`process::ProcessExecutor`] finalizes against the backend
//! and [`message::parse_kernel_message`] extracts the navigable result.
//! [`controller::ProcessController`] orchestrates all of it for the host.
//!
//! Rendering, translation, routing and authentication stay in the host —
//! the engine only ever touches the backend through the two bound kernel
//! calls in [`kernel`].

pub mod config;
pub mod controller;
pub mod errors;
pub mod kernel;
pub mod message;
pub mod plugin;
pub mod process;
pub mod scan;
pub mod schema;
pub mod state;

pub use config::EngineConfig;
pub use controller::{ConfirmDialogState, ProcessController};
pub use errors::{EngineError, KernelError, LoaderError};
pub use kernel::{ActionCaller, CallOptions, DatasourceFetcher, KernelClient};
pub use message::{ParsedMessage, parse_kernel_message};
pub use plugin::{
    LoadContext, LoadPlugin, PluginLoader, PluginRegistry, ProcessContext, ProcessInput,
    ProcessPlugin, ScanContext, ScanMatch, ScanOutcome, ScanPlugin, SelectionContext,
};
pub use process::{MessageKind, ProcessExecutor, ProcessOutcome, ResultMessage};
pub use scan::{ScanFeedback, ScanHandler, ScanState};
pub use schema::{Features, GridColumn, InputBarElement, ProcessSchema, SCHEMA_TAG};
pub use state::{Line, LineBoxState, ScannedInput};
