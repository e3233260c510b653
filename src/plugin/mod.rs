//! Typed plugin seam for externally supplied workflow logic.
//!
//! A backend-declared module describes an entire scanning workflow as data
//! plus three pieces of executable logic. Here that contract is compiled
//! down to three typed plugin traits instead of free-form script text:
//!
//! - [`LoadPlugin`] (`on_load`) — fetches initial data and returns the
//!   schema value, or anything else to mean "not a warehouse process"
//! - [`ScanPlugin`] (`on_scan`) — maps a scanned code to a line match and
//!   quantity delta
//! - [`ProcessPlugin`] (`on_process`) — finalizes the workflow against the
//!   backend
//!
//! Plugins run behind a capability-restricted context: the only host
//! operations they receive are the two bound kernel calls. Implementations
//! are registered in a [`PluginRegistry`] keyed by process identifier, which
//! is passed by injection to every component that needs it.

pub mod loader;
pub mod registry;
pub mod types;

pub use loader::PluginLoader;
pub use registry::PluginRegistry;
pub use types::{
    LoadContext, LoadPlugin, ProcessContext, ProcessInput, ProcessPlugin, ScanContext, ScanMatch,
    ScanOutcome, ScanPlugin, SelectionContext,
};
