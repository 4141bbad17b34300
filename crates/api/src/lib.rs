//! # Slotflow
//!
//! Application wiring for the workflow reminder reconciler: configuration,
//! the SQLite-backed context and the command handlers used by the CLI.

pub mod commands;
pub mod context;
pub mod utils;

pub use context::AppContext;
