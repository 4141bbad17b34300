//! Command handlers invoked by the CLI entry point

pub mod workflows;

pub use workflows::{get_workflow, update_workflow};
