//! # Slotflow Infrastructure
//!
//! Infrastructure implementations of the core workflow ports.
//!
//! This crate contains:
//! - SQLite repositories behind an r2d2 connection pool
//! - HTTP client with retry and the HTTP delivery provider
//! - Configuration loading from the environment or config files
//!
//! ## Architecture
//! - Implements traits defined in `slotflow-core`
//! - Depends on `slotflow-domain` and `slotflow-core`
//! - Contains all "impure" code (I/O, network)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod notifications;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use http::*;
pub use notifications::*;
