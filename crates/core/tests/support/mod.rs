//! Shared test helpers for `slotflow-core` integration tests.
//!
//! These helpers provide an in-memory store implementing every port, a
//! recording notification provider and fixtures so tests can focus on
//! behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod fixtures;
pub mod provider;
pub mod store;
