//! Deterministic, pure logic shared by the workflow.
//!
//! Core modules are free of I/O side effects. They operate on in-memory data
//! and return deterministic outputs suitable for tests.

pub mod index;
pub mod names;
pub mod path;
pub mod types;
