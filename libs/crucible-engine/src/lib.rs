//! Sandboxed test-case execution engine
//!
//! `Executor::execute` is the entry point: it decodes the test cases,
//! resolves the language backend and runs every test case in its own
//! short-lived OS process.

pub mod backend;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod runner;

#[cfg(test)]
mod executor_tests;

pub use backend::{LanguageRegistry, LanguageSpec};
pub use error::ExecutionError;
pub use executor::Executor;
