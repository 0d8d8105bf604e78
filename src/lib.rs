//! nlq-bridge - natural-language queries over MySQL and MongoDB.
//!
//! This library exposes the core modules for the `nlq` binary and for
//! integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod query;
pub mod safety;

pub use db::BackendTarget;
pub use error::{BridgeError, Result};
pub use orchestrator::{
    DocumentHandler, OrchestrationOutcome, Orchestrator, OutcomeStatus, RelationalHandler,
};
