//! Integration tests for nlq-bridge.

pub mod common;
pub mod document_test;
pub mod live_test;
pub mod orchestrator_test;
pub mod relational_test;
