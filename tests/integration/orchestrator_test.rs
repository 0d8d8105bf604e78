//! Orchestrator behavior across requests: budgets, concurrency and
//! determinism.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nlq_bridge::db::{MockDocumentClient, MockRelationalClient};
use nlq_bridge::error::ErrorKind;
use nlq_bridge::llm::MockGenerator;
use nlq_bridge::{BackendTarget, Orchestrator, OutcomeStatus, RelationalHandler};
use pretty_assertions::assert_eq;

use super::common::{document_orchestrator, music_schema, relational_orchestrator, three_tracks};

const TIMEOUT_MESSAGE: &str =
    "Query took too long and was canceled. Try a simpler or more specific question.";

/// A generator that answers by prompt kind, so any number of requests can
/// share it.
fn select_generator() -> MockGenerator {
    MockGenerator::new()
        .with_response(r#"Only return "modification" or "select""#, "select")
        .with_response("SQL SELECT queries", "SELECT tracks.name, tracks.duration FROM tracks")
}

#[tokio::test]
async fn test_slow_generator_times_out_within_budget() {
    let generator = MockGenerator::new().with_delay(Duration::from_secs(10));
    let orchestrator = relational_orchestrator(generator, three_tracks())
        .with_timeout(Duration::from_millis(100));

    let start = Instant::now();
    let outcome = orchestrator
        .run_query("Show all tracks", BackendTarget::Relational)
        .await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.status, OutcomeStatus::TimedOut);
    assert_eq!(outcome.query_representation, "query logic");
    assert_eq!(outcome.display_result, TIMEOUT_MESSAGE);
}

#[tokio::test]
async fn test_slow_backend_times_out_with_query_text() {
    let client = three_tracks().with_delay(Duration::from_secs(10));
    let orchestrator = relational_orchestrator(select_generator(), client)
        .with_timeout(Duration::from_millis(200));

    let start = Instant::now();
    let outcome = orchestrator
        .run_query("Show all tracks", BackendTarget::Relational)
        .await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.status, OutcomeStatus::TimedOut);
    assert_eq!(
        outcome.query_representation,
        "SELECT tracks.name, tracks.duration FROM tracks"
    );
    assert_eq!(outcome.display_result, TIMEOUT_MESSAGE);
}

#[tokio::test]
async fn test_orchestrator_usable_after_timeout() {
    let client = three_tracks().with_delay(Duration::from_millis(300));
    let orchestrator = relational_orchestrator(select_generator(), client)
        .with_timeout(Duration::from_millis(100));

    let first = orchestrator
        .run_query("Show all tracks", BackendTarget::Relational)
        .await;
    assert_eq!(first.status, OutcomeStatus::TimedOut);

    let orchestrator = orchestrator.with_timeout(Duration::from_secs(5));
    let second = orchestrator
        .run_query("Show all tracks", BackendTarget::Relational)
        .await;
    assert_eq!(second.status, OutcomeStatus::Completed);
}

#[tokio::test]
async fn test_same_request_renders_identically() {
    let orchestrator = relational_orchestrator(select_generator(), three_tracks());

    let first = orchestrator
        .run_query("Show all tracks", BackendTarget::Relational)
        .await;
    let second = orchestrator
        .run_query("Show all tracks", BackendTarget::Relational)
        .await;

    assert!(first.is_success());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let client = three_tracks().with_delay(Duration::from_millis(50));
    let orchestrator = relational_orchestrator(select_generator(), client.clone());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .run_query(&format!("Show tracks, request {i}"), BackendTarget::Relational)
                    .await
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Completed);
        assert!(outcome.display_result.contains("Shine On"));
    }
    assert_eq!(client.executed().len(), 8);
}

#[tokio::test]
async fn test_only_configured_backend_is_available() {
    let orchestrator = relational_orchestrator(select_generator(), three_tracks());
    assert!(orchestrator.has_backend(BackendTarget::Relational));
    assert!(!orchestrator.has_backend(BackendTarget::Document));

    let outcome = orchestrator
        .run_query("List books", BackendTarget::Document)
        .await;
    assert_eq!(outcome.status, OutcomeStatus::Failed(ErrorKind::Config));
    assert!(outcome.display_result.contains("document (MongoDB)"));
}

#[tokio::test]
async fn test_both_backends_side_by_side() {
    let generator = select_generator()
        .with_response(r#"Only return "schema""#, "schema")
        .with_response("structure of a MongoDB database", "Collections: books, authors.");
    let relational = MockRelationalClient::new().with_schema(music_schema());
    let orchestrator = document_orchestrator(generator, MockDocumentClient::new())
        .with_relational(RelationalHandler::new(Arc::new(relational)).await.unwrap());

    let tracks = orchestrator
        .run_query("Show all tracks", BackendTarget::Relational)
        .await;
    let schema = orchestrator
        .run_query("Which collections exist?", BackendTarget::Document)
        .await;

    assert!(tracks.is_success());
    assert!(schema.is_success());
    assert_eq!(schema.display_result, "Collections: books, authors.");
}

#[tokio::test]
async fn test_close_releases_backends() {
    let orchestrator: Orchestrator = relational_orchestrator(select_generator(), three_tracks());
    orchestrator.close().await.unwrap();
}
