//! End-to-end requests against the document backend (mocked).

use mongodb::bson::{doc, oid::ObjectId};
use nlq_bridge::db::MockDocumentClient;
use nlq_bridge::error::ErrorKind;
use nlq_bridge::llm::MockGenerator;
use nlq_bridge::{BackendTarget, OutcomeStatus};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use super::common::document_orchestrator;

#[tokio::test]
async fn test_aggregation_renders_documents() {
    let id = ObjectId::parse_str("64b7f0c2a1b2c3d4e5f60718").unwrap();
    let client = MockDocumentClient::new().with_documents(vec![
        doc! {"_id": id, "title": "Dune", "isbn": "ISBN001"},
    ]);
    let generator = MockGenerator::new().with_sequence([
        "query",
        r#"```json
{"collection": "books", "aggregate": [{"$match": {"title": "Dune"}}, {"$limit": 1}]}
```"#,
    ]);
    let orchestrator = document_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Find the book called Dune", BackendTarget::Document)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    let representation: Value = serde_json::from_str(&outcome.query_representation).unwrap();
    assert_eq!(
        representation,
        json!({"collection": "books", "aggregate": [{"$match": {"title": "Dune"}}, {"$limit": 1}]})
    );
    let documents: Value = serde_json::from_str(&outcome.display_result).unwrap();
    assert_eq!(
        documents,
        json!([{"_id": "64b7f0c2a1b2c3d4e5f60718", "title": "Dune", "isbn": "ISBN001"}])
    );
    assert_eq!(client.calls(), vec!["aggregate books (2 stages)"]);
}

#[tokio::test]
async fn test_delete_one_reports_count() {
    let client = MockDocumentClient::new().with_count(1);
    let generator = MockGenerator::new().with_sequence([
        "modification",
        r#"{"operation": "deleteOne", "collection": "books", "filter": {"isbn": "ISBN001"}}"#,
    ]);
    let orchestrator = document_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Delete the book with ISBN ISBN001", BackendTarget::Document)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.display_result, "1 rows were affected.");
    assert_eq!(client.calls(), vec!["deleteOne books"]);
}

#[tokio::test]
async fn test_schema_question_never_touches_backend() {
    let client = MockDocumentClient::new();
    let generator = MockGenerator::new().with_sequence([
        "schema",
        "There are two collections: books and authors.",
    ]);
    let orchestrator = document_orchestrator(generator.clone(), client.clone());

    let outcome = orchestrator
        .run_query("Which collections exist?", BackendTarget::Document)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(
        outcome.query_representation,
        "The user requested schema information..."
    );
    assert_eq!(
        outcome.display_result,
        "There are two collections: books and authors."
    );
    assert!(generator.prompts()[1].contains("\"books\""));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_missing_collection_key_is_parse_error() {
    let client = MockDocumentClient::new();
    let generator = MockGenerator::new()
        .with_sequence(["query", r#"{"aggregate": [{"$limit": 5}]}"#]);
    let orchestrator = document_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Show five books", BackendTarget::Document)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed(ErrorKind::SynthesisParse));
    assert_eq!(outcome.query_representation, "query logic");
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_collection_is_never_executed() {
    let client = MockDocumentClient::new();
    let generator = MockGenerator::new().with_sequence([
        "query",
        r#"{"collection": "magazines", "aggregate": [{"$limit": 5}]}"#,
    ]);
    let orchestrator = document_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Show five magazines", BackendTarget::Document)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed(ErrorKind::Validation));
    assert!(outcome.query_representation.contains("magazines"));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_write_stage_is_never_executed() {
    let client = MockDocumentClient::new();
    let generator = MockGenerator::new().with_sequence([
        "query",
        r#"{"collection": "books", "aggregate": [{"$match": {}}, {"$out": "authors"}]}"#,
    ]);
    let orchestrator = document_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Copy books into authors", BackendTarget::Document)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed(ErrorKind::Validation));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_update_without_filter_is_never_executed() {
    let client = MockDocumentClient::new();
    let generator = MockGenerator::new().with_sequence([
        "modification",
        r#"{"operation": "updateMany", "collection": "books", "update": {"$set": {"title": "x"}}}"#,
    ]);
    let orchestrator = document_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Rename every book to x", BackendTarget::Document)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed(ErrorKind::Validation));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_insert_into_new_collection() {
    let client = MockDocumentClient::new().with_count(2);
    let generator = MockGenerator::new().with_sequence([
        "modification",
        r#"{"operation": "insertMany", "collection": "reviews", "data": [{"stars": 5}, {"stars": 3}]}"#,
    ]);
    let orchestrator = document_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Add two reviews", BackendTarget::Document)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.display_result, "2 rows were affected.");
    assert_eq!(client.calls(), vec!["insertMany reviews"]);
}
