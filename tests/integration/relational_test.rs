//! End-to-end requests against the relational backend (mocked).

use nlq_bridge::db::MockRelationalClient;
use nlq_bridge::error::ErrorKind;
use nlq_bridge::llm::MockGenerator;
use nlq_bridge::{BackendTarget, OutcomeStatus};
use pretty_assertions::assert_eq;

use super::common::{relational_orchestrator, three_tracks};

const TRACKS_SQL: &str = "SELECT tracks.name, tracks.duration FROM tracks";

#[tokio::test]
async fn test_select_renders_table() {
    let client = three_tracks();
    let generator = MockGenerator::new().with_sequence(["select", TRACKS_SQL]);
    let orchestrator = relational_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Show the name and duration of every track", BackendTarget::Relational)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.query_representation, TRACKS_SQL);
    assert_eq!(
        outcome.display_result,
        "\
| name     | duration |
|----------|----------|
| Echoes   |     1411 |
| Shine On |      810 |
| Dogs     |     1023 |"
    );
    assert_eq!(client.executed(), vec![TRACKS_SQL]);
}

#[tokio::test]
async fn test_fenced_sql_is_stripped() {
    let client = three_tracks();
    let fenced = format!("```sql\n{TRACKS_SQL}\n```");
    let generator = MockGenerator::new().with_sequence(["Select", fenced.as_str()]);
    let orchestrator = relational_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("List the tracks", BackendTarget::Relational)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.query_representation, TRACKS_SQL);
    assert_eq!(client.executed(), vec![TRACKS_SQL]);
}

#[tokio::test]
async fn test_modification_reports_affected_rows() {
    let sql = "UPDATE tracks SET duration = 600 WHERE name = 'Dogs'";
    let client = MockRelationalClient::new().with_affected(1);
    let generator = MockGenerator::new().with_sequence(["modification", sql]);
    let orchestrator = relational_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Set the duration of Dogs to 600", BackendTarget::Relational)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(outcome.query_representation, sql);
    assert_eq!(outcome.display_result, "1 rows were affected.");
    assert_eq!(client.executed(), vec![sql]);
}

#[tokio::test]
async fn test_drop_is_never_executed() {
    let client = MockRelationalClient::new();
    let generator = MockGenerator::new().with_sequence(["modification", "DROP TABLE tracks"]);
    let orchestrator = relational_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Drop the tracks table", BackendTarget::Relational)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed(ErrorKind::Validation));
    assert_eq!(outcome.query_representation, "DROP TABLE tracks");
    assert!(outcome.display_result.starts_with("An error occurred: "));
    assert!(client.executed().is_empty());
}

#[tokio::test]
async fn test_drop_classified_as_select_is_never_executed() {
    let client = MockRelationalClient::new();
    let generator = MockGenerator::new().with_sequence(["select", "DROP TABLE tracks"]);
    let orchestrator = relational_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Show me the tracks table", BackendTarget::Relational)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed(ErrorKind::Validation));
    assert_eq!(outcome.query_representation, "DROP TABLE tracks");
    assert!(client.executed().is_empty());
}

#[tokio::test]
async fn test_one_line_fenced_statement_keeps_keyword() {
    let sql = "DELETE FROM tracks WHERE id = 1";
    let client = MockRelationalClient::new().with_affected(1);
    let fenced = format!("```{sql}```");
    let generator = MockGenerator::new().with_sequence(["modification", fenced.as_str()]);
    let orchestrator = relational_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Delete track 1", BackendTarget::Relational)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Completed);
    assert_eq!(client.executed(), vec![sql]);
}

#[tokio::test]
async fn test_stacked_statements_are_never_executed() {
    let client = MockRelationalClient::new();
    let generator = MockGenerator::new()
        .with_sequence(["modification", "DELETE FROM tracks WHERE id = 1; DROP TABLE albums"]);
    let orchestrator = relational_orchestrator(generator, client.clone());

    let outcome = orchestrator
        .run_query("Delete track 1", BackendTarget::Relational)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed(ErrorKind::Validation));
    assert!(client.executed().is_empty());
}

#[tokio::test]
async fn test_unrecognized_label_is_ambiguous() {
    let client = MockRelationalClient::new();
    let generator = MockGenerator::new().with_sequence(["I think it is a select"]);
    let orchestrator = relational_orchestrator(generator.clone(), client.clone());

    let outcome = orchestrator
        .run_query("Tracks?", BackendTarget::Relational)
        .await;

    assert_eq!(
        outcome.status,
        OutcomeStatus::Failed(ErrorKind::ClassificationAmbiguous)
    );
    assert_eq!(outcome.query_representation, "query logic");
    assert_eq!(generator.prompts().len(), 1);
    assert!(client.executed().is_empty());
}

#[tokio::test]
async fn test_backend_error_keeps_query_text() {
    let sql = "INSERT INTO tracks (id, name) VALUES (1, 'Intro')";
    let client = MockRelationalClient::new().failing("Duplicate entry '1' for key 'PRIMARY'");
    let generator = MockGenerator::new().with_sequence(["modification", sql]);
    let orchestrator = relational_orchestrator(generator, client);

    let outcome = orchestrator
        .run_query("Add a track called Intro", BackendTarget::Relational)
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Failed(ErrorKind::Execution));
    assert_eq!(outcome.query_representation, sql);
    assert!(outcome.display_result.contains("Duplicate entry"));
}

#[tokio::test]
async fn test_prompt_embeds_schema_and_instruction() {
    let generator = MockGenerator::new().with_sequence(["select", TRACKS_SQL]);
    let orchestrator = relational_orchestrator(generator.clone(), three_tracks());

    orchestrator
        .run_query("Which tracks are on album {schema}?", BackendTarget::Relational)
        .await;

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("MySQL database: Music"));
    assert!(prompts[1].contains("tracks"));
    assert!(prompts[1].contains("album_id"));
    assert!(prompts[1].contains("\"Which tracks are on album {schema}?\""));
}
