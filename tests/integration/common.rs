//! Shared fixtures.

use std::sync::Arc;

use nlq_bridge::db::{
    ColumnInfo, Entity, Field, ForeignKey, MockDocumentClient, MockRelationalClient,
    SchemaSnapshot, Value,
};
use nlq_bridge::llm::MockGenerator;
use nlq_bridge::{DocumentHandler, Orchestrator, RelationalHandler};

/// The Music schema: albums and their tracks.
pub fn music_schema() -> SchemaSnapshot {
    let mut schema = SchemaSnapshot::new("Music")
        .with_entity(
            Entity::new("albums")
                .with_field(Field::new("id", "int").nullable(false))
                .with_field(Field::new("title", "varchar(255)"))
                .with_primary_key(vec!["id".into()]),
        )
        .with_entity(
            Entity::new("tracks")
                .with_field(Field::new("id", "int").nullable(false))
                .with_field(Field::new("name", "varchar(255)"))
                .with_field(Field::new("duration", "int"))
                .with_field(Field::new("album_id", "int"))
                .with_primary_key(vec!["id".into()]),
        );
    schema
        .foreign_keys
        .push(ForeignKey::new("tracks", "album_id", "albums", "id"));
    schema
}

/// The library schema: books and authors.
pub fn library_schema() -> SchemaSnapshot {
    SchemaSnapshot::new("library")
        .with_entity(
            Entity::new("books")
                .with_field(Field::new("_id", "objectId"))
                .with_field(Field::new("isbn", "string"))
                .with_field(Field::new("title", "string"))
                .with_field(Field::new("author_id", "string")),
        )
        .with_entity(
            Entity::new("authors")
                .with_field(Field::new("_id", "string"))
                .with_field(Field::new("name", "string")),
        )
}

/// Three tracks, as the relational backend would return them.
pub fn three_tracks() -> MockRelationalClient {
    MockRelationalClient::new().with_rows(
        vec![ColumnInfo::new("name", "VARCHAR"), ColumnInfo::new("duration", "INT")],
        vec![
            vec![Value::from("Echoes"), Value::from(1411)],
            vec![Value::from("Shine On"), Value::from(810)],
            vec![Value::from("Dogs"), Value::from(1023)],
        ],
    )
}

pub fn relational_orchestrator(
    generator: MockGenerator,
    client: MockRelationalClient,
) -> Orchestrator {
    Orchestrator::new(Arc::new(generator))
        .with_relational(RelationalHandler::with_snapshot(Arc::new(client), music_schema()))
}

pub fn document_orchestrator(generator: MockGenerator, client: MockDocumentClient) -> Orchestrator {
    Orchestrator::new(Arc::new(generator))
        .with_document(DocumentHandler::with_snapshot(Arc::new(client), library_schema()))
}
