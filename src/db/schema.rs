//! Schema snapshot types.
//!
//! A [`SchemaSnapshot`] is built once per backend connection and is read-only
//! afterwards. It describes tables (relational) or collections (document) and
//! their fields, and renders itself into generation prompts.

use serde::Serialize;

/// Cached metadata for one backend connection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaSnapshot {
    /// Database name the snapshot was taken from.
    pub database: String,

    /// Tables or collections, in introspection order.
    pub entities: Vec<Entity>,

    /// Foreign key relationships (relational backends only).
    pub foreign_keys: Vec<ForeignKey>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot for the named database.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Adds an entity, builder style.
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Returns true if a table or collection with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.iter().any(|e| e.name == name)
    }

    /// Returns the ordered field names of an entity.
    pub fn field_names(&self, name: &str) -> Option<Vec<&str>> {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .map(Entity::field_names)
    }

    /// Formats the snapshot for a relational synthesis prompt.
    pub fn format_for_relational_prompt(&self) -> String {
        let tables_text = self
            .entities
            .iter()
            .map(|table| self.format_table(table))
            .collect::<Vec<_>>()
            .join("");

        let foreign_keys_text = if self.foreign_keys.is_empty() {
            String::new()
        } else {
            let fk_lines = self
                .foreign_keys
                .iter()
                .map(|fk| {
                    format!(
                        "  - {}.{} -> {}.{}\n",
                        fk.from_table, fk.from_column, fk.to_table, fk.to_column
                    )
                })
                .collect::<Vec<_>>()
                .join("");
            format!("Foreign Keys:\n{}", fk_lines)
        };

        format!("{}{}", tables_text, foreign_keys_text)
    }

    fn format_table(&self, table: &Entity) -> String {
        let column_lines = table
            .fields
            .iter()
            .map(|field| {
                let annotations = [
                    table.primary_key.contains(&field.name).then_some("PK"),
                    (!field.is_nullable).then_some("NOT NULL"),
                ]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>();
                let data_type = field.data_type.as_deref().unwrap_or("unknown");
                if annotations.is_empty() {
                    format!("  - {}: {}\n", field.name, data_type)
                } else {
                    format!(
                        "  - {}: {} ({})\n",
                        field.name,
                        data_type,
                        annotations.join(", ")
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("");

        format!("Table: {}\n{}\n", table.name, column_lines)
    }

    /// Formats the snapshot for a document prompt: a JSON object mapping each
    /// collection to its field names.
    pub fn format_for_document_prompt(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entities
            .iter()
            .map(|e| {
                let fields = e
                    .fields
                    .iter()
                    .map(|f| serde_json::Value::String(f.name.clone()))
                    .collect();
                (e.name.clone(), serde_json::Value::Array(fields))
            })
            .collect();
        serde_json::to_string_pretty(&serde_json::Value::Object(map))
            .unwrap_or_else(|_| "{}".to_string())
    }
}

/// A table or collection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Entity {
    /// Table or collection name.
    pub name: String,

    /// Fields in declaration (or sample document) order.
    pub fields: Vec<Field>,

    /// Column names that form the primary key.
    pub primary_key: Vec<String>,
}

impl Entity {
    /// Creates a new entity with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Adds a field, builder style.
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the primary key columns.
    pub fn with_primary_key(mut self, columns: Vec<String>) -> Self {
        self.primary_key = columns;
        self
    }

    /// Returns the ordered field names.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// A column or document field.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Field {
    /// Field name.
    pub name: String,

    /// Declared column type, or BSON type of the sampled value.
    pub data_type: Option<String>,

    /// Whether the column allows NULL values.
    pub is_nullable: bool,
}

impl Field {
    /// Creates a nullable field with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type.into()),
            is_nullable: true,
        }
    }

    /// Sets whether the field is nullable.
    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }
}

/// A single-column foreign key relationship.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ForeignKey {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl ForeignKey {
    /// Creates a new foreign key relationship.
    pub fn new(
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        Self {
            from_table: from_table.into(),
            from_column: from_column.into(),
            to_table: to_table.into(),
            to_column: to_column.into(),
        }
    }
}
