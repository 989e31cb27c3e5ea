//! Metadata snapshot types.
//!
//! Represents the cached structure of the BI platform: databases, their
//! tables, and the fields of each table.

use serde::{Deserialize, Serialize};

use crate::metabase::RemoteId;

/// The complete cached schema of every database known to Metabase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Databases in the order returned by the list endpoint.
    pub databases: Vec<Database>,
}

impl MetadataSnapshot {
    /// Creates a new empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a snapshot from the given databases.
    pub fn with_databases(databases: Vec<Database>) -> Self {
        Self { databases }
    }

    /// Returns true if no database is known.
    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    /// Returns the id of the first database in snapshot order.
    pub fn first_database_id(&self) -> Option<&RemoteId> {
        self.databases.first().map(|db| &db.id)
    }

    /// Finds a database by id.
    pub fn database(&self, id: &RemoteId) -> Option<&Database> {
        self.databases.iter().find(|db| &db.id == id)
    }

    /// Total number of tables across all databases.
    pub fn table_count(&self) -> usize {
        self.databases.iter().map(|db| db.tables.len()).sum()
    }

    /// Formats the snapshot for inclusion in an LLM system prompt.
    pub fn format_for_llm(&self) -> String {
        if self.is_empty() {
            return "Metabase Metadata:\n\n(no databases available)\n".to_string();
        }

        let databases_text = self
            .databases
            .iter()
            .map(Self::format_database_for_llm)
            .collect::<Vec<_>>()
            .join("\n");

        format!("Metabase Metadata:\n\n{}", databases_text)
    }

    fn format_database_for_llm(database: &Database) -> String {
        let tables_text = database
            .tables
            .iter()
            .map(|table| {
                let field_lines = table
                    .fields
                    .iter()
                    .map(Self::format_field_line)
                    .collect::<Vec<_>>()
                    .join("");
                format!("  Table: {}\n{}", table.name, field_lines)
            })
            .collect::<Vec<_>>()
            .join("");

        format!(
            "Database: {} (id {})\n{}",
            database.name, database.id, tables_text
        )
    }

    fn format_field_line(field: &Field) -> String {
        let base_type = if field.base_type.is_empty() {
            "unknown"
        } else {
            field.base_type.as_str()
        };

        if field.display_name != field.name && !field.display_name.is_empty() {
            format!(
                "    - {}: {} (\"{}\")\n",
                field.name, base_type, field.display_name
            )
        } else {
            format!("    - {}: {}\n", field.name, base_type)
        }
    }
}

/// A database known to Metabase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub id: RemoteId,
    pub name: String,
    pub tables: Vec<Table>,
}

impl Database {
    /// Creates a database with no tables.
    pub fn new(id: RemoteId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tables: Vec::new(),
        }
    }

    /// Sets the tables.
    pub fn with_tables(self, tables: Vec<Table>) -> Self {
        Self { tables, ..self }
    }
}

/// A table within a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: RemoteId,
    pub name: String,
    pub fields: Vec<Field>,
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: RemoteId,
    pub name: String,
    /// Human-readable name; equals `name` when Metabase provides none.
    pub display_name: String,
    /// Metabase type tag, e.g. `type/Text`.
    pub base_type: String,
}
