//! Normalization of Metabase response shapes.
//!
//! List endpoints answer either with a bare JSON array or with an object
//! wrapping the array under `data`, depending on the Metabase version. Both
//! shapes are resolved here so callers only ever see typed values.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::RemoteId;
use crate::error::{MikaError, Result};
use crate::metadata::{Database, Field, Table};

#[derive(Debug, Deserialize)]
struct RawDatabase {
    id: RemoteId,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    tables: Vec<RawTable>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    id: RemoteId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    id: RemoteId,
    #[serde(default)]
    name: String,
    display_name: Option<String>,
    base_type: Option<String>,
}

impl From<RawField> for Field {
    fn from(raw: RawField) -> Self {
        let display_name = raw.display_name.unwrap_or_else(|| raw.name.clone());
        Self {
            id: raw.id,
            name: raw.name,
            display_name,
            base_type: raw.base_type.unwrap_or_default(),
        }
    }
}

impl From<RawTable> for Table {
    fn from(raw: RawTable) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            fields: raw.fields.into_iter().map(Field::from).collect(),
        }
    }
}

/// Extracts the entries of a list response, bare or wrapped in `data`.
fn unwrap_list(value: Value, what: &str) -> Result<Vec<Value>> {
    match value {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(entries)) => Ok(entries),
            _ => Err(MikaError::internal(format!(
                "Unexpected {what} response: object without a 'data' array"
            ))),
        },
        other => Err(MikaError::internal(format!(
            "Unexpected {what} response: expected a list, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parses the `GET /api/database` response into databases without tables.
///
/// Order is preserved. A repeated id keeps its first occurrence.
pub fn parse_database_list(value: Value) -> Result<Vec<Database>> {
    let mut seen = HashSet::new();
    let mut databases = Vec::new();

    for entry in unwrap_list(value, "database list")? {
        let raw: RawDatabase = serde_json::from_value(entry)
            .map_err(|e| MikaError::internal(format!("Malformed database entry: {e}")))?;

        if !seen.insert(raw.id.clone()) {
            warn!(database_id = %raw.id, "Duplicate database id in list response, skipping");
            continue;
        }

        databases.push(Database::new(raw.id, raw.name));
    }

    Ok(databases)
}

/// Parses the `GET /api/database/{id}/metadata` response into tables.
pub fn parse_database_metadata(value: Value) -> Result<Vec<Table>> {
    if !value.is_object() {
        return Err(MikaError::internal(format!(
            "Unexpected metadata response: expected an object, got {}",
            json_kind(&value)
        )));
    }

    let raw: RawMetadata = serde_json::from_value(value)
        .map_err(|e| MikaError::internal(format!("Malformed database metadata: {e}")))?;

    Ok(raw.tables.into_iter().map(Table::from).collect())
}

/// Parses the `GET /api/card` response into raw card objects.
pub fn parse_card_list(value: Value) -> Result<Vec<Value>> {
    unwrap_list(value, "card list")
}
