//! Card request bodies.
//!
//! Metabase expects the full card representation on both create and update.
//! New cards are built from scratch; updates start from the current card and
//! overwrite only the provided attributes.

use serde_json::{json, Map, Value};

use crate::error::{MikaError, Result};
use crate::metabase::RemoteId;

/// Attributes to change on an existing card. `None` leaves a value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardUpdate {
    pub sql: Option<String>,
    pub name: Option<String>,
    pub display_type: Option<String>,
}

impl CardUpdate {
    /// Returns true if no attribute would change.
    pub fn is_empty(&self) -> bool {
        self.sql.is_none() && self.name.is_none() && self.display_type.is_none()
    }
}

/// Builds the body for `POST /api/card`.
pub fn new_card(sql: &str, name: &str, display_type: &str, database_id: &RemoteId) -> Value {
    json!({
        "name": name,
        "dataset_query": {
            "type": "native",
            "native": { "query": sql },
            "database": database_id,
        },
        "display": display_type,
        "visualization_settings": {},
    })
}

/// Applies `update` to the current card representation.
///
/// Visualization settings are always reset to `{}`. Setting SQL turns the
/// card's query into a native query; template tags of an existing native
/// query are kept.
pub fn merge_update(current: Value, update: &CardUpdate) -> Result<Value> {
    let Value::Object(mut card) = current else {
        return Err(MikaError::internal(
            "Unexpected card representation: expected a JSON object",
        ));
    };

    if let Some(sql) = &update.sql {
        let mut dataset_query = take_object(&mut card, "dataset_query");
        let was_native = dataset_query.get("type").and_then(Value::as_str) == Some("native");
        if !was_native {
            dataset_query.remove("query");
        }
        dataset_query.insert("type".to_string(), json!("native"));

        let mut native = take_object(&mut dataset_query, "native");
        native.insert("query".to_string(), json!(sql));
        dataset_query.insert("native".to_string(), Value::Object(native));
        card.insert("dataset_query".to_string(), Value::Object(dataset_query));
    }

    if let Some(name) = &update.name {
        card.insert("name".to_string(), json!(name));
    }

    if let Some(display_type) = &update.display_type {
        card.insert("display".to_string(), json!(display_type));
    }

    card.insert("visualization_settings".to_string(), json!({}));

    Ok(Value::Object(card))
}

/// Returns the database a card's query targets, if it names one.
pub fn target_database(card: &Value) -> Option<RemoteId> {
    card.get("dataset_query")
        .and_then(|query| query.get("database"))
        .and_then(RemoteId::from_json)
}

/// Points a card's query at the given database.
pub fn set_target_database(card: &mut Value, database_id: &RemoteId) {
    if let Value::Object(map) = card {
        let mut dataset_query = take_object(map, "dataset_query");
        dataset_query.insert("database".to_string(), database_id.to_json());
        map.insert("dataset_query".to_string(), Value::Object(dataset_query));
    }
}

/// Removes the object stored under `key`, or starts a new one if the
/// value is missing or not an object.
fn take_object(map: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match map.remove(key) {
        Some(Value::Object(object)) => object,
        _ => Map::new(),
    }
}
