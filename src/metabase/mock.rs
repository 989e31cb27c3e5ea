//! In-memory Metabase for tests and offline demos.
//!
//! Serves the database, metadata and card endpoints from local state, records
//! every request it receives, and can be told to fail specific requests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{MetabaseApi, Method, RemoteId};
use crate::error::{MikaError, Result};
use crate::metadata::{Database, Field, Table};

/// A request received by [`MockMetabase`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct MockState {
    databases: Vec<Database>,
    cards: Vec<Value>,
    next_card_id: i64,
    failures: HashMap<(Method, String), MikaError>,
    requests: Vec<RecordedRequest>,
}

/// A mock Metabase that answers from in-memory state.
#[derive(Debug)]
pub struct MockMetabase {
    base_url: String,
    wrap_lists: bool,
    latency: Option<Duration>,
    state: Mutex<MockState>,
}

impl MockMetabase {
    /// Creates an empty mock with no databases and no cards.
    pub fn new() -> Self {
        Self {
            base_url: "http://metabase.test".to_string(),
            wrap_lists: false,
            latency: None,
            state: Mutex::new(MockState {
                next_card_id: 1,
                ..MockState::default()
            }),
        }
    }

    /// Creates a mock with a small sample warehouse and one saved card.
    pub fn sample() -> Self {
        let field = |id: i64, name: &str, display: &str, base_type: &str| Field {
            id: RemoteId::from(id),
            name: name.to_string(),
            display_name: display.to_string(),
            base_type: base_type.to_string(),
        };

        let payments = Table {
            id: RemoteId::from(10),
            name: "payments".to_string(),
            fields: vec![
                field(100, "id", "ID", "type/BigInteger"),
                field(101, "payment_method", "Payment Method", "type/Text"),
                field(102, "amount", "Amount", "type/Float"),
            ],
        };
        let users = Table {
            id: RemoteId::from(11),
            name: "users".to_string(),
            fields: vec![
                field(110, "id", "ID", "type/BigInteger"),
                field(111, "email", "Email", "type/Text"),
                field(112, "created_at", "Created At", "type/DateTime"),
            ],
        };

        Self::new()
            .with_database(
                Database::new(RemoteId::from(1), "Sample Warehouse")
                    .with_tables(vec![payments, users]),
            )
            .with_card(json!({
                "name": "Q1 Sales Report",
                "dataset_query": {
                    "type": "native",
                    "native": {"query": "SELECT * FROM payments"},
                    "database": 1
                },
                "display": "bar",
                "visualization_settings": {}
            }))
    }

    /// Sets the base URL reported to callers.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Answers list endpoints with `{"data": [...]}` instead of a bare array.
    pub fn with_wrapped_lists(mut self, wrapped: bool) -> Self {
        self.wrap_lists = wrapped;
        self
    }

    /// Delays every response, so concurrent callers actually overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds a database together with its table metadata.
    pub fn with_database(self, database: Database) -> Self {
        self.lock().databases.push(database);
        self
    }

    /// Adds a card; an id is assigned if the card has none.
    pub fn with_card(self, card: Value) -> Self {
        self.lock().insert_card(card);
        self
    }

    /// Makes every matching request fail with the given error.
    pub fn fail_on(&self, method: Method, path: impl Into<String>, error: MikaError) {
        self.lock().failures.insert((method, path.into()), error);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Replaces the database list (e.g., to simulate a schema change).
    pub fn set_databases(&self, databases: Vec<Database>) {
        self.lock().databases = databases;
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Returns the requests that would modify remote state.
    pub fn write_requests(&self) -> Vec<RecordedRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method.is_write())
            .cloned()
            .collect()
    }

    /// Returns the stored card with the given id.
    pub fn card(&self, id: &RemoteId) -> Option<Value> {
        self.lock().find_card(id).cloned()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn list(&self, entries: Vec<Value>) -> Value {
        if self.wrap_lists {
            let total = entries.len();
            json!({ "data": entries, "total": total })
        } else {
            Value::Array(entries)
        }
    }

    fn handle(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        if let Some(error) = state.failures.get(&(method, path.to_string())) {
            return Err(error.clone());
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            (Method::Get, ["api", "database"]) => {
                let entries = state
                    .databases
                    .iter()
                    .map(|db| json!({ "id": db.id, "name": db.name, "engine": "postgres" }))
                    .collect();
                drop(state);
                Ok(self.list(entries))
            }
            (Method::Get, ["api", "database", id, "metadata"]) => state
                .databases
                .iter()
                .find(|db| db.id.to_string() == *id)
                .map(|db| json!({ "id": db.id, "name": db.name, "tables": db.tables }))
                .ok_or_else(not_found),
            (Method::Get, ["api", "card"]) => {
                let entries = state.cards.clone();
                drop(state);
                Ok(self.list(entries))
            }
            (Method::Get, ["api", "card", id]) => {
                state.find_card_by_segment(id).cloned().ok_or_else(not_found)
            }
            (Method::Post, ["api", "card"]) => {
                let card = body
                    .cloned()
                    .ok_or_else(|| MikaError::remote(400, "Missing request body"))?;
                Ok(state.insert_card(card))
            }
            (Method::Put, ["api", "card", id]) => {
                let body = body
                    .cloned()
                    .ok_or_else(|| MikaError::remote(400, "Missing request body"))?;
                let card = state.find_card_by_segment_mut(id).ok_or_else(not_found)?;
                let card_id = card.get("id").cloned().unwrap_or(Value::Null);
                *card = body;
                if let Value::Object(map) = card {
                    map.insert("id".to_string(), card_id);
                }
                Ok(card.clone())
            }
            _ => Err(not_found()),
        }
    }
}

impl MockState {
    fn insert_card(&mut self, card: Value) -> Value {
        let mut map = match card {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        match map.get("id").and_then(Value::as_i64) {
            Some(id) => self.next_card_id = self.next_card_id.max(id + 1),
            None => {
                map.insert("id".to_string(), json!(self.next_card_id));
                self.next_card_id += 1;
            }
        }

        let card = Value::Object(map);
        self.cards.push(card.clone());
        card
    }

    fn find_card(&self, id: &RemoteId) -> Option<&Value> {
        self.find_card_by_segment(&id.to_string())
    }

    fn find_card_by_segment(&self, segment: &str) -> Option<&Value> {
        self.cards
            .iter()
            .find(|card| card_id_matches(card, segment))
    }

    fn find_card_by_segment_mut(&mut self, segment: &str) -> Option<&mut Value> {
        self.cards
            .iter_mut()
            .find(|card| card_id_matches(card, segment))
    }
}

fn card_id_matches(card: &Value, segment: &str) -> bool {
    card.get("id")
        .and_then(RemoteId::from_json)
        .is_some_and(|id| id.to_string() == segment)
}

fn not_found() -> MikaError {
    MikaError::remote(404, "Not found.")
}

impl Default for MockMetabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetabaseApi for MockMetabase {
    async fn get(&self, path: &str) -> Result<Value> {
        self.delay().await;
        self.handle(Method::Get, path, None)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.delay().await;
        self.handle(Method::Post, path, Some(body))
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.delay().await;
        self.handle(Method::Put, path, Some(body))
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}
