//! Card lifecycle management.
//!
//! Creates, updates and lists Metabase cards (saved native queries with a
//! visualization). Writes always target a database known to the metadata
//! cache and always send the full card representation.

mod payload;

pub use payload::{merge_update, new_card, target_database, CardUpdate};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{MikaError, Result};
use crate::metabase::{paths, parse_card_list, MetabaseApi, RemoteId};
use crate::metadata::MetadataCache;

/// Display type used when none is requested.
pub const DEFAULT_DISPLAY_TYPE: &str = "table";

/// Visualization kinds Metabase is known to accept.
///
/// Not enforced: any display type is forwarded and Metabase decides.
pub const KNOWN_DISPLAY_TYPES: &[&str] = &[
    "table", "bar", "line", "area", "pie", "scatter", "funnel", "number", "map", "pivot",
    "progress", "combo", "gauge", "row", "waterfall", "scalar", "smartscalar",
];

/// A card created by [`CardManager::create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedCard {
    pub id: RemoteId,
    pub url: String,
    pub display_type: String,
    /// Full response from Metabase.
    #[serde(skip)]
    pub raw_response: Value,
}

/// A card updated by [`CardManager::update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatedCard {
    pub id: RemoteId,
    pub name: String,
    pub url: String,
    /// Full response from Metabase.
    #[serde(skip)]
    pub raw_response: Value,
}

/// A card returned by [`CardManager::list_by_name`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub id: RemoteId,
    pub name: String,
    pub url: String,
}

/// Creates, updates and lists cards against the Metabase API.
#[derive(Debug, Clone)]
pub struct CardManager {
    api: Arc<dyn MetabaseApi>,
    cache: Arc<MetadataCache>,
}

impl CardManager {
    /// Creates a manager writing through `api` and resolving targets via `cache`.
    pub fn new(api: Arc<dyn MetabaseApi>, cache: Arc<MetadataCache>) -> Self {
        Self { api, cache }
    }

    /// Returns the user-facing link to a card.
    pub fn card_url(&self, id: &RemoteId) -> String {
        format!("{}/card/{}", self.api.base_url().unwrap_or_default(), id)
    }

    /// Creates a native-query card in the first known database.
    ///
    /// Fails with [`MikaError::NoDatabaseAvailable`] before any request is
    /// sent if the metadata cache holds no database.
    pub async fn create(
        &self,
        sql: &str,
        name: &str,
        display_type: Option<&str>,
    ) -> Result<CreatedCard> {
        if sql.trim().is_empty() {
            return Err(MikaError::validation("sql must not be empty"));
        }
        if name.trim().is_empty() {
            return Err(MikaError::validation("name must not be empty"));
        }

        let display_type = display_type
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_TYPE);
        let database_id = self
            .cache
            .first_database_id()
            .ok_or(MikaError::NoDatabaseAvailable)?;

        let body = new_card(sql, name, display_type, &database_id);
        debug!(database_id = %database_id, display_type, "Creating card");

        let response = self.api.post(paths::CARDS, &body).await?;
        let id = response
            .get("id")
            .and_then(RemoteId::from_json)
            .ok_or_else(|| MikaError::internal("Card creation response has no id"))?;

        info!(card_id = %id, database_id = %database_id, "Card created");

        Ok(CreatedCard {
            url: self.card_url(&id),
            id,
            display_type: display_type.to_string(),
            raw_response: response,
        })
    }

    /// Updates a card by read-merge-write.
    ///
    /// Fetches the current card, overwrites only the attributes present in
    /// `update`, resets visualization settings and writes the whole card
    /// back. A card whose query names no database is pointed at the first
    /// known database.
    ///
    /// Nothing is written unless the target database is in the metadata
    /// cache: an empty cache fails with [`MikaError::NoDatabaseAvailable`]
    /// and a card naming an unknown database fails with a validation error.
    pub async fn update(&self, card_id: &RemoteId, update: &CardUpdate) -> Result<UpdatedCard> {
        let path = paths::card(card_id)?;
        let current = self.api.get(&path).await?;

        let mut merged = merge_update(current, update)?;
        let snapshot = self.cache.current();
        match target_database(&merged) {
            Some(database_id) if snapshot.database(&database_id).is_some() => {}
            Some(database_id) if !snapshot.is_empty() => {
                return Err(MikaError::validation(format!(
                    "Card {card_id} targets database {database_id}, which is not in the metadata cache"
                )));
            }
            Some(_) => return Err(MikaError::NoDatabaseAvailable),
            None => {
                let database_id = snapshot
                    .first_database_id()
                    .cloned()
                    .ok_or(MikaError::NoDatabaseAvailable)?;
                payload::set_target_database(&mut merged, &database_id);
            }
        }

        debug!(card_id = %card_id, ?update, "Updating card");
        let response = self.api.put(&path, &merged).await?;

        let id = response
            .get("id")
            .and_then(RemoteId::from_json)
            .unwrap_or_else(|| card_id.clone());
        let name = response
            .get("name")
            .or_else(|| merged.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        info!(card_id = %id, "Card updated");

        Ok(UpdatedCard {
            url: self.card_url(&id),
            id,
            name,
            raw_response: response,
        })
    }

    /// Lists cards whose name contains `substring`, ignoring case.
    ///
    /// Remote ordering is preserved; an empty substring matches every card.
    pub async fn list_by_name(&self, substring: &str) -> Result<Vec<CardSummary>> {
        let needle = substring.to_lowercase();
        let cards = parse_card_list(self.api.get(paths::CARDS).await?)?;

        let matches: Vec<CardSummary> = cards
            .iter()
            .filter_map(|card| {
                let id = card.get("id").and_then(RemoteId::from_json)?;
                let name = card.get("name").and_then(Value::as_str).unwrap_or_default();
                name.to_lowercase().contains(&needle).then(|| CardSummary {
                    url: self.card_url(&id),
                    id,
                    name: name.to_string(),
                })
            })
            .collect();

        debug!(
            substring,
            total = cards.len(),
            matched = matches.len(),
            "Listed cards by name"
        );

        Ok(matches)
    }
}
