//! Tool dispatch for the agent.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::{
    get_tool_definitions, CreateCardInput, GenerateSqlInput, ListCardsByNameInput,
    ToolDefinition, ToolInvocation, UpdateCardInput, UpdateCardOutput, CONVERSATION_ENDED,
    CREATE_CARD, END_CONVERSATION, GENERATE_SQL, LIST_CARDS_BY_NAME, LIST_METABASE_DATABASES,
    SHOW_METADATA_CONTEXT, UPDATE_CARD,
};
use crate::cards::{CardManager, CardSummary, CardUpdate, CreatedCard};
use crate::error::{MikaError, Result};
use crate::metabase::{paths, parse_database_list, MetabaseApi};
use crate::metadata::{MetadataCache, MetadataSnapshot};
use crate::sqlgen;

/// The set of tools available to the agent, bound to one Metabase instance.
#[derive(Debug, Clone)]
pub struct Toolbox {
    api: Arc<dyn MetabaseApi>,
    cache: Arc<MetadataCache>,
    cards: CardManager,
}

impl Toolbox {
    /// Creates a toolbox using `api` for requests and `cache` for metadata.
    pub fn new(api: Arc<dyn MetabaseApi>, cache: Arc<MetadataCache>) -> Self {
        let cards = CardManager::new(Arc::clone(&api), Arc::clone(&cache));
        Self { api, cache, cards }
    }

    /// Returns the metadata cache.
    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Returns the card manager.
    pub fn cards(&self) -> &CardManager {
        &self.cards
    }

    /// Returns the definitions of every tool.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        get_tool_definitions()
    }

    /// `generate_sql`: keyword-based SQL for a prompt.
    pub fn generate_sql(&self, input: &GenerateSqlInput) -> String {
        sqlgen::generate_sql(&input.prompt)
    }

    /// `create_card`: creates a card in the default database.
    pub async fn create_card(&self, input: &CreateCardInput) -> Result<CreatedCard> {
        self.cards
            .create(&input.sql, &input.name, input.display_type.as_deref())
            .await
    }

    /// `update_card`: read-merge-write update of an existing card.
    pub async fn update_card(&self, input: &UpdateCardInput) -> Result<UpdateCardOutput> {
        let update = CardUpdate {
            sql: input.sql.clone(),
            name: input.name.clone(),
            display_type: input.display_type.clone(),
        };
        let updated = self.cards.update(&input.card_id, &update).await?;
        Ok(UpdateCardOutput {
            id: updated.id,
            name: updated.name,
            url: updated.url,
        })
    }

    /// `list_cards_by_name`: cards whose name contains a substring.
    pub async fn list_cards_by_name(&self, input: &ListCardsByNameInput) -> Result<Vec<CardSummary>> {
        self.cards.list_by_name(&input.substring).await
    }

    /// `show_metadata_context`: the cached snapshot, without fetching.
    pub fn show_metadata_context(&self) -> Arc<MetadataSnapshot> {
        self.cache.current()
    }

    /// `list_metabase_databases`: database names straight from Metabase.
    ///
    /// Always returns readable text, including on failure.
    pub async fn list_metabase_databases(&self) -> String {
        let result = match self.api.get(paths::DATABASES).await {
            Ok(response) => parse_database_list(response),
            Err(e) => Err(e),
        };

        match result {
            Ok(databases) => {
                let names: Vec<&str> = databases
                    .iter()
                    .map(|db| {
                        if db.name.is_empty() {
                            "(no name)"
                        } else {
                            db.name.as_str()
                        }
                    })
                    .collect();
                format!("Databases: {}", names.join(", "))
            }
            Err(MikaError::Configuration(_)) => {
                "Metabase URL or token not configured.".to_string()
            }
            Err(e) => {
                warn!(error = %e, "Failed to list Metabase databases");
                format!("Error listing databases: {e}")
            }
        }
    }

    /// `end_conversation`: signals that the user is done.
    pub fn end_conversation(&self) -> String {
        CONVERSATION_ENDED.to_string()
    }

    /// Invokes a tool by name with JSON arguments.
    ///
    /// Never fails: unknown tools, malformed arguments, remote failures and
    /// panics all come back as structured error JSON.
    pub async fn invoke(&self, name: &str, arguments: &str) -> String {
        let start = Instant::now();
        debug!(tool_name = name, "Executing tool");

        let outcome = AssertUnwindSafe(self.dispatch(name, arguments))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(tool_name = name, error = %e, "Tool call failed");
                e.to_tool_error().to_string()
            }
            Err(_) => {
                error!(tool_name = name, "Tool call panicked");
                MikaError::internal(format!("Tool '{name}' failed unexpectedly"))
                    .to_tool_error()
                    .to_string()
            }
        };

        debug!(
            tool_name = name,
            duration_ms = start.elapsed().as_millis(),
            result_len = result.len(),
            "Tool execution complete"
        );

        result
    }

    /// Invokes a tool and records the call.
    pub async fn invoke_traced(&self, name: &str, arguments: &str) -> ToolInvocation {
        let output = self.invoke(name, arguments).await;
        ToolInvocation {
            name: name.to_string(),
            arguments: arguments.to_string(),
            output,
        }
    }

    async fn dispatch(&self, name: &str, arguments: &str) -> Result<String> {
        match name {
            GENERATE_SQL => Ok(self.generate_sql(&parse_arguments(arguments)?)),
            CREATE_CARD => to_json(&self.create_card(&parse_arguments(arguments)?).await?),
            UPDATE_CARD => to_json(&self.update_card(&parse_arguments(arguments)?).await?),
            LIST_CARDS_BY_NAME => {
                let input: ListCardsByNameInput = parse_arguments(arguments)?;
                to_json(&self.list_cards_by_name(&input).await?)
            }
            SHOW_METADATA_CONTEXT => to_json(self.show_metadata_context().as_ref()),
            LIST_METABASE_DATABASES => Ok(self.list_metabase_databases().await),
            END_CONVERSATION => Ok(self.end_conversation()),
            _ => Err(MikaError::validation(format!("Unknown tool: {name}"))),
        }
    }
}

/// Decodes tool arguments; blank arguments are treated as `{}`.
fn parse_arguments<T: DeserializeOwned>(arguments: &str) -> Result<T> {
    let arguments = if arguments.trim().is_empty() {
        "{}"
    } else {
        arguments
    };
    serde_json::from_str(arguments)
        .map_err(|e| MikaError::validation(format!("Invalid tool arguments: {e}")))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| MikaError::internal(format!("Failed to serialize tool result: {e}")))
}
