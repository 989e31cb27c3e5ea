//! Tools exposed to the conversational agent.
//!
//! Each tool has a name, a JSON Schema for its arguments and a typed result.
//! [`Toolbox`] dispatches calls by name and always returns a value: failures
//! come back as structured error JSON instead of escaping to the agent.

mod toolbox;

pub use toolbox::Toolbox;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cards::{DEFAULT_DISPLAY_TYPE, KNOWN_DISPLAY_TYPES};
use crate::metabase::RemoteId;

pub const GENERATE_SQL: &str = "generate_sql";
pub const CREATE_CARD: &str = "create_card";
pub const UPDATE_CARD: &str = "update_card";
pub const LIST_CARDS_BY_NAME: &str = "list_cards_by_name";
pub const SHOW_METADATA_CONTEXT: &str = "show_metadata_context";
pub const LIST_METABASE_DATABASES: &str = "list_metabase_databases";
pub const END_CONVERSATION: &str = "end_conversation";

/// Reply of the `end_conversation` tool.
pub const CONVERSATION_ENDED: &str = "Conversation ended.";

/// Tool definition for LLM function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One tool call made during an agent turn, with its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    /// JSON arguments as passed by the agent.
    pub arguments: String,
    /// Result returned to the agent (plain text or JSON).
    pub output: String,
}

impl ToolInvocation {
    /// Parses the output as JSON, if it is JSON.
    pub fn output_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.output).ok()
    }

    /// Returns true if the output is a structured tool error.
    pub fn is_error(&self) -> bool {
        self.output_json()
            .is_some_and(|value| value.get("error").is_some())
    }
}

/// Input parameters for the generate_sql tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSqlInput {
    pub prompt: String,
}

/// Input parameters for the create_card tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCardInput {
    pub sql: String,
    pub name: String,
    #[serde(default, alias = "viz_type", skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
}

/// Input parameters for the update_card tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCardInput {
    pub card_id: RemoteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "viz_type", skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
}

/// Input parameters for the list_cards_by_name tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCardsByNameInput {
    #[serde(default)]
    pub substring: String,
}

/// Output of the update_card tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCardOutput {
    pub id: RemoteId,
    pub name: String,
    pub url: String,
}

fn display_type_description() -> String {
    format!(
        "Visualization type, e.g. {} (default: {})",
        KNOWN_DISPLAY_TYPES.join(", "),
        DEFAULT_DISPLAY_TYPE
    )
}

/// Returns the tool definitions available to the agent.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: GENERATE_SQL.to_string(),
            description: "Generate a SQL query from a natural language prompt.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "The user's question in natural language"
                    }
                },
                "required": ["prompt"]
            }),
        },
        ToolDefinition {
            name: CREATE_CARD.to_string(),
            description: "Create a Metabase card (saved question) from SQL in the default \
                          database. Returns the card id, its URL and display type."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "sql": { "type": "string", "description": "Native SQL query" },
                    "name": { "type": "string", "description": "Card name" },
                    "display_type": {
                        "type": "string",
                        "description": display_type_description()
                    }
                },
                "required": ["sql", "name"]
            }),
        },
        ToolDefinition {
            name: UPDATE_CARD.to_string(),
            description: "Update an existing Metabase card. Only the provided fields change; \
                          visualization settings are reset."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "card_id": { "type": ["integer", "string"], "description": "Card id" },
                    "sql": { "type": "string", "description": "New SQL query (optional)" },
                    "name": { "type": "string", "description": "New card name (optional)" },
                    "display_type": {
                        "type": "string",
                        "description": display_type_description()
                    }
                },
                "required": ["card_id"]
            }),
        },
        ToolDefinition {
            name: LIST_CARDS_BY_NAME.to_string(),
            description: "Find Metabase cards whose name contains the given text \
                          (case-insensitive). An empty string lists every card."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "substring": { "type": "string", "description": "Text to search for" }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: SHOW_METADATA_CONTEXT.to_string(),
            description: "Show the cached Metabase metadata: databases, tables and fields."
                .to_string(),
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        },
        ToolDefinition {
            name: LIST_METABASE_DATABASES.to_string(),
            description: "List all databases available in Metabase.".to_string(),
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        },
        ToolDefinition {
            name: END_CONVERSATION.to_string(),
            description: "End the conversation with the user.".to_string(),
            parameters: json!({ "type": "object", "properties": {}, "required": [] }),
        },
    ]
}
