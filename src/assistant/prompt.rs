//! Prompt construction for agent turns.
//!
//! Builds the system prompt with the cached Metabase metadata.

use super::types::{Message, Role};
use crate::metadata::MetadataSnapshot;

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a data assistant for Metabase. You turn questions into SQL and save them as Metabase cards.

{metadata}

INSTRUCTIONS:
- Use generate_sql to write the SQL for a question
- Use create_card to save a query; pick a display type that suits the data
- Use update_card to change an existing card; only pass the fields that change
- Use list_cards_by_name to find existing cards before creating duplicates
- Use show_metadata_context or list_metabase_databases when asked about available data
- Use end_conversation when the user says goodbye
- Only reference tables and fields listed above

OUTPUT FORMAT:
Answer briefly. When you show SQL, wrap it in ```sql code blocks.
Include the card link after creating or updating a card."#;

/// Builds the system prompt with the metadata snapshot injected.
pub fn build_system_prompt(snapshot: &MetadataSnapshot) -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{metadata}", snapshot.format_for_llm().trim_end())
}

/// Builds the message list for an agent turn: system prompt, then history.
///
/// System messages in `history` are dropped in favor of a fresh prompt.
pub fn build_messages(snapshot: &MetadataSnapshot, history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(build_system_prompt(snapshot)));
    messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
    messages
}
