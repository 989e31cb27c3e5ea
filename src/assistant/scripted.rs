//! Deterministic keyword-driven agent.
//!
//! Picks tools from the wording of the last user message. Used offline and
//! in tests in place of a language model.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use super::agent::{Agent, AgentRun};
use super::types::{Message, Role};
use crate::cards::{CardSummary, CreatedCard, KNOWN_DISPLAY_TYPES};
use crate::error::{MikaError, Result};
use crate::metadata::MetadataSnapshot;
use crate::tools::{self, ToolInvocation, Toolbox, UpdateCardOutput};

static CARD_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcard\s+#?(\d+)").expect("valid regex"));

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|“([^”]+)”"#).expect("valid regex"));

/// Display types that are also common English words in questions.
const AMBIGUOUS_DISPLAY_WORDS: &[&str] = &["table", "number", "map", "row"];

const MAX_NAME_CHARS: usize = 80;

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    EndConversation,
    UpdateCard(i64),
    ListCards,
    ListDatabases,
    ShowMetadata,
    CreateCard,
    GenerateSql,
}

/// Agent that maps keywords in the prompt to tool calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedAgent;

impl ScriptedAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn run(&self, messages: &[Message], toolbox: &Toolbox) -> Result<AgentRun> {
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .ok_or_else(|| MikaError::validation("No user message to answer"))?;

        let intent = classify(prompt);
        debug!(?intent, "Scripted agent selected intent");

        let mut turn = Turn {
            toolbox,
            calls: Vec::new(),
        };
        let reply = match intent {
            Intent::EndConversation => {
                let call = turn.call(tools::END_CONVERSATION, json!({})).await;
                format!("Goodbye! {}", call.output)
            }
            Intent::ListDatabases => {
                turn.call(tools::LIST_METABASE_DATABASES, json!({}))
                    .await
                    .output
            }
            Intent::ShowMetadata => {
                let call = turn.call(tools::SHOW_METADATA_CONTEXT, json!({})).await;
                match serde_json::from_str::<MetadataSnapshot>(&call.output) {
                    Ok(snapshot) => snapshot.format_for_llm(),
                    Err(_) => call.output,
                }
            }
            Intent::ListCards => turn.list_cards(prompt).await,
            Intent::UpdateCard(card_id) => turn.update_card(prompt, card_id).await,
            Intent::CreateCard => turn.create_card(prompt).await,
            Intent::GenerateSql => {
                let sql = turn.generate_sql(prompt).await;
                format!("Here is the SQL:\n\n```sql\n{sql}\n```")
            }
        };

        Ok(AgentRun {
            final_output: reply,
            tool_calls: turn.calls,
        })
    }
}

/// Tool calls made while answering one prompt.
struct Turn<'a> {
    toolbox: &'a Toolbox,
    calls: Vec<ToolInvocation>,
}

impl Turn<'_> {
    async fn call(&mut self, name: &str, arguments: Value) -> ToolInvocation {
        let call = self
            .toolbox
            .invoke_traced(name, &arguments.to_string())
            .await;
        self.calls.push(call.clone());
        call
    }

    async fn generate_sql(&mut self, prompt: &str) -> String {
        self.call(tools::GENERATE_SQL, json!({ "prompt": prompt }))
            .await
            .output
    }

    async fn list_cards(&mut self, prompt: &str) -> String {
        let substring = quoted_text(prompt).unwrap_or_default();
        let call = self
            .call(tools::LIST_CARDS_BY_NAME, json!({ "substring": substring }))
            .await;

        match serde_json::from_str::<Vec<CardSummary>>(&call.output) {
            Ok(cards) if cards.is_empty() => "No cards found.".to_string(),
            Ok(cards) => {
                let lines: Vec<String> = cards
                    .iter()
                    .map(|card| format!("- {} (#{}): {}", card.name, card.id, card.url))
                    .collect();
                format!("Found {} card(s):\n{}", cards.len(), lines.join("\n"))
            }
            Err(_) => failure_reply("list cards", &call),
        }
    }

    async fn update_card(&mut self, prompt: &str, card_id: i64) -> String {
        let mut arguments = json!({ "card_id": card_id });
        if let Some(name) = quoted_text(prompt) {
            arguments["name"] = json!(name);
        }
        if let Some(display) = display_keyword(prompt) {
            arguments["display_type"] = json!(display);
        }
        if arguments.get("name").is_none() && arguments.get("display_type").is_none() {
            arguments["sql"] = json!(self.generate_sql(prompt).await);
        }

        let call = self.call(tools::UPDATE_CARD, arguments).await;
        match serde_json::from_str::<UpdateCardOutput>(&call.output) {
            Ok(updated) => format!("Updated card \"{}\": {}", updated.name, updated.url),
            Err(_) => failure_reply(&format!("update card {card_id}"), &call),
        }
    }

    async fn create_card(&mut self, prompt: &str) -> String {
        let sql = self.generate_sql(prompt).await;
        let name = quoted_text(prompt).unwrap_or_else(|| default_card_name(prompt));

        let mut arguments = json!({ "sql": sql, "name": name });
        if let Some(display) = display_keyword(prompt) {
            arguments["display_type"] = json!(display);
        }

        let call = self.call(tools::CREATE_CARD, arguments).await;
        match serde_json::from_str::<CreatedCard>(&call.output) {
            Ok(created) => format!(
                "Created card \"{}\" as a {} chart: {}\n\n```sql\n{}\n```",
                name, created.display_type, created.url, sql
            ),
            Err(_) => failure_reply("create the card", &call),
        }
    }
}

fn classify(prompt: &str) -> Intent {
    let lower = prompt.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has_word =
        |candidates: &[&str]| words.iter().any(|w| candidates.iter().any(|c| c == w));

    if has_word(&["bye", "goodbye"])
        || lower.contains("end conversation")
        || lower.contains("end the conversation")
    {
        return Intent::EndConversation;
    }

    if has_word(&["update", "change", "rename", "edit"]) {
        let card_id = CARD_NUMBER
            .captures(prompt)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok());
        if let Some(card_id) = card_id {
            return Intent::UpdateCard(card_id);
        }
    }

    if has_word(&["find", "list", "search", "show"]) && has_word(&["card", "cards"]) {
        return Intent::ListCards;
    }
    if has_word(&["database", "databases"]) {
        return Intent::ListDatabases;
    }
    if has_word(&["metadata", "schema"]) {
        return Intent::ShowMetadata;
    }
    if has_word(&["create", "save", "chart", "card", "plot", "visualize", "visualise"]) {
        return Intent::CreateCard;
    }

    Intent::GenerateSql
}

/// Returns the first double-quoted phrase in the prompt.
fn quoted_text(prompt: &str) -> Option<String> {
    QUOTED
        .captures(prompt)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Returns the first chart kind named in the prompt.
fn display_keyword(prompt: &str) -> Option<String> {
    prompt
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| {
            KNOWN_DISPLAY_TYPES.iter().any(|k| k == w)
                && !AMBIGUOUS_DISPLAY_WORDS.iter().any(|k| k == w)
        })
        .map(str::to_string)
}

fn default_card_name(prompt: &str) -> String {
    let name: String = prompt.trim().chars().take(MAX_NAME_CHARS).collect();
    if name.is_empty() {
        "Untitled question".to_string()
    } else {
        name
    }
}

fn failure_reply(action: &str, call: &ToolInvocation) -> String {
    let message = call
        .output_json()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| call.output.clone());
    format!("Sorry, I couldn't {action}: {message}")
}
