//! Conversational front door.
//!
//! Runs one prompt turn through an [`Agent`] and condenses the outcome into
//! a [`PromptReply`]: the reply text, the SQL that was produced and the
//! chosen visualization.

mod agent;
pub mod parser;
pub mod prompt;
mod scripted;
pub mod types;

pub use agent::{Agent, AgentRun};
pub use parser::{extract_sql, parse_reply, ParsedReply};
pub use prompt::{build_messages, build_system_prompt};
pub use scripted::ScriptedAgent;
pub use types::{Conversation, Message, Role};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::cards::CreatedCard;
use crate::tools::{Toolbox, CREATE_CARD, END_CONVERSATION, GENERATE_SQL};

/// Reply shown when a turn fails.
pub const APOLOGY: &str = "Sorry, there was an error processing your request.";

/// Visualization reported when no card was created during the turn.
pub const DEFAULT_VIZ_TYPE: &str = "bar";

/// Result of one prompt turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptReply {
    pub reply: String,
    pub sql: String,
    pub viz_type: String,
    #[serde(default)]
    pub conversation_ended: bool,
}

impl PromptReply {
    /// Condenses an agent run.
    pub fn from_run(run: &AgentRun) -> Self {
        let sql = run
            .last_successful_call(GENERATE_SQL)
            .map(|call| call.output.clone())
            .or_else(|| extract_sql(&run.final_output))
            .unwrap_or_default();

        let viz_type = run
            .last_successful_call(CREATE_CARD)
            .and_then(|call| serde_json::from_str::<CreatedCard>(&call.output).ok())
            .map(|card| card.display_type)
            .unwrap_or_else(|| DEFAULT_VIZ_TYPE.to_string());

        Self {
            reply: run.final_output.clone(),
            sql,
            viz_type,
            conversation_ended: run.last_call(END_CONVERSATION).is_some(),
        }
    }

    /// The reply for a failed turn.
    pub fn failed() -> Self {
        Self {
            reply: APOLOGY.to_string(),
            sql: String::new(),
            viz_type: String::new(),
            conversation_ended: false,
        }
    }
}

/// Answers prompts with an agent and the tools.
pub struct Assistant {
    agent: Box<dyn Agent>,
    toolbox: Arc<Toolbox>,
}

impl Assistant {
    pub fn new(agent: impl Agent + 'static, toolbox: Arc<Toolbox>) -> Self {
        Self {
            agent: Box::new(agent),
            toolbox,
        }
    }

    pub fn toolbox(&self) -> &Arc<Toolbox> {
        &self.toolbox
    }

    /// Runs a single-prompt turn.
    pub async fn handle_prompt(&self, prompt: &str) -> PromptReply {
        self.handle_messages(&[Message::user(prompt)]).await
    }

    /// Runs a turn over a conversation history.
    ///
    /// The system prompt is rebuilt from the current metadata snapshot;
    /// system messages in `history` are replaced by it. Never fails: agent
    /// errors and panics become [`PromptReply::failed`].
    pub async fn handle_messages(&self, history: &[Message]) -> PromptReply {
        let start = Instant::now();
        let snapshot = self.toolbox.cache().current();

        let messages = build_messages(&snapshot, history);

        let outcome = AssertUnwindSafe(self.agent.run(&messages, &self.toolbox))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(run)) => {
                let reply = PromptReply::from_run(&run);
                info!(
                    tool_calls = run.tool_calls.len(),
                    conversation_ended = reply.conversation_ended,
                    duration_ms = start.elapsed().as_millis(),
                    "Prompt handled"
                );
                reply
            }
            Ok(Err(e)) => {
                error!(error = %e, category = e.category(), "Agent run failed");
                PromptReply::failed()
            }
            Err(_) => {
                error!("Agent run panicked");
                PromptReply::failed()
            }
        }
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("toolbox", &self.toolbox)
            .finish_non_exhaustive()
    }
}
