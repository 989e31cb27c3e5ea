//! Message types for agent conversations.

use serde::{Deserialize, Serialize};

/// Default number of user/assistant exchanges kept in a conversation.
pub const DEFAULT_MAX_EXCHANGES: usize = 10;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and metadata context.
    System,
    /// Human input.
    User,
    /// Agent output.
    Assistant,
    /// Output of a tool call, fed back to the agent.
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

/// Bounded conversation history.
///
/// Keeps at most `max_exchanges` user/assistant pairs; system messages at the
/// start are never dropped.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    max_exchanges: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_max_exchanges(DEFAULT_MAX_EXCHANGES)
    }

    pub fn with_max_exchanges(max_exchanges: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_exchanges,
        }
    }

    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
        self.trim_to_limit();
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.add(Message::user(content));
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.add(Message::assistant(content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn trim_to_limit(&mut self) {
        let start = self
            .messages
            .iter()
            .position(|m| m.role != Role::System)
            .unwrap_or(self.messages.len());

        while self.exchange_count(start) > self.max_exchanges {
            let oldest = (start..self.messages.len().saturating_sub(1)).find(|&i| {
                self.messages[i].role == Role::User && self.messages[i + 1].role == Role::Assistant
            });
            match oldest {
                Some(i) => {
                    self.messages.drain(i..i + 2);
                }
                None => break,
            }
        }
    }

    /// Counts user messages immediately followed by an assistant message.
    fn exchange_count(&self, start: usize) -> usize {
        self.messages[start..]
            .windows(2)
            .filter(|pair| pair[0].role == Role::User && pair[1].role == Role::Assistant)
            .count()
    }
}
