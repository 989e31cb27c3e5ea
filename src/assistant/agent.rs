//! The agent boundary.

use async_trait::async_trait;

use super::types::Message;
use crate::error::Result;
use crate::tools::{ToolInvocation, Toolbox};

/// Outcome of one agent turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentRun {
    /// Final text shown to the user.
    pub final_output: String,
    /// Tool calls made during the turn, in call order.
    pub tool_calls: Vec<ToolInvocation>,
}

impl AgentRun {
    /// Creates a run with only a reply and no tool calls.
    pub fn text(final_output: impl Into<String>) -> Self {
        Self {
            final_output: final_output.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Returns the last call to the named tool.
    pub fn last_call(&self, name: &str) -> Option<&ToolInvocation> {
        self.tool_calls.iter().rev().find(|call| call.name == name)
    }

    /// Returns the last call to the named tool that did not fail.
    pub fn last_successful_call(&self, name: &str) -> Option<&ToolInvocation> {
        self.tool_calls
            .iter()
            .rev()
            .find(|call| call.name == name && !call.is_error())
    }
}

/// Something that can answer a conversation using the tools.
///
/// An implementation receives the full message list (system prompt first)
/// and calls tools through the [`Toolbox`], which never fails.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(&self, messages: &[Message], toolbox: &Toolbox) -> Result<AgentRun>;
}
