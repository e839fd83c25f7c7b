//! The planner agent.
//!
//! One planner step is one chat completion. When the model requests tool
//! calls they are executed sequentially and their results appended as tool
//! turns; otherwise the step yields a content turn, which may carry the
//! final answer.

use super::conversation::{ToolCallRecord, Turn};
use crate::error::{GlimtError, Result};
use crate::providers::{ChatMessage, ChatOutcome, ChatRequest};
use crate::retry::with_retry;
use crate::tools::{self, ToolContext, ToolKind};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Outcome of one planner step.
#[derive(Debug)]
pub struct PlannerStep {
    /// Turns to append to the conversation, in order.
    pub turns: Vec<Turn>,
    /// Messages to append to the shared chat history, in order.
    pub messages: Vec<ChatMessage>,
    /// The step's content when no tool was called.
    pub final_content: Option<String>,
}

/// Tool-using agent that drives the conversation toward an answer.
pub struct PlannerAgent {
    context: Arc<ToolContext>,
    tool_kinds: Vec<ToolKind>,
    system_prompt: String,
}

impl PlannerAgent {
    pub fn new(context: Arc<ToolContext>, tool_kinds: Vec<ToolKind>, system_prompt: String) -> Self {
        Self {
            context,
            tool_kinds,
            system_prompt,
        }
    }

    /// Run one step against the shared history (which excludes system
    /// messages; each agent prepends its own).
    ///
    /// Model failures here are loop-level: unlike tool backends, a planner
    /// that cannot produce a completion cannot continue the conversation.
    #[instrument(skip(self, history))]
    pub async fn step(&self, history: &[ChatMessage]) -> Result<PlannerStep> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::System(self.system_prompt.clone()));
        messages.extend_from_slice(history);

        let request = ChatRequest {
            messages,
            tools: tools::tool_specs(&self.tool_kinds),
            ..Default::default()
        };

        let outcome = with_retry(&self.context.retry, || {
            self.context.providers.llm.chat(request.clone())
        })
        .await
        .map_err(|e| GlimtError::Agent(format!("Planner completion failed: {}", e)))?;

        self.apply(outcome).await
    }

    async fn apply(&self, outcome: ChatOutcome) -> Result<PlannerStep> {
        let mut step = PlannerStep {
            turns: Vec::new(),
            messages: Vec::new(),
            final_content: None,
        };

        if outcome.tool_calls.is_empty() {
            let content = outcome.content.unwrap_or_default();
            step.messages.push(ChatMessage::Assistant {
                content: Some(content.clone()),
                tool_calls: Vec::new(),
            });
            step.turns.push(Turn::planner(content.clone()));
            step.final_content = Some(content);
            return Ok(step);
        }

        if let Some(content) = outcome.content.as_deref().filter(|c| !c.trim().is_empty()) {
            step.turns.push(Turn::planner(content));
        }
        step.messages.push(ChatMessage::Assistant {
            content: outcome.content.clone(),
            tool_calls: outcome.tool_calls.clone(),
        });

        for call in &outcome.tool_calls {
            debug!("Planner invokes {}", call.name);
            let result = match tools::parse_tool_call(&call.name, &call.arguments) {
                Ok(parsed) => match self.context.execute(&parsed).await {
                    Ok(result) => result,
                    Err(e) => format!("Tool error: {}", e),
                },
                Err(e) => format!("Tool error: {}", e),
            };

            step.messages.push(ChatMessage::Tool {
                call_id: call.id.clone(),
                content: result.clone(),
            });
            step.turns.push(Turn::tool(ToolCallRecord {
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                result,
            }));
        }

        Ok(step)
    }
}
