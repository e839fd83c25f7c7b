//! The critic agent.
//!
//! The critic owns exactly one tool. Its step asks the model which
//! timestamps to inspect, runs the review, and relays the tool's feedback
//! and verdict back into the conversation.

use super::conversation::{ToolCallRecord, Turn};
use crate::error::{GlimtError, Result};
use crate::providers::{ChatMessage, ChatRequest};
use crate::retry::with_retry;
use crate::tools::{self, critic_tool, ToolCall, ToolContext, Verdict};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Outcome of one critic step.
pub struct CriticStep {
    pub turns: Vec<Turn>,
    pub messages: Vec<ChatMessage>,
    /// The review verdict, when the tool completed one.
    pub verdict: Option<Verdict>,
}

/// Agent that validates the planner's draft against frame evidence.
pub struct CriticAgent {
    context: Arc<ToolContext>,
    system_prompt: String,
}

impl CriticAgent {
    pub fn new(context: Arc<ToolContext>, system_prompt: String) -> Self {
        Self {
            context,
            system_prompt,
        }
    }

    /// Run one review step against the shared history.
    #[instrument(skip(self, history))]
    pub async fn step(&self, history: &[ChatMessage]) -> Result<CriticStep> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::System(self.system_prompt.clone()));
        messages.extend_from_slice(history);

        let request = ChatRequest {
            messages,
            tools: vec![tools::critic_spec()],
            ..Default::default()
        };

        let outcome = with_retry(&self.context.retry, || {
            self.context.providers.llm.chat(request.clone())
        })
        .await
        .map_err(|e| GlimtError::Agent(format!("Critic completion failed: {}", e)))?;

        let mut step = CriticStep {
            turns: Vec::new(),
            messages: Vec::new(),
            verdict: None,
        };

        // Without a tool call there is no review; the content still lands
        // in the conversation so the planner sees the critic spoke.
        let Some(call) = outcome.tool_calls.first() else {
            let content = outcome.content.unwrap_or_default();
            step.messages.push(ChatMessage::Assistant {
                content: Some(content.clone()),
                tool_calls: Vec::new(),
            });
            step.turns.push(Turn::critic(content, None));
            return Ok(step);
        };

        step.messages.push(ChatMessage::Assistant {
            content: outcome.content.clone(),
            tool_calls: vec![call.clone()],
        });

        let review = match tools::parse_tool_call(&call.name, &call.arguments)? {
            ToolCall::Critic {
                timestamps,
                logs,
                video_id,
            } => critic_tool(&self.context, &timestamps, &logs, &video_id).await?,
            other => {
                return Err(GlimtError::Agent(format!(
                    "Critic requested a non-critic tool: {:?}",
                    other
                )))
            }
        };
        debug!("Critic verdict: {:?}", review.verdict());

        step.verdict = review.verdict();
        let content = review.render();
        step.messages.push(ChatMessage::Tool {
            call_id: call.id.clone(),
            content: content.clone(),
        });
        step.turns.push(Turn::critic(
            content.clone(),
            Some(ToolCallRecord {
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                result: content,
            }),
        ));

        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Prompts, Settings};
    use crate::providers::testing::{ScriptedLlm, StaticEmbedder};
    use crate::providers::{ChatOutcome, Providers, ToolCallRequest};
    use crate::retry::RetryPolicy;
    use crate::search::MemorySearchIndex;
    use crate::{agent::conversation::Speaker, artifacts};
    use std::sync::Arc;

    fn critic(
        dir: &std::path::Path,
        llm: Arc<ScriptedLlm>,
        vision: Arc<ScriptedLlm>,
    ) -> CriticAgent {
        let providers = Providers {
            llm,
            vision,
            embedder: Arc::new(StaticEmbedder::new(4)),
            search: Arc::new(MemorySearchIndex::new()),
            artifacts: Arc::new(artifacts::LocalArtifactStore::new(dir).unwrap()),
        };
        let mut context = ToolContext::new(providers, Prompts::default(), Settings::default());
        context.retry = RetryPolicy {
            intervals: vec![],
            rate_limit_extra: std::time::Duration::from_millis(0),
            call_timeout: None,
        };
        CriticAgent::new(Arc::new(context), Prompts::default().critic.agent)
    }

    fn review_call(timestamps: &str) -> ChatOutcome {
        ChatOutcome {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "call-1".to_string(),
                name: "critic".to_string(),
                arguments: serde_json::json!({
                    "timestamps": timestamps,
                    "logs": "planner said the tutor wears a red shirt",
                    "video_id": "vid",
                })
                .to_string(),
            }],
        }
    }

    fn review_reply(feedback: &str, verdict: &str) -> ChatOutcome {
        ChatOutcome::text(
            serde_json::json!({ "Feedback": feedback, "Verdict": verdict }).to_string(),
        )
    }

    #[tokio::test]
    async fn test_accepting_review() {
        let dir = tempfile::tempdir().unwrap();
        artifacts::testing::write_fixture(dir.path(), "vid", 10);
        let llm = Arc::new(ScriptedLlm::replying(vec![review_call("00:00:04")]));
        let vision = Arc::new(ScriptedLlm::replying(vec![review_reply(
            "The red shirt is visible.",
            "YES",
        )]));
        let agent = critic(dir.path(), llm, vision);

        let step = agent
            .step(&[ChatMessage::user_text("task")])
            .await
            .unwrap();

        assert_eq!(step.verdict, Some(Verdict::Accept));
        assert_eq!(step.turns.len(), 1);
        assert_eq!(step.turns[0].speaker, Speaker::Critic);
        assert!(step.turns[0].content.contains("Critic Feedback"));
        assert!(step.turns[0].content.ends_with("Verdict: YES"));
        // Assistant tool-call message plus the tool result message.
        assert_eq!(step.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_rejecting_review() {
        let dir = tempfile::tempdir().unwrap();
        artifacts::testing::write_fixture(dir.path(), "vid", 10);
        let llm = Arc::new(ScriptedLlm::replying(vec![review_call("00:00:04")]));
        let vision = Arc::new(ScriptedLlm::replying(vec![review_reply(
            "The shirt is blue, not red.",
            "NO",
        )]));
        let agent = critic(dir.path(), llm, vision);

        let step = agent.step(&[ChatMessage::user_text("task")]).await.unwrap();
        assert_eq!(step.verdict, Some(Verdict::Continue));
        assert!(step.turns[0].content.ends_with("Verdict: NO"));
    }

    #[tokio::test]
    async fn test_invalid_timestamps_produce_no_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::replying(vec![review_call("END")]));
        let vision = Arc::new(ScriptedLlm::replying(vec![]));
        let agent = critic(dir.path(), llm, vision.clone());

        let step = agent.step(&[ChatMessage::user_text("task")]).await.unwrap();
        assert_eq!(step.verdict, None);
        assert_eq!(step.turns[0].content, "Invalid timestamps");
        assert_eq!(vision.call_count(), 0);
    }

    #[tokio::test]
    async fn test_step_without_tool_call_is_plain_content() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::replying(vec![ChatOutcome::text(
            "Please include your tool log.",
        )]));
        let agent = critic(dir.path(), llm, Arc::new(ScriptedLlm::replying(vec![])));

        let step = agent.step(&[ChatMessage::user_text("task")]).await.unwrap();
        assert_eq!(step.verdict, None);
        assert_eq!(step.turns[0].content, "Please include your tool log.");
    }
}
