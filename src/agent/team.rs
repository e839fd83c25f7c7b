//! Planner/critic orchestration loop.
//!
//! The team alternates speakers over a shared conversation: the planner
//! drives toward an answer with its tools, and when enabled the critic is
//! selected exactly when the planner's latest content turn asks for
//! criticism or feedback. The critic never takes two turns in a row.
//!
//! Every appended turn is checked for termination, in this order: the
//! terminal phrase, then the armed critic acceptance, then the turn ceiling.

use super::conversation::{Conversation, Speaker, TerminationReason, Turn};
use super::critic::CriticAgent;
use super::planner::PlannerAgent;
use crate::config::AgentSettings;
use crate::error::Result;
use crate::providers::ChatMessage;
use crate::tools::Verdict;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, instrument};

/// Loop configuration for one run.
#[derive(Debug, Clone)]
pub struct TeamConfig {
    pub critic_enabled: bool,
    pub max_turns: usize,
    pub terminal_phrase: String,
}

impl TeamConfig {
    /// Configuration for the validated planner/critic loop.
    pub fn with_critic(settings: &AgentSettings) -> Self {
        Self {
            critic_enabled: true,
            max_turns: settings.max_turns_with_critic,
            terminal_phrase: settings.terminal_phrase.clone(),
        }
    }

    /// Configuration for the plain single-agent tool loop.
    pub fn without_critic(settings: &AgentSettings) -> Self {
        Self {
            critic_enabled: false,
            max_turns: settings.max_turns,
            terminal_phrase: settings.terminal_phrase.clone(),
        }
    }
}

/// Completed run of the team.
#[derive(Debug, Clone)]
pub struct TeamResult {
    /// Content of the turn that terminated the run.
    pub final_content: String,
    pub reason: TerminationReason,
    pub conversation: Conversation,
}

/// Events emitted by a streaming run.
#[derive(Debug, Clone)]
pub enum TeamEvent {
    Turn(Turn),
    Completed(TeamResult),
    /// The loop itself failed; no result will follow.
    Failed(String),
}

/// The planner/critic team.
pub struct AgentTeam {
    planner: PlannerAgent,
    critic: Option<CriticAgent>,
    config: TeamConfig,
}

impl AgentTeam {
    pub fn new(planner: PlannerAgent, critic: Option<CriticAgent>, config: TeamConfig) -> Self {
        Self {
            planner,
            critic,
            config,
        }
    }

    /// Run the loop to completion.
    #[instrument(skip(self, task))]
    pub async fn run(&self, task: &str) -> Result<TeamResult> {
        self.run_inner(task, None).await
    }

    /// Run the loop in a background task, emitting every turn as it lands.
    ///
    /// The receiver yields [`TeamEvent::Turn`] per appended turn and ends
    /// with either `Completed` or `Failed`.
    pub fn run_stream(self, task: &str) -> UnboundedReceiver<TeamEvent> {
        let (events, receiver) = mpsc::unbounded();
        let task = task.to_string();
        tokio::spawn(async move {
            match self.run_inner(&task, Some(&events)).await {
                Ok(result) => {
                    let _ = events.unbounded_send(TeamEvent::Completed(result));
                }
                Err(e) => {
                    let _ = events.unbounded_send(TeamEvent::Failed(e.to_string()));
                }
            }
        });
        receiver
    }

    async fn run_inner(
        &self,
        task: &str,
        events: Option<&UnboundedSender<TeamEvent>>,
    ) -> Result<TeamResult> {
        let mut history = vec![ChatMessage::user_text(task)];
        let mut conversation = Conversation::new();
        let mut accept_armed = false;

        loop {
            let critic = self
                .critic
                .as_ref()
                .filter(|_| self.config.critic_enabled && solicits_feedback(&conversation));

            if let Some(critic) = critic {
                let step = critic.step(&history).await?;
                history.extend(step.messages);
                match step.verdict {
                    Some(Verdict::Accept) => accept_armed = true,
                    Some(Verdict::Continue) => accept_armed = false,
                    None => {}
                }
                debug!(armed = accept_armed, "Critic step complete");

                for turn in step.turns {
                    if let Some(result) = self.note_turn(&mut conversation, events, turn) {
                        return Ok(self.finish(result, conversation));
                    }
                }
            } else {
                let step = self.planner.step(&history).await?;
                history.extend(step.messages);

                for turn in step.turns {
                    if let Some(result) = self.note_turn(&mut conversation, events, turn) {
                        return Ok(self.finish(result, conversation));
                    }
                }

                // An accepted draft's next content turn ends the run even
                // without the terminal phrase.
                if accept_armed {
                    if let Some(content) = step.final_content {
                        return Ok(self.finish(
                            (content, TerminationReason::CriticAccept),
                            conversation,
                        ));
                    }
                }
            }
        }
    }

    /// Emit and append one turn, returning the termination outcome if this
    /// turn ends the run.
    fn note_turn(
        &self,
        conversation: &mut Conversation,
        events: Option<&UnboundedSender<TeamEvent>>,
        turn: Turn,
    ) -> Option<(String, TerminationReason)> {
        if let Some(events) = events {
            let _ = events.unbounded_send(TeamEvent::Turn(turn.clone()));
        }
        let content = turn.content.clone();
        let has_phrase = content.contains(&self.config.terminal_phrase);
        conversation.push(turn);

        if has_phrase {
            return Some((content, TerminationReason::TerminalPhrase));
        }
        if conversation.len() >= self.config.max_turns {
            return Some((content, TerminationReason::TurnCeiling));
        }
        None
    }

    fn finish(
        &self,
        (final_content, reason): (String, TerminationReason),
        conversation: Conversation,
    ) -> TeamResult {
        info!(?reason, turns = conversation.len(), "Run terminated");
        TeamResult {
            final_content,
            reason,
            conversation,
        }
    }
}

/// The critic speaks exactly when the latest turn is planner content asking
/// for criticism or feedback. A critic turn never follows another critic
/// turn, and the first turn is always the planner's.
fn solicits_feedback(conversation: &Conversation) -> bool {
    match conversation.last() {
        Some(turn) if turn.speaker == Speaker::Planner && turn.tool_call.is_none() => {
            let lower = turn.content.to_lowercase();
            lower.contains("feedback") || lower.contains("critic")
        }
        _ => false,
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
    use crate::tools::{ToolContext, ToolKind};
    use crate::artifacts;
    use futures::StreamExt;
    use std::sync::Arc;

    struct Fixture {
        team: AgentTeam,
        llm: Arc<ScriptedLlm>,
        vision: Arc<ScriptedLlm>,
    }

    /// Both agents share one scripted model, so the script is consumed in
    /// exact speaker order.
    fn fixture(
        dir: &std::path::Path,
        script: Vec<ChatOutcome>,
        vision_script: Vec<ChatOutcome>,
        config: TeamConfig,
    ) -> Fixture {
        let llm = Arc::new(ScriptedLlm::replying(script));
        let vision = Arc::new(ScriptedLlm::replying(vision_script));
        let providers = Providers {
            llm: llm.clone(),
            vision: vision.clone(),
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
        let context = Arc::new(context);

        let prompts = Prompts::default();
        let planner_prompt = if config.critic_enabled {
            prompts.planner.with_critic.clone()
        } else {
            prompts.planner.without_critic.clone()
        };
        let planner = PlannerAgent::new(
            context.clone(),
            ToolKind::default_qna_set(),
            planner_prompt,
        );
        let critic = config
            .critic_enabled
            .then(|| CriticAgent::new(context.clone(), prompts.critic.agent.clone()));

        Fixture {
            team: AgentTeam::new(planner, critic, config),
            llm,
            vision,
        }
    }

    fn tool_call(name: &str, arguments: serde_json::Value) -> ChatOutcome {
        ChatOutcome {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "call-1".to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        }
    }

    fn critic_call() -> ChatOutcome {
        tool_call(
            "critic",
            serde_json::json!({
                "timestamps": "00:00:04",
                "logs": "draft: red shirt",
                "video_id": "vid",
            }),
        )
    }

    fn review_reply(verdict: &str) -> ChatOutcome {
        ChatOutcome::text(
            serde_json::json!({ "Feedback": "checked", "Verdict": verdict }).to_string(),
        )
    }

    #[tokio::test]
    async fn test_plain_loop_terminates_on_phrase_without_critic() {
        let dir = tempfile::tempdir().unwrap();
        artifacts::testing::write_fixture(dir.path(), "vid", 3);
        let config = TeamConfig::without_critic(&Settings::default().agent);
        assert_eq!(config.max_turns, 20);

        let f = fixture(
            dir.path(),
            vec![
                tool_call(
                    "get_summary_transcript",
                    serde_json::json!({"video_id": "vid"}),
                ),
                ChatOutcome::text("The tutor wears a red shirt. TERMINATE"),
            ],
            vec![],
            config,
        );

        let result = f.team.run("query: shirt color. video id: vid").await.unwrap();
        assert_eq!(result.reason, TerminationReason::TerminalPhrase);
        assert!(result.final_content.contains("red shirt"));
        // One tool turn plus the final content turn.
        assert_eq!(result.conversation.len(), 2);
        // The critic model was never consulted.
        assert_eq!(f.vision.call_count(), 0);
        assert_eq!(f.llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_critic_cycle_first_turn_is_planner() {
        let dir = tempfile::tempdir().unwrap();
        artifacts::testing::write_fixture(dir.path(), "vid", 10);

        let f = fixture(
            dir.path(),
            vec![
                // Planner drafts and solicits a review.
                ChatOutcome::text("Draft: the tutor wears a red shirt. Requesting critic feedback."),
                // Critic runs its tool.
                critic_call(),
                // Planner finalizes.
                ChatOutcome::text("The tutor wears a red shirt. TERMINATE"),
            ],
            vec![review_reply("YES")],
            TeamConfig::with_critic(&Settings::default().agent),
        );

        let result = f.team.run("query: shirt color. video id: vid").await.unwrap();
        assert_eq!(result.reason, TerminationReason::TerminalPhrase);

        let speakers: Vec<Speaker> = result
            .conversation
            .turns()
            .iter()
            .map(|t| t.speaker)
            .collect();
        assert_eq!(speakers, vec![Speaker::Planner, Speaker::Critic, Speaker::Planner]);
        assert!(result.conversation.turns()[1].content.ends_with("Verdict: YES"));
    }

    #[tokio::test]
    async fn test_rejecting_critic_keeps_the_loop_going() {
        let dir = tempfile::tempdir().unwrap();
        artifacts::testing::write_fixture(dir.path(), "vid", 10);

        let f = fixture(
            dir.path(),
            vec![
                ChatOutcome::text("Draft: blue shirt. Requesting critic feedback."),
                critic_call(),
                // Planner reworks after the rejection and asks again.
                ChatOutcome::text("Corrected draft: red shirt. Requesting critic feedback."),
                critic_call(),
                ChatOutcome::text("The shirt is red. TERMINATE"),
            ],
            vec![review_reply("NO"), review_reply("YES")],
            TeamConfig::with_critic(&Settings::default().agent),
        );

        let result = f.team.run("task").await.unwrap();
        assert_eq!(result.reason, TerminationReason::TerminalPhrase);
        assert_eq!(result.conversation.len(), 5);
        assert_eq!(f.vision.call_count(), 2);
    }

    #[tokio::test]
    async fn test_accepted_draft_terminates_without_phrase() {
        let dir = tempfile::tempdir().unwrap();
        artifacts::testing::write_fixture(dir.path(), "vid", 10);

        let f = fixture(
            dir.path(),
            vec![
                ChatOutcome::text("Draft: red shirt. Requesting critic feedback."),
                critic_call(),
                // Finalizes but forgets the phrase; acceptance still ends it.
                ChatOutcome::text("The tutor wears a red shirt."),
            ],
            vec![review_reply("YES")],
            TeamConfig::with_critic(&Settings::default().agent),
        );

        let result = f.team.run("task").await.unwrap();
        assert_eq!(result.reason, TerminationReason::CriticAccept);
        assert_eq!(result.final_content, "The tutor wears a red shirt.");
    }

    #[tokio::test]
    async fn test_critic_without_tool_call_hands_back_to_planner() {
        let dir = tempfile::tempdir().unwrap();
        artifacts::testing::write_fixture(dir.path(), "vid", 10);

        let f = fixture(
            dir.path(),
            vec![
                ChatOutcome::text("Draft ready. Requesting critic feedback."),
                // Critic replies without reviewing; planner must speak next.
                ChatOutcome::text("Please include your full tool log."),
                ChatOutcome::text("Full log attached. Requesting critic feedback."),
                critic_call(),
                ChatOutcome::text("Answer. TERMINATE"),
            ],
            vec![review_reply("YES")],
            TeamConfig::with_critic(&Settings::default().agent),
        );

        let result = f.team.run("task").await.unwrap();
        let speakers: Vec<Speaker> = result
            .conversation
            .turns()
            .iter()
            .map(|t| t.speaker)
            .collect();
        assert_eq!(
            speakers,
            vec![
                Speaker::Planner,
                Speaker::Critic,
                Speaker::Planner,
                Speaker::Critic,
                Speaker::Planner,
            ]
        );
    }

    #[tokio::test]
    async fn test_turn_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TeamConfig::without_critic(&Settings::default().agent);
        config.max_turns = 3;

        // The scripted fallback keeps producing non-terminal content.
        let f = fixture(dir.path(), vec![], vec![], config);

        let result = f.team.run("task").await.unwrap();
        assert_eq!(result.reason, TerminationReason::TurnCeiling);
        assert_eq!(result.conversation.len(), 3);
        assert_eq!(f.llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_phrase_wins_over_ceiling_on_the_same_turn() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TeamConfig::without_critic(&Settings::default().agent);
        config.max_turns = 1;

        let f = fixture(
            dir.path(),
            vec![ChatOutcome::text("Answer. TERMINATE")],
            vec![],
            config,
        );

        let result = f.team.run("task").await.unwrap();
        assert_eq!(result.reason, TerminationReason::TerminalPhrase);
    }

    #[tokio::test]
    async fn test_run_stream_emits_turns_then_completion() {
        let dir = tempfile::tempdir().unwrap();
        artifacts::testing::write_fixture(dir.path(), "vid", 3);

        let f = fixture(
            dir.path(),
            vec![
                tool_call(
                    "get_summary_transcript",
                    serde_json::json!({"video_id": "vid"}),
                ),
                ChatOutcome::text("Answer. TERMINATE"),
            ],
            vec![],
            TeamConfig::without_critic(&Settings::default().agent),
        );

        let events: Vec<TeamEvent> = f.team.run_stream("task").collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], TeamEvent::Turn(_)));
        assert!(matches!(events[1], TeamEvent::Turn(_)));
        match &events[2] {
            TeamEvent::Completed(result) => {
                assert_eq!(result.reason, TerminationReason::TerminalPhrase);
            }
            _ => panic!("Expected completion event"),
        }
    }
}
