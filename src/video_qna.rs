//! Question answering over one ingested video.
//!
//! The entry point for questions where the video is already known. Builds a
//! planner/critic team over the video's artifacts, verifies those artifacts
//! up front, and runs the loop to a final answer.

use crate::agent::{
    AgentTeam, CriticAgent, PlannerAgent, TeamConfig, TeamEvent, TerminationReason,
};
use crate::config::{Prompts, Settings};
use crate::error::Result;
use crate::providers::Providers;
use crate::tools::{ToolContext, ToolKind};
use futures::channel::mpsc::UnboundedReceiver;
use std::sync::Arc;
use tracing::{info, instrument};

/// One question about one video.
#[derive(Debug, Clone)]
pub struct QnaRequest {
    pub query: String,
    pub video_id: String,
    /// Validate the draft answer with a critic pass before finalizing.
    pub critic: bool,
    /// Tools available to the planner.
    pub tools: Vec<ToolKind>,
}

impl QnaRequest {
    pub fn new(query: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            video_id: video_id.into(),
            critic: true,
            tools: ToolKind::default_qna_set(),
        }
    }

    pub fn with_critic(mut self, critic: bool) -> Self {
        self.critic = critic;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolKind>) -> Self {
        self.tools = tools;
        self
    }
}

/// The answer produced by a run.
#[derive(Debug, Clone)]
pub struct QnaResponse {
    /// Final answer text with the terminal phrase stripped.
    pub answer: String,
    /// False when the run hit the turn ceiling instead of answering.
    pub answered: bool,
    pub reason: TerminationReason,
    /// Number of conversation turns the run took.
    pub turns: usize,
}

/// A configured, ready-to-run QnA invocation.
pub struct VideoQna {
    request: QnaRequest,
    providers: Providers,
    team: AgentTeam,
    terminal_phrase: String,
}

impl VideoQna {
    /// Build the invocation. Fails on setup problems (prompt loading,
    /// provider construction) before any turn executes.
    pub fn new(request: QnaRequest, providers: Providers, settings: &Settings) -> Result<Self> {
        Self::with_prompts(request, providers, settings, Prompts::default())
    }

    /// Build the invocation with custom prompts.
    pub fn with_prompts(
        request: QnaRequest,
        providers: Providers,
        settings: &Settings,
        prompts: Prompts,
    ) -> Result<Self> {
        let planner_prompt = if request.critic {
            prompts.planner.with_critic.clone()
        } else {
            prompts.planner.without_critic.clone()
        };
        let critic_prompt = prompts.critic.agent.clone();

        let context = Arc::new(ToolContext::new(
            providers.clone(),
            prompts,
            settings.clone(),
        ));
        let planner = PlannerAgent::new(context.clone(), request.tools.clone(), planner_prompt);
        let critic = request
            .critic
            .then(|| CriticAgent::new(context, critic_prompt));
        let config = if request.critic {
            TeamConfig::with_critic(&settings.agent)
        } else {
            TeamConfig::without_critic(&settings.agent)
        };

        Ok(Self {
            request,
            providers,
            team: AgentTeam::new(planner, critic, config),
            terminal_phrase: settings.agent.terminal_phrase.clone(),
        })
    }

    fn task(&self) -> String {
        format!(
            "query: {}\nInstruction: video id: {}",
            self.request.query, self.request.video_id
        )
    }

    /// Run to completion and return the answer.
    #[instrument(skip(self), fields(video_id = %self.request.video_id))]
    pub async fn run(self) -> Result<QnaResponse> {
        // A missing upload fails the invocation before any model call.
        self.providers
            .artifacts
            .verify(&self.request.video_id)
            .await?;
        info!("Answering question about video {}", self.request.video_id);

        let result = self.team.run(&self.task()).await?;
        Ok(QnaResponse {
            answer: strip_phrase(&result.final_content, &self.terminal_phrase),
            answered: result.reason != TerminationReason::TurnCeiling,
            reason: result.reason,
            turns: result.conversation.len(),
        })
    }

    /// Run in the background, emitting every turn as it lands.
    pub async fn run_stream(self) -> Result<UnboundedReceiver<TeamEvent>> {
        self.providers
            .artifacts
            .verify(&self.request.video_id)
            .await?;
        let task = self.task();
        Ok(self.team.run_stream(&task))
    }
}

/// Answer a question about one video with the default setup.
pub async fn video_qna(
    request: QnaRequest,
    providers: Providers,
    settings: &Settings,
) -> Result<QnaResponse> {
    VideoQna::new(request, providers, settings)?.run().await
}

fn strip_phrase(content: &str, phrase: &str) -> String {
    content.replace(phrase, "").trim().to_string()
}
