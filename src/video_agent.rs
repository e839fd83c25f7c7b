//! Question answering over the whole video library.
//!
//! Unlike [`crate::video_qna`], no video id is given: the planner first
//! discovers candidate videos with the search tool, then answers the
//! question per video through the nested analysis tool. This outer loop
//! runs without a critic; validation happens inside the nested runs.

use crate::agent::{AgentTeam, PlannerAgent, TeamConfig, TeamEvent, TerminationReason};
use crate::config::{Prompts, Settings};
use crate::error::Result;
use crate::providers::Providers;
use crate::tools::{ToolContext, ToolKind};
use crate::video_qna::QnaResponse;
use futures::channel::mpsc::UnboundedReceiver;
use std::sync::Arc;
use tracing::instrument;

/// Default number of candidate videos to retrieve.
const DEFAULT_TOP_N: usize = 3;

/// One question against the video library.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub query: String,
    /// Number of candidate videos the planner is told to retrieve.
    pub top_n: usize,
}

impl AgentRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }
}

/// A configured, ready-to-run library-wide invocation.
pub struct VideoAgent {
    request: AgentRequest,
    team: AgentTeam,
    terminal_phrase: String,
}

impl VideoAgent {
    pub fn new(request: AgentRequest, providers: Providers, settings: &Settings) -> Result<Self> {
        Self::with_prompts(request, providers, settings, Prompts::default())
    }

    pub fn with_prompts(
        request: AgentRequest,
        providers: Providers,
        settings: &Settings,
        prompts: Prompts,
    ) -> Result<Self> {
        let planner_prompt = prompts.planner.multi_video.clone();
        let context = Arc::new(ToolContext::new(providers, prompts, settings.clone()));
        let planner = PlannerAgent::new(
            context,
            vec![ToolKind::VideoSearch, ToolKind::VideoQna],
            planner_prompt,
        );

        Ok(Self {
            request,
            team: AgentTeam::new(planner, None, TeamConfig::without_critic(&settings.agent)),
            terminal_phrase: settings.agent.terminal_phrase.clone(),
        })
    }

    fn task(&self) -> String {
        format!(
            "query: {}\nInstruction: retrieve up to {} relevant videos, then answer from them.",
            self.request.query, self.request.top_n
        )
    }

    /// Run to completion and return the combined answer.
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<QnaResponse> {
        let result = self.team.run(&self.task()).await?;
        Ok(QnaResponse {
            answer: result
                .final_content
                .replace(&self.terminal_phrase, "")
                .trim()
                .to_string(),
            answered: result.reason != TerminationReason::TurnCeiling,
            reason: result.reason,
            turns: result.conversation.len(),
        })
    }

    /// Run in the background, emitting every turn as it lands.
    pub fn run_stream(self) -> UnboundedReceiver<TeamEvent> {
        let task = self.task();
        self.team.run_stream(&task)
    }
}

/// Answer a question against the whole library with the default setup.
pub async fn video_agent(
    request: AgentRequest,
    providers: Providers,
    settings: &Settings,
) -> Result<QnaResponse> {
    VideoAgent::new(request, providers, settings)?.run().await
}
