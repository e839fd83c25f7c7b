//! Tool adapters for the agent system.
//!
//! Every external capability the planner can use is a [`ToolCall`] variant
//! with its own typed parameters, so unknown tools and missing arguments are
//! caught at parse time. [`tool_specs`] produces the descriptors the LLM
//! consumes for tool selection; [`ToolContext`] executes parsed calls.

mod critic;
mod frame_search;
mod transcript;
mod video_search;
mod vision;

pub use critic::{critic_tool, CriticOutcome, CriticReview, Verdict};

use crate::config::{Prompts, Settings};
use crate::error::{GlimtError, Result};
use crate::providers::{Providers, ToolSpec};
use crate::retry::RetryPolicy;
use futures::future::{BoxFuture, FutureExt};
use serde_json::json;

/// Identifier of one tool kind, used to select a planner's tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    GetSummaryTranscript,
    QuerySummaryTranscript,
    QueryVision,
    QueryFrames,
    RetrieveContext,
    VideoSearch,
    VideoQna,
}

impl ToolKind {
    /// Wire name of the tool.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::GetSummaryTranscript => "get_summary_transcript",
            ToolKind::QuerySummaryTranscript => "query_summary_transcript",
            ToolKind::QueryVision => "query_vision",
            ToolKind::QueryFrames => "query_frames",
            ToolKind::RetrieveContext => "retrieve_context",
            ToolKind::VideoSearch => "video_search",
            ToolKind::VideoQna => "video_qna",
        }
    }

    /// Default planner tool set for answering questions about a known video.
    pub fn default_qna_set() -> Vec<ToolKind> {
        vec![
            ToolKind::GetSummaryTranscript,
            ToolKind::QuerySummaryTranscript,
            ToolKind::QueryVision,
            ToolKind::QueryFrames,
        ]
    }
}

/// A parsed, typed tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    /// Fetch the full summary/transcript document of a video.
    GetSummaryTranscript { video_id: String },

    /// Answer a question from the summary/transcript document.
    QuerySummaryTranscript { query: String, video_id: String },

    /// Answer a question from frames sampled around a timestamp.
    QueryVision {
        query: String,
        timestamp: String,
        video_id: String,
    },

    /// Answer a question from search-selected keyframes.
    QueryFrames {
        query: String,
        video_id: String,
        frame_ids: Vec<String>,
        timestamp_ranges: Vec<(String, String)>,
    },

    /// Retrieve ranked summary/transcript documents for a query.
    RetrieveContext {
        query: String,
        index_name: String,
        video_id: Option<String>,
        youtube_url: Option<String>,
    },

    /// Find candidate video ids across the whole index.
    VideoSearch { query: String, top_n: usize },

    /// Answer a question about one video with a nested agent run.
    VideoQna {
        query: String,
        video_id: String,
        critic: bool,
    },

    /// Review a draft answer against frame evidence.
    Critic {
        timestamps: String,
        logs: String,
        video_id: String,
    },
}

/// Tool execution context for one orchestration run.
///
/// Owns its provider bundle; nothing in here is shared mutable state, so
/// concurrent invocations for different videos cannot interfere.
pub struct ToolContext {
    pub providers: Providers,
    pub prompts: Prompts,
    pub settings: Settings,
    pub retry: RetryPolicy,
}

impl ToolContext {
    /// Create a context from the provider bundle and settings.
    pub fn new(providers: Providers, prompts: Prompts, settings: Settings) -> Self {
        let retry = settings.agent.retry_policy(settings.llm.timeout_seconds);
        Self {
            providers,
            prompts,
            settings,
            retry,
        }
    }

    /// Execute a tool call and return the result as a string.
    ///
    /// Backend failures inside retry-wrapped tools come back as `Ok` error
    /// strings; only missing artifacts and setup problems surface as `Err`.
    ///
    /// Returns a boxed future: the video analysis tool runs a nested agent
    /// loop whose planner executes tools again, and the indirection is what
    /// lets the recursive future type (and its `Send` bound) resolve.
    pub fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String>> {
        async move {
            match call {
                ToolCall::GetSummaryTranscript { video_id } => {
                    transcript::get_summary_transcript(self, video_id).await
                }
                ToolCall::QuerySummaryTranscript { query, video_id } => {
                    transcript::query_summary_transcript(self, query, video_id).await
                }
                ToolCall::QueryVision {
                    query,
                    timestamp,
                    video_id,
                } => vision::query_vision(self, query, timestamp, video_id).await,
                ToolCall::QueryFrames {
                    query,
                    video_id,
                    frame_ids,
                    timestamp_ranges,
                } => {
                    frame_search::query_frames(self, query, video_id, frame_ids, timestamp_ranges)
                        .await
                }
                ToolCall::RetrieveContext {
                    query,
                    index_name,
                    video_id,
                    youtube_url,
                } => {
                    frame_search::retrieve_context(
                        self,
                        query,
                        index_name,
                        video_id.as_deref(),
                        youtube_url.as_deref(),
                    )
                    .await
                }
                ToolCall::VideoSearch { query, top_n } => {
                    video_search::video_search(self, query, *top_n).await
                }
                ToolCall::VideoQna {
                    query,
                    video_id,
                    critic,
                } => {
                    let request = crate::video_qna::QnaRequest::new(query, video_id)
                        .with_critic(*critic);
                    let qna = crate::video_qna::VideoQna::new(
                        request,
                        self.providers.clone(),
                        &self.settings,
                    )?;
                    let response = qna.run().await?;
                    Ok(response.answer)
                }
                ToolCall::Critic {
                    timestamps,
                    logs,
                    video_id,
                } => Ok(critic_tool(self, timestamps, logs, video_id)
                    .await?
                    .render()),
            }
        }
        .boxed()
    }
}

/// Tool descriptors for the given tool kinds, for LLM tool selection.
pub fn tool_specs(kinds: &[ToolKind]) -> Vec<ToolSpec> {
    kinds.iter().map(spec_for).collect()
}

/// Descriptor of the critic tool (only ever given to the critic agent).
pub fn critic_spec() -> ToolSpec {
    ToolSpec {
        name: "critic".to_string(),
        description: "Perform visual criticism of the reasoning log against frames \
            sampled at the given timestamps."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "timestamps": {
                    "type": "string",
                    "description": "A pipe-separated list of relevant timestamps (fewer than 10) \
                        in the format HH:MM:SS only. Example: '00:00:00|00:01:30'. Entries like \
                        '00:00:27,920' or 'END' are not allowed."
                },
                "logs": {
                    "type": "string",
                    "description": "Complete retrieval and reasoning logs with tool usage \
                        (which tool was used) and output"
                },
                "video_id": {
                    "type": "string",
                    "description": "The video id"
                }
            },
            "required": ["timestamps", "logs", "video_id"]
        }),
    }
}

fn spec_for(kind: &ToolKind) -> ToolSpec {
    match kind {
        ToolKind::GetSummaryTranscript => ToolSpec {
            name: kind.name().to_string(),
            description: "Get the full summary and transcript document of a video. \
                Use this first to understand what the video covers."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "video_id": {"type": "string", "description": "The video id"}
                },
                "required": ["video_id"]
            }),
        },
        ToolKind::QuerySummaryTranscript => ToolSpec {
            name: kind.name().to_string(),
            description: "Answer a question from the video's summary and transcript. \
                Use this for questions about what was said or done."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The question to answer"},
                    "video_id": {"type": "string", "description": "The video id"}
                },
                "required": ["query", "video_id"]
            }),
        },
        ToolKind::QueryVision => ToolSpec {
            name: kind.name().to_string(),
            description: "Answer a question from the video frames sampled around a \
                timestamp. Use this for questions about what is visible on screen."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The question to answer"},
                    "timestamp": {
                        "type": "string",
                        "description": "Timestamp in format HH:MM:SS"
                    },
                    "video_id": {"type": "string", "description": "The video id"}
                },
                "required": ["query", "timestamp", "video_id"]
            }),
        },
        ToolKind::QueryFrames => ToolSpec {
            name: kind.name().to_string(),
            description: "Answer a question from keyframes selected by search. \
                Provide either explicit frame ids or timestamp ranges to scope the search."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The question to answer"},
                    "video_id": {"type": "string", "description": "The video id"},
                    "frame_ids": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Explicit keyframe filenames to inspect"
                    },
                    "timestamp_ranges": {
                        "type": "array",
                        "items": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "A [start, end] pair in format HH:MM:SS"
                        },
                        "description": "Timestamp ranges relevant to the query"
                    }
                },
                "required": ["query", "video_id"]
            }),
        },
        ToolKind::RetrieveContext => ToolSpec {
            name: kind.name().to_string(),
            description: "Retrieve ranked summary/transcript documents related to the \
                query from the vector index."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Query to fetch documents for"},
                    "index_name": {"type": "string", "description": "Vector index name"},
                    "video_id": {
                        "type": "string",
                        "description": "Video id, if provided in the instruction"
                    },
                    "youtube_url": {
                        "type": "string",
                        "description": "YouTube url, if provided in the instruction"
                    }
                },
                "required": ["query", "index_name"]
            }),
        },
        ToolKind::VideoSearch => ToolSpec {
            name: kind.name().to_string(),
            description: "Find the ids of ingested videos relevant to the query."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Query to find videos for"},
                    "top_n": {
                        "type": "integer",
                        "description": "Number of video ids to retrieve (default: 3)",
                        "default": 3
                    }
                },
                "required": ["query"]
            }),
        },
        ToolKind::VideoQna => ToolSpec {
            name: kind.name().to_string(),
            description: "Answer a question about the content of one specific video. \
                Runs the full video analysis pipeline for that video."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The question to answer"},
                    "video_id": {"type": "string", "description": "The video id"},
                    "critic": {
                        "type": "boolean",
                        "description": "Validate the answer with a critic pass (default: true)",
                        "default": true
                    }
                },
                "required": ["query", "video_id"]
            }),
        },
    }
}

/// Parse a tool call from the model's function-call format.
pub fn parse_tool_call(name: &str, arguments: &str) -> Result<ToolCall> {
    let args: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| GlimtError::Agent(format!("Invalid tool arguments: {}", e)))?;

    let required_str = |field: &str| -> Result<String> {
        args[field]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| GlimtError::Agent(format!("Missing '{}' argument", field)))
    };
    let optional_str =
        |field: &str| -> Option<String> { args[field].as_str().map(str::to_string) };

    match name {
        "get_summary_transcript" => Ok(ToolCall::GetSummaryTranscript {
            video_id: required_str("video_id")?,
        }),
        "query_summary_transcript" => Ok(ToolCall::QuerySummaryTranscript {
            query: required_str("query")?,
            video_id: required_str("video_id")?,
        }),
        "query_vision" => Ok(ToolCall::QueryVision {
            query: required_str("query")?,
            timestamp: required_str("timestamp")?,
            video_id: required_str("video_id")?,
        }),
        "query_frames" => {
            let frame_ids = args["frame_ids"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            let timestamp_ranges = args["timestamp_ranges"]
                .as_array()
                .map(|ranges| {
                    ranges
                        .iter()
                        .filter_map(|range| {
                            let pair = range.as_array()?;
                            Some((pair.first()?.as_str()?.to_string(), pair.get(1)?.as_str()?.to_string()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(ToolCall::QueryFrames {
                query: required_str("query")?,
                video_id: required_str("video_id")?,
                frame_ids,
                timestamp_ranges,
            })
        }
        "retrieve_context" => Ok(ToolCall::RetrieveContext {
            query: required_str("query")?,
            index_name: required_str("index_name")?,
            video_id: optional_str("video_id"),
            youtube_url: optional_str("youtube_url"),
        }),
        "video_search" => Ok(ToolCall::VideoSearch {
            query: required_str("query")?,
            top_n: args["top_n"].as_u64().unwrap_or(3) as usize,
        }),
        "video_qna" => Ok(ToolCall::VideoQna {
            query: required_str("query")?,
            video_id: required_str("video_id")?,
            critic: args["critic"].as_bool().unwrap_or(true),
        }),
        "critic" => Ok(ToolCall::Critic {
            timestamps: required_str("timestamps")?,
            logs: required_str("logs")?,
            video_id: required_str("video_id")?,
        }),
        _ => Err(GlimtError::Agent(format!("Unknown tool: {}", name))),
    }
}
