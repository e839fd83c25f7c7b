//! Visual criticism of a draft answer.
//!
//! The critic tool samples frames around the timestamps the reasoning relied
//! on, budgets them to at most [`CRITIC_FRAME_BUDGET`] images, and asks the
//! vision backend whether the frames support the draft answer.

use super::ToolContext;
use crate::error::Result;
use crate::frames::{
    check_frame_alignment, critic_allocation, frame_window, nearest_frame_index,
    stack_window_into_groups, CRITIC_FRAME_BUDGET,
};
use crate::providers::{ChatMessage, ChatRequest, ContentPart};
use crate::retry::with_retry;
use crate::timestamp::parse_timestamp_list;
use serde_json::json;
use tracing::{debug, instrument};

/// Frames looked at before each timestamp's nearest match.
const CRITIC_WINDOW_BEFORE: usize = 5;
/// Frames looked at after each timestamp's nearest match.
const CRITIC_WINDOW_AFTER: usize = 4;

/// Reply when the timestamp list is rejected before any frame is sampled.
const INVALID_TIMESTAMPS: &str = "Invalid timestamps";

/// Verdict of a critic review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The draft answer holds up; the planner may finalize.
    Accept,
    /// The draft answer needs more work.
    Continue,
}

impl Verdict {
    /// Wire token of the verdict.
    pub fn token(&self) -> &'static str {
        match self {
            Verdict::Accept => "YES",
            Verdict::Continue => "NO",
        }
    }

    /// Parse a verdict token; anything other than an explicit "NO" accepts.
    fn parse(token: Option<&str>) -> Self {
        match token {
            Some(token) if token.trim().eq_ignore_ascii_case("NO") => Verdict::Continue,
            _ => Verdict::Accept,
        }
    }
}

/// One completed critic review.
#[derive(Debug, Clone)]
pub struct CriticReview {
    /// Feedback for the planner, wrapped as a JSON document.
    pub feedback: String,
    pub verdict: Verdict,
}

/// Result of one critic tool invocation.
#[derive(Debug, Clone)]
pub enum CriticOutcome {
    /// The timestamp list was rejected; no frames were sampled and no model
    /// call was made.
    InvalidTimestamps,
    /// The vision backend failed after the full retry schedule.
    Failed(String),
    Review(CriticReview),
}

impl CriticOutcome {
    /// Render the outcome as conversation content.
    pub fn render(&self) -> String {
        match self {
            CriticOutcome::InvalidTimestamps => INVALID_TIMESTAMPS.to_string(),
            CriticOutcome::Failed(message) => message.clone(),
            CriticOutcome::Review(review) => {
                format!("{} Verdict: {}", review.feedback, review.verdict.token())
            }
        }
    }

    /// Verdict, when the review produced one.
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            CriticOutcome::Review(review) => Some(review.verdict),
            _ => None,
        }
    }
}

/// Review the reasoning `logs` against frames sampled at `timestamps`.
///
/// `timestamps` is a pipe-separated list of at most 9 strict HH:MM:SS
/// entries. The 10-frame budget is split evenly across the timestamps with
/// the remainder going to the last one; windows wider than their share are
/// stacked down to it.
#[instrument(skip(ctx, logs))]
pub async fn critic_tool(
    ctx: &ToolContext,
    timestamps: &str,
    logs: &str,
    video_id: &str,
) -> Result<CriticOutcome> {
    let parsed = match parse_timestamp_list(timestamps) {
        Ok(parsed) => parsed,
        Err(_) => return Ok(CriticOutcome::InvalidTimestamps),
    };
    let labels: Vec<&str> = timestamps.split('|').map(str::trim).collect();

    let frames = ctx.providers.artifacts.load_frames(video_id).await?;
    let frame_timestamps = ctx
        .providers
        .artifacts
        .load_frame_timestamps(video_id)
        .await?;
    check_frame_alignment(video_id, frames.len(), frame_timestamps.len())?;

    let allocation = critic_allocation(parsed.len());
    let mut selected = Vec::new();
    let mut assignments = Vec::new();
    for ((target_ms, label), share) in parsed.iter().zip(&labels).zip(&allocation) {
        let Some(center) = nearest_frame_index(&frame_timestamps, *target_ms as f64) else {
            continue;
        };
        let (start, end) = frame_window(
            center,
            CRITIC_WINDOW_BEFORE,
            CRITIC_WINDOW_AFTER,
            frames.len(),
        );
        let window = &frames[start..=end];

        let batch = if window.len() <= *share {
            window.to_vec()
        } else {
            stack_window_into_groups(window, *share)?
        };

        let first = selected.len() + 1;
        selected.extend(batch);
        assignments.push(format!(
            "Image(s) {}-{} are for timestamp {}",
            first,
            selected.len(),
            label
        ));
    }
    debug!(
        "Critic sampled {} images for {} timestamps",
        selected.len(),
        parsed.len()
    );
    debug_assert!(selected.len() <= CRITIC_FRAME_BUDGET);

    let mut parts: Vec<ContentPart> = selected
        .iter()
        .map(|frame| ContentPart::frame(frame, true))
        .collect();
    parts.push(ContentPart::Text(format!(
        "These are the reasoning logs:\n{}\n\n{}. Note that each image may contain multiple \
         horizontally stacked frames.",
        logs,
        assignments.join("; ")
    )));

    let request = ChatRequest {
        messages: vec![
            ChatMessage::System(ctx.prompts.critic.tool.clone()),
            ChatMessage::User(parts),
        ],
        temperature: Some(0.0),
        top_p: Some(0.1),
        json_response: true,
        ..Default::default()
    };

    let reply = match with_retry(&ctx.retry, || ctx.providers.vision.chat(request.clone())).await
    {
        Ok(reply) => reply.content.unwrap_or_default(),
        Err(e) => return Ok(CriticOutcome::Failed(e.to_string())),
    };

    let (feedback, verdict) = match serde_json::from_str::<serde_json::Value>(&reply) {
        Ok(parsed) => (
            parsed["Feedback"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| reply.clone()),
            Verdict::parse(parsed["Verdict"].as_str()),
        ),
        Err(_) => (reply, Verdict::Accept),
    };

    Ok(CriticOutcome::Review(CriticReview {
        feedback: json!({ "Critic Feedback": feedback }).to_string(),
        verdict,
    }))
}
