//! Timestamp-window vision queries.
//!
//! Answers a question from the frames sampled around one timestamp: the
//! frame nearest the timestamp plus a window of 4 frames before and 5 after.

use super::ToolContext;
use crate::error::{GlimtError, Result};
use crate::frames::{
    check_frame_alignment, frame_window, nearest_frame_index, WINDOW_AFTER, WINDOW_BEFORE,
};
use crate::providers::{ChatMessage, ChatRequest, ContentPart};
use crate::retry::with_retry;
use crate::timestamp::parse_hms;
use tracing::{debug, instrument};

/// Answer `query` from the frames around `timestamp` (HH:MM:SS).
///
/// Missing frame artifacts are fatal for the invocation; vision backend
/// failures after the retry schedule are returned as the tool's output so
/// the conversation can react to them.
#[instrument(skip(ctx, query))]
pub async fn query_vision(
    ctx: &ToolContext,
    query: &str,
    timestamp: &str,
    video_id: &str,
) -> Result<String> {
    let target_ms = parse_hms(timestamp)? as f64;

    let frames = ctx.providers.artifacts.load_frames(video_id).await?;
    let frame_timestamps = ctx
        .providers
        .artifacts
        .load_frame_timestamps(video_id)
        .await?;
    check_frame_alignment(video_id, frames.len(), frame_timestamps.len())?;

    let center = nearest_frame_index(&frame_timestamps, target_ms).ok_or_else(|| {
        GlimtError::Frame(format!("Video {} has no keyframes", video_id))
    })?;
    let (start, end) = frame_window(center, WINDOW_BEFORE, WINDOW_AFTER, frames.len());
    debug!(
        "Vision window for {} at {}: frames {}..={}",
        video_id, timestamp, start, end
    );

    let mut parts: Vec<ContentPart> = frames[start..=end]
        .iter()
        .map(|frame| ContentPart::frame(frame, true))
        .collect();
    parts.push(ContentPart::Text(query.to_string()));

    let request = ChatRequest {
        messages: vec![
            ChatMessage::System(ctx.prompts.vision.frame_window.clone()),
            ChatMessage::User(parts),
        ],
        temperature: Some(0.0),
        top_p: Some(0.1),
        max_tokens: Some(1000),
        ..Default::default()
    };

    match with_retry(&ctx.retry, || ctx.providers.vision.chat(request.clone())).await {
        Ok(reply) => Ok(reply.content.unwrap_or_default()),
        Err(e) => Ok(e.to_string()),
    }
}
