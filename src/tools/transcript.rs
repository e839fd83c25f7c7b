//! Transcript and summary document tools.

use super::ToolContext;
use crate::error::Result;
use crate::providers::{ChatMessage, ChatRequest};
use crate::retry::with_retry;
use tracing::instrument;

const QUERY_SYSTEM_PROMPT: &str = "You answer questions about a video from its summary and \
transcript document. Answer only from the document; if the document does not contain the \
answer, say so. Quote timestamps from the transcript in HH:MM:SS format where relevant.";

/// Return the full summary/transcript document of a video.
///
/// Fails loudly when the document artifact is missing; the video cannot be
/// analyzed without it.
#[instrument(skip(ctx))]
pub async fn get_summary_transcript(ctx: &ToolContext, video_id: &str) -> Result<String> {
    ctx.providers.artifacts.load_summary_document(video_id).await
}

/// Answer a question from the summary/transcript document with one LLM pass.
///
/// Backend failures after the retry schedule come back as the error text, so
/// the planner sees the failure as tool output and can react.
#[instrument(skip(ctx, query))]
pub async fn query_summary_transcript(
    ctx: &ToolContext,
    query: &str,
    video_id: &str,
) -> Result<String> {
    let document = ctx
        .providers
        .artifacts
        .load_summary_document(video_id)
        .await?;

    let request = ChatRequest {
        messages: vec![
            ChatMessage::System(QUERY_SYSTEM_PROMPT.to_string()),
            ChatMessage::user_text(format!("Document:\n{}\n\nQuestion: {}", document, query)),
        ],
        ..Default::default()
    };

    let outcome = with_retry(&ctx.retry, || {
        ctx.providers.llm.chat(request.clone())
    })
    .await;

    match outcome {
        Ok(reply) => Ok(reply.content.unwrap_or_default()),
        Err(e) => Ok(e.to_string()),
    }
}
