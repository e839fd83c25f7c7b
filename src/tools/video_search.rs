//! Corpus-wide video discovery.

use super::ToolContext;
use crate::error::Result;
use crate::search::SearchRequest;
use tracing::{debug, instrument};

/// Find the ids of the `top_n` ingested videos most relevant to `query`.
///
/// Pulls a wide candidate pool from the chapter index, drops hits below the
/// relevance threshold, deduplicates chapters of the same video, and keeps
/// the best `top_n` videos.
#[instrument(skip(ctx, query))]
pub async fn video_search(ctx: &ToolContext, query: &str, top_n: usize) -> Result<String> {
    let embedding = ctx.providers.embedder.embed(query).await?;

    let hits = ctx
        .providers
        .search
        .search(
            SearchRequest::vector(
                &ctx.settings.search.video_index,
                embedding,
                &ctx.settings.search.vector_field,
                ctx.settings.search.search_pool,
            )
            .with_select(&["video_id", "youtube_url", "topic_of_video"]),
        )
        .await?;

    let threshold = ctx.settings.search.min_score / 100.0;
    let mut seen_urls = std::collections::HashSet::new();
    let mut selected = Vec::new();
    for hit in hits {
        if hit.score < threshold {
            continue;
        }
        let Some(video_id) = hit.get_str("video_id") else {
            continue;
        };
        let url = hit.get_str("youtube_url").unwrap_or(video_id).to_string();
        if !seen_urls.insert(url) {
            continue;
        }

        selected.push(format!(
            "{} (topic: {}, score: {:.2})",
            video_id,
            hit.get_str("topic_of_video").unwrap_or("unknown"),
            hit.score
        ));
        if selected.len() == top_n {
            break;
        }
    }
    debug!("Video search kept {} of requested {}", selected.len(), top_n);

    if selected.is_empty() {
        return Ok("No matching videos found.".to_string());
    }
    Ok(format!("Relevant video ids:\n{}", selected.join("\n")))
}
