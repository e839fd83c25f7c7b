//! Search-backed frame queries and document retrieval.

use super::ToolContext;
use crate::error::Result;
use crate::providers::{ChatMessage, ChatRequest, ContentPart};
use crate::retry::with_retry;
use crate::search::{FilterBuilder, SearchRequest};
use crate::timestamp::parse_hms;
use crate::frames;
use serde_json::json;
use tracing::{debug, instrument, warn};

const KEYFRAMES_PER_RANGE: usize = 10;
const CONTEXT_TOP: usize = 3;

const DOCUMENT_FIELDS: &[&str] = &[
    "video_id",
    "youtube_url",
    "topic_of_video",
    "detailed_summary",
    "action_taken",
    "text_from_scene",
    "chapter_transcript",
];

/// Answer `query` from keyframes named explicitly or found by searching the
/// keyframe index within timestamp ranges.
///
/// Keyframes that cannot be loaded are skipped; when none remain the tool
/// reports that instead of calling the vision backend.
#[instrument(skip(ctx, query, frame_ids, timestamp_ranges))]
pub async fn query_frames(
    ctx: &ToolContext,
    query: &str,
    video_id: &str,
    frame_ids: &[String],
    timestamp_ranges: &[(String, String)],
) -> Result<String> {
    let mut filenames: Vec<String> = frame_ids.to_vec();

    if !timestamp_ranges.is_empty() {
        let embedding = ctx.providers.embedder.embed(query).await?;
        for (start, end) in timestamp_ranges {
            let start_seconds = parse_hms(start)? as f64 / 1000.0;
            let end_seconds = parse_hms(end)? as f64 / 1000.0;
            let filter = FilterBuilder::new()
                .eq_str("video_id", video_id)
                .ge("timestamp_seconds", start_seconds)
                .le("timestamp_seconds", end_seconds)
                .build();

            let hits = ctx
                .providers
                .search
                .search(
                    SearchRequest::vector(
                        &ctx.settings.search.keyframe_index,
                        embedding.clone(),
                        &ctx.settings.search.vector_field,
                        KEYFRAMES_PER_RANGE,
                    )
                    .with_filter(filter)
                    .with_select(&["keyframe_filename", "timestamp_seconds"]),
                )
                .await?;

            filenames.extend(
                hits.iter()
                    .filter_map(|hit| hit.get_str("keyframe_filename"))
                    .map(str::to_string),
            );
        }
    }

    let mut seen = std::collections::HashSet::new();
    filenames.retain(|name| seen.insert(name.clone()));

    let mut images = Vec::new();
    for filename in &filenames {
        match ctx.providers.artifacts.load_keyframe(video_id, filename).await {
            Ok(bytes) => match image::load_from_memory(&bytes) {
                Ok(img) => images.push(img),
                Err(e) => warn!("Skipping undecodable keyframe {}: {}", filename, e),
            },
            Err(e) => warn!("Skipping unavailable keyframe {}: {}", filename, e),
        }
    }

    if images.is_empty() {
        return Ok("No keyframes matched the query.".to_string());
    }

    let (processed, stacked_count) = frames::batch_frames_for_vision(&images)?;
    debug!(
        "Frame query over {} keyframes ({} stacked)",
        images.len(),
        stacked_count
    );

    let mut parts: Vec<ContentPart> = processed
        .iter()
        .map(|frame| ContentPart::frame(frame, true))
        .collect();
    let mut prompt = query.to_string();
    if stacked_count > 0 {
        prompt.push_str(
            "\nNote: some of the attached images are horizontal stacks of multiple frames.",
        );
    }
    parts.push(ContentPart::Text(prompt));

    let request = ChatRequest {
        messages: vec![
            ChatMessage::System(ctx.prompts.vision.frame_search.clone()),
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

/// Retrieve the ranked summary/transcript documents most relevant to `query`.
///
/// When the instruction pinned a video id or url, retrieval is filtered to
/// that video's chapters.
#[instrument(skip(ctx, query))]
pub async fn retrieve_context(
    ctx: &ToolContext,
    query: &str,
    index_name: &str,
    video_id: Option<&str>,
    youtube_url: Option<&str>,
) -> Result<String> {
    let embedding = ctx.providers.embedder.embed(query).await?;

    let mut filter = FilterBuilder::new();
    if let Some(url) = youtube_url {
        filter = filter.eq_str("youtube_url", url);
    } else if let Some(id) = video_id {
        filter = filter.eq_str("video_id", id);
    }

    let hits = ctx
        .providers
        .search
        .search(
            SearchRequest::vector(
                index_name,
                embedding,
                &ctx.settings.search.vector_field,
                CONTEXT_TOP,
            )
            .with_filter(filter.build())
            .with_select(DOCUMENT_FIELDS),
        )
        .await?;

    if hits.is_empty() {
        return Ok("No matching documents found.".to_string());
    }

    let documents: Vec<serde_json::Value> = hits
        .iter()
        .map(|hit| {
            json!({
                "score": hit.score,
                "document": hit.fields,
            })
        })
        .collect();
    Ok(serde_json::to_string_pretty(&documents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Prompts, Settings};
    use crate::providers::testing::{ScriptedLlm, StaticEmbedder};
    use crate::providers::{ChatOutcome, Providers};
    use crate::retry::RetryPolicy;
    use crate::search::{MemorySearchIndex, SearchProvider as _};
    use crate::{artifacts, tools};
    use std::sync::Arc;

    struct Fixture {
        ctx: tools::ToolContext,
        vision: Arc<ScriptedLlm>,
        search: Arc<MemorySearchIndex>,
    }

    fn fixture(dir: &std::path::Path) -> Fixture {
        let vision = Arc::new(ScriptedLlm::replying(vec![ChatOutcome::text(
            "frame answer",
        )]));
        let search = Arc::new(MemorySearchIndex::new());
        let providers = Providers {
            llm: Arc::new(ScriptedLlm::replying(vec![])),
            vision: vision.clone(),
            embedder: Arc::new(StaticEmbedder::new(4)),
            search: search.clone(),
            artifacts: Arc::new(artifacts::LocalArtifactStore::new(dir).unwrap()),
        };
        let mut ctx = tools::ToolContext::new(providers, Prompts::default(), Settings::default());
        ctx.retry = RetryPolicy {
            intervals: vec![],
            rate_limit_extra: std::time::Duration::from_millis(0),
            call_timeout: None,
        };
        Fixture { ctx, vision, search }
    }

    fn write_keyframe(dir: &std::path::Path, video_id: &str, filename: &str) {
        let keyframe_dir = dir.join("keyframes").join(video_id);
        std::fs::create_dir_all(&keyframe_dir).unwrap();
        let png = crate::frames::testing::tiny_png_base64();
        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(png)
            .unwrap();
        std::fs::write(keyframe_dir.join(filename), bytes).unwrap();
    }

    #[tokio::test]
    async fn test_query_frames_by_timestamp_range() {
        let dir = tempfile::tempdir().unwrap();
        write_keyframe(dir.path(), "vid", "kf_10.png");
        write_keyframe(dir.path(), "vid", "kf_99.png");
        let f = fixture(dir.path());

        for (name, seconds, video) in [
            ("kf_10.png", 15.0, "vid"),
            ("kf_99.png", 500.0, "vid"),
            ("kf_other.png", 15.0, "other"),
        ] {
            f.search
                .insert(
                    &f.ctx.settings.search.keyframe_index,
                    Some(vec![1.0, 0.0, 0.0, 0.0]),
                    serde_json::json!({
                        "keyframe_filename": name,
                        "timestamp_seconds": seconds,
                        "video_id": video,
                    }),
                )
                .await
                .unwrap();
        }

        let answer = query_frames(
            &f.ctx,
            "what is on screen?",
            "vid",
            &[],
            &[("00:00:10".to_string(), "00:00:40".to_string())],
        )
        .await
        .unwrap();
        assert_eq!(answer, "frame answer");

        // Only the in-range frame of the right video was attached.
        let request = &f.vision.requests()[0];
        match &request.messages[1] {
            ChatMessage::User(parts) => assert_eq!(parts.len(), 2),
            _ => panic!("Expected user message"),
        }
    }

    #[tokio::test]
    async fn test_query_frames_with_explicit_ids_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_keyframe(dir.path(), "vid", "kf_1.png");
        let f = fixture(dir.path());

        let answer = query_frames(
            &f.ctx,
            "q",
            "vid",
            &["kf_1.png".to_string(), "kf_gone.png".to_string()],
            &[],
        )
        .await
        .unwrap();
        assert_eq!(answer, "frame answer");
        assert_eq!(f.vision.call_count(), 1);
    }

    #[tokio::test]
    async fn test_query_frames_without_matches_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        let f = fixture(dir.path());

        let answer = query_frames(&f.ctx, "q", "vid", &[], &[]).await.unwrap();
        assert!(answer.contains("No keyframes"));
        assert_eq!(f.vision.call_count(), 0);
    }

    #[tokio::test]
    async fn test_retrieve_context_filters_and_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let f = fixture(dir.path());

        for (id, summary) in [("a", "about farming"), ("b", "about cooking")] {
            f.search
                .insert(
                    "video-index",
                    Some(vec![0.5, 0.5, 0.5, 0.5]),
                    serde_json::json!({
                        "video_id": id,
                        "detailed_summary": summary,
                        "internal_field": "hidden",
                    }),
                )
                .await
                .unwrap();
        }

        let rendered = retrieve_context(&f.ctx, "farming", "video-index", Some("a"), None)
            .await
            .unwrap();
        assert!(rendered.contains("about farming"));
        assert!(!rendered.contains("about cooking"));
        assert!(!rendered.contains("internal_field"));
    }

    #[tokio::test]
    async fn test_retrieve_context_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let f = fixture(dir.path());
        f.search
            .create_index(&crate::search::IndexSchema {
                name: "video-index".to_string(),
                definition: serde_json::json!({}),
            })
            .await
            .unwrap();

        let rendered = retrieve_context(&f.ctx, "q", "video-index", None, None)
            .await
            .unwrap();
        assert!(rendered.contains("No matching documents"));
    }
}
