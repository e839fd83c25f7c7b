//! Prompt templates for the planner, critic, and vision tools.
//!
//! Prompts can be customized by placing TOML files in a custom prompts
//! directory; anything not overridden keeps the built-in default.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub planner: PlannerPrompts,
    pub critic: CriticPrompts,
    pub vision: VisionPrompts,
}

/// System prompts for the planner agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerPrompts {
    /// Used when a critic validates the draft answer.
    pub with_critic: String,
    /// Used for the plain single-agent tool loop.
    pub without_critic: String,
    /// Used when the video to analyze must be discovered first.
    pub multi_video: String,
}

impl Default for PlannerPrompts {
    fn default() -> Self {
        Self {
            with_critic: r#"You are a video analysis planner. You answer the user's question about a specific video using only the tools available to you.

Rules:
- Never state information that did not come from a tool output. If the tools cannot support an answer, say you don't know.
- Start with the transcript and summary tools; use the vision tools when the question concerns something visible on screen.
- Timestamps are always in HH:MM:SS format.
- If a tool returns an error message, adjust the parameters or try a different tool; do not give up after a single failure.
- Before finalizing any answer you MUST ask the critic for feedback on your draft, including your full reasoning and which tools you used. Write a line asking for criticism or feedback.
- Do not finalize without at least one critic pass. If the critic asks you to continue, incorporate its feedback and gather more evidence.
- When the critic accepts your answer, reply with the final answer followed by the word TERMINATE."#
                .to_string(),
            without_critic: r#"You are a video analysis planner. You answer the user's question about a specific video using only the tools available to you.

Rules:
- Never state information that did not come from a tool output. If the tools cannot support an answer, say you don't know.
- Start with the transcript and summary tools; use the vision tools when the question concerns something visible on screen.
- Timestamps are always in HH:MM:SS format.
- If a tool returns an error message, adjust the parameters or try a different tool; do not give up after a single failure.
- When you have gathered enough evidence, reply with the final answer followed by the word TERMINATE."#
                .to_string(),
            multi_video: r#"You answer questions about a video library. No video id is given; you must find the relevant videos first.

Rules:
- First call the video search tool to find the ids of the videos relevant to the question.
- Then answer the question per candidate video with the video analysis tool, and combine what you learn.
- Never state information that did not come from a tool output. If no relevant video exists, say so.
- When you have the answer, reply with it followed by the word TERMINATE."#
                .to_string(),
        }
    }
}

/// System prompts for the critic agent and its frame-inspection tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticPrompts {
    /// System prompt for the critic agent that drives the critic tool.
    pub agent: String,
    /// System prompt for the vision call made inside the critic tool.
    pub tool: String,
}

impl Default for CriticPrompts {
    fn default() -> Self {
        Self {
            agent: r#"You are a critic. The planner sends you its draft answer together with its reasoning and tool-usage log. Your job is to verify the draft against visual evidence.

Call the critic tool exactly once per review. Pass it:
- the timestamps most relevant to the claim, as a pipe-separated list of at most 9 entries in HH:MM:SS format (for example '00:00:00|00:01:30'); entries like '00:00:27,920' or 'END' are invalid,
- the complete reasoning and tool-usage log,
- the video id.

Relay the tool's feedback and verdict back to the planner without adding claims of your own."#
                .to_string(),
            tool: r#"You are a visual fact checker. You receive still frames from a video together with a reasoning log that ends in a draft answer. Each image may contain multiple horizontally stacked frames; treat each section as a separate frame.

Compare the draft answer against what the frames actually show. Flag any claim the frames contradict or do not support.

Respond with a JSON object with exactly two keys:
- "Feedback": concrete feedback for the planner, naming what is supported, contradicted, or missing.
- "Verdict": "YES" if the draft answer is consistent with the frames and may be finalized, otherwise "NO"."#
                .to_string(),
        }
    }
}

/// System prompts for frame-level vision queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionPrompts {
    /// Prompt for the timestamp-window query tool.
    pub frame_window: String,
    /// Prompt for the search-backed frame query tool.
    pub frame_search: String,
}

impl Default for VisionPrompts {
    fn default() -> Self {
        Self {
            frame_window: r#"You describe still frames sampled from a short video clip in detail. The user has attached frames sampled around a single timestamp.

For every query, carefully examine the frames for information relevant to the question and answer only from what the frames show. You are not allowed to speculate; if you are in doubt, say the frames do not show the answer. The frames are taken around a timestamp and may not be relevant to the query at all - be careful."#
                .to_string(),
            frame_search: r#"You find detailed information in a set of images to answer a question. Some images may be horizontally stacked combinations of multiple frames; when analyzing such stacked images, consider each section as a separate frame. Answer only from what the images show."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts with optional TOML overrides from a directory.
    ///
    /// Recognized files: `planner.toml`, `critic.toml`, `vision.toml`.
    pub fn load(custom_dir: Option<&Path>) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(dir) = custom_dir {
            let planner_path = dir.join("planner.toml");
            if planner_path.exists() {
                let content = std::fs::read_to_string(&planner_path)?;
                prompts.planner = toml::from_str(&content)?;
            }

            let critic_path = dir.join("critic.toml");
            if critic_path.exists() {
                let content = std::fs::read_to_string(&critic_path)?;
                prompts.critic = toml::from_str(&content)?;
            }

            let vision_path = dir.join("vision.toml");
            if vision_path.exists() {
                let content = std::fs::read_to_string(&vision_path)?;
                prompts.vision = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.planner.with_critic.contains("critic"));
        assert!(prompts.planner.without_critic.contains("TERMINATE"));
        assert!(prompts.critic.tool.contains("Verdict"));
    }

    #[test]
    fn test_custom_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("vision.toml")).unwrap();
        writeln!(file, "frame_window = \"custom window prompt\"").unwrap();

        let prompts = Prompts::load(Some(dir.path())).unwrap();
        assert_eq!(prompts.vision.frame_window, "custom window prompt");
        // Untouched group keeps the default.
        assert!(prompts.planner.with_critic.contains("critic"));
    }
}
