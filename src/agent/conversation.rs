//! Shared conversation state of one orchestration run.

use std::fmt;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Planner,
    Critic,
    Tool,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Speaker::Planner => "planner",
            Speaker::Critic => "critic",
            Speaker::Tool => "tool",
        };
        write!(f, "{}", name)
    }
}

/// Record of one tool invocation and its result.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub arguments: String,
    pub result: String,
}

impl fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> {}",
            self.tool_name, self.arguments, self.result
        )
    }
}

/// One appended conversation turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
    /// Present when this turn records a tool invocation.
    pub tool_call: Option<ToolCallRecord>,
}

impl Turn {
    pub fn planner(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Planner,
            content: content.into(),
            tool_call: None,
        }
    }

    pub fn critic(content: impl Into<String>, tool_call: Option<ToolCallRecord>) -> Self {
        Self {
            speaker: Speaker::Critic,
            content: content.into(),
            tool_call,
        }
    }

    pub fn tool(record: ToolCallRecord) -> Self {
        Self {
            speaker: Speaker::Tool,
            content: record.result.clone(),
            tool_call: Some(record),
        }
    }
}

/// Why an orchestration run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// A turn contained the configured terminal phrase.
    TerminalPhrase,
    /// The critic accepted the draft and the planner produced its final
    /// content turn.
    CriticAccept,
    /// The turn ceiling was reached without a final answer.
    TurnCeiling,
}

/// Append-only transcript of one run.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Render the transcript for logging or critic review.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|turn| match &turn.tool_call {
                Some(record) if turn.speaker == Speaker::Tool => {
                    format!("[{}] {}", turn.speaker, record)
                }
                _ => format!("[{}] {}", turn.speaker, turn.content),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_rendering() {
        let mut conversation = Conversation::new();
        conversation.push(Turn::planner("Let me check the transcript."));
        conversation.push(Turn::tool(ToolCallRecord {
            tool_name: "get_summary_transcript".to_string(),
            arguments: r#"{"video_id":"v"}"#.to_string(),
            result: "a transcript".to_string(),
        }));
        conversation.push(Turn::critic("Looks good. Verdict: YES", None));

        let transcript = conversation.transcript();
        assert!(transcript.contains("[planner] Let me check"));
        assert!(transcript.contains("[tool] get_summary_transcript({\"video_id\":\"v\"}) -> a transcript"));
        assert!(transcript.contains("[critic] Looks good"));
        assert_eq!(conversation.len(), 3);
    }
}
