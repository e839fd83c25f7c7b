//! Configuration management for Glimt.

mod prompts;
mod settings;

pub use prompts::Prompts;
pub use settings::{
    AgentSettings, EmbeddingSettings, GeneralSettings, LlmSettings, SearchSettings, Settings,
};
