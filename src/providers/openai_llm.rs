//! OpenAI chat backend, including vision content and tool calling.

use super::{
    openai_client, ChatMessage, ChatOutcome, ChatRequest, ContentPart, LlmProvider,
    ToolCallRequest,
};
use crate::error::{GlimtError, Result};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContentPart, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject, ImageDetail, ImageUrlArgs,
    ResponseFormat,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// OpenAI-backed chat provider.
pub struct OpenAiLlm {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAiLlm {
    /// Create a provider for the given model with a request timeout.
    pub fn new(model: &str, timeout_seconds: u64) -> Self {
        Self {
            client: openai_client(Duration::from_secs(timeout_seconds)),
            model: model.to_string(),
        }
    }

    fn map_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
        let agent_err = |e: &dyn std::fmt::Display| GlimtError::Agent(e.to_string());

        match message {
            ChatMessage::System(content) => Ok(ChatCompletionRequestSystemMessageArgs::default()
                .content(content.clone())
                .build()
                .map_err(|e| agent_err(&e))?
                .into()),

            ChatMessage::User(parts) => {
                let mapped: Vec<ChatCompletionRequestUserMessageContentPart> = parts
                    .iter()
                    .map(|part| Self::map_part(part))
                    .collect::<Result<_>>()?;
                Ok(ChatCompletionRequestUserMessageArgs::default()
                    .content(mapped)
                    .build()
                    .map_err(|e| agent_err(&e))?
                    .into())
            }

            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(content) = content {
                    builder.content(content.clone());
                }
                if !tool_calls.is_empty() {
                    let calls: Vec<ChatCompletionMessageToolCall> = tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect();
                    builder.tool_calls(calls);
                }
                Ok(builder.build().map_err(|e| agent_err(&e))?.into())
            }

            ChatMessage::Tool { call_id, content } => {
                Ok(ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(call_id.clone())
                    .content(content.clone())
                    .build()
                    .map_err(|e| agent_err(&e))?
                    .into())
            }
        }
    }

    fn map_part(part: &ContentPart) -> Result<ChatCompletionRequestUserMessageContentPart> {
        let agent_err = |e: &dyn std::fmt::Display| GlimtError::Agent(e.to_string());

        match part {
            ContentPart::Text(text) => Ok(ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(text.clone())
                .build()
                .map_err(|e| agent_err(&e))?
                .into()),
            ContentPart::ImageUrl { url, high_detail } => {
                let mut image_url = ImageUrlArgs::default();
                image_url.url(url.clone());
                if *high_detail {
                    image_url.detail(ImageDetail::High);
                }
                Ok(ChatCompletionRequestMessageContentPartImageArgs::default()
                    .image_url(image_url.build().map_err(|e| agent_err(&e))?)
                    .build()
                    .map_err(|e| agent_err(&e))?
                    .into())
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    async fn chat(&self, request: ChatRequest) -> Result<ChatOutcome> {
        let messages: Vec<ChatCompletionRequestMessage> = request
            .messages
            .iter()
            .map(Self::map_message)
            .collect::<Result<_>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages);

        if !request.tools.is_empty() {
            let tools: Vec<ChatCompletionTool> = request
                .tools
                .iter()
                .map(|spec| ChatCompletionTool {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionObject {
                        name: spec.name.clone(),
                        description: Some(spec.description.clone()),
                        parameters: Some(spec.parameters.clone()),
                        strict: None,
                    },
                })
                .collect();
            builder.tools(tools);
        }
        if let Some(temperature) = request.temperature {
            builder.temperature(temperature);
        }
        if let Some(top_p) = request.top_p {
            builder.top_p(top_p);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder.max_tokens(max_tokens);
        }
        if request.json_response {
            builder.response_format(ResponseFormat::JsonObject);
        }

        let chat_request = builder
            .build()
            .map_err(|e| GlimtError::Agent(e.to_string()))?;

        debug!("Chat completion against model {}", self.model);

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| GlimtError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GlimtError::OpenAI("No response from model".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(ChatOutcome {
            content: choice.message.content,
            tool_calls,
        })
    }
}
