//! LLM client trait and response structures

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::message::LlmMessage;

/// Trait for LLM clients
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat completion request
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Response from an LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated message
    pub message: LlmMessage,

    /// Usage statistics
    pub usage: Option<Usage>,

    /// Model used for generation
    pub model: String,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,

    /// Additional metadata
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// Usage statistics for a request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,

    /// Number of tokens in the completion
    pub completion_tokens: u32,

    /// Total number of tokens
    pub total_tokens: u32,
}

/// Reason why generation finished
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Generation completed naturally
    Stop,

    /// Hit the maximum token limit
    Length,

    /// Model decided to call a tool
    ToolCalls,

    /// Content was filtered
    ContentFilter,

    /// Other reason
    Other(String),
}

/// Tool definition for function calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (usually "function")
    #[serde(rename = "type")]
    pub tool_type: String,

    /// Function definition
    pub function: FunctionDefinition,
}

/// Function definition for tool calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,

    /// Description of what the function does
    pub description: String,

    /// JSON schema for the function parameters
    pub parameters: serde_json::Value,
}

/// Options for chat completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Temperature for generation
    pub temperature: Option<f32>,

    /// Top-p sampling parameter
    pub top_p: Option<f32>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(8192),
            temperature: Some(0.7),
            top_p: Some(1.0),
        }
    }
}

impl ChatOptions {
    /// Overlay configured model parameters on top of the defaults
    pub fn from_params(params: &crate::config::ModelParams) -> Self {
        let defaults = Self::default();
        Self {
            max_tokens: params.max_tokens.or(defaults.max_tokens),
            temperature: params.temperature.or(defaults.temperature),
            top_p: params.top_p.or(defaults.top_p),
        }
    }
}

/// Build the client for a resolved configuration
pub fn create_client(
    config: &crate::config::ResolvedLlmConfig,
) -> Result<std::sync::Arc<dyn LlmClient>> {
    use crate::config::Protocol;
    use std::sync::Arc;

    let client: Arc<dyn LlmClient> = match config.protocol {
        Protocol::GoogleAI => Arc::new(super::GoogleClient::new(config)?),
        Protocol::OpenAICompat | Protocol::DeepSeek => Arc::new(super::OpenAiClient::new(config)?),
        Protocol::Anthropic => Arc::new(super::AnthropicClient::new(config)?),
    };

    tracing::debug!(
        "Created {} client for model {}",
        client.provider_name(),
        client.model_name()
    );

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelParams, Protocol, ResolvedLlmConfig};

    #[test]
    fn test_chat_options_from_params() {
        let params = ModelParams {
            max_tokens: Some(1024),
            temperature: None,
            top_p: None,
        };
        let options = ChatOptions::from_params(&params);
        assert_eq!(options.max_tokens, Some(1024));
        assert_eq!(options.temperature, Some(0.7));
    }

    #[test]
    fn test_create_client_requires_api_key() {
        for protocol in Protocol::ALL {
            let config = ResolvedLlmConfig::new(
                protocol,
                protocol.default_base_url().to_string(),
                String::new(),
                protocol.default_model().to_string(),
            );
            let err = create_client(&config).err().expect("empty key must be rejected");
            assert!(
                matches!(
                    err,
                    crate::error::Error::Llm(crate::error::LlmError::Authentication { .. })
                ),
                "unexpected error for {}: {}",
                protocol,
                err
            );
        }
    }

    #[test]
    fn test_create_client_per_protocol() {
        let config = ResolvedLlmConfig::new(
            Protocol::DeepSeek,
            Protocol::DeepSeek.default_base_url().to_string(),
            "key".to_string(),
            "deepseek-chat".to_string(),
        );
        let client = create_client(&config).unwrap();
        assert_eq!(client.provider_name(), "deepseek");
        assert_eq!(client.model_name(), "deepseek-chat");
    }
}
