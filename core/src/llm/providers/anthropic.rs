//! Anthropic Claude client implementation

use crate::config::ResolvedLlmConfig;
use crate::error::{LlmError, Result};
use crate::llm::{
    ChatOptions, ContentBlock, FinishReason, LlmClient, LlmMessage, LlmResponse, MessageContent,
    MessageRole, ToolDefinition, Usage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    headers: HashMap<String, String>,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Authentication {
                message: "No API key found for Anthropic".to_string(),
            }
            .into());
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            headers: config.headers.clone(),
        })
    }

    fn build_request(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> AnthropicRequest {
        let options = options.unwrap_or_default();

        // Separate system messages from conversation messages
        let mut system_parts = Vec::new();
        let mut conversation = Vec::new();

        for message in messages {
            match message.role {
                MessageRole::System => {
                    if let Some(text) = message.get_text() {
                        system_parts.push(text);
                    }
                }
                MessageRole::User => conversation.push(AnthropicMessage {
                    role: "user",
                    content: to_anthropic_blocks(&message.content),
                }),
                MessageRole::Assistant => conversation.push(AnthropicMessage {
                    role: "assistant",
                    content: to_anthropic_blocks(&message.content),
                }),
                // Tool results travel as user turns; consecutive results share one turn
                MessageRole::Tool => {
                    let blocks = to_anthropic_blocks(&message.content);
                    match conversation.last_mut() {
                        Some(last)
                            if last.role == "user"
                                && last.content.iter().all(|b| b["type"] == "tool_result") =>
                        {
                            last.content.extend(blocks)
                        }
                        _ => conversation.push(AnthropicMessage {
                            role: "user",
                            content: blocks,
                        }),
                    }
                }
            }
        }

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: options.max_tokens.unwrap_or(4096),
            temperature: options.temperature.map(|t| t.min(1.0)),
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages: conversation,
            tools: tools.filter(|t| !t.is_empty()).map(|t| {
                t.into_iter()
                    .map(|tool| AnthropicTool {
                        name: tool.function.name,
                        description: tool.function.description,
                        input_schema: tool.function.parameters,
                    })
                    .collect()
            }),
        }
    }

    fn convert_response(&self, response: AnthropicResponse) -> LlmResponse {
        let blocks: Vec<ContentBlock> = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContent::Text { text } => Some(ContentBlock::Text { text }),
                AnthropicContent::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                AnthropicContent::Other => None,
            })
            .collect();

        let content = match blocks.as_slice() {
            [] => MessageContent::Text(String::new()),
            [ContentBlock::Text { text }] => MessageContent::Text(text.clone()),
            _ => MessageContent::MultiModal(blocks),
        };

        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        let finish_reason = response.stop_reason.map(|reason| match reason.as_str() {
            "end_turn" | "stop_sequence" => FinishReason::Stop,
            "max_tokens" => FinishReason::Length,
            "tool_use" => FinishReason::ToolCalls,
            _ => FinishReason::Other(reason),
        });

        LlmResponse {
            message: LlmMessage {
                role: MessageRole::Assistant,
                content,
                metadata: None,
            },
            usage,
            model: response.model,
            finish_reason,
            metadata: None,
        }
    }
}

fn to_anthropic_blocks(content: &MessageContent) -> Vec<Value> {
    match content {
        MessageContent::Text(text) => vec![json!({"type": "text", "text": text})],
        MessageContent::MultiModal(blocks) => blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => json!({"type": "text", "text": text}),
                ContentBlock::ToolUse { id, name, input } => {
                    json!({"type": "tool_use", "id": id, "name": name, "input": input})
                }
                ContentBlock::ToolResult {
                    tool_use_id,
                    is_error,
                    content,
                } => json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "is_error": is_error.unwrap_or(false),
                    "content": content,
                }),
            })
            .collect(),
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let request = self.build_request(messages, tools, options);

        let mut builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json");
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Network {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Anthropic API call failed: {} - {}", status, error_text);
            return Err((LlmError::ApiError {
                status,
                message: error_text,
            })
            .into());
        }

        let anthropic_response: AnthropicResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.convert_response(anthropic_response))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<AnthropicContent>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContent {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    fn client() -> AnthropicClient {
        AnthropicClient::new(&ResolvedLlmConfig::new(
            Protocol::Anthropic,
            "https://api.anthropic.com/".to_string(),
            "key".to_string(),
            "claude-3-5-sonnet-20241022".to_string(),
        ))
        .unwrap()
    }

    #[test]
    fn test_build_request_moves_system_and_groups_tool_results() {
        let assistant = LlmMessage {
            role: MessageRole::Assistant,
            content: MessageContent::MultiModal(vec![
                ContentBlock::ToolUse {
                    id: "a".to_string(),
                    name: "wikipedia".to_string(),
                    input: json!({"query": "Ada Lovelace"}),
                },
                ContentBlock::ToolUse {
                    id: "b".to_string(),
                    name: "web_search".to_string(),
                    input: json!({"query": "Ada Lovelace"}),
                },
            ]),
            metadata: None,
        };
        let messages = vec![
            LlmMessage::system("instructions"),
            LlmMessage::user("who was Ada Lovelace"),
            assistant,
            LlmMessage::tool_result("a", "wiki text", false),
            LlmMessage::tool_result("b", "search text", false),
        ];

        let request = client().build_request(messages, None, None);
        assert_eq!(request.system.as_deref(), Some("instructions"));
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[2].role, "user");
        assert_eq!(request.messages[2].content.len(), 2);
        assert_eq!(request.messages[2].content[1]["tool_use_id"], "b");
        assert!(request.tools.is_none());
    }

    #[test]
    fn test_convert_response_with_tool_use() {
        let raw = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "Let me look that up."},
                {"type": "tool_use", "id": "toolu_1", "name": "wikipedia", "input": {"query": "Rust"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let response: AnthropicResponse = serde_json::from_value(raw).unwrap();
        let converted = client().convert_response(response);

        assert_eq!(converted.finish_reason, Some(FinishReason::ToolCalls));
        assert!(converted.message.has_tool_use());
        assert_eq!(converted.usage.unwrap().total_tokens, 15);
    }
}
