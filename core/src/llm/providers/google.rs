//! Google Gemini client implementation (generateContent API)

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

/// Gemini client
pub struct GoogleClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl GoogleClient {
    /// Create a new Gemini client
    pub fn new(config: &ResolvedLlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Authentication {
                message: "No API key found for Google AI (set GOOGLE_API_KEY)".to_string(),
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

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> GeminiRequest {
        let options = options.unwrap_or_default();
        let mut system_parts = Vec::new();
        let mut contents: Vec<GeminiContent> = Vec::new();
        // Gemini function responses are keyed by name, not call id
        let mut call_names: HashMap<String, String> = HashMap::new();

        for message in messages {
            let (role, parts) = match message.role {
                MessageRole::System => {
                    if let Some(text) = message.get_text() {
                        system_parts.push(GeminiPart {
                            text: Some(text),
                            ..Default::default()
                        });
                    }
                    continue;
                }
                MessageRole::User => ("user", to_gemini_parts(&message.content, &call_names)),
                MessageRole::Assistant => {
                    for block in message.get_tool_uses() {
                        if let ContentBlock::ToolUse { id, name, .. } = block {
                            call_names.insert(id.clone(), name.clone());
                        }
                    }
                    ("model", to_gemini_parts(&message.content, &call_names))
                }
                MessageRole::Tool => ("user", to_gemini_parts(&message.content, &call_names)),
            };

            // Consecutive turns of the same role are merged into one content entry
            match contents.last_mut() {
                Some(last) if last.role.as_deref() == Some(role) => last.parts.extend(parts),
                _ => contents.push(GeminiContent {
                    role: Some(role.to_string()),
                    parts,
                }),
            }
        }

        GeminiRequest {
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(GeminiContent {
                    role: None,
                    parts: system_parts,
                })
            },
            contents,
            tools: tools.filter(|t| !t.is_empty()).map(|t| {
                vec![GeminiTool {
                    function_declarations: t
                        .into_iter()
                        .map(|tool| GeminiFunctionDeclaration {
                            name: tool.function.name,
                            description: tool.function.description,
                            parameters: tool.function.parameters,
                        })
                        .collect(),
                }]
            }),
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
                top_p: options.top_p,
                max_output_tokens: options.max_tokens,
            },
        }
    }

    fn convert_response(&self, response: GeminiResponse) -> Result<LlmResponse> {
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            LlmError::InvalidResponse {
                message: "No candidates in Gemini response".to_string(),
            }
        })?;

        let mut blocks = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                blocks.push(ContentBlock::Text { text });
            }
            if let Some(call) = part.function_call {
                blocks.push(ContentBlock::ToolUse {
                    id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                    name: call.name,
                    input: if call.args.is_null() { json!({}) } else { call.args },
                });
            }
        }

        let content = match blocks.as_slice() {
            [] => MessageContent::Text(String::new()),
            [ContentBlock::Text { text }] => MessageContent::Text(text.clone()),
            _ => MessageContent::MultiModal(blocks),
        };

        let has_tool_use = matches!(&content, MessageContent::MultiModal(b)
            if b.iter().any(|block| matches!(block, ContentBlock::ToolUse { .. })));

        let finish_reason = candidate.finish_reason.map(|reason| match reason.as_str() {
            "STOP" if has_tool_use => FinishReason::ToolCalls,
            "STOP" => FinishReason::Stop,
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => {
                FinishReason::ContentFilter
            }
            _ => FinishReason::Other(reason),
        });

        let usage = response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(LlmResponse {
            message: LlmMessage {
                role: MessageRole::Assistant,
                content,
                metadata: None,
            },
            usage,
            model: response.model_version.unwrap_or_else(|| self.model.clone()),
            finish_reason,
            metadata: None,
        })
    }
}

fn to_gemini_parts(content: &MessageContent, call_names: &HashMap<String, String>) -> Vec<GeminiPart> {
    match content {
        MessageContent::Text(text) => vec![GeminiPart {
            text: Some(text.clone()),
            ..Default::default()
        }],
        MessageContent::MultiModal(blocks) => blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => GeminiPart {
                    text: Some(text.clone()),
                    ..Default::default()
                },
                ContentBlock::ToolUse { name, input, .. } => GeminiPart {
                    function_call: Some(GeminiFunctionCall {
                        name: name.clone(),
                        args: input.clone(),
                    }),
                    ..Default::default()
                },
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => GeminiPart {
                    function_response: Some(GeminiFunctionResponse {
                        name: call_names
                            .get(tool_use_id)
                            .cloned()
                            .unwrap_or_else(|| tool_use_id.clone()),
                        response: json!({ "content": content }),
                    }),
                    ..Default::default()
                },
            })
            .collect(),
    }
}

#[async_trait]
impl LlmClient for GoogleClient {
    async fn chat_completion(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<ToolDefinition>>,
        options: Option<ChatOptions>,
    ) -> Result<LlmResponse> {
        let request = self.build_request(messages, tools, options);

        let mut builder = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
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
            tracing::error!("Gemini API call failed: {} - {}", status, error_text);
            return Err((LlmError::ApiError {
                status,
                message: error_text,
            })
            .into());
        }

        let gemini_response: GeminiResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })?;

        let result = self.convert_response(gemini_response)?;
        let tool_use_count = result.message.get_tool_uses().len();
        if tool_use_count > 0 {
            tracing::debug!("Gemini response contains {} function calls", tool_use_count);
        }

        Ok(result)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "google_ai"
    }
}
