//! Minimal configuration types for Research Agent core
//!
//! Core only accepts fully resolved, validated configuration.
//! All discovery, loading, and merging happens in CLI layer.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default file the save tool appends to
pub const DEFAULT_OUTPUT_FILE: &str = "research_output.txt";

/// Supported LLM protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Google AI API (Gemini)
    #[serde(rename = "google_ai")]
    GoogleAI,
    /// OpenAI-compatible API (includes OpenAI, many proxies, local models)
    #[serde(rename = "openai")]
    OpenAICompat,
    /// Anthropic Claude API
    #[serde(rename = "anthropic")]
    Anthropic,
    /// DeepSeek chat API (OpenAI wire format)
    #[serde(rename = "deepseek")]
    DeepSeek,
}

impl Protocol {
    /// All protocols, in env auto-detection preference order
    pub const ALL: [Protocol; 4] = [
        Protocol::GoogleAI,
        Protocol::OpenAICompat,
        Protocol::Anthropic,
        Protocol::DeepSeek,
    ];

    /// Get the protocol name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::GoogleAI => "google_ai",
            Protocol::OpenAICompat => "openai",
            Protocol::Anthropic => "anthropic",
            Protocol::DeepSeek => "deepseek",
        }
    }

    /// Parse a protocol name; accepts a few common aliases
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "google_ai" | "google" | "gemini" => Some(Protocol::GoogleAI),
            "openai" | "openai_compat" => Some(Protocol::OpenAICompat),
            "anthropic" | "claude" => Some(Protocol::Anthropic),
            "deepseek" => Some(Protocol::DeepSeek),
            _ => None,
        }
    }

    /// Get the default base URL for this protocol
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Protocol::GoogleAI => "https://generativelanguage.googleapis.com/v1beta",
            Protocol::OpenAICompat => "https://api.openai.com/v1",
            Protocol::Anthropic => "https://api.anthropic.com",
            Protocol::DeepSeek => "https://api.deepseek.com",
        }
    }

    /// Get the default model for this protocol
    pub fn default_model(&self) -> &'static str {
        match self {
            Protocol::GoogleAI => "gemini-2.5-flash",
            Protocol::OpenAICompat => "gpt-4o",
            Protocol::Anthropic => "claude-3-5-sonnet-20241022",
            Protocol::DeepSeek => "deepseek-chat",
        }
    }

    /// Prefix of the environment variables for this protocol (`<PREFIX>_API_KEY`, ...)
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Protocol::GoogleAI => "GOOGLE",
            Protocol::OpenAICompat => "OPENAI",
            Protocol::Anthropic => "ANTHROPIC",
            Protocol::DeepSeek => "DEEPSEEK",
        }
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| ConfigError::UnsupportedProtocol {
            protocol: s.trim().to_string(),
        })
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model parameters for LLM requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Top-p sampling parameter
    pub top_p: Option<f32>,
}

/// A fully resolved LLM configuration ready for use by core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLlmConfig {
    /// The protocol to use
    pub protocol: Protocol,
    /// Base URL for the API
    pub base_url: String,
    /// API key for authentication
    pub api_key: String,
    /// Model name/identifier
    pub model: String,
    /// Model parameters
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers for requests
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl ResolvedLlmConfig {
    /// Create a new resolved LLM config
    pub fn new(protocol: Protocol, base_url: String, api_key: String, model: String) -> Self {
        Self {
            protocol,
            base_url,
            api_key,
            model,
            params: ModelParams::default(),
            headers: HashMap::new(),
        }
    }

    /// Set model parameters
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Add multiple headers
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.trim().is_empty() {
            return Err(format!(
                "API key cannot be empty (set {}_API_KEY)",
                self.protocol.env_prefix()
            ));
        }

        if self.model.is_empty() {
            return Err("Model name cannot be empty".to_string());
        }

        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Base URL must start with http:// or https://".to_string());
        }

        if let Some(temp) = self.params.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if let Some(top_p) = self.params.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err("Top-p must be between 0.0 and 1.0".to_string());
            }
        }

        Ok(())
    }
}

/// How tool names are bound to handlers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolWiring {
    /// Search performs a web search, save appends to the output file
    #[default]
    Intended,
    /// Both the search and save names append to the output file
    Legacy,
}

/// Settings the built-in tools are created with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// File the save tool appends to
    pub output_file: PathBuf,
    /// Maximum number of web search results
    pub search_max_results: usize,
    /// Number of Wikipedia pages to summarise
    pub wikipedia_top_k: usize,
    /// Character budget for the Wikipedia observation
    pub wikipedia_max_chars: usize,
    /// Name/handler binding
    pub wiring: ToolWiring,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            search_max_results: 5,
            wikipedia_top_k: 3,
            wikipedia_max_chars: 2000,
            wiring: ToolWiring::default(),
        }
    }
}
