//! CLI configuration loader for the research agent
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./research.json or ./.research/config.json
//! 3. User config directory: <config_dir>/research/config.json
//! 4. Environment variables only (no files)

use anyhow::{anyhow, Context, Result};
use research_core::config::DEFAULT_OUTPUT_FILE;
use research_core::{ModelParams, Protocol, ResolvedLlmConfig, ToolWiring};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CONFIG_FILE_NAME: &str = "research.json";
const CONFIG_DIR_NAME: &str = ".research";
const USER_CONFIG_DIR_NAME: &str = "research";

/// Raw configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    /// Protocol to use
    pub protocol: String,
    /// API key (can be "env:VAR_NAME" for environment variable)
    #[serde(default)]
    pub api_key: String,
    /// Base URL (optional, uses protocol default if not specified)
    pub base_url: Option<String>,
    /// Model name (optional, uses protocol default if not specified)
    pub model: Option<String>,
    #[serde(default)]
    pub params: ModelParams,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// File the save tool appends to
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub tool_wiring: Option<ToolWiring>,
    pub max_iterations: Option<usize>,
}

impl RawConfig {
    fn for_protocol(protocol: Protocol, api_key: String) -> Self {
        Self {
            protocol: protocol.as_str().to_string(),
            api_key,
            base_url: None,
            model: None,
            params: ModelParams::default(),
            headers: HashMap::new(),
            output_file: None,
            tool_wiring: None,
            max_iterations: None,
        }
    }
}

/// Fully resolved CLI configuration
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub llm: ResolvedLlmConfig,
    pub output_file: PathBuf,
    pub tool_wiring: ToolWiring,
    pub max_iterations: Option<usize>,
}

type EnvSource = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// CLI configuration loader
pub struct CliConfigLoader {
    config_override: Option<PathBuf>,
    protocol_override: Option<String>,
    api_key_override: Option<String>,
    base_url_override: Option<String>,
    model_override: Option<String>,
    search_dir: Option<PathBuf>,
    user_config_dir: Option<PathBuf>,
    env: EnvSource,
}

impl CliConfigLoader {
    pub fn new() -> Self {
        Self {
            config_override: None,
            protocol_override: None,
            api_key_override: None,
            base_url_override: None,
            model_override: None,
            search_dir: None,
            user_config_dir: dirs::config_dir(),
            env: Arc::new(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty())),
        }
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    pub fn with_protocol_override(mut self, protocol: String) -> Self {
        self.protocol_override = Some(protocol);
        self
    }

    pub fn with_api_key_override(mut self, api_key: String) -> Self {
        self.api_key_override = Some(api_key);
        self
    }

    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url_override = Some(base_url);
        self
    }

    pub fn with_model_override(mut self, model: String) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Directory searched for `research.json` instead of the working directory
    #[cfg(test)]
    pub fn with_search_dir(mut self, dir: PathBuf) -> Self {
        self.search_dir = Some(dir);
        self
    }

    /// User-level config directory; `None` disables that search step
    #[cfg(test)]
    pub fn with_user_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_config_dir = dir;
        self
    }

    /// Read environment variables through `env` instead of the process environment
    #[cfg(test)]
    pub fn with_env_source<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(env);
        self
    }

    fn env_var(&self, name: &str) -> Option<String> {
        (self.env)(name)
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<LoadedConfig> {
        // Step 1: Find and load base configuration
        let mut config = if let Some(override_path) = &self.config_override {
            self.load_from_path(override_path).await.with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    override_path.display()
                )
            })?
        } else {
            self.search_and_load().await?
        };

        // Step 2: Apply flag overrides
        if let Some(protocol) = &self.protocol_override {
            if Protocol::from_name(protocol) != Protocol::from_name(&config.protocol) {
                // Switching provider invalidates the provider-specific endpoint and model
                config.base_url = None;
                config.model = None;
            }
            config.protocol = protocol.clone();
        }
        if let Some(api_key) = &self.api_key_override {
            config.api_key = api_key.clone();
        }
        if let Some(base_url) = &self.base_url_override {
            config.base_url = Some(base_url.clone());
        }
        if let Some(model) = &self.model_override {
            config.model = Some(model.clone());
        }

        // Step 3: Resolve to final config
        self.resolve_config(config)
    }

    async fn search_and_load(&self) -> Result<RawConfig> {
        if let Some(config) = self.try_load_cwd().await? {
            return Ok(config);
        }

        if let Some(config) = self.try_load_user_config().await? {
            return Ok(config);
        }

        self.try_load_env_only()
    }

    async fn try_load_cwd(&self) -> Result<Option<RawConfig>> {
        let dir = match &self.search_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };

        for candidate in [
            dir.join(CONFIG_FILE_NAME),
            dir.join(CONFIG_DIR_NAME).join("config.json"),
        ] {
            if candidate.is_file() {
                tracing::debug!("Using config file {}", candidate.display());
                return Ok(Some(self.load_file(&candidate).await?));
            }
        }

        Ok(None)
    }

    async fn try_load_user_config(&self) -> Result<Option<RawConfig>> {
        if let Some(config_dir) = &self.user_config_dir {
            let config_path = config_dir.join(USER_CONFIG_DIR_NAME).join("config.json");
            if config_path.is_file() {
                tracing::debug!("Using config file {}", config_path.display());
                return Ok(Some(self.load_file(&config_path).await?));
            }
        }
        Ok(None)
    }

    /// Build a config from `<PROVIDER>_API_KEY` style environment variables
    fn try_load_env_only(&self) -> Result<RawConfig> {
        let available: Vec<(Protocol, String)> = Protocol::ALL
            .iter()
            .filter_map(|protocol| {
                self.env_var(&format!("{}_API_KEY", protocol.env_prefix()))
                    .map(|key| (*protocol, key))
            })
            .collect();
        let available_names = || {
            available
                .iter()
                .map(|(p, _)| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let preference = self
            .protocol_override
            .clone()
            .or_else(|| self.env_var("RESEARCH_PROTOCOL"));

        let (protocol, api_key) = if let Some(preferred) = preference {
            let protocol: Protocol = preferred.parse()?;
            let key = available
                .iter()
                .find(|(p, _)| *p == protocol)
                .map(|(_, key)| key.clone())
                .or_else(|| self.api_key_override.clone())
                .ok_or_else(|| {
                    anyhow!(
                        "Protocol '{}' specified but {}_API_KEY is not set",
                        protocol,
                        protocol.env_prefix()
                    )
                })?;
            (protocol, key)
        } else {
            match available.as_slice() {
                [] if self.api_key_override.is_some() => {
                    (Protocol::GoogleAI, self.api_key_override.clone().unwrap_or_default())
                }
                [] => {
                    return Err(anyhow!(
                        "No configuration found. Set GOOGLE_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY, DEEPSEEK_API_KEY) in the environment or a .env file, or create {}",
                        CONFIG_FILE_NAME
                    ))
                }
                [(protocol, key)] => (*protocol, key.clone()),
                _ => match available.iter().find(|(p, _)| *p == Protocol::GoogleAI) {
                    Some((protocol, key)) => (*protocol, key.clone()),
                    None => {
                        return Err(anyhow!(
                            "Multiple API keys detected: {}. Please specify which protocol to use with RESEARCH_PROTOCOL or --protocol",
                            available_names()
                        ))
                    }
                },
            }
        };

        let prefix = protocol.env_prefix();
        let mut config = RawConfig::for_protocol(protocol, api_key);
        config.base_url = self
            .env_var(&format!("{}_BASE_URL", prefix))
            .or_else(|| self.env_var("RESEARCH_BASE_URL"));
        config.model = self
            .env_var(&format!("{}_MODEL", prefix))
            .or_else(|| self.env_var("RESEARCH_MODEL"));

        Ok(config)
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<RawConfig> {
        if path.is_file() {
            self.load_file(path).await
        } else if path.is_dir() {
            let config_file = path.join("config.json");
            if config_file.exists() {
                self.load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    async fn load_file(&self, path: &Path) -> Result<RawConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn resolve_config(&self, config: RawConfig) -> Result<LoadedConfig> {
        let protocol: Protocol = config.protocol.parse()?;

        // Resolve API key (handle env: prefix)
        let api_key = match config.api_key.strip_prefix("env:") {
            Some(var_name) => self
                .env_var(var_name)
                .ok_or_else(|| anyhow!("Environment variable not found: {}", var_name))?,
            None if config.api_key.is_empty() => self
                .env_var(&format!("{}_API_KEY", protocol.env_prefix()))
                .unwrap_or_default(),
            None => config.api_key,
        };

        let base_url = config
            .base_url
            .unwrap_or_else(|| protocol.default_base_url().to_string());
        let model = config
            .model
            .unwrap_or_else(|| protocol.default_model().to_string());

        let llm = ResolvedLlmConfig::new(protocol, base_url, api_key, model)
            .with_params(config.params)
            .with_headers(config.headers);

        llm.validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(LoadedConfig {
            llm,
            output_file: config
                .output_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE)),
            tool_wiring: config.tool_wiring.unwrap_or_default(),
            max_iterations: config.max_iterations,
        })
    }
}

impl Default for CliConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::error::ConfigError;
    use tempfile::tempdir;

    fn loader_with_env(dir: &Path, vars: &[(&str, &str)]) -> CliConfigLoader {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfigLoader::new()
            .with_search_dir(dir.to_path_buf())
            .with_user_config_dir(None)
            .with_env_source(move |name| vars.get(name).cloned())
    }

    #[tokio::test]
    async fn test_env_only_google_defaults() {
        let dir = tempdir().unwrap();
        let config = loader_with_env(dir.path(), &[("GOOGLE_API_KEY", "g-key")])
            .load()
            .await
            .unwrap();

        assert_eq!(config.llm.protocol, Protocol::GoogleAI);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.api_key, "g-key");
        assert_eq!(config.output_file, PathBuf::from("research_output.txt"));
        assert_eq!(config.tool_wiring, ToolWiring::Intended);
    }

    #[tokio::test]
    async fn test_env_only_without_keys_fails() {
        let dir = tempdir().unwrap();
        let err = loader_with_env(dir.path(), &[]).load().await.unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_multiple_keys_prefer_google() {
        let dir = tempdir().unwrap();
        let config = loader_with_env(
            dir.path(),
            &[("OPENAI_API_KEY", "o-key"), ("GOOGLE_API_KEY", "g-key")],
        )
        .load()
        .await
        .unwrap();
        assert_eq!(config.llm.protocol, Protocol::GoogleAI);
    }

    #[tokio::test]
    async fn test_multiple_keys_without_google_is_ambiguous() {
        let dir = tempdir().unwrap();
        let err = loader_with_env(
            dir.path(),
            &[("OPENAI_API_KEY", "o-key"), ("DEEPSEEK_API_KEY", "d-key")],
        )
        .load()
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Multiple API keys detected"));
    }

    #[tokio::test]
    async fn test_research_protocol_selects_provider_and_model_env() {
        let dir = tempdir().unwrap();
        let config = loader_with_env(
            dir.path(),
            &[
                ("GOOGLE_API_KEY", "g-key"),
                ("DEEPSEEK_API_KEY", "d-key"),
                ("RESEARCH_PROTOCOL", "deepseek"),
                ("DEEPSEEK_MODEL", "deepseek-reasoner"),
            ],
        )
        .load()
        .await
        .unwrap();

        assert_eq!(config.llm.protocol, Protocol::DeepSeek);
        assert_eq!(config.llm.api_key, "d-key");
        assert_eq!(config.llm.model, "deepseek-reasoner");
        assert_eq!(config.llm.base_url, "https://api.deepseek.com");
    }

    #[tokio::test]
    async fn test_config_file_in_search_dir_with_env_key() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("research.json"),
            r#"{
                "protocol": "anthropic",
                "api_key": "env:MY_CLAUDE_KEY",
                "output_file": "notes/out.txt",
                "tool_wiring": "legacy",
                "max_iterations": 4
            }"#,
        )
        .unwrap();

        let config = loader_with_env(dir.path(), &[("MY_CLAUDE_KEY", "c-key")])
            .load()
            .await
            .unwrap();

        assert_eq!(config.llm.protocol, Protocol::Anthropic);
        assert_eq!(config.llm.api_key, "c-key");
        assert_eq!(config.llm.model, "claude-3-5-sonnet-20241022");
        assert_eq!(config.output_file, PathBuf::from("notes/out.txt"));
        assert_eq!(config.tool_wiring, ToolWiring::Legacy);
        assert_eq!(config.max_iterations, Some(4));
    }

    #[tokio::test]
    async fn test_dot_dir_config_and_flag_overrides() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".research")).unwrap();
        std::fs::write(
            dir.path().join(".research").join("config.json"),
            r#"{"protocol": "openai", "api_key": "o-key", "model": "gpt-4o-mini"}"#,
        )
        .unwrap();

        let config = loader_with_env(dir.path(), &[])
            .with_model_override("gpt-4.1".to_string())
            .with_base_url_override("http://localhost:8080/v1".to_string())
            .load()
            .await
            .unwrap();

        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.base_url, "http://localhost:8080/v1");
    }

    #[tokio::test]
    async fn test_config_override_directory() {
        let dir = tempdir().unwrap();
        let custom = dir.path().join("custom");
        std::fs::create_dir(&custom).unwrap();
        std::fs::write(
            custom.join("config.json"),
            r#"{"protocol": "google_ai", "api_key": "g-key"}"#,
        )
        .unwrap();

        let config = loader_with_env(dir.path(), &[])
            .with_config_override(custom)
            .load()
            .await
            .unwrap();
        assert_eq!(config.llm.protocol, Protocol::GoogleAI);
    }

    #[tokio::test]
    async fn test_missing_override_path_fails() {
        let dir = tempdir().unwrap();
        let err = loader_with_env(dir.path(), &[])
            .with_config_override(dir.path().join("absent.json"))
            .load()
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Config path does not exist"));
    }

    #[tokio::test]
    async fn test_user_config_dir_is_searched() {
        let cwd = tempdir().unwrap();
        let home = tempdir().unwrap();
        std::fs::create_dir(home.path().join("research")).unwrap();
        std::fs::write(
            home.path().join("research").join("config.json"),
            r#"{"protocol": "deepseek", "api_key": "d-key"}"#,
        )
        .unwrap();

        let config = loader_with_env(cwd.path(), &[])
            .with_user_config_dir(Some(home.path().to_path_buf()))
            .load()
            .await
            .unwrap();
        assert_eq!(config.llm.protocol, Protocol::DeepSeek);
    }

    #[tokio::test]
    async fn test_unknown_protocol_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("research.json"),
            r#"{"protocol": "azure_openai", "api_key": "k"}"#,
        )
        .unwrap();
        let err = loader_with_env(dir.path(), &[]).load().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnsupportedProtocol { protocol }) if protocol == "azure_openai"
        ));
    }

    #[tokio::test]
    async fn test_unknown_protocol_preference_rejected() {
        let dir = tempdir().unwrap();
        let err = loader_with_env(
            dir.path(),
            &[("GOOGLE_API_KEY", "g-key"), ("RESEARCH_PROTOCOL", "mistral")],
        )
        .load()
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported protocol: mistral");
    }
}
