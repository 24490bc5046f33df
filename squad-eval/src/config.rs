//! Configuration management for the evaluation pipeline
//!
//! Loads provider, dataset and pipeline settings from TOML files and
//! provides runtime access. Credentials never live in the file: each
//! provider names the environment variables that hold them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::batch::PollPolicy;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub answers: AnswerConfig,
    #[serde(default)]
    pub grading: GradingConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub default_model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Fixed base URL (OpenAI style providers)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the endpoint (Azure style providers)
    #[serde(default)]
    pub endpoint_env: Option<String>,
    /// Requests per minute
    #[serde(default = "default_rpm")]
    pub rpm: u32,
    /// Tokens per minute
    #[serde(default = "default_tpm")]
    pub tpm: u32,
    /// Price in dollars per 1K prompt tokens
    #[serde(default)]
    pub input_cost_per_1k: f64,
    /// Price in dollars per 1K completion tokens
    #[serde(default)]
    pub output_cost_per_1k: f64,
}

/// Source dataset settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_path")]
    pub path: String,
    /// Maximum number of answerable questions to extract
    #[serde(default = "default_question_limit")]
    pub question_limit: usize,
}

/// Answer generation settings shared by the batch and serial generators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    #[serde(default = "default_answer_model")]
    pub batch_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_answer_system_prompt")]
    pub system_prompt: String,
    /// Template for the batch user message; `{question}` is substituted
    #[serde(default = "default_answer_user_prompt")]
    pub user_prompt: String,
    /// Completion cap for serial answers; unset sends no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_batch_input")]
    pub batch_input_file: String,
    #[serde(default = "default_batch_output")]
    pub batch_output_file: String,
    #[serde(default = "default_serial_output")]
    pub serial_output_file: String,
}

/// Grading settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    #[serde(default = "default_grading_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_grading_input")]
    pub input_file: String,
    #[serde(default = "default_grading_output")]
    pub output_file: String,
}

/// Batch job submission and polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_completion_window")]
    pub completion_window: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Zero means no attempt cap; the timeout still applies
    #[serde(default)]
    pub max_poll_attempts: u32,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

// Default value functions
fn default_true() -> bool { true }
fn default_rpm() -> u32 { 60 }
fn default_tpm() -> u32 { 100_000 }
fn default_dataset_path() -> String { "dev-v2.0.json".to_string() }
fn default_question_limit() -> usize { 500 }
fn default_answer_model() -> String { "gpt-4o-mini".to_string() }
fn default_temperature() -> f32 { 0.2 }
fn default_answer_system_prompt() -> String {
    "You are an intelligent AI. Answer all questions concisely and to the best of your ability."
        .to_string()
}
fn default_answer_user_prompt() -> String {
    "Answer this question concisely and to the best of your ability: {question}".to_string()
}
fn default_batch_input() -> String { "gpt-answers-input-batch.jsonl".to_string() }
fn default_batch_output() -> String { "gpt-answers-output-batch.jsonl".to_string() }
fn default_serial_output() -> String { "llama-answers.jsonl".to_string() }
fn default_grading_model() -> String { "gpt-4o".to_string() }
fn default_grading_input() -> String { "gpt-grading-input-batch.jsonl".to_string() }
fn default_grading_output() -> String { "gpt-grading-output-batch.jsonl".to_string() }
fn default_completion_window() -> String { "24h".to_string() }
fn default_poll_interval_ms() -> u64 { 1_000 }
fn default_max_poll_interval_ms() -> u64 { 60_000 }
fn default_backoff_multiplier() -> f64 { 2.0 }
fn default_poll_timeout_ms() -> u64 { 24 * 60 * 60 * 1_000 }

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            question_limit: default_question_limit(),
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            batch_model: default_answer_model(),
            temperature: default_temperature(),
            system_prompt: default_answer_system_prompt(),
            user_prompt: default_answer_user_prompt(),
            max_tokens: None,
            batch_input_file: default_batch_input(),
            batch_output_file: default_batch_output(),
            serial_output_file: default_serial_output(),
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            model: default_grading_model(),
            temperature: default_temperature(),
            input_file: default_grading_input(),
            output_file: default_grading_output(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            completion_window: default_completion_window(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_poll_attempts: 0,
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl BatchConfig {
    /// Build the poll policy used while waiting for batch jobs
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(self.poll_interval_ms),
            max_interval: Duration::from_millis(self.max_poll_interval_ms),
            multiplier: self.backoff_multiplier,
            max_attempts: if self.max_poll_attempts == 0 {
                None
            } else {
                Some(self.max_poll_attempts)
            },
            timeout: Duration::from_millis(self.poll_timeout_ms),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/squad-eval.toml",
            "../config/squad-eval.toml",
            "squad-eval/config/squad-eval.toml",
        ];

        for path in &config_paths {
            if let Ok(config) = Self::from_file(path) {
                tracing::info!("Loaded configuration from {}", path);
                return config;
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Load from an explicit path, or fall back to the default search
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::load_or_default()),
        }
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Get a specific provider config
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut providers = HashMap::new();

        providers.insert("openai".to_string(), ProviderConfig {
            name: "openai".to_string(),
            enabled: true,
            default_model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: Some("https://api.openai.com/v1".to_string()),
            endpoint_env: None,
            rpm: 500,
            tpm: 200_000,
            input_cost_per_1k: 0.00015,
            output_cost_per_1k: 0.0006,
        });

        providers.insert("azure".to_string(), ProviderConfig {
            name: "azure".to_string(),
            enabled: true,
            default_model: "Llama-3.2-11B-Vision-Instruct".to_string(),
            api_key_env: "AZURE_MLSTUDIO_KEY".to_string(),
            base_url: None,
            endpoint_env: Some("AZURE_MLSTUDIO_ENDPOINT".to_string()),
            rpm: 60,
            tpm: 100_000,
            input_cost_per_1k: 0.0003,
            output_cost_per_1k: 0.00061,
        });

        Self {
            providers,
            dataset: DatasetConfig::default(),
            answers: AnswerConfig::default(),
            grading: GradingConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
