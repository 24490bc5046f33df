//! LLM Provider implementations

pub mod azure;
pub mod openai;
pub mod traits;

pub use azure::AzureInferenceClient;
pub use openai::OpenAIClient;
pub use traits::{
    CompletionRequest, CompletionResponse, JsonSchemaSpec, LLMProvider, Message, ProviderError,
    ProviderResult, ResponseFormat,
};

use crate::config::{Config, ProviderConfig};
use std::sync::Arc;

/// Apply config settings to an OpenAI client
fn configure_openai(client: OpenAIClient, pc: &ProviderConfig) -> OpenAIClient {
    let client = client
        .with_rate_limits(pc.rpm, pc.tpm)
        .with_model(&pc.default_model);
    match &pc.base_url {
        Some(url) => client.with_base_url(url),
        None => client,
    }
}

/// Create the OpenAI client used for chat and batch jobs
pub fn create_openai(config: &Config) -> ProviderResult<OpenAIClient> {
    match config.get_provider("openai") {
        Some(pc) if !pc.enabled => Err(ProviderError::Config("openai provider is disabled".to_string())),
        Some(pc) => Ok(configure_openai(OpenAIClient::from_env_var(&pc.api_key_env)?, pc)),
        None => OpenAIClient::from_env(),
    }
}

/// Create the Azure inference client used for serial answers
pub fn create_azure(config: &Config) -> ProviderResult<AzureInferenceClient> {
    match config.get_provider("azure") {
        Some(pc) if !pc.enabled => Err(ProviderError::Config("azure provider is disabled".to_string())),
        Some(pc) => {
            let endpoint_env = pc.endpoint_env.as_deref().unwrap_or("AZURE_MLSTUDIO_ENDPOINT");
            let client = AzureInferenceClient::from_env_vars(endpoint_env, &pc.api_key_env)?;
            Ok(client
                .with_rate_limits(pc.rpm, pc.tpm)
                .with_model(&pc.default_model))
        }
        None => AzureInferenceClient::from_env(),
    }
}

/// Create a chat provider by name, applying settings from config
pub fn create_provider(
    name: &str,
    config: &Config,
) -> ProviderResult<Arc<dyn LLMProvider + Send + Sync>> {
    match name.to_lowercase().as_str() {
        "azure" | "llama" => Ok(Arc::new(create_azure(config)?)),
        "openai" | "gpt" => Ok(Arc::new(create_openai(config)?)),
        _ => Err(ProviderError::Config(format!("Unknown provider: {}", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider() {
        let err = create_provider("grok", &Config::default()).err().unwrap();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn test_disabled_provider() {
        let mut config = Config::default();
        if let Some(pc) = config.providers.get_mut("azure") {
            pc.enabled = false;
        }
        let err = create_azure(&config).err().unwrap();
        assert!(err.to_string().contains("disabled"));
    }
}
