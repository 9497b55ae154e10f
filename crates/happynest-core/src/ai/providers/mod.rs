mod openai;

use std::sync::Arc;

use async_openai::config::{AzureConfig, OpenAIConfig};

pub use openai::OpenAiProvider;

use crate::config::AiConfig;
use crate::{Error, Result};

/// A chat completion backend: one system turn, one user turn, one reply
#[async_trait::async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Build the completion model named by `config.provider`
pub fn completion_model(config: &AiConfig) -> Result<Arc<dyn CompletionModel>> {
    let api_key = config
        .api_key
        .as_ref()
        .ok_or_else(|| Error::Config("AI API key not configured".to_string()))?;

    let model: Arc<dyn CompletionModel> = match config.provider.as_str() {
        "azure" => {
            let endpoint = config
                .azure_endpoint
                .as_ref()
                .ok_or_else(|| Error::Config("Azure OpenAI endpoint not configured".to_string()))?;
            let azure = AzureConfig::new()
                .with_api_base(endpoint.trim_end_matches('/'))
                .with_api_version(&config.azure_api_version)
                .with_deployment_id(&config.azure_deployment)
                .with_api_key(api_key);
            Arc::new(OpenAiProvider::new(azure, config))
        }
        "openai" => {
            let openai = OpenAIConfig::new().with_api_key(api_key);
            Arc::new(OpenAiProvider::new(openai, config))
        }
        other => {
            return Err(Error::Config(format!("Unknown AI provider '{}'", other)));
        }
    };

    Ok(model)
}
