use async_openai::{
    config::Config,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};

use super::CompletionModel;
use crate::config::AiConfig;
use crate::{Error, Result};

/// Chat completions through async-openai, for either OpenAI or an Azure deployment
pub struct OpenAiProvider<C: Config> {
    client: Client<C>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

impl<C: Config> OpenAiProvider<C> {
    pub fn new(config: C, ai: &AiConfig) -> Self {
        Self {
            client: Client::with_config(config),
            model: ai.model.clone(),
            max_tokens: ai.max_tokens,
            temperature: ai.temperature,
            top_p: ai.top_p,
            frequency_penalty: ai.frequency_penalty,
            presence_penalty: ai.presence_penalty,
        }
    }

    fn messages(system: &str, prompt: &str) -> Result<Vec<ChatCompletionRequestMessage>> {
        Ok(vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| Error::AiProvider(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| Error::AiProvider(e.to_string()))?,
            ),
        ])
    }
}

#[async_trait::async_trait]
impl<C> CompletionModel for OpenAiProvider<C>
where
    C: Config + Send + Sync + 'static,
{
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::messages(system, prompt)?)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .top_p(self.top_p)
            .frequency_penalty(self.frequency_penalty)
            .presence_penalty(self.presence_penalty)
            .build()
            .map_err(|e| Error::AiProvider(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| Error::AiProvider(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(content)
    }
}
