use async_openai::{
    config::OpenAIConfig,
    types::{CreateSpeechRequestArgs, SpeechModel, Voice},
    Client,
};
use bytes::Bytes;

use crate::config::SpeechConfig;
use crate::{Error, Result};

/// Turns a narration script into encoded audio
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, script: &str) -> Result<Bytes>;
}

fn parse_voice(name: &str) -> Result<Voice> {
    match name.to_lowercase().as_str() {
        "alloy" => Ok(Voice::Alloy),
        "echo" => Ok(Voice::Echo),
        "fable" => Ok(Voice::Fable),
        "onyx" => Ok(Voice::Onyx),
        "nova" => Ok(Voice::Nova),
        "shimmer" => Ok(Voice::Shimmer),
        other => Err(Error::Config(format!("Unknown speech voice '{}'", other))),
    }
}

fn parse_model(name: &str) -> SpeechModel {
    match name {
        "tts-1" => SpeechModel::Tts1,
        "tts-1-hd" => SpeechModel::Tts1Hd,
        other => SpeechModel::Other(other.to_string()),
    }
}

/// OpenAI text-to-speech, returns MP3 bytes
pub struct OpenAiSpeech {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiSpeech {
    /// `fallback_key` is used when the speech section has no key of its own
    pub fn new(config: &SpeechConfig, fallback_key: Option<&str>) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .or(fallback_key)
            .ok_or_else(|| Error::Config("Speech API key not configured".to_string()))?;

        Ok(Self {
            client: Client::with_config(OpenAIConfig::new().with_api_key(api_key)),
            model: parse_model(&config.model),
            voice: parse_voice(&config.voice)?,
        })
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, script: &str) -> Result<Bytes> {
        let request = CreateSpeechRequestArgs::default()
            .input(script)
            .voice(self.voice.clone())
            .model(self.model.clone())
            .build()
            .map_err(|e| Error::Speech(e.to_string()))?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| Error::Speech(e.to_string()))?;

        tracing::debug!("Synthesized {} bytes of audio", response.bytes.len());
        Ok(response.bytes)
    }
}
