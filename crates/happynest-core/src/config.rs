use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub digest: DigestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path (database and generated audio)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// News API base URL
    #[serde(default = "default_news_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Application id sent in the `AppId` header
    #[serde(default)]
    pub app_id: Option<String>,
    /// Story language filter
    #[serde(default = "default_language")]
    pub language: String,
    /// Publication date range expression
    #[serde(default = "default_published_window")]
    pub published_window: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Cap on stories fetched per location
    #[serde(default = "default_max_stories")]
    pub max_stories: usize,
    /// Cooldown after HTTP 429
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_secs: u64,
    /// Cooldown after HTTP 5xx
    #[serde(default = "default_server_error_delay")]
    pub server_error_delay_secs: u64,
    /// Retries per page before the fetch gives up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: default_news_base_url(),
            username: None,
            password: None,
            app_id: None,
            language: default_language(),
            published_window: default_published_window(),
            per_page: default_per_page(),
            max_stories: default_max_stories(),
            rate_limit_delay_secs: default_rate_limit_delay(),
            server_error_delay_secs: default_server_error_delay(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Completion provider: "azure" or "openai"
    #[serde(default = "default_ai_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name (ignored by Azure, which routes by deployment)
    #[serde(default = "default_model")]
    pub model: String,
    /// Azure resource endpoint, e.g. https://my-resource.openai.azure.com
    #[serde(default)]
    pub azure_endpoint: Option<String>,
    #[serde(default = "default_azure_deployment")]
    pub azure_deployment: String,
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub frequency_penalty: f32,
    #[serde(default)]
    pub presence_penalty: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_ai_provider(),
            api_key: None,
            model: default_model(),
            azure_endpoint: None,
            azure_deployment: default_azure_deployment(),
            azure_api_version: default_azure_api_version(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Enable spoken digests
    #[serde(default)]
    pub enabled: bool,
    /// OpenAI API key for speech; falls back to `ai.api_key`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_speech_model")]
    pub model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: default_speech_model(),
            voice: default_voice(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_base_url")]
    pub base_url: String,
    /// Nominatim rejects requests without a User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    /// City used when reverse geocoding fails
    #[serde(default = "default_city")]
    pub default_city: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_base_url(),
            user_agent: default_user_agent(),
            zoom: default_zoom(),
            default_city: default_city(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Titles more similar than this are treated as duplicates (0.0-1.0)
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,
    /// Titles read out per location
    #[serde(default = "default_narration_max_titles")]
    pub narration_max_titles: usize,
    /// Cities sampled by a global digest
    #[serde(default = "default_global_sample_size")]
    pub global_sample_size: usize,
    /// Interval of the scheduled global digest in seconds (0 = disabled)
    #[serde(default)]
    pub schedule_interval_secs: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: default_dedup_threshold(),
            narration_max_titles: default_narration_max_titles(),
            global_sample_size: default_global_sample_size(),
            schedule_interval_secs: 0,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("happynest")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_news_base_url() -> String {
    "https://api.aylien.com".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_published_window() -> String {
    "[NOW-14DAYS/HOUR TO NOW/HOUR]".to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_max_stories() -> usize {
    100
}

fn default_rate_limit_delay() -> u64 {
    10
}

fn default_server_error_delay() -> u64 {
    260
}

fn default_max_retries() -> u32 {
    5
}

fn default_ai_provider() -> String {
    "azure".to_string()
}

fn default_model() -> String {
    "gpt-35-turbo".to_string()
}

fn default_azure_deployment() -> String {
    "gpt-35-turbo".to_string()
}

fn default_azure_api_version() -> String {
    "2024-08-01-preview".to_string()
}

fn default_max_tokens() -> u32 {
    800
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.95
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_geocoder_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    "HappyNest/1.0".to_string()
}

fn default_zoom() -> u8 {
    10
}

fn default_city() -> String {
    "New York".to_string()
}

fn default_dedup_threshold() -> f64 {
    0.5
}

fn default_narration_max_titles() -> usize {
    10
}

fn default_global_sample_size() -> usize {
    3
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults, then apply environment overrides
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        let mut config: Self = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Credentials and paths that may come from the environment (or a `.env` file)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AYLIEN_USERNAME") {
            self.news.username = Some(v);
        }
        if let Some(v) = lookup("AYLIEN_PASSWORD") {
            self.news.password = Some(v);
        }
        if let Some(v) = lookup("AYLIEN_APP_ID") {
            self.news.app_id = Some(v);
        }
        if let Some(v) = lookup("AZURE_OPENAI_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.ai.api_key = Some(v);
        }
        if let Some(v) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.ai.azure_endpoint = Some(v);
        }
        if let Some(v) = lookup("HAPPYNEST_DATA_DIR") {
            self.general.data_dir = PathBuf::from(v);
        }
    }

    /// Get the configuration file path
    /// Always uses ~/.config/happynest/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("happynest")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("happynest.db")
    }

    /// Directory holding generated digest audio, served under `/static`
    pub fn static_dir(&self) -> PathBuf {
        self.data_dir().join("static")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}
