use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use url::Url;

use super::fetcher::{StoryQuery, StorySource};
use super::models::{Story, StoryPage};
use crate::config::NewsConfig;
use crate::{Error, Result};

const TOKEN_PATH: &str = "/v1/oauth/token";
const STORIES_PATH: &str = "/v6/news/stories";
const APP_ID_HEADER: &str = "AppId";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct StoriesResponse {
    #[serde(default)]
    stories: Vec<ApiStory>,
    next_page_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ApiStory {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: String,
    published_at: Option<DateTime<Utc>>,
    links: Option<ApiLinks>,
    source: Option<ApiSource>,
}

#[derive(Deserialize)]
struct ApiLinks {
    permalink: Option<String>,
}

#[derive(Deserialize)]
struct ApiSource {
    name: Option<String>,
}

impl ApiStory {
    /// Untitled stories are dropped rather than failing the whole page
    fn into_story(self) -> Option<Story> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        Some(Story {
            title,
            body: self.body,
            published_at: self.published_at,
            permalink: self.links.and_then(|l| l.permalink),
            source_name: self.source.and_then(|s| s.name),
        })
    }
}

impl From<StoriesResponse> for StoryPage {
    fn from(response: StoriesResponse) -> Self {
        StoryPage {
            stories: response
                .stories
                .into_iter()
                .filter_map(ApiStory::into_story)
                .collect(),
            next_cursor: response.next_page_cursor,
        }
    }
}

/// Client for the Aylien news search API
///
/// The bearer token is cached and shared by every request; a 401 or 403
/// drops it and exchanges credentials again before one retry.
pub struct AylienClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    app_id: String,
    token: RwLock<Option<String>>,
}

impl AylienClient {
    /// Create a new client; fails if credentials are not configured
    pub fn new(config: &NewsConfig) -> Result<Self> {
        let username = config
            .username
            .clone()
            .ok_or_else(|| Error::Config("News API username not configured".to_string()))?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| Error::Config("News API password not configured".to_string()))?;
        let app_id = config
            .app_id
            .clone()
            .ok_or_else(|| Error::Config("News API app id not configured".to_string()))?;

        let base_url = Url::parse(&config.base_url)?;

        let client = Client::builder()
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            username,
            password,
            app_id,
            token: RwLock::new(None),
        })
    }

    /// Exchange username/password for a bearer token
    pub async fn authenticate(&self) -> Result<String> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);

        tracing::debug!("Requesting news API token");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .form(&[("grant_type", "password")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Cached token, exchanging credentials on first use
    async fn bearer_token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }

        let token = self.authenticate().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Replace a token the API rejected, unless another request already did
    async fn refresh_token(&self, rejected: &str) -> Result<String> {
        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref().filter(|t| t.as_str() != rejected) {
            return Ok(token.clone());
        }

        *slot = None;
        let token = self.authenticate().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    async fn request_page(
        &self,
        token: &str,
        query: &StoryQuery,
        cursor: Option<&str>,
    ) -> Result<StoryPage> {
        let url = format!("{}{}", self.base_url, STORIES_PATH);

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers(token)?)
            .query(&query.params(cursor))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let page: StoriesResponse = response.json().await?;
        Ok(page.into())
    }

    fn auth_headers(&self, token: &str) -> Result<HeaderMap> {
        build_auth_headers(token, &self.app_id)
    }
}

fn build_auth_headers(token: &str, app_id: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| Error::Config(format!("Invalid bearer token: {}", e)))?,
    );
    headers.insert(
        APP_ID_HEADER,
        HeaderValue::from_str(app_id)
            .map_err(|e| Error::Config(format!("Invalid app id: {}", e)))?,
    );
    Ok(headers)
}

#[async_trait::async_trait]
impl StorySource for AylienClient {
    async fn page(&self, query: &StoryQuery, cursor: Option<&str>) -> Result<StoryPage> {
        let token = self.bearer_token().await?;

        match self.request_page(&token, query, cursor).await {
            Err(Error::UpstreamStatus {
                status: 401 | 403,
                ..
            }) => {
                tracing::info!("News API rejected the cached token, re-authenticating");
                let token = self.refresh_token(&token).await?;
                self.request_page(&token, query, cursor).await
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::news::StoryFetcher;
    use crate::retry::RetryPolicy;

    /// Token endpoint hands out t1, t2, ...; t1 stops working after one page
    #[derive(Default)]
    struct ExpiringApi {
        exchanges: AtomicUsize,
        pages: AtomicUsize,
    }

    async fn issue_token(State(api): State<Arc<ExpiringApi>>) -> Json<Value> {
        let n = api.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        Json(json!({ "access_token": format!("t{}", n) }))
    }

    async fn serve_stories(
        State(api): State<Arc<ExpiringApi>>,
        headers: HeaderMap,
    ) -> std::result::Result<Json<Value>, StatusCode> {
        let n = api.pages.fetch_add(1, Ordering::SeqCst) + 1;
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth == "Bearer t1" && n > 1 {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(json!({ "stories": [{ "title": format!("Story {}", n) }] })))
    }

    async fn spawn_api(api: Arc<ExpiringApi>) -> String {
        let app = Router::new()
            .route(TOKEN_PATH, routing::post(issue_token))
            .route(STORIES_PATH, routing::get(serve_stories))
            .with_state(api);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn configured(base_url: String) -> NewsConfig {
        NewsConfig {
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            app_id: Some("app".to_string()),
            base_url,
            ..NewsConfig::default()
        }
    }

    #[tokio::test]
    async fn test_rejected_token_is_exchanged_again() {
        let api = Arc::new(ExpiringApi::default());
        let config = configured(spawn_api(api.clone()).await);
        let client = Arc::new(AylienClient::new(&config).unwrap());
        let fetcher = StoryFetcher::new(client, RetryPolicy::upstream(&config));
        let query = StoryQuery::for_city("Boston", &config);

        let mut sizes = Vec::new();
        for _ in 0..3 {
            sizes.push(fetcher.fetch_top_stories(&query, Some(1)).await.len());
        }

        assert_eq!(sizes, vec![1, 1, 1]);
        assert_eq!(api.exchanges.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_new_requires_credentials() {
        let config = NewsConfig::default();
        assert!(matches!(AylienClient::new(&config), Err(Error::Config(_))));

        let config = NewsConfig {
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            app_id: Some("app".to_string()),
            base_url: "https://api.example.com/".to_string(),
            ..NewsConfig::default()
        };
        let client = AylienClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://api.example.com");

        let config = NewsConfig {
            base_url: "not a url".to_string(),
            ..config
        };
        assert!(matches!(AylienClient::new(&config), Err(Error::UrlParse(_))));
    }

    #[test]
    fn test_auth_headers() {
        let headers = build_auth_headers("abc123", "app-42").unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc123");
        assert_eq!(headers.get(APP_ID_HEADER).unwrap(), "app-42");
    }

    #[test]
    fn test_parse_stories_page() {
        let json = r#"{
            "stories": [
                {
                    "title": "Community garden opens in Queens",
                    "body": "Residents celebrated...",
                    "published_at": "2024-10-12T14:30:00Z",
                    "links": {"permalink": "https://news.example.com/garden"},
                    "source": {"name": "Queens Daily"},
                    "sentiment": {"body": {"polarity": "positive"}}
                },
                {
                    "title": "Bridge repairs finished early"
                },
                {
                    "title": null,
                    "body": "Untitled wire copy"
                },
                {
                    "body": "No title at all"
                }
            ],
            "next_page_cursor": "c2"
        }"#;

        let response: StoriesResponse = serde_json::from_str(json).unwrap();
        let page = StoryPage::from(response);

        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
        assert_eq!(page.stories.len(), 2);
        assert_eq!(page.stories[0].source_name.as_deref(), Some("Queens Daily"));
        assert_eq!(
            page.stories[0].permalink.as_deref(),
            Some("https://news.example.com/garden")
        );
        assert!(page.stories[0].published_at.is_some());
        assert_eq!(page.stories[1].body, "");
        assert_eq!(page.stories[1].source_label(), "unknown");
    }

    #[test]
    fn test_parse_last_page_without_cursor() {
        let response: StoriesResponse = serde_json::from_str(r#"{"stories": []}"#).unwrap();
        let page = StoryPage::from(response);
        assert!(page.stories.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
