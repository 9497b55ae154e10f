use std::sync::Arc;

use super::models::{Story, StoryPage};
use crate::config::NewsConfig;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::Result;

/// Search parameters for stories mentioning a location
#[derive(Debug, Clone, PartialEq)]
pub struct StoryQuery {
    /// Location entity to match in story titles
    pub entity: String,
    pub published_window: String,
    pub language: String,
    pub sort_by: String,
    pub per_page: u32,
}

impl StoryQuery {
    pub fn for_city(city: &str, config: &NewsConfig) -> Self {
        Self {
            entity: city.to_string(),
            published_window: config.published_window.clone(),
            language: config.language.clone(),
            sort_by: "published_at".to_string(),
            per_page: config.per_page,
        }
    }

    /// Render the query string for one page request
    pub fn params(&self, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("published_at", self.published_window.clone()),
            ("language", format!("({})", self.language)),
            (
                "entities",
                format!(
                    "{{{{element:title AND surface_forms:\"{}\" AND type:(\"Location\", \"City\")}}}}",
                    self.entity
                ),
            ),
            ("sort_by", self.sort_by.clone()),
            ("per_page", self.per_page.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        params
    }
}

/// Anything that can serve one page of stories for a query
#[async_trait::async_trait]
pub trait StorySource: Send + Sync {
    async fn page(&self, query: &StoryQuery, cursor: Option<&str>) -> Result<StoryPage>;
}

/// Paginates a [`StorySource`] with the upstream retry policy
pub struct StoryFetcher {
    source: Arc<dyn StorySource>,
    policy: RetryPolicy,
}

impl StoryFetcher {
    pub fn new(source: Arc<dyn StorySource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// Fetch stories in server order, up to `cap` if given
    ///
    /// Never fails: an error that survives the retry policy ends pagination
    /// and whatever was collected so far is returned.
    pub async fn fetch_top_stories(&self, query: &StoryQuery, cap: Option<usize>) -> Vec<Story> {
        let mut query = query.clone();
        if let Some(cap) = cap {
            if (query.per_page as usize) > cap {
                query.per_page = cap as u32;
            }
        }

        let mut fetched: Vec<Story> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            if let Some(cap) = cap {
                if fetched.len() >= cap {
                    break;
                }
            }

            let page = retry_with_backoff(&self.policy, || {
                self.source.page(&query, cursor.as_deref())
            })
            .await;

            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        entity = %query.entity,
                        fetched = fetched.len(),
                        "Story fetch aborted, keeping partial results: {}",
                        e
                    );
                    break;
                }
            };

            if page.stories.is_empty() {
                break;
            }

            fetched.extend(page.stories);
            tracing::info!(
                "Fetched stories for '{}'. Total story count so far: {}",
                query.entity,
                fetched.len()
            );

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    tracing::debug!("No next page cursor for '{}'", query.entity);
                    break;
                }
            }
        }

        if let Some(cap) = cap {
            fetched.truncate(cap);
        }
        fetched
    }
}
