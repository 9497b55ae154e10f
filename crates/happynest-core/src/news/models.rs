use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A single news item as returned by the search API, before classification
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub title: String,
    pub body: String,
    pub published_at: Option<DateTime<Utc>>,
    pub permalink: Option<String>,
    pub source_name: Option<String>,
}

impl Story {
    /// Text handed to the classifier; falls back to the title for empty bodies
    pub fn classification_text(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.title
        } else {
            &self.body
        }
    }

    /// Source label stored with the article
    pub fn source_label(&self) -> String {
        self.source_name
            .clone()
            .or_else(|| self.permalink.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// One page of search results plus the cursor for the next one
#[derive(Debug, Clone, Default)]
pub struct StoryPage {
    pub stories: Vec<Story>,
    pub next_cursor: Option<String>,
}

/// Sentiment label produced by the content classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown sentiment '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub coordinates: Coordinates,
}

impl Location {
    pub fn city(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            ..Self::default()
        }
    }
}

/// A persisted, sentiment-approved article shown in the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub location: Location,
    pub sentiment: Sentiment,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNewsArticle {
    pub title: String,
    pub content: String,
    pub location: Location,
    pub sentiment: Sentiment,
    pub published_at: DateTime<Utc>,
    pub source: String,
}

/// Partial update of a news article; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub location: Option<Location>,
    pub sentiment: Option<Sentiment>,
    pub published_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl NewsArticleUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.location.is_none()
            && self.sentiment.is_none()
            && self.published_at.is_none()
            && self.source.is_none()
    }
}
