use chrono::Utc;

use crate::news::{Location, NewNewsArticle, NewsArticle, Sentiment, Story};
use crate::storage::{Database, NewsRepository};
use crate::Result;

pub const DEFAULT_NARRATION_LIMIT: usize = 10;

const CLOSING_LINE: &str =
    "That's all the good news for now. Stay kind, and we'll see you next time!";

/// A story together with the label the classifier gave it
#[derive(Debug, Clone)]
pub struct ClassifiedStory {
    pub story: Story,
    pub sentiment: Sentiment,
}

/// Persists the positive subset of a classified batch
pub struct FeedAssembler<'a> {
    repo: NewsRepository<'a>,
}

impl<'a> FeedAssembler<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            repo: NewsRepository::new(db),
        }
    }

    /// Store every positive story under `location`, in input order
    pub async fn assemble(
        &self,
        location: &Location,
        classified: Vec<ClassifiedStory>,
    ) -> Result<Vec<NewsArticle>> {
        let mut stored = Vec::new();

        for item in classified {
            if item.sentiment != Sentiment::Positive {
                continue;
            }

            let story = item.story;
            let new_article = NewNewsArticle {
                source: story.source_label(),
                published_at: story.published_at.unwrap_or_else(Utc::now),
                title: story.title,
                content: story.body,
                location: location.clone(),
                sentiment: Sentiment::Positive,
            };
            stored.push(self.repo.create(&new_article).await?);
        }

        tracing::info!(
            city = %location.city,
            stored = stored.len(),
            "Assembled positive articles"
        );
        Ok(stored)
    }
}

/// Spoken digest text: opening line, one headline per line, closing line
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationScript {
    lines: Vec<String>,
}

impl NarrationScript {
    /// Digest for a single place, reading at most `limit` titles
    pub fn for_location<S: AsRef<str>>(place: &str, titles: &[S], limit: usize) -> Self {
        let mut lines = vec![format!(
            "Hello and welcome to your HappyNest digest! Here is the good news from {} today.",
            place
        )];
        lines.extend(titles.iter().take(limit).map(|t| t.as_ref().to_string()));
        lines.push(CLOSING_LINE.to_string());
        Self { lines }
    }

    /// Digest across several places, each with up to `limit` titles
    pub fn global<S: AsRef<str>>(sections: &[(String, Vec<S>)], limit: usize) -> Self {
        let mut lines = vec![
            "Hello and welcome to your HappyNest digest! Here is the good news from around the world today."
                .to_string(),
        ];
        for (place, titles) in sections {
            if titles.is_empty() {
                continue;
            }
            lines.push(format!("From {}:", place));
            lines.extend(titles.iter().take(limit).map(|t| t.as_ref().to_string()));
        }
        lines.push(CLOSING_LINE.to_string());
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}
