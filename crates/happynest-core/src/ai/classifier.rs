use std::sync::Arc;

use super::providers::CompletionModel;
use crate::news::Sentiment;
use crate::{Error, Result};

const MAX_INPUT_CHARS: usize = 4000;

const SENTIMENT_SYSTEM: &str = "You are a helpful assistant that performs sentiment analysis.";

const POLITICS_SYSTEM: &str = "You are a helpful assistant that classifies news content by topic.";

fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// Trim whitespace, quotes and punctuation around a one-word reply
fn normalize_reply(reply: &str) -> String {
    reply
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Two-step classifier: sentiment first, then a political-content guard for
/// anything that came back positive
pub struct ContentClassifier {
    model: Arc<dyn CompletionModel>,
}

impl ContentClassifier {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    async fn ask(&self, system: &str, prompt: String) -> Result<String> {
        let reply = self.model.complete(system, &prompt).await?;
        let reply = normalize_reply(&reply);
        if reply.is_empty() {
            return Err(Error::AiProvider("empty completion".to_string()));
        }
        Ok(reply)
    }

    /// Label a text positive, negative or neutral
    ///
    /// A reply that is not one of the three labels counts as neutral.
    pub async fn analyze_sentiment(&self, text: &str) -> Result<Sentiment> {
        let prompt = format!(
            "Analyze the sentiment of this text and return just one word, 'positive' if it's happy or positive, else return 'negative' if it's sad or dangerous otherwise 'neutral':\n\n{}",
            truncate_chars(text, MAX_INPUT_CHARS)
        );

        let reply = self.ask(SENTIMENT_SYSTEM, prompt).await?;
        Ok(reply.parse().unwrap_or_else(|_| {
            tracing::debug!("Unrecognized sentiment reply '{}', treating as neutral", reply);
            Sentiment::Neutral
        }))
    }

    pub async fn is_political(&self, text: &str) -> Result<bool> {
        let prompt = format!(
            "Is the following text about politics, elections, political parties or politicians? Answer with just one word, 'yes' or 'no':\n\n{}",
            truncate_chars(text, MAX_INPUT_CHARS)
        );

        let reply = self.ask(POLITICS_SYSTEM, prompt).await?;
        Ok(reply.starts_with("yes"))
    }

    /// Final label for the feed: positive only if upbeat and not political
    pub async fn classify(&self, text: &str) -> Result<Sentiment> {
        let sentiment = self.analyze_sentiment(text).await?;
        if sentiment != Sentiment::Positive {
            return Ok(sentiment);
        }

        if self.is_political(text).await? {
            tracing::debug!("Positive story rejected as political");
            return Ok(Sentiment::Neutral);
        }

        Ok(Sentiment::Positive)
    }
}
