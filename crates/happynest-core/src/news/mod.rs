mod client;
mod dedup;
mod fetcher;
mod models;

pub use client::AylienClient;
pub use dedup::{remove_duplicates, similarity, DEFAULT_THRESHOLD};
pub use fetcher::{StoryFetcher, StoryQuery, StorySource};
pub use models::{
    Coordinates, Location, NewNewsArticle, NewsArticle, NewsArticleUpdate, Sentiment, Story,
    StoryPage,
};
