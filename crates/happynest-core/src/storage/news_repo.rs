use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::news::{
    Coordinates, Location, NewNewsArticle, NewsArticle, NewsArticleUpdate, Sentiment,
};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::{Error, Result};

const SELECT_COLUMNS: &str = r#"
    SELECT id, title, content, city, state, country, lat, lon,
           sentiment, published_at, source, created_at
    FROM news_articles
"#;

// Both statements bind the same columns in the same order, id last
const INSERT_ARTICLE: &str = r#"
    INSERT INTO news_articles
    (title, content, city, state, country, lat, lon, sentiment, published_at, source, created_at, id)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_ARTICLE: &str = r#"
    UPDATE news_articles
    SET title = ?, content = ?, city = ?, state = ?, country = ?, lat = ?, lon = ?,
        sentiment = ?, published_at = ?, source = ?, created_at = ?
    WHERE id = ?
"#;

/// Repository for persisted feed articles
pub struct NewsRepository<'a> {
    db: &'a Database,
    write_policy: RetryPolicy,
}

#[derive(FromRow)]
struct NewsArticleRow {
    id: String,
    title: String,
    content: String,
    city: String,
    state: Option<String>,
    country: Option<String>,
    lat: f64,
    lon: f64,
    sentiment: String,
    published_at: DateTime<Utc>,
    source: String,
    created_at: DateTime<Utc>,
}

impl From<NewsArticleRow> for NewsArticle {
    fn from(row: NewsArticleRow) -> Self {
        NewsArticle {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            title: row.title,
            content: row.content,
            location: Location {
                city: row.city,
                state: row.state,
                country: row.country,
                coordinates: Coordinates::new(row.lat, row.lon),
            },
            sentiment: row.sentiment.parse().unwrap_or(Sentiment::Neutral),
            published_at: row.published_at,
            source: row.source,
            created_at: row.created_at,
        }
    }
}

impl<'a> NewsRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            write_policy: RetryPolicy::storage(),
        }
    }

    /// Run an insert or update of every column, retrying transient SQLite errors
    async fn write(&self, sql: &'static str, article: &NewsArticle) -> Result<u64> {
        let pool = self.db.pool();
        let id = article.id.to_string();
        let id = id.as_str();
        let location = &article.location;

        let result = retry_with_backoff(&self.write_policy, || async move {
            sqlx::query(sql)
                .bind(article.title.as_str())
                .bind(article.content.as_str())
                .bind(location.city.as_str())
                .bind(location.state.as_deref())
                .bind(location.country.as_deref())
                .bind(location.coordinates.lat)
                .bind(location.coordinates.lon)
                .bind(article.sentiment.as_str())
                .bind(article.published_at)
                .bind(article.source.as_str())
                .bind(article.created_at)
                .bind(id)
                .execute(pool)
                .await
                .map_err(Error::from)
        })
        .await?;

        Ok(result.rows_affected())
    }

    /// Insert a new article, assigning its id and creation time
    pub async fn create(&self, new_article: &NewNewsArticle) -> Result<NewsArticle> {
        let article = NewsArticle {
            id: Uuid::new_v4(),
            title: new_article.title.clone(),
            content: new_article.content.clone(),
            location: new_article.location.clone(),
            sentiment: new_article.sentiment,
            published_at: new_article.published_at,
            source: new_article.source.clone(),
            created_at: Utc::now(),
        };

        self.write(INSERT_ARTICLE, &article).await?;
        tracing::debug!(id = %article.id, city = %article.location.city, "Stored news article");

        Ok(article)
    }

    /// Find an article by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<NewsArticle>> {
        let row: Option<NewsArticleRow> =
            sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(NewsArticle::from))
    }

    /// All articles, newest first
    pub async fn list_all(&self) -> Result<Vec<NewsArticle>> {
        let rows: Vec<NewsArticleRow> = sqlx::query_as(&format!(
            "{} ORDER BY published_at DESC, created_at DESC",
            SELECT_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(NewsArticle::from).collect())
    }

    /// Articles for a city (case-insensitive), newest first
    pub async fn list_by_city(&self, city: &str) -> Result<Vec<NewsArticle>> {
        let rows: Vec<NewsArticleRow> = sqlx::query_as(&format!(
            "{} WHERE city = ? COLLATE NOCASE ORDER BY published_at DESC, created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(city.trim())
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(NewsArticle::from).collect())
    }

    /// Apply a partial update; `None` if the article does not exist
    pub async fn update(
        &self,
        id: Uuid,
        update: &NewsArticleUpdate,
    ) -> Result<Option<NewsArticle>> {
        let Some(mut article) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        if let Some(title) = &update.title {
            article.title = title.clone();
        }
        if let Some(content) = &update.content {
            article.content = content.clone();
        }
        if let Some(location) = &update.location {
            article.location = location.clone();
        }
        if let Some(sentiment) = update.sentiment {
            article.sentiment = sentiment;
        }
        if let Some(published_at) = update.published_at {
            article.published_at = published_at;
        }
        if let Some(source) = &update.source {
            article.source = source.clone();
        }

        if self.write(UPDATE_ARTICLE, &article).await? == 0 {
            return Ok(None);
        }

        Ok(Some(article))
    }

    /// Delete an article; `false` if it did not exist
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let pool = self.db.pool();
        let id = id.to_string();
        let id = id.as_str();

        let result = retry_with_backoff(&self.write_policy, || async move {
            sqlx::query("DELETE FROM news_articles WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .map_err(Error::from)
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news_articles")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count as u64)
    }
}
