//! News article endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::digest::{DigestReport, DigestService, DigestTarget};
use crate::news::{Coordinates, Location, NewNewsArticle, NewsArticle, NewsArticleUpdate, Sentiment};
use crate::storage::NewsRepository;
use crate::Error;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Body of `POST /api/news`; the publication time is set by the server
#[derive(Debug, Deserialize)]
pub struct CreateNewsRequest {
    pub title: String,
    pub content: String,
    pub location: Location,
    pub sentiment: Sentiment,
    pub source: String,
}

/// Query parameters for a per-location digest
#[derive(Debug, Default, Deserialize)]
pub struct FetchParams {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default)]
    pub narrate: bool,
}

impl FetchParams {
    fn target(self, digest: &DigestService) -> DigestTarget {
        let coordinates = self.lat.zip(self.lon).map(|(lat, lon)| Coordinates::new(lat, lon));
        digest.target_for(self.city, self.state, self.country, coordinates)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GlobalFetchParams {
    pub cities: Option<usize>,
    #[serde(default)]
    pub narrate: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/news", get(list_news).post(create_news))
        .route("/news/city/{name}", get(news_by_city))
        .route("/news/fetch", get(fetch_news))
        .route("/news/fetch/global", get(fetch_global_news))
        .route(
            "/news/{id}",
            get(get_news).put(update_news).delete(delete_news),
        )
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request(format!("Invalid article id '{}'", id)))
}

fn digest_service(state: &AppState) -> Result<&DigestService, ApiError> {
    state
        .digest
        .as_deref()
        .ok_or_else(|| {
            ApiError::new(
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                "Digest service not configured",
            )
        })
}

/// GET /api/news
async fn list_news(State(state): State<AppState>) -> ApiResult<Value> {
    let articles = NewsRepository::new(&state.db).list_all().await?;
    Ok(Json(json!({ "data": articles })))
}

/// POST /api/news
async fn create_news(
    State(state): State<AppState>,
    Json(request): Json<CreateNewsRequest>,
) -> ApiResult<Value> {
    let new_article = NewNewsArticle {
        title: request.title,
        content: request.content,
        location: request.location,
        sentiment: request.sentiment,
        published_at: Utc::now(),
        source: request.source,
    };
    let article = NewsRepository::new(&state.db).create(&new_article).await?;
    Ok(Json(json!({ "id": article.id })))
}

/// GET /api/news/city/{name}
async fn news_by_city(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Value> {
    let articles = NewsRepository::new(&state.db).list_by_city(&name).await?;
    Ok(Json(json!({ "data": articles })))
}

/// GET /api/news/fetch - digest one location and return what was stored
async fn fetch_news(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
) -> ApiResult<DigestReport> {
    let digest = digest_service(&state)?;
    let narrate = params.narrate;
    let report = digest.run(params.target(digest), narrate).await?;
    Ok(Json(report))
}

/// GET /api/news/fetch/global - digest a random sample of cities
async fn fetch_global_news(
    State(state): State<AppState>,
    Query(params): Query<GlobalFetchParams>,
) -> ApiResult<DigestReport> {
    let digest = digest_service(&state)?;
    let sample = params.cities.unwrap_or_else(|| digest.global_sample_size());
    let report = digest
        .run(DigestTarget::Global { sample }, params.narrate)
        .await?;
    Ok(Json(report))
}

/// GET /api/news/{id}
async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NewsArticle> {
    let id = parse_id(&id)?;
    NewsRepository::new(&state.db)
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::ArticleNotFound(id).into())
}

/// PUT /api/news/{id}
async fn update_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<NewsArticleUpdate>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    if update.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    match NewsRepository::new(&state.db).update(id, &update).await? {
        Some(_) => Ok(Json(json!({ "detail": "News article updated successfully" }))),
        None => Err(Error::ArticleNotFound(id).into()),
    }
}

/// DELETE /api/news/{id}
async fn delete_news(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    if NewsRepository::new(&state.db).delete(id).await? {
        Ok(Json(json!({ "detail": "News article deleted successfully" })))
    } else {
        Err(Error::ArticleNotFound(id).into())
    }
}
