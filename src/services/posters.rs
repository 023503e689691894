//! Poster lookup against the TMDB metadata API
//!
//! Poster resolution never fails from the caller's point of view: every error is
//! logged and replaced with a placeholder image so one bad lookup cannot hide a
//! recommendation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client as HttpClient};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Shown when the metadata record has no poster
pub const NO_POSTER_URL: &str = "https://via.placeholder.com/500x750.png?text=No+Poster+Available";

/// Shown when the metadata lookup itself failed
pub const POSTER_NOT_FOUND_URL: &str =
    "https://via.placeholder.com/500x750.png?text=Poster+Not+Found";

/// How the API credential is attached to metadata requests
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `Authorization: Bearer <key>` (TMDB read access token)
    #[default]
    Bearer,
    /// `?api_key=<key>` query parameter (TMDB v3 key)
    Query,
}

/// Trait for poster sources
#[async_trait::async_trait]
pub trait PosterResolver: Send + Sync {
    /// Image URL for `item_id`; a placeholder on any failure
    async fn resolve_poster(&self, item_id: i64) -> String;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Resolves posters for several items at once, keeping input order.
///
/// One task per id; the caller bounds the batch size.
pub async fn resolve_posters(resolver: Arc<dyn PosterResolver>, item_ids: &[i64]) -> Vec<String> {
    let tasks: Vec<_> = item_ids
        .iter()
        .map(|&item_id| {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve_poster(item_id).await })
        })
        .collect();

    let mut posters = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(url) => posters.push(url),
            Err(e) => {
                tracing::warn!(error = %e, provider = resolver.name(), "Poster task failed");
                posters.push(POSTER_NOT_FOUND_URL.to_string());
            }
        }
    }

    posters
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    #[serde(default)]
    poster_path: Option<String>,
}

#[derive(Clone)]
pub struct TmdbPosterResolver {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    image_base_url: String,
    auth_mode: AuthMode,
}

impl TmdbPosterResolver {
    pub fn new(
        api_key: String,
        api_url: String,
        image_base_url: String,
        auth_mode: AuthMode,
        timeout: Duration,
    ) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::InvalidInput("TMDB API key is empty".to_string()));
        }

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            image_base_url,
            auth_mode,
        })
    }

    /// Fetches the poster path for `item_id`, `None` when the record has none
    async fn fetch_poster_path(&self, item_id: i64) -> AppResult<Option<String>> {
        let url = format!("{}/movie/{}", self.api_url, item_id);

        let request = self
            .http_client
            .get(&url)
            .header(header::ACCEPT, "application/json");
        let request = match self.auth_mode {
            AuthMode::Bearer => request.bearer_auth(&self.api_key),
            AuthMode::Query => request.query(&[("api_key", self.api_key.as_str())]),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::PosterFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::PosterFetchFailed(format!(
                "TMDB returned status {} for movie {}",
                response.status(),
                item_id
            )));
        }

        let details: MovieDetails = response
            .json()
            .await
            .map_err(|e| AppError::PosterFetchFailed(format!("Invalid TMDB response: {}", e)))?;

        Ok(details.poster_path.filter(|path| !path.trim().is_empty()))
    }
}

#[async_trait::async_trait]
impl PosterResolver for TmdbPosterResolver {
    async fn resolve_poster(&self, item_id: i64) -> String {
        match self.fetch_poster_path(item_id).await {
            Ok(Some(path)) => format!("{}{}", self.image_base_url, path),
            Ok(None) => {
                tracing::debug!(item_id, "Movie has no poster");
                NO_POSTER_URL.to_string()
            }
            Err(e) => {
                tracing::warn!(item_id, error = %e, provider = self.name(), "Could not fetch poster");
                POSTER_NOT_FOUND_URL.to_string()
            }
        }
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

/// Used when no API key is configured
#[derive(Debug, Clone, Default)]
pub struct PlaceholderPosterResolver;

#[async_trait::async_trait]
impl PosterResolver for PlaceholderPosterResolver {
    async fn resolve_poster(&self, _item_id: i64) -> String {
        NO_POSTER_URL.to_string()
    }

    fn name(&self) -> &'static str {
        "placeholder"
    }
}
