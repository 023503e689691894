use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::RecommendedMovie,
    services::{posters::resolve_posters, recommender::MAX_TOP_N},
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub title: String,
    pub limit: Option<usize>,
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// All titles in catalog order, for the title picker
pub async fn list_titles(State(state): State<AppState>) -> Json<Vec<String>> {
    let titles = state
        .catalog()
        .items()
        .iter()
        .map(|item| item.title.clone())
        .collect();
    Json(titles)
}

/// Recommendations for a title, with posters
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<RecommendationQuery>, QueryRejection>,
) -> AppResult<Json<Vec<RecommendedMovie>>> {
    let Query(query) = query.map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;

    let limit = query.limit.unwrap_or(state.top_n);
    if !(1..=MAX_TOP_N).contains(&limit) {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_TOP_N
        )));
    }

    tracing::info!(
        request_id = %request_id,
        title = %query.title,
        limit,
        "Processing recommendation request"
    );

    let recommendations = state.recommender.recommend(&query.title, limit)?;

    let ids: Vec<i64> = recommendations.iter().map(|r| r.id).collect();
    let posters = resolve_posters(state.posters.clone(), &ids).await;

    let movies: Vec<RecommendedMovie> = recommendations
        .into_iter()
        .zip(posters)
        .map(|(recommendation, poster_url)| RecommendedMovie::new(recommendation, poster_url))
        .collect();

    tracing::info!(
        request_id = %request_id,
        results = movies.len(),
        provider = state.posters.name(),
        "Recommendations completed"
    );

    Ok(Json(movies))
}
