use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Artifact unavailable: {0}")]
    ArtifactUnavailable(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Failed to decode artifact: {0}")]
    DecodeFailed(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Inconsistent artifacts: {0}")]
    InconsistentArtifacts(String),

    #[error("Invalid cache key: {0}")]
    InvalidCacheKey(String),

    #[error("Title not found: {0}")]
    TitleNotFound(String),

    #[error("Poster fetch failed: {0}")]
    PosterFetchFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error can only occur while acquiring and validating artifacts.
    ///
    /// Startup errors abort initialization; everything else is per-request.
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            AppError::ArtifactUnavailable(_)
                | AppError::DownloadFailed(_)
                | AppError::DecodeFailed(_)
                | AppError::InvalidLocator(_)
                | AppError::InconsistentArtifacts(_)
                | AppError::InvalidCacheKey(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::TitleNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::DownloadFailed(_) | AppError::PosterFetchFailed(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::ArtifactUnavailable(_)
            | AppError::DecodeFailed(_)
            | AppError::InvalidLocator(_)
            | AppError::InconsistentArtifacts(_)
            | AppError::InvalidCacheKey(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_errors_are_classified() {
        assert!(AppError::ArtifactUnavailable("movies".to_string()).is_startup_error());
        assert!(AppError::InconsistentArtifacts("rows".to_string()).is_startup_error());
        assert!(AppError::InvalidCacheKey("data/movies.json".to_string()).is_startup_error());
        assert!(!AppError::InvalidInput("limit".to_string()).is_startup_error());
        assert!(!AppError::TitleNotFound("Heat".to_string()).is_startup_error());
        assert!(!AppError::PosterFetchFailed("timeout".to_string()).is_startup_error());
    }

    #[test]
    fn test_title_not_found_maps_to_404() {
        let response = AppError::TitleNotFound("Heat".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        let response = AppError::InvalidInput("limit".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
