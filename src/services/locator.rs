//! Artifact source locators
//!
//! Turns the configured locator strings into URLs that can be fetched directly.
//! Cloud-drive sharing links point at an HTML viewer page, so they are rewritten
//! into the provider's direct-download endpoint.

use reqwest::Url;

use crate::error::{AppError, AppResult};

const DEFAULT_DRIVE_ORIGIN: &str = "https://drive.google.com";
const FILE_VIEW_SEGMENT: &str = "/file/d/";

/// Normalizes a source locator into a fetchable URL.
///
/// - empty input stays empty (cache-only)
/// - a bare drive file id becomes a direct-download URL on the default drive host
/// - drive sharing links (`/file/d/<id>/view` or `?id=<id>`) become direct-download URLs
/// - any other URL passes through unchanged
pub fn normalize_locator(locator: &str) -> AppResult<String> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Ok(String::new());
    }

    if !locator.contains("://") {
        if is_file_id(locator) {
            return Ok(direct_download_url(DEFAULT_DRIVE_ORIGIN, locator));
        }
        return Err(AppError::InvalidLocator(format!(
            "'{}' is neither a URL nor a drive file id",
            locator
        )));
    }

    let url = Url::parse(locator)
        .map_err(|e| AppError::InvalidLocator(format!("'{}': {}", locator, e)))?;

    let host = url.host_str().unwrap_or_default();
    if !is_drive_host(host) {
        return Ok(locator.to_string());
    }

    let file_id = file_id_from_path(&url)
        .or_else(|| file_id_from_query(&url))
        .ok_or_else(|| {
            AppError::InvalidLocator(format!("no file id in drive link '{}'", locator))
        })?;

    let origin = url.origin().ascii_serialization();
    Ok(direct_download_url(&origin, &file_id))
}

fn direct_download_url(origin: &str, file_id: &str) -> String {
    format!("{}/uc?export=download&id={}", origin, file_id)
}

fn is_drive_host(host: &str) -> bool {
    host.starts_with("drive.")
}

fn is_file_id(candidate: &str) -> bool {
    candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn file_id_from_path(url: &Url) -> Option<String> {
    let (_, rest) = url.path().split_once(FILE_VIEW_SEGMENT)?;
    let id = rest.split('/').next()?;
    (!id.is_empty() && is_file_id(id)).then(|| id.to_string())
}

fn file_id_from_query(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty() && is_file_id(id))
}
