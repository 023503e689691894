use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::locator::normalize_locator;

// Some file hosts refuse requests without a browser user agent
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Transport that copies a remote artifact into a local file
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Downloads `url` into `dest`, returning the number of bytes written
    async fn download(&self, url: &str, dest: &Path) -> AppResult<u64>;
}

/// Streams artifacts over HTTP(S)
#[derive(Clone)]
pub struct HttpArtifactSource {
    http_client: HttpClient,
}

impl HttpArtifactSource {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

#[async_trait::async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn download(&self, url: &str, dest: &Path) -> AppResult<u64> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::DownloadFailed(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::DownloadFailed(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let write_error =
            |e: std::io::Error| AppError::DownloadFailed(format!("{}: {}", dest.display(), e));

        let mut file = tokio::fs::File::create(dest).await.map_err(write_error)?;
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::DownloadFailed(format!("{}: {}", url, e)))?
        {
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(write_error)?;
        file.sync_all().await.map_err(write_error)?;

        Ok(written)
    }
}

/// Local cache of downloaded artifacts
///
/// Each artifact lives in a flat cache directory under its cache key. A present,
/// non-empty file is always trusted: there is no freshness or checksum check.
/// Concurrent cold starts from several processes are not coordinated; the
/// temp-file rename only guarantees that readers never see a partial file.
pub struct ArtifactStore {
    cache_dir: PathBuf,
    source: Arc<dyn ArtifactSource>,
}

impl ArtifactStore {
    pub fn new(cache_dir: impl Into<PathBuf>, source: Arc<dyn ArtifactSource>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            source,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the bytes for `cache_key`, downloading from `locator` on a cache miss
    pub async fn materialize(&self, locator: &str, cache_key: &str) -> AppResult<Vec<u8>> {
        let path = self.cache_path(cache_key)?;

        if let Some(bytes) = read_cached(&path).await? {
            tracing::debug!(cache_key = %cache_key, bytes = bytes.len(), "Artifact cache hit");
            return Ok(bytes);
        }

        let url = normalize_locator(locator)?;
        if url.is_empty() {
            return Err(AppError::ArtifactUnavailable(format!(
                "{} is not cached and no source locator is configured",
                cache_key
            )));
        }

        tracing::info!(cache_key = %cache_key, url = %url, "Downloading artifact");

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| {
                AppError::DownloadFailed(format!("{}: {}", self.cache_dir.display(), e))
            })?;

        let temp_path = self
            .cache_dir
            .join(format!(".{}.{}.part", cache_key, Uuid::new_v4()));

        let written = match self.source.download(&url, &temp_path).await {
            Ok(0) => Err(AppError::DownloadFailed(format!("{} returned an empty body", url))),
            other => other,
        };

        let persisted = match written {
            Ok(written) => tokio::fs::rename(&temp_path, &path)
                .await
                .map(|_| written)
                .map_err(|e| AppError::DownloadFailed(format!("{}: {}", path.display(), e))),
            Err(e) => Err(e),
        };

        let written = match persisted {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                tracing::error!(cache_key = %cache_key, error = %e, "Artifact download failed");
                return Err(e);
            }
        };

        tracing::info!(cache_key = %cache_key, bytes = written, "Artifact cached");

        tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::ArtifactUnavailable(format!("{}: {}", path.display(), e)))
    }

    /// Materializes an artifact and decodes it from JSON
    pub async fn load<T: DeserializeOwned>(&self, locator: &str, cache_key: &str) -> AppResult<T> {
        let bytes = self.materialize(locator, cache_key).await?;

        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::DecodeFailed(format!("{}: {}", cache_key, e)))
    }

    /// Drops the cached copy of `cache_key` so the next materialize downloads again.
    ///
    /// Returns whether anything was removed.
    pub async fn invalidate(&self, cache_key: &str) -> AppResult<bool> {
        let path = self.cache_path(cache_key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(cache_key = %cache_key, "Artifact cache entry invalidated");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Internal(format!("{}: {}", path.display(), e))),
        }
    }

    fn cache_path(&self, cache_key: &str) -> AppResult<PathBuf> {
        let is_safe = !cache_key.is_empty()
            && cache_key != "."
            && cache_key != ".."
            && !cache_key.contains(|c: char| matches!(c, '/' | '\\' | '\0'));

        if !is_safe {
            return Err(AppError::InvalidCacheKey(format!(
                "'{}' must be a plain file name",
                cache_key
            )));
        }

        Ok(self.cache_dir.join(cache_key))
    }
}

/// Reads a cache entry; missing and empty files both count as a miss
async fn read_cached(path: &Path) -> AppResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => {
            tracing::warn!(path = %path.display(), "Ignoring empty cache entry");
            Ok(None)
        }
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::ArtifactUnavailable(format!(
            "{}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tempfile::TempDir;

    fn store_with(source: MockArtifactSource) -> (ArtifactStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Arc::new(source));
        (store, dir)
    }

    fn writes(body: &'static [u8]) -> impl Fn(&str, &Path) -> AppResult<u64> + Send + 'static {
        move |_, dest| {
            std::fs::write(dest, body).unwrap();
            Ok(body.len() as u64)
        }
    }

    fn leftover_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_no_locator_and_no_cache_is_unavailable() {
        let mut source = MockArtifactSource::new();
        source.expect_download().times(0);
        let (store, _dir) = store_with(source);

        let result = store.materialize("", "movies_dic.json").await;

        assert!(matches!(result, Err(AppError::ArtifactUnavailable(_))));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let mut source = MockArtifactSource::new();
        source.expect_download().times(0);
        let (store, dir) = store_with(source);
        std::fs::write(dir.path().join("movies_dic.json"), b"cached").unwrap();

        let bytes = store
            .materialize("https://cdn.example.com/movies.json", "movies_dic.json")
            .await
            .unwrap();

        assert_eq!(bytes, b"cached");
    }

    #[tokio::test]
    async fn test_download_is_cached_for_next_call() {
        let mut source = MockArtifactSource::new();
        source
            .expect_download()
            .withf(|url, _| url.ends_with("id=ABC123"))
            .times(1)
            .returning(writes(b"[[1.0]]"));
        let (store, dir) = store_with(source);

        let locator = "https://drive.example.com/file/d/ABC123/view?usp=sharing";
        let first = store.materialize(locator, "tag_similarity.json").await.unwrap();
        let second = store.materialize(locator, "tag_similarity.json").await.unwrap();

        assert_eq!(first, b"[[1.0]]");
        assert_eq!(second, first);
        assert_eq!(leftover_files(dir.path()), vec!["tag_similarity.json".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_cache_file_is_downloaded_again() {
        let mut source = MockArtifactSource::new();
        source
            .expect_download()
            .times(1)
            .returning(writes(b"fresh"));
        let (store, dir) = store_with(source);
        std::fs::write(dir.path().join("movies_dic.json"), b"").unwrap();

        let bytes = store
            .materialize("https://cdn.example.com/movies.json", "movies_dic.json")
            .await
            .unwrap();

        assert_eq!(bytes, b"fresh");
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_files() {
        let mut source = MockArtifactSource::new();
        source.expect_download().times(1).returning(|_, dest| {
            std::fs::write(dest, b"partial").unwrap();
            Err(AppError::DownloadFailed("connection reset".to_string()))
        });
        let (store, dir) = store_with(source);

        let result = store
            .materialize("https://cdn.example.com/movies.json", "movies_dic.json")
            .await;

        assert!(matches!(result, Err(AppError::DownloadFailed(_))));
        assert!(leftover_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_empty_download_is_rejected() {
        let mut source = MockArtifactSource::new();
        source.expect_download().times(1).returning(writes(b""));
        let (store, dir) = store_with(source);

        let result = store
            .materialize("https://cdn.example.com/movies.json", "movies_dic.json")
            .await;

        assert!(matches!(result, Err(AppError::DownloadFailed(_))));
        assert!(leftover_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_locator_is_reported() {
        let mut source = MockArtifactSource::new();
        source.expect_download().times(0);
        let (store, _dir) = store_with(source);

        let result = store
            .materialize("https://drive.google.com/drive/my-drive", "movies_dic.json")
            .await;

        assert!(matches!(result, Err(AppError::InvalidLocator(_))));
    }

    #[tokio::test]
    async fn test_load_reports_decode_failures() {
        let mut source = MockArtifactSource::new();
        source.expect_download().times(0);
        let (store, dir) = store_with(source);
        std::fs::write(dir.path().join("tag_similarity.json"), b"not json").unwrap();

        let result: AppResult<Vec<Vec<f64>>> = store.load("", "tag_similarity.json").await;

        assert!(matches!(result, Err(AppError::DecodeFailed(_))));
    }

    #[tokio::test]
    async fn test_invalidate_forces_download() {
        let mut source = MockArtifactSource::new();
        source
            .expect_download()
            .times(1)
            .returning(writes(b"[[0.5]]"));
        let (store, dir) = store_with(source);
        std::fs::write(dir.path().join("tag_similarity.json"), b"[[1.0]]").unwrap();

        assert!(store.invalidate("tag_similarity.json").await.unwrap());
        assert!(!store.invalidate("tag_similarity.json").await.unwrap());

        let matrix: Vec<Vec<f64>> = store
            .load("https://cdn.example.com/sim.json", "tag_similarity.json")
            .await
            .unwrap();
        assert_eq!(matrix, vec![vec![0.5]]);
    }

    #[tokio::test]
    async fn test_unsafe_cache_keys_are_rejected() {
        let mut source = MockArtifactSource::new();
        source.expect_download().times(0);
        let (store, _dir) = store_with(source);

        for key in ["", "..", "../movies.json", "nested/movies.json"] {
            let result = store.materialize("", key).await;
            assert!(matches!(result, Err(AppError::InvalidCacheKey(_))), "key {:?}", key);
        }
    }

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_source_streams_body_to_file() {
        let base = spawn_server(Router::new().route(
            "/movies.json",
            get(|| async { r#"{"id": [1], "title": ["Heat"]}"# }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("movies.part");

        let source = HttpArtifactSource::new(Duration::from_secs(5)).unwrap();
        let written = source
            .download(&format!("{}/movies.json", base), &dest)
            .await
            .unwrap();

        let body = std::fs::read(&dest).unwrap();
        assert_eq!(written, body.len() as u64);
        assert_eq!(body, br#"{"id": [1], "title": ["Heat"]}"#);
    }

    #[tokio::test]
    async fn test_http_source_rejects_error_status() {
        let base = spawn_server(
            Router::new().route("/missing", get(|| async { StatusCode::NOT_FOUND })),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();

        let source = HttpArtifactSource::new(Duration::from_secs(5)).unwrap();
        let result = source
            .download(&format!("{}/missing", base), &dir.path().join("x.part"))
            .await;

        assert!(matches!(result, Err(AppError::DownloadFailed(_))));
    }
}
