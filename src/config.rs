use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::services::{
    posters::AuthMode,
    recommender::{DEFAULT_TOP_N, MAX_TOP_N},
};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Remote locator for the item table; empty means "local cache only"
    #[serde(default)]
    pub movies_pickle_url: String,

    /// Remote locator for the similarity matrix; empty means "local cache only"
    #[serde(default)]
    pub similarity_pickle_url: String,

    /// Directory holding cached artifacts
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Cache slot for the item table
    #[serde(default = "default_movies_cache_key")]
    pub movies_cache_key: String,

    /// Cache slot for the similarity matrix
    #[serde(default = "default_similarity_cache_key")]
    pub similarity_cache_key: String,

    /// Timeout for a single artifact download, in seconds
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// TMDB API key. Without it every poster is the placeholder.
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Prefix joined with `poster_path` to build image URLs
    #[serde(default = "default_tmdb_image_base_url")]
    pub tmdb_image_base_url: String,

    /// How the API key is sent to TMDB
    #[serde(default)]
    pub tmdb_auth_mode: AuthMode,

    /// Timeout for a single poster lookup, in seconds
    #[serde(default = "default_poster_timeout_secs")]
    pub poster_timeout_secs: u64,

    /// Number of recommendations returned when the caller does not ask
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_movies_cache_key() -> String {
    "movies_dic.json".to_string()
}

fn default_similarity_cache_key() -> String {
    "tag_similarity.json".to_string()
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_image_base_url() -> String {
    "https://image.tmdb.org/t/p/w500".to_string()
}

fn default_poster_timeout_secs() -> u64 {
    10
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of key/value pairs
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(vars)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        if !(1..=MAX_TOP_N).contains(&config.top_n) {
            anyhow::bail!(
                "Failed to load config: TOP_N must be between 1 and {}",
                MAX_TOP_N
            );
        }

        Ok(config)
    }

    /// API key, ignoring blank values
    pub fn api_key(&self) -> Option<&str> {
        self.tmdb_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn poster_timeout(&self) -> Duration {
        Duration::from_secs(self.poster_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
