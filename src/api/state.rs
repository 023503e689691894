use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    services::{
        ArtifactStore, CatalogIndex, HttpArtifactSource, PlaceholderPosterResolver,
        PosterResolver, Recommender, TmdbPosterResolver,
    },
};

/// Shared application state
///
/// Built once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Recommender,
    pub posters: Arc<dyn PosterResolver>,
    pub top_n: usize,
}

impl AppState {
    pub fn new(catalog: Arc<CatalogIndex>, posters: Arc<dyn PosterResolver>, top_n: usize) -> Self {
        Self {
            recommender: Recommender::new(catalog),
            posters,
            top_n,
        }
    }

    /// Downloads (or reads cached) artifacts and wires up the services.
    ///
    /// Any error here is a startup error; the server must not start without both
    /// artifacts.
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let source = HttpArtifactSource::new(config.download_timeout())?;
        let store = ArtifactStore::new(config.cache_dir.clone(), Arc::new(source));

        let catalog = CatalogIndex::load(
            &store,
            (config.movies_pickle_url.as_str(), config.movies_cache_key.as_str()),
            (
                config.similarity_pickle_url.as_str(),
                config.similarity_cache_key.as_str(),
            ),
        )
        .await?;

        Ok(Self::new(Arc::new(catalog), poster_resolver(config)?, config.top_n))
    }

    pub fn catalog(&self) -> &CatalogIndex {
        self.recommender.catalog()
    }
}

/// Picks the TMDB resolver when a key is configured, placeholders otherwise
pub fn poster_resolver(config: &Config) -> AppResult<Arc<dyn PosterResolver>> {
    match config.api_key() {
        Some(api_key) => {
            let resolver = TmdbPosterResolver::new(
                api_key.to_string(),
                config.tmdb_api_url.clone(),
                config.tmdb_image_base_url.clone(),
                config.tmdb_auth_mode,
                config.poster_timeout(),
            )?;
            Ok(Arc::new(resolver))
        }
        None => {
            tracing::warn!("TMDB_API_KEY is not set; posters will use a placeholder image");
            Ok(Arc::new(PlaceholderPosterResolver))
        }
    }
}
