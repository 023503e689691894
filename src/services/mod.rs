pub mod artifact_store;
pub mod catalog;
pub mod locator;
pub mod posters;
pub mod recommender;

pub use artifact_store::{ArtifactSource, ArtifactStore, HttpArtifactSource};
pub use catalog::CatalogIndex;
pub use posters::{PlaceholderPosterResolver, PosterResolver, TmdbPosterResolver};
pub use recommender::Recommender;
