use crate::{
    error::{AppError, AppResult},
    models::{Item, ItemTable, SimilarityMatrix},
    services::artifact_store::ArtifactStore,
};

/// Read-only view over the loaded item table and similarity matrix
///
/// Row `i` of the matrix scores item `i` against every other item; construction
/// guarantees an `N x N` matrix for `N` items.
#[derive(Debug)]
pub struct CatalogIndex {
    items: Vec<Item>,
    similarity: SimilarityMatrix,
}

impl CatalogIndex {
    pub fn new(items: Vec<Item>, similarity: SimilarityMatrix) -> AppResult<Self> {
        if similarity.row_count() != items.len() {
            return Err(AppError::InconsistentArtifacts(format!(
                "{} items but {} similarity rows",
                items.len(),
                similarity.row_count()
            )));
        }

        if let Some((row, width)) = similarity.first_row_not_of_width(items.len()) {
            return Err(AppError::InconsistentArtifacts(format!(
                "similarity row {} has {} scores, expected {}",
                row,
                width,
                items.len()
            )));
        }

        Ok(Self { items, similarity })
    }

    /// Builds the index from a columnar item table
    pub fn from_table(table: ItemTable, similarity: SimilarityMatrix) -> AppResult<Self> {
        Self::new(table.into_items()?, similarity)
    }

    /// Materializes both artifacts and builds the index
    pub async fn load(
        store: &ArtifactStore,
        movies: (&str, &str),
        similarity: (&str, &str),
    ) -> AppResult<Self> {
        let (movies_locator, movies_key) = movies;
        let (similarity_locator, similarity_key) = similarity;

        let table: ItemTable = store.load(movies_locator, movies_key).await?;
        let matrix: SimilarityMatrix = store.load(similarity_locator, similarity_key).await?;

        let index = Self::from_table(table, matrix)?;

        tracing::info!(items = index.row_count(), "Catalog loaded");

        Ok(index)
    }

    /// First row whose title matches exactly
    pub fn find_row_by_title(&self, title: &str) -> AppResult<usize> {
        self.items
            .iter()
            .position(|item| item.title == title)
            .ok_or_else(|| AppError::TitleNotFound(title.to_string()))
    }

    pub fn row_count(&self) -> usize {
        self.items.len()
    }

    pub fn item_at(&self, row: usize) -> Option<&Item> {
        self.items.get(row)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Scores of `row` against every row, in row order
    pub fn similarity_row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.similarity
            .row(row)
            .unwrap_or_default()
            .iter()
            .copied()
            .enumerate()
    }
}
