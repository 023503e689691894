use std::cmp::Ordering;
use std::sync::Arc;

use crate::{error::AppResult, models::Recommendation, services::catalog::CatalogIndex};

/// Number of recommendations returned by default
pub const DEFAULT_TOP_N: usize = 5;

/// Largest number of recommendations served per request
pub const MAX_TOP_N: usize = 50;

/// Ranks catalog items by similarity to a selected title
#[derive(Debug, Clone)]
pub struct Recommender {
    catalog: Arc<CatalogIndex>,
}

impl Recommender {
    pub fn new(catalog: Arc<CatalogIndex>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &CatalogIndex {
        &self.catalog
    }

    /// Returns up to `top_n` items most similar to `title`, best first.
    ///
    /// Ties keep ascending row order and the title's own row is never included.
    /// A catalog smaller than `top_n + 1` just yields fewer results.
    pub fn recommend(&self, title: &str, top_n: usize) -> AppResult<Vec<Recommendation>> {
        let query_row = self.catalog.find_row_by_title(title)?;

        let mut ranked: Vec<(usize, f64)> = self
            .catalog
            .similarity_row(query_row)
            .filter(|(row, _)| *row != query_row)
            .collect();

        ranked.sort_by(|a, b| by_score_descending(a.1, b.1).then(a.0.cmp(&b.0)));

        let recommendations: Vec<Recommendation> = ranked
            .into_iter()
            .take(top_n)
            .filter_map(|(row, _)| self.catalog.item_at(row))
            .map(|item| Recommendation {
                title: item.title.clone(),
                id: item.id,
            })
            .collect();

        tracing::debug!(
            title = %title,
            row = query_row,
            results = recommendations.len(),
            "Recommendations ranked"
        );

        Ok(recommendations)
    }
}

// NaN sorts after every real score
fn by_score_descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
