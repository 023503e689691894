use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

pub mod similarity;

pub use similarity::SimilarityMatrix;

/// A movie in the loaded catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// External metadata-provider id (TMDB movie id)
    pub id: i64,
    /// Display title, used for lookup
    pub title: String,
}

/// A single recommendation produced for a request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recommendation {
    pub title: String,
    pub id: i64,
}

/// A recommendation together with its resolved poster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendedMovie {
    pub title: String,
    pub id: i64,
    pub poster_url: String,
}

impl RecommendedMovie {
    pub fn new(recommendation: Recommendation, poster_url: String) -> Self {
        Self {
            title: recommendation.title,
            id: recommendation.id,
            poster_url,
        }
    }
}

// ============================================================================
// Item table wire format
// ============================================================================

/// One column of the exported item table.
///
/// Accepts either a plain array or a dataframe-style `{"<row>": value}` map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Column<T> {
    List(Vec<T>),
    Indexed(BTreeMap<String, T>),
}

impl<T> Column<T> {
    /// Flattens the column into row order, returning each row's index alongside.
    ///
    /// List columns are indexed `0..len`; indexed columns are ordered by their
    /// integer keys.
    fn into_keyed_rows(self, name: &str) -> AppResult<(Vec<u64>, Vec<T>)> {
        match self {
            Column::List(values) => Ok(((0..values.len() as u64).collect(), values)),
            Column::Indexed(map) => {
                let mut keyed = map
                    .into_iter()
                    .map(|(key, value)| {
                        key.parse::<u64>().map(|index| (index, value)).map_err(|_| {
                            AppError::DecodeFailed(format!(
                                "column '{}' has non-integer row key '{}'",
                                name, key
                            ))
                        })
                    })
                    .collect::<AppResult<Vec<(u64, T)>>>()?;
                keyed.sort_by_key(|(index, _)| *index);

                if let Some(pair) = keyed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                    return Err(AppError::DecodeFailed(format!(
                        "column '{}' has duplicate row key {}",
                        name, pair[0].0
                    )));
                }

                Ok(keyed.into_iter().unzip())
            }
        }
    }
}

/// Record-of-columns item table as exported by the data pipeline.
///
/// Columns other than `id` and `title` are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemTable {
    pub id: Column<i64>,
    pub title: Column<String>,
}

impl ItemTable {
    /// Materializes the columns into row-ordered items, once, at load time
    pub fn into_items(self) -> AppResult<Vec<Item>> {
        let (id_keys, ids) = self.id.into_keyed_rows("id")?;
        let (title_keys, titles) = self.title.into_keyed_rows("title")?;

        if ids.len() != titles.len() {
            return Err(AppError::DecodeFailed(format!(
                "item table columns differ in length: {} ids, {} titles",
                ids.len(),
                titles.len()
            )));
        }

        // Rows are joined by index, not by position
        if let Some((id_key, title_key)) = id_keys
            .iter()
            .zip(&title_keys)
            .find(|(id_key, title_key)| id_key != title_key)
        {
            return Err(AppError::DecodeFailed(format!(
                "item table columns disagree on row keys: id row {} vs title row {}",
                id_key, title_key
            )));
        }

        Ok(ids
            .into_iter()
            .zip(titles)
            .map(|(id, title)| Item { id, title })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_table_from_lists() {
        let table: ItemTable = serde_json::from_str(
            r#"{"id": [19995, 285], "title": ["Avatar", "Pirates of the Caribbean"], "tags": ["a", "b"]}"#,
        )
        .unwrap();

        let items = table.into_items().unwrap();
        assert_eq!(
            items,
            vec![
                Item { id: 19995, title: "Avatar".to_string() },
                Item { id: 285, title: "Pirates of the Caribbean".to_string() },
            ]
        );
    }

    #[test]
    fn test_item_table_from_indexed_columns_orders_numerically() {
        // "10" sorts before "2" as a string; rows must follow the integer index
        let table: ItemTable = serde_json::from_str(
            r#"{
                "id": {"2": 3, "10": 11, "0": 1},
                "title": {"0": "A", "10": "K", "2": "C"}
            }"#,
        )
        .unwrap();

        let items = table.into_items().unwrap();
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C", "K"]);
        assert_eq!(items[2].id, 11);
    }

    #[test]
    fn test_item_table_rejects_non_integer_keys() {
        let table: ItemTable =
            serde_json::from_str(r#"{"id": {"first": 1}, "title": {"first": "A"}}"#).unwrap();

        assert!(matches!(table.into_items(), Err(AppError::DecodeFailed(_))));
    }

    #[test]
    fn test_item_table_rejects_uneven_columns() {
        let table: ItemTable =
            serde_json::from_str(r#"{"id": [1, 2], "title": ["A"]}"#).unwrap();

        assert!(matches!(table.into_items(), Err(AppError::DecodeFailed(_))));
    }

    #[test]
    fn test_item_table_rejects_mismatched_row_keys() {
        let table: ItemTable = serde_json::from_str(
            r#"{"id": {"0": 10, "1": 20}, "title": {"0": "Alien", "5": "Heat"}}"#,
        )
        .unwrap();

        assert!(matches!(table.into_items(), Err(AppError::DecodeFailed(_))));
    }

    #[test]
    fn test_item_table_list_and_indexed_columns_must_align() {
        let aligned: ItemTable = serde_json::from_str(
            r#"{"id": [10, 20], "title": {"1": "Aliens", "0": "Alien"}}"#,
        )
        .unwrap();
        let items = aligned.into_items().unwrap();
        assert_eq!(items[1], Item { id: 20, title: "Aliens".to_string() });

        let shifted: ItemTable = serde_json::from_str(
            r#"{"id": [10, 20], "title": {"1": "Alien", "2": "Aliens"}}"#,
        )
        .unwrap();
        assert!(matches!(shifted.into_items(), Err(AppError::DecodeFailed(_))));
    }

    #[test]
    fn test_item_table_rejects_duplicate_row_keys() {
        let table: ItemTable = serde_json::from_str(
            r#"{"id": {"1": 10, "01": 20}, "title": {"0": "Alien", "1": "Aliens"}}"#,
        )
        .unwrap();

        assert!(matches!(table.into_items(), Err(AppError::DecodeFailed(_))));
    }

    #[test]
    fn test_recommended_movie_serialization() {
        let movie = RecommendedMovie::new(
            Recommendation { title: "Heat".to_string(), id: 949 },
            "https://image.tmdb.org/t/p/w500/heat.jpg".to_string(),
        );

        let json = serde_json::to_value(&movie).unwrap();
        assert_eq!(json["title"], "Heat");
        assert_eq!(json["id"], 949);
        assert_eq!(json["poster_url"], "https://image.tmdb.org/t/p/w500/heat.jpg");
    }
}
