//! The static food dataset that gets embedded and searched.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RagError, Result};

/// One entry of the food dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FoodItem {
    pub id: String,
    /// Short description of the food.
    pub text: String,
    /// Where the food comes from.
    pub region: String,
    /// Category such as "Soup" or "Dessert".
    #[serde(rename = "type")]
    pub kind: String,
}

impl FoodItem {
    /// The text that is embedded and handed to the language model.
    pub fn document_text(&self) -> String {
        format!("{} This is a {} from {}.", self.text.trim(), self.kind.to_lowercase(), self.region)
    }
}

/// Read and validate the dataset at `path`.
///
/// # Errors
///
/// Returns [`RagError::DatasetError`] if the file cannot be read, is not a
/// JSON array of food items, or contains empty or duplicate ids.
pub async fn load_food_dataset(path: impl AsRef<Path>) -> Result<Vec<FoodItem>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        RagError::DatasetError(format!("failed to read {}: {e}", path.display()))
    })?;
    let items = parse_food_dataset(&raw)?;
    info!(path = %path.display(), count = items.len(), "loaded food dataset");
    Ok(items)
}

/// Parse and validate a dataset from its JSON text.
pub fn parse_food_dataset(raw: &str) -> Result<Vec<FoodItem>> {
    let items: Vec<FoodItem> = serde_json::from_str(raw)
        .map_err(|e| RagError::DatasetError(format!("invalid dataset: {e}")))?;

    let mut seen = HashSet::with_capacity(items.len());
    for item in &items {
        if item.id.trim().is_empty() {
            return Err(RagError::DatasetError("item with empty id".to_string()));
        }
        if item.text.trim().is_empty() {
            return Err(RagError::DatasetError(format!("item '{}' has no text", item.id)));
        }
        if !seen.insert(item.id.as_str()) {
            return Err(RagError::DatasetError(format!("duplicate id '{}'", item.id)));
        }
    }
    Ok(items)
}
