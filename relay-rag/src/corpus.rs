//! Menu corpus loading.
//!
//! The corpus is a JSON array of menu items:
//!
//! ```json
//! [{ "name": "Gemma Classic", "description": "...", "price": 8.99, "category": "Burgers" }]
//! ```
//!
//! Each item becomes one [`Document`] whose content is the text the model
//! reads, with `name`, `category` and `price` kept as metadata.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::Document;
use crate::error::{RagError, Result};

/// One entry of the menu corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub name: String,
    pub description: String,
    pub price: serde_json::Number,
    pub category: String,
}

impl MenuItem {
    /// Render the item as a retrievable document.
    pub fn to_document(&self) -> Document {
        Document::new(format!(
            "Menu Item: {}\nDescription: {}\nPrice: ${}\nCategory: {}",
            self.name, self.description, self.price, self.category
        ))
        .with_metadata("name", &self.name)
        .with_metadata("category", &self.category)
        .with_metadata("price", self.price.to_string())
    }
}

/// Parse a JSON menu into documents.
pub fn parse_menu(json: &str) -> Result<Vec<Document>> {
    let items: Vec<MenuItem> = serde_json::from_str(json)
        .map_err(|e| RagError::CorpusError(format!("invalid menu JSON: {e}")))?;
    Ok(items.iter().map(MenuItem::to_document).collect())
}

/// Read and parse a JSON menu file.
pub async fn load_menu(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RagError::CorpusError(format!("failed to read {}: {e}", path.display())))?;
    let documents = parse_menu(&json)?;
    info!(path = %path.display(), count = documents.len(), "loaded menu corpus");
    Ok(documents)
}
