//! Data models for articles and the source catalog.
//!
//! - [`Article`] / [`ArticleList`]: payloads of `/api/top` and `/api/search`
//! - [`SourceCatalog`]: category -> source -> URL template, as served by
//!   `/api/sources`
//! - [`SourceSearchResult`]: payload of the legacy `/api/source-search`

use crate::error::NewsError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Catalog shipped inside the binary, used by `--offline`.
const BUNDLED_CATALOG: &str = include_str!("../assets/sources.json");

/// Placeholder substituted with the encoded query in every template.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// A single article as returned by the backend.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub description: Option<String>,
    pub url_to_image: Option<String>,
    /// RFC 3339 timestamp, e.g. `2025-05-06T14:30:00Z`.
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: ArticleSource,
}

/// The outlet an article came from.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ArticleSource {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

/// Envelope around a list of articles.
///
/// `articles` is optional because the backend forwards upstream error bodies
/// that carry no list at all.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleList {
    pub status: Option<String>,
    pub total_results: Option<u64>,
    pub articles: Option<Vec<Article>>,
}

/// Response of `/api/source-search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSearchResult {
    pub url: Option<String>,
}

/// One selectable news source and its search URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTemplate {
    pub name: String,
    pub template: String,
}

/// A named group of sources, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub sources: Vec<SourceTemplate>,
}

impl Category {
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.name.as_str())
    }

    pub fn template(&self, source: &str) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.name == source)
            .map(|s| s.template.as_str())
    }
}

/// The category -> source -> template mapping.
///
/// Ordering follows the JSON document it was parsed from (serde_json is built
/// with `preserve_order`). Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceCatalog {
    categories: Vec<Category>,
}

impl SourceCatalog {
    /// Parse a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// [`NewsError::MalformedData`] if the text is not JSON or is not an
    /// object of objects of strings.
    pub fn from_json(text: &str) -> Result<Self, NewsError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, NewsError> {
        let Value::Object(map) = value else {
            return Err(NewsError::MalformedData(
                "catalog must be an object of categories".into(),
            ));
        };

        let mut categories = Vec::with_capacity(map.len());
        for (name, sources) in map {
            let Value::Object(sources) = sources else {
                return Err(NewsError::MalformedData(format!(
                    "category {name:?} must map source names to templates"
                )));
            };
            let mut templates = Vec::with_capacity(sources.len());
            for (source, template) in sources {
                let Value::String(template) = template else {
                    return Err(NewsError::MalformedData(format!(
                        "template for {source:?} in {name:?} is not a string"
                    )));
                };
                templates.push(SourceTemplate {
                    name: source,
                    template,
                });
            }
            categories.push(Category {
                name,
                sources: templates,
            });
        }
        Ok(Self { categories })
    }

    /// The catalog compiled into the binary.
    pub fn bundled() -> Result<Self, NewsError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn first_category(&self) -> Option<&Category> {
        self.categories.first()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
