//! Backend API access.
//!
//! The backend is a thin proxy in front of NewsAPI that also serves the
//! source catalog. Everything goes through the [`NewsBackend`] trait so the
//! commands can run against an in-process fake in tests.
//!
//! | Endpoint | Result |
//! |----------|--------|
//! | `GET /api/top?country=` | [`ArticleList`] |
//! | `GET /api/search?q=` | [`ArticleList`] |
//! | `GET /api/sources` | [`SourceCatalog`] |
//! | `GET /api/source-search?category=&source=&q=` | `{ url }` |
//!
//! No request is retried; a failure surfaces to the calling command.

use crate::error::NewsError;
use crate::models::{ArticleList, SourceCatalog, SourceSearchResult};
use crate::utils::truncate_for_log;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

/// Operations the client needs from the backend.
pub trait NewsBackend {
    /// Top headlines, optionally limited to a two-letter country code.
    async fn fetch_top(&self, country: Option<&str>) -> Result<ArticleList, NewsError>;

    /// Free-text search across all articles.
    async fn fetch_search(&self, query: &str) -> Result<ArticleList, NewsError>;

    /// The category -> source -> template mapping.
    async fn fetch_catalog(&self) -> Result<SourceCatalog, NewsError>;

    /// Resolve a single source search on the server side.
    ///
    /// Older flow; [`crate::urls::build_urls`] does the same locally.
    async fn resolve_source_search(
        &self,
        category: &str,
        source: &str,
        query: &str,
    ) -> Result<String, NewsError>;
}

/// [`NewsBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Build a client for `api_base` (e.g. `http://127.0.0.1:8000`).
    ///
    /// # Errors
    ///
    /// [`NewsError::Config`] if `api_base` is not an absolute URL,
    /// [`NewsError::Network`] if the HTTP client cannot be built.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, NewsError> {
        Url::parse(api_base)
            .map_err(|e| NewsError::Config(format!("invalid API base {api_base:?}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("global_news/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base: api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Absolute URL for `path` with `params` appended as a query string.
    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, NewsError> {
        let mut url = Url::parse(&format!("{}{}", self.base, path))
            .map_err(|e| NewsError::Config(format!("invalid endpoint {path}: {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    #[instrument(level = "info", skip_all, fields(url = %url))]
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, NewsError> {
        let t0 = Instant::now();
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        let elapsed_ms = t0.elapsed().as_millis();

        if !status.is_success() {
            warn!(%status, elapsed_ms, body = %truncate_for_log(&body, 300), "Backend returned an error status");
            return Err(NewsError::Network(format!("HTTP {status} from {url}")));
        }
        debug!(%status, elapsed_ms, bytes = body.len(), "Backend responded");

        serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, body = %truncate_for_log(&body, 300), "Response is not the expected JSON");
            NewsError::MalformedData(format!("{url}: {e}"))
        })
    }
}

/// Query parameters for `/api/top`; an absent or blank country is omitted.
fn top_params(country: Option<&str>) -> Vec<(&str, &str)> {
    match country.map(str::trim).filter(|c| !c.is_empty()) {
        Some(country) => vec![("country", country)],
        None => Vec::new(),
    }
}

impl NewsBackend for HttpBackend {
    async fn fetch_top(&self, country: Option<&str>) -> Result<ArticleList, NewsError> {
        let url = self.endpoint("/api/top", &top_params(country))?;
        self.get_json(url).await
    }

    async fn fetch_search(&self, query: &str) -> Result<ArticleList, NewsError> {
        let url = self.endpoint("/api/search", &[("q", query)])?;
        self.get_json(url).await
    }

    async fn fetch_catalog(&self) -> Result<SourceCatalog, NewsError> {
        let url = self.endpoint("/api/sources", &[])?;
        let value: serde_json::Value = self.get_json(url).await?;
        SourceCatalog::from_value(value)
    }

    async fn resolve_source_search(
        &self,
        category: &str,
        source: &str,
        query: &str,
    ) -> Result<String, NewsError> {
        let url = self.endpoint(
            "/api/source-search",
            &[("category", category), ("source", source), ("q", query)],
        )?;
        let result: SourceSearchResult = self.get_json(url).await?;
        result.url.filter(|u| !u.is_empty()).ok_or_else(|| {
            NewsError::MalformedData(format!("no URL returned for {source:?} in {category:?}"))
        })
    }
}
