//! Article feed: top headlines and search results rendered as text cards.

use crate::api::NewsBackend;
use crate::models::Article;
use crate::utils::html_to_text;
use chrono::{DateTime, Local, TimeZone};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, instrument};

/// Shown instead of cards when a list is empty or missing.
pub const NO_ARTICLES: &str = "No articles found.";

/// Which list to load into the results area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRequest {
    Top { country: Option<String> },
    Search { query: String },
}

impl FeedRequest {
    /// Search when there is a non-blank query, top headlines otherwise.
    pub fn from_query(query: &str, country: Option<String>) -> Self {
        let query = query.trim();
        if query.is_empty() {
            FeedRequest::Top { country }
        } else {
            FeedRequest::Search {
                query: query.to_string(),
            }
        }
    }

    fn failure_text(&self) -> &'static str {
        match self {
            FeedRequest::Top { .. } => "Error fetching top stories.",
            FeedRequest::Search { .. } => "Error fetching articles.",
        }
    }
}

/// Proof that a request was issued, ordered by issue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Lets a later feed request supersede an earlier one.
///
/// Nothing is cancelled; a response whose ticket is no longer the latest is
/// simply not rendered.
#[derive(Debug, Default)]
pub struct FeedSequencer {
    latest: AtomicU64,
}

impl FeedSequencer {
    pub fn begin(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

/// Run `request` and render it, unless a newer request was issued meanwhile.
///
/// Failures never propagate: they are logged and replaced by a short
/// fallback line for the results area.
#[instrument(level = "info", skip(backend, sequencer))]
pub async fn load<B: NewsBackend>(
    backend: &B,
    sequencer: &FeedSequencer,
    ticket: Ticket,
    request: &FeedRequest,
) -> Option<String> {
    let result = match request {
        FeedRequest::Top { country } => backend.fetch_top(country.as_deref()).await,
        FeedRequest::Search { query } => backend.fetch_search(query).await,
    };

    if !sequencer.is_current(ticket) {
        debug!(?ticket, "Dropping superseded response");
        return None;
    }

    Some(match result {
        Ok(list) => render(list.articles.as_deref()),
        Err(e) => {
            error!(error = %e, "Feed request failed");
            request.failure_text().to_string()
        }
    })
}

/// Render articles as text cards, replacing whatever was shown before.
pub fn render(articles: Option<&[Article]>) -> String {
    render_in(articles, &Local)
}

/// [`render`] with an explicit time zone for publish times.
pub fn render_in<Tz: TimeZone>(articles: Option<&[Article]>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let articles = match articles {
        Some(list) if !list.is_empty() => list,
        _ => return NO_ARTICLES.to_string(),
    };

    articles
        .iter()
        .map(|article| card(article, tz))
        .collect::<Vec<_>>()
        .join("\n")
}

fn card<Tz: TimeZone>(article: &Article, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut lines = vec![
        article.title.clone(),
        format!("  {}", article.url),
        format!(
            "  {} · {}",
            article.source.name,
            format_published(article.published_at.as_deref(), tz)
        ),
    ];
    if let Some(image) = article.url_to_image.as_deref().filter(|u| !u.is_empty()) {
        lines.push(format!("  image: {image}"));
    }
    let description = article
        .description
        .as_deref()
        .map(html_to_text)
        .unwrap_or_default();
    lines.push(format!("  {description}"));

    let mut card = lines.join("\n");
    card.push('\n');
    card
}

/// `YYYY-MM-DD HH:MM` in `tz`; empty when absent or not RFC 3339.
pub fn format_published<Tz: TimeZone>(published_at: Option<&str>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    published_at
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::FakeBackend;
    use crate::models::ArticleSource;
    use chrono::Utc;

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            url: format!("https://example.com/{}", title.to_lowercase()),
            description: Some("<p>Short &amp; sweet</p>".to_string()),
            url_to_image: None,
            published_at: Some("2025-05-06T14:30:00Z".to_string()),
            source: ArticleSource {
                id: None,
                name: "Example".to_string(),
            },
        }
    }

    #[test]
    fn test_empty_or_missing_list_renders_placeholder() {
        assert_eq!(render(Some(&[][..])), "No articles found.");
        assert_eq!(render(None), "No articles found.");
    }

    #[test]
    fn test_card_layout() {
        let mut with_image = article("Rust");
        with_image.url_to_image = Some("https://example.com/rust.png".to_string());
        let mut bare = article("Bare");
        bare.description = None;
        bare.published_at = None;

        let out = render_in(Some(&[with_image, bare][..]), &Utc);
        assert_eq!(
            out,
            "Rust\n  https://example.com/rust\n  Example · 2025-05-06 14:30\n  image: https://example.com/rust.png\n  Short & sweet\n\
             \n\
             Bare\n  https://example.com/bare\n  Example · \n  \n"
        );
        assert!(!out.contains(NO_ARTICLES));
    }

    #[test]
    fn test_unparsable_timestamp_is_blank() {
        assert_eq!(format_published(Some("yesterday"), &Utc), "");
        assert_eq!(format_published(None, &Utc), "");
    }

    #[test]
    fn test_request_from_query() {
        assert_eq!(
            FeedRequest::from_query("  ", Some("us".into())),
            FeedRequest::Top {
                country: Some("us".into())
            }
        );
        assert_eq!(
            FeedRequest::from_query(" mars ", None),
            FeedRequest::Search {
                query: "mars".into()
            }
        );
    }

    #[test]
    fn test_sequencer_only_latest_is_current() {
        let seq = FeedSequencer::default();
        let first = seq.begin();
        assert!(seq.is_current(first));
        let second = seq.begin();
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));
    }

    #[tokio::test]
    async fn test_stale_response_is_dropped() {
        let backend = FakeBackend {
            articles: vec![article("Mars")],
            ..Default::default()
        };
        let seq = FeedSequencer::default();
        let top = FeedRequest::Top { country: None };
        let search = FeedRequest::Search {
            query: "mars".into(),
        };

        let top_ticket = seq.begin();
        let search_ticket = seq.begin();
        let rendered = load(&backend, &seq, search_ticket, &search).await;
        let stale = load(&backend, &seq, top_ticket, &top).await;

        assert!(rendered.unwrap().starts_with("Mars\n"));
        assert_eq!(stale, None);
    }

    #[tokio::test]
    async fn test_failure_renders_fallback_text() {
        let backend = FakeBackend {
            fail_feed: true,
            ..Default::default()
        };
        let seq = FeedSequencer::default();
        let request = FeedRequest::Top {
            country: Some("de".into()),
        };

        let out = load(&backend, &seq, seq.begin(), &request).await;
        assert_eq!(out.as_deref(), Some("Error fetching top stories."));
        assert_eq!(backend.requests.borrow().as_slice(), ["top de"]);
    }
}
