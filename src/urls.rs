//! Turning a query and a set of picked sources into concrete search URLs.

use crate::models::{QUERY_PLACEHOLDER, SourceCatalog};
use tracing::debug;

/// Substitute every `{query}` in `template` with the percent-encoded query.
///
/// Encoding follows `encodeURIComponent`: everything outside
/// `A-Z a-z 0-9 - _ . ~` is escaped, so a space becomes `%20`.
pub fn fill_template(template: &str, query: &str) -> String {
    template.replace(QUERY_PLACEHOLDER, &urlencoding::encode(query))
}

/// Resolve the URLs for `selected` sources of `category`.
///
/// The result follows the order of `selected`. Names that the category does
/// not know (including every name when the category itself is unknown) are
/// dropped.
pub fn build_urls<S: AsRef<str>>(
    catalog: &SourceCatalog,
    category: &str,
    query: &str,
    selected: &[S],
) -> Vec<String> {
    let Some(category) = catalog.category(category) else {
        debug!(category, "Unknown category; no URLs built");
        return Vec::new();
    };

    selected
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let template = category.template(name);
            if template.is_none() {
                debug!(source = name, category = %category.name, "Dropping unknown source");
            }
            template
        })
        .map(|template| fill_template(template, query))
        .collect()
}

/// Join keyword, date and `site:` domain into a single search query.
///
/// Empty parts are skipped; surrounding whitespace is trimmed.
pub fn compose_query(keyword: &str, date: Option<&str>, domain: Option<&str>) -> String {
    let mut parts = Vec::with_capacity(3);
    let keyword = keyword.trim();
    if !keyword.is_empty() {
        parts.push(keyword.to_string());
    }
    if let Some(date) = date.map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(date.to_string());
    }
    if let Some(domain) = domain.map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(format!("site:{domain}"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SourceCatalog {
        SourceCatalog::from_json(
            r#"{
                "Tech": {
                    "HN": "https://hn.test/?q={query}",
                    "Lobsters": "https://lobste.rs/search?q={query}&what=stories&q2={query}"
                },
                "Misc": { "a": "http://x?q={query}" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_space_is_percent_encoded() {
        assert_eq!(
            build_urls(&catalog(), "Misc", "hi there", &["a"]),
            ["http://x?q=hi%20there"]
        );
    }

    #[test]
    fn test_unknown_names_are_dropped_and_order_kept() {
        let urls = build_urls(&catalog(), "Tech", "rust", &["Lobsters", "Slashdot", "HN"]);
        assert_eq!(
            urls,
            [
                "https://lobste.rs/search?q=rust&what=stories&q2=rust",
                "https://hn.test/?q=rust",
            ]
        );
    }

    #[test]
    fn test_unknown_category_builds_nothing() {
        assert!(build_urls(&catalog(), "Sports", "rust", &["HN"]).is_empty());
    }

    #[test]
    fn test_empty_query_substitutes_empty_string() {
        assert_eq!(build_urls(&catalog(), "Tech", "", &["HN"]), ["https://hn.test/?q="]);
    }

    #[test]
    fn test_reserved_characters_are_escaped() {
        assert_eq!(
            fill_template("https://s.test/{query}", "a&b/c?d=é"),
            "https://s.test/a%26b%2Fc%3Fd%3D%C3%A9"
        );
    }

    #[test]
    fn test_compose_query() {
        assert_eq!(compose_query("election", None, None), "election");
        assert_eq!(
            compose_query(" election ", Some("2025-05-06"), Some("bbc.co.uk")),
            "election 2025-05-06 site:bbc.co.uk"
        );
        assert_eq!(compose_query("", Some(""), Some("npr.org")), "site:npr.org");
        assert_eq!(compose_query("", None, None), "");
    }
}
