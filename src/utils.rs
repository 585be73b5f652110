//! Small helpers shared by the feed renderer and the API client.

use scraper::Html;

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (backing off to a char boundary) with
/// an ellipsis and byte count appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Flatten an HTML fragment to plain text with collapsed whitespace.
///
/// Upstream descriptions regularly embed markup (`<p>`, `<a>`, entities);
/// the terminal only gets the text nodes.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return fragment.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    let parsed = Html::parse_fragment(fragment);
    parsed
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
