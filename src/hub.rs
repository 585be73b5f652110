//! Link hub: one intermediary page instead of N tabs.
//!
//! The whole URL list travels in the fragment of the hub page URL as
//! percent-encoded JSON (`link_hub.html#%5B%22https...%22%5D`). Fragments are
//! never sent to a server. The page itself is a static document embedded in
//! the binary and written into the state directory on first use.

use crate::error::NewsError;
use crate::launcher::Browser;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use url::Url;

const HUB_PAGE: &str = include_str!("../assets/link_hub.html");
const HUB_FILE: &str = "link_hub.html";

/// How the hub ended up in front of the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubOutcome {
    /// Opened in a new tab.
    Opened(Url),
    /// Opening was refused; the hub URL was written out for the user instead.
    Fallback(Url),
}

/// Encode `urls` as a fragment (without the leading `#`).
pub fn encode_fragment(urls: &[String]) -> Result<String, NewsError> {
    let json = serde_json::to_string(urls)?;
    Ok(urlencoding::encode(&json).into_owned())
}

/// Decode a fragment produced by [`encode_fragment`]; a leading `#` is allowed.
///
/// # Errors
///
/// [`NewsError::MalformedData`] unless the fragment decodes to a JSON array
/// of strings.
pub fn decode_fragment(fragment: &str) -> Result<Vec<String>, NewsError> {
    let raw = fragment.strip_prefix('#').unwrap_or(fragment);
    let json = urlencoding::decode(raw)
        .map_err(|e| NewsError::MalformedData(format!("hub fragment is not UTF-8: {e}")))?;
    serde_json::from_str::<Vec<String>>(&json)
        .map_err(|e| NewsError::MalformedData(format!("hub fragment is not a URL list: {e}")))
}

/// Make sure the hub page exists in `state_dir` and return its path.
#[instrument(level = "debug", skip_all, fields(state_dir = %state_dir.display()))]
pub fn install_hub_page(state_dir: &Path) -> Result<PathBuf, NewsError> {
    fs::create_dir_all(state_dir)?;
    let path = state_dir.join(HUB_FILE);
    let current = fs::read_to_string(&path).ok();
    if current.as_deref() != Some(HUB_PAGE) {
        fs::write(&path, HUB_PAGE)?;
        debug!(path = %path.display(), "Wrote hub page");
    }
    Ok(path)
}

/// `file://` URL of the hub page carrying `urls` in its fragment.
pub fn hub_url(page: &Path, urls: &[String]) -> Result<Url, NewsError> {
    let absolute = if page.is_absolute() {
        page.to_path_buf()
    } else {
        std::env::current_dir()?.join(page)
    };
    let mut url = Url::from_file_path(&absolute).map_err(|()| {
        NewsError::Config(format!("cannot address hub page {}", absolute.display()))
    })?;
    url.set_fragment(Some(&encode_fragment(urls)?));
    Ok(url)
}

/// Open the hub for `urls`; if the browser refuses, write the hub URL to
/// `fallback` so the user can navigate there.
///
/// # Errors
///
/// [`NewsError::NothingSelected`] for an empty list, or a write error on
/// `fallback`.
#[instrument(level = "info", skip_all, fields(count = urls.len()))]
pub fn open_hub<B: Browser>(
    browser: &mut B,
    page: &Path,
    urls: &[String],
    fallback: &mut impl Write,
) -> Result<HubOutcome, NewsError> {
    if urls.is_empty() {
        return Err(NewsError::NothingSelected);
    }
    let url = hub_url(page, urls)?;

    match browser.open_url(url.as_str()) {
        Ok(()) => {
            info!("Opened link hub");
            Ok(HubOutcome::Opened(url))
        }
        Err(e) => {
            warn!(error = %e, "Link hub was blocked; printing its address");
            writeln!(fallback, "{url}")?;
            Ok(HubOutcome::Fallback(url))
        }
    }
}
