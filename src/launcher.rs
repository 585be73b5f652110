//! Opening one view per URL.
//!
//! [`launch`] first reserves one blank tab per URL, all inside the call that
//! the user triggered, and only then points each tab at its URL. A tab that
//! could not be reserved, or that refuses the redirect, is closed if it
//! exists and the URL is opened directly instead. Failures are collected in
//! the [`LaunchReport`]; one bad URL never stops the rest.

use crate::error::NewsError;
use std::io::Write;
use tracing::{debug, error, info, instrument, warn};

/// Window-opening primitive of whatever shows the pages.
pub trait Browser {
    /// Handle of a tab reserved by [`Browser::open_blank`].
    type Tab;

    /// Reserve an empty tab. `None` means the open was blocked.
    fn open_blank(&mut self) -> Option<Self::Tab>;

    /// Point a reserved tab at `url`.
    fn navigate(&mut self, tab: &mut Self::Tab, url: &str) -> Result<(), NewsError>;

    /// Discard a tab whose redirect failed.
    fn close(&mut self, tab: Self::Tab);

    /// Open `url` in a new tab in one step.
    fn open_url(&mut self, url: &str) -> Result<(), NewsError>;
}

/// Outcome of a [`launch`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    /// Every URL that ended up open, in launch order.
    pub opened: Vec<String>,
    /// The subset of `opened` that needed the direct-open retry.
    pub retried: Vec<String>,
    /// URLs that could not be opened at all.
    pub failed: Vec<String>,
}

impl LaunchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Open one tab per URL, in order.
///
/// # Errors
///
/// [`NewsError::NothingSelected`] when `urls` is empty; nothing is opened.
#[instrument(level = "info", skip_all, fields(count = urls.len()))]
pub fn launch<B: Browser>(browser: &mut B, urls: &[String]) -> Result<LaunchReport, NewsError> {
    if urls.is_empty() {
        return Err(NewsError::NothingSelected);
    }

    // All reservations happen before any redirect.
    let tabs: Vec<Option<B::Tab>> = urls.iter().map(|_| browser.open_blank()).collect();

    let mut report = LaunchReport::default();
    for (index, (url, tab)) in urls.iter().zip(tabs).enumerate() {
        let redirected = match tab {
            Some(mut tab) => match browser.navigate(&mut tab, url) {
                Ok(()) => true,
                Err(e) => {
                    warn!(index, %url, error = %e, "Redirect failed; closing tab");
                    browser.close(tab);
                    false
                }
            },
            None => {
                warn!(index, %url, "Blank tab was blocked");
                false
            }
        };

        if redirected {
            debug!(index, %url, "Opened");
            report.opened.push(url.clone());
            continue;
        }

        match browser.open_url(url) {
            Ok(()) => {
                info!(index, %url, "Opened directly after redirect failure");
                report.opened.push(url.clone());
                report.retried.push(url.clone());
            }
            Err(e) => {
                error!(index, %url, error = %e, "Could not open URL");
                report.failed.push(url.clone());
            }
        }
    }

    info!(
        opened = report.opened.len(),
        retried = report.retried.len(),
        failed = report.failed.len(),
        "Launch finished"
    );
    Ok(report)
}

/// The user's default browser.
///
/// Desktop launchers have no notion of a blank tab, so a reservation is just
/// a slot; navigating it hands the URL to the browser.
#[derive(Debug, Default)]
pub struct SystemBrowser;

/// Reserved slot of a [`SystemBrowser`].
#[derive(Debug, Default)]
pub struct SystemTab {
    url: Option<String>,
}

impl Browser for SystemBrowser {
    type Tab = SystemTab;

    fn open_blank(&mut self) -> Option<SystemTab> {
        Some(SystemTab::default())
    }

    fn navigate(&mut self, tab: &mut SystemTab, url: &str) -> Result<(), NewsError> {
        self.open_url(url)?;
        tab.url = Some(url.to_string());
        Ok(())
    }

    fn close(&mut self, tab: SystemTab) {
        debug!(url = ?tab.url, "Dropping unused tab slot");
    }

    fn open_url(&mut self, url: &str) -> Result<(), NewsError> {
        webbrowser::open(url).map_err(|e| NewsError::PopupBlocked(format!("{url}: {e}")))
    }
}

/// Writes each URL on its own line instead of opening it (`--print`).
#[derive(Debug)]
pub struct PrintBrowser<W: Write> {
    out: W,
}

impl<W: Write> PrintBrowser<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Browser for PrintBrowser<W> {
    type Tab = ();

    fn open_blank(&mut self) -> Option<()> {
        Some(())
    }

    fn navigate(&mut self, _tab: &mut (), url: &str) -> Result<(), NewsError> {
        self.open_url(url)
    }

    fn close(&mut self, _tab: ()) {}

    fn open_url(&mut self, url: &str) -> Result<(), NewsError> {
        writeln!(self.out, "{url}").map_err(|e| NewsError::PopupBlocked(e.to_string()))
    }
}
