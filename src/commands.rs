//! Subcommand bodies.
//!
//! Each function is one user action: it restores what it needs, does its
//! work, persists, and writes what the user should see to `out`. They are
//! generic over the backend, the store and the browser so the whole flow can
//! run against fakes.

use crate::api::NewsBackend;
use crate::cli::LaunchArgs;
use crate::error::NewsError;
use crate::feed::{self, FeedRequest, FeedSequencer};
use crate::hub::{HubOutcome, decode_fragment, install_hub_page, open_hub};
use crate::launcher::{Browser, LaunchReport, launch};
use crate::models::SourceCatalog;
use crate::selector::SourceSelector;
use crate::sessions::SessionBook;
use crate::storage::KeyValueStore;
use crate::urls::compose_query;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument};

/// Where the source catalog comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Backend,
    File(PathBuf),
    Bundled,
}

#[instrument(level = "info", skip(backend))]
pub async fn load_catalog<B: NewsBackend>(
    backend: &B,
    source: &CatalogSource,
) -> Result<SourceCatalog, NewsError> {
    let catalog = match source {
        CatalogSource::Backend => backend.fetch_catalog().await?,
        CatalogSource::File(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            SourceCatalog::from_json(&text)?
        }
        CatalogSource::Bundled => SourceCatalog::bundled()?,
    };
    info!(categories = catalog.categories().len(), "Loaded catalog");
    Ok(catalog)
}

/// Start-up view: the feed and the source picker, loaded concurrently.
///
/// The top-stories request always goes out. A query issues a search after
/// it, which supersedes it. A catalog failure only disables the picker
/// section.
pub async fn browse<B: NewsBackend, K: KeyValueStore>(
    backend: &B,
    catalog_source: &CatalogSource,
    store: K,
    country: Option<String>,
    query: Option<String>,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    let sequencer = FeedSequencer::default();
    let top = FeedRequest::Top { country };
    let top_ticket = sequencer.begin();
    let search = query
        .filter(|q| !q.trim().is_empty())
        .map(|q| (FeedRequest::from_query(&q, None), sequencer.begin()));

    let feed_view = async {
        let top_view = feed::load(backend, &sequencer, top_ticket, &top);
        match &search {
            Some((request, ticket)) => {
                let (top_view, search_view) =
                    join(top_view, feed::load(backend, &sequencer, *ticket, request)).await;
                search_view.or(top_view)
            }
            None => top_view.await,
        }
    };
    let (view, catalog) = join(feed_view, load_catalog(backend, catalog_source)).await;

    writeln!(out, "{}", view.unwrap_or_default())?;
    writeln!(out)?;
    match catalog {
        Ok(catalog) => {
            let mut selector = SourceSelector::new(catalog, store);
            selector.restore()?;
            write_selection(&selector, out)?;
        }
        Err(e) => {
            error!(error = %e, "Failed to load sources");
            writeln!(out, "Sources unavailable: {e}")?;
        }
    }
    Ok(())
}

/// Render a single feed request.
pub async fn show_feed<B: NewsBackend>(
    backend: &B,
    request: FeedRequest,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    let sequencer = FeedSequencer::default();
    let ticket = sequencer.begin();
    let view = feed::load(backend, &sequencer, ticket, &request).await;
    writeln!(out, "{}", view.unwrap_or_default())?;
    Ok(())
}

/// All categories, the active one marked, then the active category's sources.
pub fn list_sources<K: KeyValueStore>(
    selector: &mut SourceSelector<K>,
    filter: Option<&str>,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    selector.restore()?;
    let active = selector.category().map(|c| c.name.clone());
    for category in selector.catalog().categories() {
        let mark = if active.as_deref() == Some(category.name.as_str()) {
            ">"
        } else {
            " "
        };
        writeln!(out, "{mark} {} ({})", category.name, category.sources.len())?;
    }
    writeln!(out)?;
    write_filtered_selection(selector, filter.unwrap_or_default(), out)?;
    Ok(())
}

pub fn choose_category<K: KeyValueStore>(
    selector: &mut SourceSelector<K>,
    name: &str,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    selector.select_category(name)?;
    write_selection(selector, out)?;
    Ok(())
}

/// Flip `names` and, if `auto_open`, launch only the newly picked sources.
pub fn toggle<K: KeyValueStore, B: Browser>(
    selector: &mut SourceSelector<K>,
    browser: &mut B,
    names: &[String],
    query: &str,
    auto_open: bool,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    selector.restore()?;
    selector.set_query(query);
    let added = selector.flip(names)?;
    write_selection(selector, out)?;

    if auto_open && !added.is_empty() {
        let urls = selector.urls_for(&added);
        check_report(launch(browser, &urls)?)?;
    }
    Ok(())
}

pub fn select_all<K: KeyValueStore>(
    selector: &mut SourceSelector<K>,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    selector.restore()?;
    selector.select_all()?;
    write_selection(selector, out)?;
    Ok(())
}

pub fn clear_all<K: KeyValueStore>(
    selector: &mut SourceSelector<K>,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    selector.restore()?;
    selector.clear_all()?;
    write_selection(selector, out)?;
    Ok(())
}

pub fn session_save<K: KeyValueStore>(
    selector: &mut SourceSelector<K>,
    book: &mut SessionBook,
    name: &str,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    selector.restore()?;
    let data = selector.snapshot();
    let picks: usize = data.selections.values().map(Vec::len).sum();
    book.save(name, data, now)?;
    writeln!(out, "Saved session {:?} ({picks} pick(s))", name.trim())?;
    Ok(())
}

pub fn session_load<K: KeyValueStore>(
    selector: &mut SourceSelector<K>,
    book: &SessionBook,
    name: &str,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    let session = book
        .get(name)
        .ok_or_else(|| NewsError::UnknownSession(name.to_string()))?;
    selector.apply(&session.data)?;
    write_selection(selector, out)?;
    Ok(())
}

pub fn session_list(book: &SessionBook, out: &mut impl Write) -> Result<(), NewsError> {
    let sessions = book.list();
    if sessions.is_empty() {
        writeln!(out, "No saved sessions.")?;
    }
    for session in sessions {
        writeln!(out, "{}  {}", session.created_at, session.name)?;
    }
    Ok(())
}

pub fn session_export(
    book: &SessionBook,
    path: &Path,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    let count = book.export(path, now)?;
    writeln!(out, "Exported {count} session(s) to {}", path.display())?;
    Ok(())
}

pub async fn session_import(
    book: &mut SessionBook,
    path: &Path,
    overwrite: bool,
    now: DateTime<Utc>,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    let text = tokio::fs::read_to_string(path).await?;
    let count = book.import(&text, overwrite, now)?;
    writeln!(out, "Imported {count} session(s) from {}", path.display())?;
    Ok(())
}

/// Query for a launch: keywords, optional date, optional `site:` domain.
pub fn launch_query(args: &LaunchArgs, today: NaiveDate) -> String {
    let date = if args.today {
        Some(today.format("%Y-%m-%d").to_string())
    } else {
        args.date.clone()
    };
    compose_query(&args.query, date.as_deref(), args.site.as_deref())
}

/// Open every picked source, as tabs or through the link hub.
pub fn open<K: KeyValueStore, B: Browser>(
    selector: &mut SourceSelector<K>,
    browser: &mut B,
    args: &LaunchArgs,
    today: NaiveDate,
    state_dir: &Path,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    selector.restore()?;
    selector.set_query(launch_query(args, today));
    let urls = selector.urls();

    if args.hub {
        if urls.is_empty() {
            return Err(NewsError::NothingSelected);
        }
        let page = install_hub_page(state_dir)?;
        match open_hub(browser, &page, &urls, out)? {
            HubOutcome::Opened(url) => info!(%url, "Link hub opened"),
            HubOutcome::Fallback(url) => {
                debug!(%url, "Link hub printed instead of opened");
                writeln!(
                    out,
                    "Could not open the link hub; open the address above to reach your {} link(s).",
                    urls.len()
                )?;
            }
        }
        return Ok(());
    }
    check_report(launch(browser, &urls)?)
}

/// Server-side resolution of one source search URL.
pub async fn resolve<N: NewsBackend, B: Browser>(
    backend: &N,
    browser: &mut B,
    category: &str,
    source: &str,
    query: &str,
    open: bool,
    out: &mut impl Write,
) -> Result<(), NewsError> {
    let url = backend.resolve_source_search(category, source, query).await?;
    writeln!(out, "{url}")?;
    if open {
        check_report(launch(browser, &[url])?)?;
    }
    Ok(())
}

/// What the link hub page does, natively: open every URL in the fragment.
pub fn open_fragment<B: Browser>(browser: &mut B, fragment: &str) -> Result<(), NewsError> {
    let urls = decode_fragment(fragment)?;
    check_report(launch(browser, &urls)?)
}

fn check_report(report: LaunchReport) -> Result<(), NewsError> {
    if report.is_complete() {
        return Ok(());
    }
    Err(NewsError::PopupBlocked(format!(
        "{} of {} tab(s) could not be opened: {}",
        report.failed.len(),
        report.failed.len() + report.opened.len(),
        report.failed.join(", ")
    )))
}

fn write_selection<K: KeyValueStore>(
    selector: &SourceSelector<K>,
    out: &mut impl Write,
) -> std::io::Result<()> {
    write_filtered_selection(selector, "", out)
}

fn write_filtered_selection<K: KeyValueStore>(
    selector: &SourceSelector<K>,
    filter: &str,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let Some(category) = selector.category() else {
        return Ok(());
    };
    let selected = selector.selected();
    writeln!(
        out,
        "{} ({} of {} selected)",
        category.name,
        selected.len(),
        selector.options().len()
    )?;
    for option in selector.matching_options(filter) {
        let mark = if selected.iter().any(|s| s == option) { "*" } else { " " };
        writeln!(out, "  {mark} {option}")?;
    }
    Ok(())
}
