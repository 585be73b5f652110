//! # Global News
//!
//! A terminal news browser. It shows top headlines or search results from a
//! news backend and keeps per-category picks of news outlets. Those picks
//! open one search tab per outlet for a query.
//!
//! ## Usage
//!
//! ```sh
//! global_news                              # top stories + current picks
//! global_news category Europe              # switch category
//! global_news toggle "Le Monde" NOS -q EU  # pick, opening new picks
//! global_news open -q "EU summit" --today  # open every pick
//! global_news session save europe          # remember every category's picks
//! ```
//!
//! ## Architecture
//!
//! Every run handles one action: the source catalog is loaded once, the picks
//! are restored from the state directory, the action runs, and the
//! result is persisted before exit. Failures are reported at the boundary
//! of that action and never leave persisted state half-written.

use chrono::{Local, Utc};
use clap::Parser;
use std::error::Error;
use std::io;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod commands;
mod config;
mod error;
mod feed;
mod hub;
mod launcher;
mod models;
mod selector;
mod sessions;
mod storage;
mod urls;
mod utils;

use api::HttpBackend;
use cli::{Cli, Command, SessionCommand};
use commands::CatalogSource;
use config::Settings;
use error::NewsError;
use feed::FeedRequest;
use launcher::{Browser, PrintBrowser, SystemBrowser};
use selector::SourceSelector;
use sessions::SessionBook;
use storage::FileStore;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    // Quiet by default: stdout is the user's results area.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let cli = Cli::parse();
    debug!(command = ?cli.command, "Parsed CLI arguments");

    let settings = Settings::resolve(&cli).await?;
    info!(api_base = %settings.api_base, state_dir = %settings.state_dir.display(), "Starting");

    let outcome = if cli.print {
        run(&cli, &settings, PrintBrowser::new(io::stdout())).await
    } else {
        run(&cli, &settings, SystemBrowser).await
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn catalog_source(cli: &Cli) -> CatalogSource {
    match (&cli.catalog, cli.offline) {
        (Some(path), _) => CatalogSource::File(path.clone()),
        (None, true) => CatalogSource::Bundled,
        (None, false) => CatalogSource::Backend,
    }
}

async fn open_selector(
    backend: &HttpBackend,
    source: &CatalogSource,
    settings: &Settings,
) -> Result<SourceSelector<FileStore>, NewsError> {
    let catalog = commands::load_catalog(backend, source).await?;
    let store = FileStore::open(&settings.state_dir)?;
    Ok(SourceSelector::new(catalog, store))
}

async fn run<B: Browser>(cli: &Cli, settings: &Settings, mut browser: B) -> Result<(), NewsError> {
    let backend = HttpBackend::new(&settings.api_base, settings.timeout)?;
    let source = catalog_source(cli);
    let mut out = io::stdout();

    let command = cli.command.clone().unwrap_or(Command::Browse {
        country: None,
        query: None,
    });

    match command {
        Command::Browse { country, query } => {
            let store = FileStore::open(&settings.state_dir)?;
            let country = country.or_else(|| settings.country.clone());
            commands::browse(&backend, &source, store, country, query, &mut out).await
        }
        Command::Top { country } => {
            let country = country.or_else(|| settings.country.clone());
            commands::show_feed(&backend, FeedRequest::Top { country }, &mut out).await
        }
        Command::Search { query } => {
            commands::show_feed(&backend, FeedRequest::Search { query }, &mut out).await
        }
        Command::Sources { filter } => {
            let mut selector = open_selector(&backend, &source, settings).await?;
            commands::list_sources(&mut selector, filter.as_deref(), &mut out)
        }
        Command::Category { name } => {
            let mut selector = open_selector(&backend, &source, settings).await?;
            commands::choose_category(&mut selector, &name, &mut out)
        }
        Command::Toggle {
            names,
            query,
            no_open,
        } => {
            let mut selector = open_selector(&backend, &source, settings).await?;
            commands::toggle(&mut selector, &mut browser, &names, &query, !no_open, &mut out)
        }
        Command::SelectAll => {
            let mut selector = open_selector(&backend, &source, settings).await?;
            commands::select_all(&mut selector, &mut out)
        }
        Command::Clear => {
            let mut selector = open_selector(&backend, &source, settings).await?;
            commands::clear_all(&mut selector, &mut out)
        }
        Command::Session { action } => {
            let mut book = SessionBook::open(&settings.state_dir)?;
            match action {
                SessionCommand::Save { name } => {
                    let mut selector = open_selector(&backend, &source, settings).await?;
                    commands::session_save(&mut selector, &mut book, &name, Utc::now(), &mut out)
                }
                SessionCommand::Load { name } => {
                    let mut selector = open_selector(&backend, &source, settings).await?;
                    commands::session_load(&mut selector, &book, &name, &mut out)
                }
                SessionCommand::List => commands::session_list(&book, &mut out),
                SessionCommand::Export { path } => {
                    commands::session_export(&book, &path, Utc::now(), &mut out)
                }
                SessionCommand::Import { path, overwrite } => {
                    commands::session_import(&mut book, &path, overwrite, Utc::now(), &mut out)
                        .await
                }
            }
        }
        Command::Open(args) => {
            let mut selector = open_selector(&backend, &source, settings).await?;
            let today = Local::now().date_naive();
            commands::open(
                &mut selector,
                &mut browser,
                &args,
                today,
                &settings.state_dir,
                &mut out,
            )
        }
        Command::Resolve {
            category,
            source: name,
            query,
            open,
        } => {
            commands::resolve(&backend, &mut browser, &category, &name, &query, open, &mut out)
                .await
        }
        Command::Hub { fragment } => commands::open_fragment(&mut browser, &fragment),
    }
}
