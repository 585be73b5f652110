//! Command-line interface definitions.
//!
//! Global options can be given before or after the subcommand, and most of
//! them fall back to an environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Top stories plus the current source picks
//! global_news
//!
//! # Pick sources, opening each newly picked one for "election"
//! global_news category "United Kingdom"
//! global_news toggle BBC "The Guardian" --query election
//!
//! # Open every picked source, restricted to a date, through the link hub
//! global_news open --query election --today --hub
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Base URL of the news backend
    #[arg(long, env = "NEWS_API_BASE", global = true)]
    pub api_base: Option<String>,

    /// Directory holding persisted picks and the link hub page
    #[arg(long, env = "GLOBAL_NEWS_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Optional path to a YAML config file
    #[arg(short, long, env = "GLOBAL_NEWS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Read the source catalog from a local JSON file instead of the backend
    #[arg(long, global = true, conflicts_with = "offline")]
    pub catalog: Option<PathBuf>,

    /// Use the source catalog built into the binary
    #[arg(long, global = true)]
    pub offline: bool,

    /// Print URLs instead of opening them in the browser
    #[arg(long, global = true)]
    pub print: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show top stories (or search results) and the current source picks
    Browse {
        /// Two-letter country code for top stories
        #[arg(long)]
        country: Option<String>,
        /// Search instead of top stories
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Show top headlines
    Top {
        #[arg(long)]
        country: Option<String>,
    },
    /// Search all articles
    Search { query: String },
    /// List categories and the sources of the active one
    Sources {
        /// Only show sources whose name contains this text (any case)
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Switch the active category
    Category { name: String },
    /// Flip the named sources in or out of the selection
    Toggle {
        #[arg(required = true)]
        names: Vec<String>,
        /// Query used when opening newly picked sources
        #[arg(short, long, default_value = "")]
        query: String,
        /// Only update the selection
        #[arg(long)]
        no_open: bool,
    },
    /// Select every source of the active category
    SelectAll,
    /// Deselect every source of the active category
    Clear,
    /// Save, load and share named snapshots of the picks
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
    /// Open a search tab for every picked source
    Open(LaunchArgs),
    /// Ask the backend for one source's search URL
    Resolve {
        category: String,
        source: String,
        #[arg(short, long, default_value = "")]
        query: String,
        /// Open the URL as well as printing it
        #[arg(long)]
        open: bool,
    },
    /// Open every URL carried by a link hub fragment
    Hub { fragment: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Save every category's picks and the active category under a name
    Save { name: String },
    /// Restore a saved session
    Load { name: String },
    /// List saved sessions, newest first
    List,
    /// Write all sessions to a JSON file
    Export { path: PathBuf },
    /// Merge sessions from a JSON file
    Import {
        path: PathBuf,
        /// Replace existing sessions with the same name
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct LaunchArgs {
    /// Search keywords
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Append a date (e.g. 2025-05-06) to the query
    #[arg(long)]
    pub date: Option<String>,

    /// Append today's date to the query
    #[arg(long, conflicts_with = "date")]
    pub today: bool,

    /// Restrict results to a domain with `site:`
    #[arg(long)]
    pub site: Option<String>,

    /// Open one link hub page instead of one tab per source
    #[arg(long)]
    pub hub: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_browse() {
        let cli = Cli::parse_from(["global_news"]);
        assert!(cli.command.is_none());
        assert!(!cli.print);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "global_news",
            "open",
            "--query",
            "election",
            "--today",
            "--hub",
            "--print",
            "--offline",
        ]);
        assert!(cli.print);
        assert!(cli.offline);
        let Some(Command::Open(args)) = cli.command else {
            panic!("expected open");
        };
        assert_eq!(args.query, "election");
        assert!(args.today && args.hub);
        assert_eq!(args.date, None);
    }

    #[test]
    fn test_toggle_requires_names() {
        assert!(Cli::try_parse_from(["global_news", "toggle"]).is_err());
        let cli = Cli::try_parse_from(["global_news", "toggle", "BBC", "NPR", "--no-open"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Toggle {
                names: vec!["BBC".into(), "NPR".into()],
                query: String::new(),
                no_open: true,
            })
        );
    }

    #[test]
    fn test_sources_filter_and_session_commands() {
        let cli = Cli::parse_from(["global_news", "sources", "--filter", "bbc"]);
        assert_eq!(
            cli.command,
            Some(Command::Sources {
                filter: Some("bbc".into())
            })
        );

        let cli = Cli::parse_from(["global_news", "session", "import", "s.json", "--overwrite"]);
        assert_eq!(
            cli.command,
            Some(Command::Session {
                action: SessionCommand::Import {
                    path: PathBuf::from("s.json"),
                    overwrite: true,
                }
            })
        );
        assert!(Cli::try_parse_from(["global_news", "session", "save"]).is_err());
    }

    #[test]
    fn test_date_conflicts_with_today() {
        assert!(
            Cli::try_parse_from(["global_news", "open", "--date", "2025-05-06", "--today"])
                .is_err()
        );
    }

    #[test]
    fn test_catalog_conflicts_with_offline() {
        assert!(
            Cli::try_parse_from(["global_news", "--catalog", "s.json", "--offline", "sources"])
                .is_err()
        );
    }
}
