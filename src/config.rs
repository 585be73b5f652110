//! Runtime settings.
//!
//! Values come from three layers, highest first: command-line flags (or
//! their environment variables), an optional YAML file passed with
//! `--config`, and built-in defaults.
//!
//! ```yaml
//! api_base: http://127.0.0.1:8000
//! state_dir: /home/me/.local/share/global_news
//! timeout_secs: 10
//! country: us
//! ```

use crate::cli::Cli;
use crate::error::NewsError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const STATE_DIR_NAME: &str = "global_news";

/// Optional YAML configuration file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_base: Option<String>,
    pub state_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub country: Option<String>,
}

impl FileConfig {
    #[instrument(level = "debug", fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, NewsError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| NewsError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text)
            .map_err(|e| NewsError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to an empty mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base: String,
    pub state_dir: PathBuf,
    pub timeout: Duration,
    /// Default country for top headlines.
    pub country: Option<String>,
}

impl Settings {
    /// Resolve settings for `cli`, reading its `--config` file if given.
    pub async fn resolve(cli: &Cli) -> Result<Self, NewsError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path).await?,
            None => FileConfig::default(),
        };
        let settings = Self::layer(cli, file, dirs::data_dir().as_deref())?;
        debug!(?settings, "Resolved settings");
        Ok(settings)
    }

    /// Merge flags over the file over defaults.
    ///
    /// The default state directory lives under the platform data directory
    /// (`$XDG_DATA_HOME`, `~/Library/Application Support`, `%APPDATA%`).
    ///
    /// # Errors
    ///
    /// [`NewsError::Config`] when no state directory was given and the
    /// platform has no data directory.
    pub fn layer(cli: &Cli, file: FileConfig, data_dir: Option<&Path>) -> Result<Self, NewsError> {
        let state_dir = match cli.state_dir.clone().or(file.state_dir) {
            Some(dir) => dir,
            None => data_dir
                .map(|dir| dir.join(STATE_DIR_NAME))
                .ok_or_else(|| {
                    NewsError::Config(
                        "no data directory on this platform; pass --state-dir".into(),
                    )
                })?,
        };

        Ok(Self {
            api_base: cli
                .api_base
                .clone()
                .or(file.api_base)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            state_dir,
            timeout: Duration::from_secs(
                cli.timeout_secs
                    .or(file.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            country: file.country.filter(|c| !c.trim().is_empty()),
        })
    }
}
