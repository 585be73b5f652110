//! Error taxonomy shared by every command.
//!
//! Every variant is recoverable: commands catch it at their boundary, log it
//! and report it to the user. Nothing here is meant to abort the process from
//! deep inside a module.

use std::error::Error;
use std::fmt;

/// Errors raised while fetching, parsing, persisting or launching.
#[derive(Debug)]
pub enum NewsError {
    /// The request failed in transport or returned an error status.
    Network(String),
    /// A catalog, API payload, persisted value or hub fragment had the wrong shape.
    MalformedData(String),
    /// A tab handle was missing or unusable after opening it.
    PopupBlocked(String),
    /// A launch was requested with no URLs to open.
    NothingSelected,
    /// Reading or writing the state directory failed.
    Storage(std::io::Error),
    /// The configuration file could not be read or parsed.
    Config(String),
    /// No saved session has the requested name.
    UnknownSession(String),
}

impl fmt::Display for NewsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewsError::Network(msg) => write!(f, "network error: {msg}"),
            NewsError::MalformedData(msg) => write!(f, "malformed data: {msg}"),
            NewsError::PopupBlocked(msg) => write!(f, "tab could not be opened: {msg}"),
            NewsError::NothingSelected => write!(f, "no sources selected"),
            NewsError::Storage(e) => write!(f, "storage error: {e}"),
            NewsError::Config(msg) => write!(f, "configuration error: {msg}"),
            NewsError::UnknownSession(name) => write!(f, "no session named {name:?}"),
        }
    }
}

impl Error for NewsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NewsError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NewsError {
    fn from(e: reqwest::Error) -> Self {
        NewsError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for NewsError {
    fn from(e: serde_json::Error) -> Self {
        NewsError::MalformedData(e.to_string())
    }
}

impl From<std::io::Error> for NewsError {
    fn from(e: std::io::Error) -> Self {
        NewsError::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(NewsError::NothingSelected.to_string(), "no sources selected");
        assert_eq!(
            NewsError::Network("HTTP 502".into()).to_string(),
            "network error: HTTP 502"
        );
    }

    #[test]
    fn test_json_error_is_malformed_data() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(NewsError::from(err), NewsError::MalformedData(_)));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = NewsError::from(std::io::Error::other("disk full"));
        assert!(err.source().is_some());
    }
}
