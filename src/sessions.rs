//! Named sessions: saved snapshots of every category's picks.
//!
//! All sessions live in `<state_dir>/sessions.json`, rewritten atomically on
//! each change. Export files have the shape
//! `{ "exported_at": ..., "sessions": [{ "name", "created_at", "data" }] }`;
//! import also accepts a bare list of such entries.

use crate::error::NewsError;
use crate::storage::write_atomic;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const SESSIONS_FILE: &str = "sessions.json";

/// What a session restores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// Category to re-enter after loading.
    #[serde(default)]
    pub category: Option<String>,
    /// Category name -> picked source names.
    #[serde(default)]
    pub selections: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub created_at: String,
    pub data: SessionData,
}

#[derive(Debug, Serialize)]
struct ExportFile<'a> {
    exported_at: String,
    sessions: &'a [Session],
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The saved sessions of one state directory.
#[derive(Debug)]
pub struct SessionBook {
    path: PathBuf,
    sessions: Vec<Session>,
}

impl SessionBook {
    /// Open the book in `state_dir`. A missing file is an empty book; a
    /// corrupt one is logged and treated as empty.
    #[instrument(level = "debug", skip_all, fields(state_dir = %state_dir.display()))]
    pub fn open(state_dir: &Path) -> Result<Self, NewsError> {
        fs::create_dir_all(state_dir)?;
        let path = state_dir.join(SESSIONS_FILE);
        let sessions = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Sessions file is corrupt; starting empty");
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(count = sessions.len(), "Loaded sessions");
        Ok(Self { path, sessions })
    }

    fn flush(&self) -> Result<(), NewsError> {
        let json = serde_json::to_string_pretty(&self.sessions)?;
        write_atomic(&self.path, &json)
    }

    /// Save `data` under `name`, replacing any session of that name.
    pub fn save(&mut self, name: &str, data: SessionData, now: DateTime<Utc>) -> Result<(), NewsError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NewsError::Config("session name cannot be empty".into()));
        }
        let session = Session {
            name: name.to_string(),
            created_at: timestamp(now),
            data,
        };
        match self.sessions.iter_mut().find(|s| s.name == name) {
            Some(existing) => *existing = session,
            None => self.sessions.push(session),
        }
        info!(name, "Saved session");
        self.flush()
    }

    pub fn get(&self, name: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.name == name)
    }

    /// Sessions, newest first.
    pub fn list(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.iter().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    /// Write every session to `path`. Returns how many were written.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn export(&self, path: &Path, now: DateTime<Utc>) -> Result<usize, NewsError> {
        let file = ExportFile {
            exported_at: timestamp(now),
            sessions: &self.sessions,
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(self.sessions.len())
    }

    /// Merge the sessions in `text` into the book.
    ///
    /// Entries without a name or data are skipped. An existing session with
    /// the same name is replaced only when `overwrite` is set. Returns how
    /// many sessions were added or replaced.
    ///
    /// # Errors
    ///
    /// [`NewsError::MalformedData`] unless `text` is a list of sessions or an
    /// object with a `sessions` list.
    pub fn import(&mut self, text: &str, overwrite: bool, now: DateTime<Utc>) -> Result<usize, NewsError> {
        let entries = match serde_json::from_str::<Value>(text)? {
            Value::Array(entries) => entries,
            Value::Object(mut map) => match map.remove("sessions") {
                Some(Value::Array(entries)) => entries,
                _ => {
                    return Err(NewsError::MalformedData(
                        "import file has no \"sessions\" list".into(),
                    ));
                }
            },
            _ => {
                return Err(NewsError::MalformedData(
                    "import file must be a list or contain \"sessions\"".into(),
                ));
            }
        };

        let mut imported = 0;
        for entry in entries {
            let name = entry.get("name").and_then(Value::as_str).unwrap_or_default().trim();
            let data = entry
                .get("data")
                .cloned()
                .map(serde_json::from_value::<SessionData>);
            let data = match (name.is_empty(), data) {
                (false, Some(Ok(data))) => data,
                _ => {
                    warn!(name, "Skipping session without a name or valid data");
                    continue;
                }
            };
            let created_at = entry
                .get("created_at")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| timestamp(now));
            let session = Session {
                name: name.to_string(),
                created_at,
                data,
            };

            match self.sessions.iter_mut().find(|s| s.name == session.name) {
                Some(existing) if overwrite => *existing = session,
                Some(_) => continue,
                None => self.sessions.push(session),
            }
            imported += 1;
        }

        info!(imported, overwrite, "Imported sessions");
        if imported > 0 {
            self.flush()?;
        }
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, hour, 0, 0).unwrap()
    }

    fn data(category: &str, picks: &[&str]) -> SessionData {
        SessionData {
            category: Some(category.to_string()),
            selections: [(
                category.to_string(),
                picks.iter().map(|p| p.to_string()).collect(),
            )]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_save_replaces_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = SessionBook::open(dir.path()).unwrap();
        book.save("morning", data("Tech", &["HN"]), at(8)).unwrap();
        book.save("morning", data("World", &["BBC"]), at(9)).unwrap();
        book.save("evening", data("Tech", &[]), at(18)).unwrap();

        let book = SessionBook::open(dir.path()).unwrap();
        let morning = book.get("morning").unwrap();
        assert_eq!(morning.data, data("World", &["BBC"]));
        assert_eq!(morning.created_at, "2025-05-06T09:00:00Z");
        let names: Vec<_> = book.list().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["evening", "morning"]);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = SessionBook::open(dir.path()).unwrap();
        assert!(matches!(
            book.save("  ", SessionData::default(), at(8)),
            Err(NewsError::Config(_))
        ));
    }

    #[test]
    fn test_export_then_import_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = SessionBook::open(&dir.path().join("a")).unwrap();
        book.save("morning", data("Tech", &["HN"]), at(8)).unwrap();
        let file = dir.path().join("export.json");
        assert_eq!(book.export(&file, at(10)).unwrap(), 1);

        let text = fs::read_to_string(&file).unwrap();
        assert!(text.contains("\"exported_at\": \"2025-05-06T10:00:00Z\""));

        let mut other = SessionBook::open(&dir.path().join("b")).unwrap();
        assert_eq!(other.import(&text, false, at(11)).unwrap(), 1);
        assert_eq!(other.get("morning").unwrap().data, data("Tech", &["HN"]));
    }

    #[test]
    fn test_import_respects_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = SessionBook::open(dir.path()).unwrap();
        book.save("morning", data("Tech", &["HN"]), at(8)).unwrap();
        let incoming = r#"[
            {"name": "morning", "data": {"category": "World", "selections": {"World": ["BBC"]}}},
            {"name": "", "data": {}},
            {"name": "nodata"},
            {"name": "late", "created_at": "2025-05-07T00:00:00Z", "data": {}}
        ]"#;

        assert_eq!(book.import(incoming, false, at(9)).unwrap(), 1);
        assert_eq!(book.get("morning").unwrap().data, data("Tech", &["HN"]));
        assert_eq!(book.get("late").unwrap().created_at, "2025-05-07T00:00:00Z");
        assert!(book.get("nodata").is_none());

        assert_eq!(book.import(incoming, true, at(9)).unwrap(), 2);
        assert_eq!(book.get("morning").unwrap().data, data("World", &["BBC"]));
        assert_eq!(book.get("morning").unwrap().created_at, "2025-05-06T09:00:00Z");
    }

    #[test]
    fn test_import_rejects_unknown_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = SessionBook::open(dir.path()).unwrap();
        for bad in [r#"{"rows": []}"#, "42", "not json"] {
            assert!(
                matches!(book.import(bad, true, at(8)), Err(NewsError::MalformedData(_))),
                "accepted {bad}"
            );
        }
    }
}
