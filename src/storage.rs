//! Durable key-value storage for the active category and per-category picks.
//!
//! Values are strings, like browser `localStorage`; selections are stored as
//! JSON arrays of source names. [`FileStore`] keeps everything in one JSON
//! object and rewrites it atomically on every change. No locking: the last
//! writer wins.

use crate::error::NewsError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Key holding the last active category.
pub const CATEGORY_KEY: &str = "news_source_category";
/// Unscoped selection key written by older versions.
pub const LEGACY_SELECTION_KEY: &str = "news_source_selected";

const SELECTION_KEY_PREFIX: &str = "news_source_selected_";
const STORAGE_FILE: &str = "storage.json";

/// Storage key of the persisted selection for `category`.
pub fn selection_key(category: &str) -> String {
    format!("{SELECTION_KEY_PREFIX}{category}")
}

/// String-keyed durable storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), NewsError>;
    fn remove(&mut self, key: &str) -> Result<(), NewsError>;

    /// Set several keys as one write.
    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), NewsError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), NewsError> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Decode a persisted selection.
///
/// Anything that is not a JSON array of strings counts as no selection.
pub fn decode_selection(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "Persisted selection is malformed; treating as empty");
            Vec::new()
        }
    }
}

/// Read the selection persisted for `category`, empty when absent or malformed.
pub fn load_selection(store: &impl KeyValueStore, category: &str) -> Vec<String> {
    store
        .get(&selection_key(category))
        .map(|raw| decode_selection(&raw))
        .unwrap_or_default()
}

pub fn save_selection(
    store: &mut impl KeyValueStore,
    category: &str,
    names: &[String],
) -> Result<(), NewsError> {
    let encoded = serde_json::to_string(names)?;
    store.set(&selection_key(category), &encoded)
}

/// Storage backed by `<state_dir>/storage.json`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open (or lazily create) the store inside `state_dir`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and also treated as empty; it gets replaced on the next write.
    #[instrument(level = "debug", skip_all, fields(state_dir = %state_dir.display()))]
    pub fn open(state_dir: &Path) -> Result<Self, NewsError> {
        fs::create_dir_all(state_dir)?;
        let path = state_dir.join(STORAGE_FILE);

        let entries = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Storage file is corrupt; starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(keys = entries.len(), "Loaded storage");
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<(), NewsError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        write_atomic(&self.path, &json)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), NewsError> {
        if self.entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), NewsError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), NewsError> {
        let mut changed = false;
        for (key, value) in entries {
            if self.entries.get(*key).map(String::as_str) != Some(*value) {
                self.entries.insert(key.to_string(), value.to_string());
                changed = true;
            }
        }
        if changed {
            self.flush()?;
        }
        Ok(())
    }
}

/// In-memory store for tests. `writes` counts write calls.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    pub writes: usize,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), NewsError> {
        self.writes += 1;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), NewsError> {
        self.writes += 1;
        self.entries.remove(key);
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), NewsError> {
        self.writes += 1;
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}
