//! Source selection session.
//!
//! [`SourceSelector`] owns everything the selection UI needs for one run: the
//! catalog, the active category and its options, the current picks, the
//! query, and the per-category snapshot used to work out which sources a
//! change newly added. Every change is written through to the
//! [`KeyValueStore`] before the call returns, so what is persisted for a
//! category always equals the selection after the last change.

use crate::error::NewsError;
use crate::models::{Category, SourceCatalog};
use crate::sessions::SessionData;
use crate::storage::{
    CATEGORY_KEY, KeyValueStore, LEGACY_SELECTION_KEY, decode_selection, load_selection,
    save_selection, selection_key,
};
use crate::urls::build_urls;
use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
pub struct SourceSelector<S: KeyValueStore> {
    catalog: SourceCatalog,
    store: S,
    category: Option<String>,
    options: Vec<String>,
    selected: Vec<String>,
    snapshots: HashMap<String, Vec<String>>,
    query: String,
}

impl<S: KeyValueStore> SourceSelector<S> {
    /// Start a session over `catalog`, migrating the unscoped legacy key if
    /// one is still present.
    pub fn new(catalog: SourceCatalog, store: S) -> Self {
        let mut selector = Self {
            catalog,
            store,
            category: None,
            options: Vec::new(),
            selected: Vec::new(),
            snapshots: HashMap::new(),
            query: String::new(),
        };
        if let Err(e) = selector.migrate_legacy_selection() {
            warn!(error = %e, "Legacy selection migration failed");
        }
        selector
    }

    /// Seed per-category keys from the old unscoped selection, then drop it.
    fn migrate_legacy_selection(&mut self) -> Result<(), NewsError> {
        let Some(raw) = self.store.get(LEGACY_SELECTION_KEY) else {
            return Ok(());
        };
        let legacy = decode_selection(&raw);

        for category in self.catalog.categories() {
            if self.store.get(&selection_key(&category.name)).is_some() {
                continue;
            }
            let seeded: Vec<String> = category
                .source_names()
                .filter(|name| legacy.iter().any(|l| l == name))
                .map(str::to_string)
                .collect();
            if !seeded.is_empty() {
                info!(category = %category.name, count = seeded.len(), "Migrated legacy selection");
                save_selection(&mut self.store, &category.name, &seeded)?;
            }
        }
        self.store.remove(LEGACY_SELECTION_KEY)
    }

    /// Re-enter the last persisted category, or the first one.
    pub fn restore(&mut self) -> Result<(), NewsError> {
        let last = self.store.get(CATEGORY_KEY).unwrap_or_default();
        self.select_category(&last)
    }

    /// Switch to `name`, falling back to the first category when unknown.
    ///
    /// Options are rebuilt in catalog order; an option starts selected iff
    /// its name is in the persisted selection for the category. The result
    /// and the active category are persisted.
    #[instrument(level = "debug", skip(self))]
    pub fn select_category(&mut self, name: &str) -> Result<(), NewsError> {
        let category = match self.catalog.category(name) {
            Some(category) => category,
            None => {
                let first = self
                    .catalog
                    .first_category()
                    .ok_or_else(|| NewsError::MalformedData("catalog has no categories".into()))?;
                if !name.is_empty() {
                    warn!(requested = name, fallback = %first.name, "Unknown category");
                }
                first
            }
        };

        let persisted = load_selection(&self.store, &category.name);
        let options: Vec<String> = category.source_names().map(str::to_string).collect();
        let selected: Vec<String> = options
            .iter()
            .filter(|option| persisted.contains(option))
            .cloned()
            .collect();
        let category_name = category.name.clone();

        debug!(
            category = %category_name,
            options = options.len(),
            restored = selected.len(),
            "Populated sources"
        );

        let encoded = serde_json::to_string(&selected)?;
        self.store.set_many(&[
            (selection_key(&category_name).as_str(), encoded.as_str()),
            (CATEGORY_KEY, category_name.as_str()),
        ])?;

        self.snapshots.insert(category_name.clone(), selected.clone());
        self.options = options;
        self.selected = selected;
        self.category = Some(category_name);
        Ok(())
    }

    /// Replace the selection with `changed`, returning the newly added names.
    ///
    /// Names outside the current option list are ignored. The selection is
    /// kept in option order and persisted; the delta is computed against the
    /// snapshot taken at the previous change for this category.
    pub fn toggle_selection<I, T>(&mut self, changed: I) -> Result<Vec<String>, NewsError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let category = self.require_category()?.to_string();
        let changed: Vec<T> = changed.into_iter().collect();

        for name in &changed {
            if !self.options.iter().any(|o| o == name.as_ref()) {
                warn!(source = name.as_ref(), %category, "Ignoring unknown source");
            }
        }
        let selected: Vec<String> = self
            .options
            .iter()
            .filter(|option| changed.iter().any(|c| c.as_ref() == option.as_str()))
            .cloned()
            .collect();

        save_selection(&mut self.store, &category, &selected)?;

        let previous = self.snapshots.get(&category).cloned().unwrap_or_default();
        let added: Vec<String> = selected
            .iter()
            .filter(|name| !previous.contains(name))
            .cloned()
            .collect();

        info!(%category, selected = selected.len(), added = added.len(), "Selection changed");
        self.snapshots.insert(category, selected.clone());
        self.selected = selected;
        Ok(added)
    }

    /// Flip membership of each named source, then apply it as a change.
    pub fn flip<I, T>(&mut self, names: I) -> Result<Vec<String>, NewsError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut next = self.selected.clone();
        for name in names.into_iter().map(|n| n.as_ref().to_string()).unique() {
            if let Some(pos) = next.iter().position(|s| *s == name) {
                next.remove(pos);
            } else {
                next.push(name);
            }
        }
        self.toggle_selection(next)
    }

    /// Select every option of the current category. Never launches.
    pub fn select_all(&mut self) -> Result<(), NewsError> {
        let all = self.options.clone();
        self.toggle_selection(all).map(|_| ())
    }

    /// Deselect every option of the current category. Never launches.
    pub fn clear_all(&mut self) -> Result<(), NewsError> {
        self.toggle_selection(Vec::<String>::new()).map(|_| ())
    }

    /// Options whose name contains `filter`, ignoring case. A blank filter
    /// matches everything.
    pub fn matching_options(&self, filter: &str) -> Vec<&str> {
        let needle = filter.trim().to_lowercase();
        self.options
            .iter()
            .map(String::as_str)
            .filter(|name| needle.is_empty() || name.to_lowercase().contains(&needle))
            .collect()
    }

    /// The active category and the persisted picks of every category.
    pub fn snapshot(&self) -> SessionData {
        let selections = self
            .catalog
            .categories()
            .iter()
            .filter_map(|category| {
                let picks = load_selection(&self.store, &category.name);
                (!picks.is_empty()).then(|| (category.name.clone(), picks))
            })
            .collect();
        SessionData {
            category: self.category.clone(),
            selections,
        }
    }

    /// Replace every category's picks with those in `data`, then re-enter
    /// its category.
    ///
    /// Categories missing from `data` end up with nothing picked. Names the
    /// catalog does not know are dropped.
    #[instrument(level = "debug", skip_all)]
    pub fn apply(&mut self, data: &SessionData) -> Result<(), NewsError> {
        for category in self.catalog.categories() {
            let wanted = data.selections.get(&category.name);
            let picks: Vec<String> = category
                .source_names()
                .filter(|name| wanted.is_some_and(|w| w.iter().any(|n| n == name)))
                .map(str::to_string)
                .collect();
            save_selection(&mut self.store, &category.name, &picks)?;
        }
        self.snapshots.clear();
        self.select_category(data.category.as_deref().unwrap_or_default())
    }

    /// URLs for the current picks and query, in selection order.
    pub fn urls(&self) -> Vec<String> {
        self.urls_for(&self.selected)
    }

    /// URLs for an arbitrary subset of the current category, e.g. a toggle delta.
    pub fn urls_for(&self, names: &[String]) -> Vec<String> {
        match &self.category {
            Some(category) => build_urls(&self.catalog, category, &self.query, names),
            None => Vec::new(),
        }
    }

    fn require_category(&self) -> Result<&str, NewsError> {
        self.category
            .as_deref()
            .ok_or_else(|| NewsError::MalformedData("no category selected".into()))
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn category(&self) -> Option<&Category> {
        self.category
            .as_deref()
            .and_then(|name| self.catalog.category(name))
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    #[cfg(test)]
    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn catalog() -> SourceCatalog {
        SourceCatalog::from_json(
            r#"{
                "Tech": {
                    "HN": "https://hn.test/?q={query}",
                    "Lobsters": "https://lobste.rs/search?q={query}",
                    "Slashdot": "https://slashdot.test/index2.pl?fhfilter={query}"
                },
                "World": {
                    "BBC": "https://www.bbc.co.uk/search?q={query}",
                    "NPR": "https://www.npr.org/search?query={query}"
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_options_follow_catalog_order() {
        let catalog = catalog();
        let mut selector = SourceSelector::new(catalog.clone(), MemoryStore::default());
        for category in catalog.categories() {
            selector.select_category(&category.name).unwrap();
            let expected: Vec<_> = category.source_names().collect();
            assert_eq!(selector.options(), expected.as_slice());
        }
    }

    #[test]
    fn test_unknown_category_falls_back_to_first() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        selector.select_category("Sports").unwrap();
        assert_eq!(selector.category().unwrap().name, "Tech");

        let store = selector.into_store();
        assert_eq!(store.get(CATEGORY_KEY).as_deref(), Some("Tech"));
    }

    #[test]
    fn test_selection_survives_reload() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        selector.select_category("World").unwrap();
        selector.toggle_selection(["NPR", "BBC"]).unwrap();
        let store = selector.into_store();

        let mut reloaded = SourceSelector::new(catalog(), store);
        reloaded.restore().unwrap();
        assert_eq!(reloaded.category().unwrap().name, "World");
        assert_eq!(reloaded.selected(), ["BBC", "NPR"]);

        reloaded.select_category("Tech").unwrap();
        assert!(reloaded.selected().is_empty());
        reloaded.select_category("World").unwrap();
        assert_eq!(reloaded.selected(), ["BBC", "NPR"]);
    }

    #[test]
    fn test_persisted_equals_selection_after_change() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        selector.select_category("Tech").unwrap();
        selector.toggle_selection(["Slashdot", "HN", "Digg"]).unwrap();
        assert_eq!(selector.selected(), ["HN", "Slashdot"]);

        let store = selector.into_store();
        assert_eq!(load_selection(&store, "Tech"), ["HN", "Slashdot"]);
    }

    #[test]
    fn test_toggle_returns_only_new_entries() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        selector.select_category("Tech").unwrap();

        assert_eq!(selector.toggle_selection(["HN"]).unwrap(), ["HN"]);
        assert_eq!(
            selector.toggle_selection(["HN", "Lobsters"]).unwrap(),
            ["Lobsters"]
        );
        assert!(selector.toggle_selection(["Lobsters"]).unwrap().is_empty());
        assert_eq!(selector.flip(["HN", "Lobsters"]).unwrap(), ["HN"]);
        assert_eq!(selector.selected(), ["HN"]);
    }

    #[test]
    fn test_select_all_persists_every_option() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        selector.select_category("World").unwrap();
        selector.select_all().unwrap();
        assert_eq!(selector.selected(), ["BBC", "NPR"]);
        assert_eq!(load_selection(&selector.into_store(), "World"), ["BBC", "NPR"]);
    }

    #[test]
    fn test_clear_all_persists_empty_selection() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        selector.select_category("World").unwrap();
        selector.select_all().unwrap();
        selector.clear_all().unwrap();
        assert!(selector.selected().is_empty());
        assert!(selector.urls().is_empty());
        assert!(load_selection(&selector.into_store(), "World").is_empty());
    }

    #[test]
    fn test_matching_options_ignores_case() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        selector.select_category("Tech").unwrap();
        assert_eq!(selector.matching_options("LOB"), ["Lobsters"]);
        assert_eq!(selector.matching_options("s"), ["Lobsters", "Slashdot"]);
        assert_eq!(selector.matching_options("  ").len(), 3);
        assert!(selector.matching_options("digg").is_empty());
    }

    #[test]
    fn test_category_switch_is_one_write() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        selector.select_category("World").unwrap();
        let store = selector.into_store();
        assert_eq!(store.writes, 1);
        assert_eq!(store.get(CATEGORY_KEY).as_deref(), Some("World"));
        assert!(store.get(&selection_key("World")).is_some());
    }

    #[test]
    fn test_snapshot_then_apply_restores_picks() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        selector.select_category("Tech").unwrap();
        selector.toggle_selection(["HN"]).unwrap();
        selector.select_category("World").unwrap();
        selector.toggle_selection(["NPR"]).unwrap();
        let saved = selector.snapshot();
        assert_eq!(saved.category.as_deref(), Some("World"));
        assert_eq!(saved.selections.len(), 2);

        selector.select_all().unwrap();
        selector.select_category("Tech").unwrap();
        selector.toggle_selection(["Lobsters"]).unwrap();

        selector.apply(&saved).unwrap();
        assert_eq!(selector.category().unwrap().name, "World");
        assert_eq!(selector.selected(), ["NPR"]);
        let store = selector.into_store();
        assert_eq!(load_selection(&store, "Tech"), ["HN"]);
    }

    #[test]
    fn test_apply_drops_unknown_names() {
        let mut selector = SourceSelector::new(catalog(), MemoryStore::default());
        let data = SessionData {
            category: Some("Gone".into()),
            selections: [("Tech".to_string(), vec!["Digg".to_string(), "HN".to_string()])]
                .into_iter()
                .collect(),
        };
        selector.apply(&data).unwrap();
        assert_eq!(selector.category().unwrap().name, "Tech");
        assert_eq!(selector.selected(), ["HN"]);
    }

    #[test]
    fn test_malformed_persisted_selection_is_empty() {
        let mut store = MemoryStore::default();
        store.set(&selection_key("Tech"), r#"{"HN": true}"#).unwrap();

        let mut selector = SourceSelector::new(catalog(), store);
        selector.select_category("Tech").unwrap();
        assert!(selector.selected().is_empty());
        assert_eq!(selector.options().len(), 3);
    }

    #[test]
    fn test_stale_persisted_names_are_not_restored() {
        let mut store = MemoryStore::default();
        store.set(&selection_key("Tech"), r#"["Digg"]"#).unwrap();

        let mut selector = SourceSelector::new(catalog(), store);
        selector.select_category("Tech").unwrap();
        assert!(selector.selected().is_empty());
    }

    #[test]
    fn test_legacy_selection_is_migrated_by_name() {
        let mut store = MemoryStore::default();
        store.set(LEGACY_SELECTION_KEY, r#"["NPR", "HN", "Gone"]"#).unwrap();
        store.set(&selection_key("World"), r#"["BBC"]"#).unwrap();

        let selector = SourceSelector::new(catalog(), store);
        let store = selector.into_store();
        assert_eq!(store.get(LEGACY_SELECTION_KEY), None);
        assert_eq!(load_selection(&store, "Tech"), ["HN"]);
        assert_eq!(load_selection(&store, "World"), ["BBC"]);
    }

    #[test]
    fn test_scenario_single_source_url() {
        let catalog = SourceCatalog::from_json(r#"{"Tech": {"HN": "https://hn.test/?q={query}"}}"#)
            .unwrap();
        let mut selector = SourceSelector::new(catalog, MemoryStore::default());
        selector.select_category("Tech").unwrap();
        selector.toggle_selection(["HN"]).unwrap();
        selector.set_query("rust");
        assert_eq!(selector.urls(), ["https://hn.test/?q=rust"]);
    }

    #[test]
    fn test_empty_catalog_cannot_select() {
        let mut selector = SourceSelector::new(SourceCatalog::default(), MemoryStore::default());
        assert!(matches!(
            selector.select_category("Tech"),
            Err(NewsError::MalformedData(_))
        ));
        assert!(selector.urls().is_empty());
    }
}
