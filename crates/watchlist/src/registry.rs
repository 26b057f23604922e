use crate::error::{Result, WatchlistError};
use crate::types::{WatchlistEntry, PLACEHOLDER_PREFIX};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// Entries per listing page.
pub const PAGE_SIZE: usize = 10;

/// Internal handle of an entry. Ids grow monotonically, so id order is insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

/// Which entries a listing should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Entries whose key is one of these (lowercased) online names
    Online(HashSet<String>),
    /// Entries whose key contains this (lowercased) text
    Matching(String),
}

impl Selection {
    pub fn online<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Online(
            names
                .into_iter()
                .map(|name| name.as_ref().to_lowercase())
                .collect(),
        )
    }

    pub fn matching(text: &str) -> Self {
        Self::Matching(text.to_lowercase())
    }

    /// Interprets a listing word: `all`, `online`, or anything else as a name filter.
    pub fn from_word<I, S>(word: &str, online: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match word {
            "all" => Self::All,
            "online" => Self::online(online),
            other => Self::matching(other),
        }
    }

    fn accepts(&self, entry: &WatchlistEntry) -> bool {
        match self {
            Self::All => true,
            Self::Online(names) => names.contains(&entry.key().to_lowercase()),
            Self::Matching(text) => entry.key().to_lowercase().contains(text.as_str()),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// 1-based page number actually served (after clamping)
    pub number: usize,
    pub total_pages: usize,
    pub total_entries: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            number: self.number,
            total_pages: self.total_pages,
            total_entries: self.total_entries,
            items: self.items.into_iter().map(f).collect(),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }
}

/// Cuts `items` into pages of [`PAGE_SIZE`] and returns the requested one. Out-of-range
/// requests clamp to the nearest page; an empty list is page 1 of 1.
pub fn paginate<T>(items: Vec<T>, page: usize) -> Page<T> {
    let total_entries = items.len();
    let total_pages = total_entries.div_ceil(PAGE_SIZE).max(1);
    let number = page.clamp(1, total_pages);
    let start = (number - 1) * PAGE_SIZE;
    let items = items.into_iter().skip(start).take(PAGE_SIZE).collect();
    Page {
        number,
        total_pages,
        total_entries,
        items,
    }
}

/// In-memory watchlist: entries keyed by [`EntryId`] plus a case-insensitive name index.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<EntryId, WatchlistEntry>,
    by_name: HashMap<String, EntryId>,
    next_id: u64,
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an entry under its own key. Fails if the key is taken (case-insensitively).
    pub fn insert(&mut self, entry: WatchlistEntry) -> Result<EntryId> {
        let name = name_key(entry.key());
        if self.by_name.contains_key(&name) {
            return Err(WatchlistError::invalid_record(
                entry.key(),
                "key already on watchlist",
            ));
        }
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.by_name.insert(name, id);
        self.entries.insert(id, entry);
        Ok(id)
    }

    pub fn id_of(&self, name: &str) -> Option<EntryId> {
        self.by_name.get(&name_key(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&name_key(name))
    }

    pub fn get(&self, name: &str) -> Option<&WatchlistEntry> {
        self.id_of(name).and_then(|id| self.entries.get(&id))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut WatchlistEntry> {
        let id = self.id_of(name)?;
        self.entries.get_mut(&id)
    }

    pub fn entry(&self, id: EntryId) -> Option<&WatchlistEntry> {
        self.entries.get(&id)
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut WatchlistEntry> {
        self.entries.get_mut(&id)
    }

    /// First entry (in insertion order) carrying `uuid`.
    pub fn get_by_uuid(&self, uuid: Uuid) -> Option<&WatchlistEntry> {
        self.ids_with_uuid(uuid)
            .first()
            .and_then(|id| self.entries.get(id))
    }

    /// Every entry carrying `uuid`, in insertion order.
    pub fn ids_with_uuid(&self, uuid: Uuid) -> Vec<EntryId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.uuid == Some(uuid))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Entries whose known IP equals `ip`. An unknown IP matches nothing.
    pub fn find_by_ip(&self, ip: Option<&str>) -> Vec<&WatchlistEntry> {
        self.entries
            .values()
            .filter(|entry| entry.shares_ip_with(ip))
            .collect()
    }

    pub fn ids_with_ip(&self, ip: Option<&str>) -> Vec<EntryId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.shares_ip_with(ip))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn remove(&mut self, name: &str) -> Option<WatchlistEntry> {
        let id = self.id_of(name)?;
        self.remove_id(id)
    }

    pub fn remove_id(&mut self, id: EntryId) -> Option<WatchlistEntry> {
        let entry = self.entries.remove(&id)?;
        self.by_name.remove(&name_key(entry.key()));
        Some(entry)
    }

    /// Moves an entry to a new key. Fails if another entry already owns that key.
    pub fn rekey(&mut self, id: EntryId, new_key: &str) -> Result<()> {
        let new_name = name_key(new_key);
        match self.by_name.get(&new_name) {
            Some(owner) if *owner != id => {
                return Err(WatchlistError::invalid_record(
                    new_key,
                    "key already on watchlist",
                ));
            }
            _ => {}
        }
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| WatchlistError::not_found(new_key))?;
        self.by_name.remove(&name_key(entry.key()));
        entry.set_key(new_key.to_string());
        self.by_name.insert(new_name, id);
        Ok(())
    }

    /// `unknownName<N>` with the smallest N not yet used as a key.
    pub fn next_placeholder_key(&self) -> String {
        (0..)
            .map(|n| format!("{PLACEHOLDER_PREFIX}{n}"))
            .find(|key| !self.contains(key))
            .unwrap_or_else(|| format!("{PLACEHOLDER_PREFIX}{}", self.next_id))
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &WatchlistEntry> {
        self.entries.values()
    }

    /// Selected entries in ascending case-insensitive key order.
    pub fn select(&self, selection: &Selection) -> Vec<&WatchlistEntry> {
        let mut selected: Vec<&WatchlistEntry> = self
            .entries
            .values()
            .filter(|entry| selection.accepts(entry))
            .collect();
        selected.sort_by_cached_key(|entry| entry.key().to_lowercase());
        selected
    }

    pub fn page(&self, selection: &Selection, page: usize) -> Page<&WatchlistEntry> {
        paginate(self.select(selection), page)
    }
}

/// Two registries are equal when they hold the same entries under the same keys,
/// regardless of internal ids.
impl PartialEq for Registry {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|entry| other.get(entry.key()) == Some(entry))
    }
}

impl Eq for Registry {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WatchlistReason;
    use pretty_assertions::assert_eq;

    fn entry(key: &str) -> WatchlistEntry {
        WatchlistEntry::new(
            key,
            None,
            None,
            WatchlistReason::new("griefing", "Mod", key, true),
        )
    }

    fn keys(entries: &[&WatchlistEntry]) -> Vec<String> {
        entries.iter().map(|e| e.key().to_string()).collect()
    }

    #[test]
    fn name_lookup_ignores_case() {
        let mut registry = Registry::new();
        registry.insert(entry("Bob")).unwrap();
        assert!(registry.get("bob").is_some());
        assert!(registry.get("BOB").is_some());
        assert!(registry.insert(entry("bOb")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn select_sorts_case_insensitively() {
        let mut registry = Registry::new();
        for key in ["charlie", "Alice", "bob", "Dave"] {
            registry.insert(entry(key)).unwrap();
        }
        assert_eq!(
            keys(&registry.select(&Selection::All)),
            vec!["Alice", "bob", "charlie", "Dave"]
        );
        assert_eq!(
            keys(&registry.select(&Selection::matching("A"))),
            vec!["Alice", "charlie", "Dave"]
        );
        assert_eq!(
            keys(&registry.select(&Selection::online(["DAVE", "bob", "zed"]))),
            vec!["bob", "Dave"]
        );
    }

    #[test]
    fn selection_words() {
        assert_eq!(Selection::from_word("all", ["x"]), Selection::All);
        assert_eq!(Selection::from_word("online", ["X"]), Selection::online(["x"]));
        assert_eq!(
            Selection::from_word("Gri", Vec::<String>::new()),
            Selection::Matching("gri".into())
        );
    }

    #[test]
    fn pagination_clamps_and_splits() {
        let items: Vec<usize> = (0..23).collect();
        let first = paginate(items.clone(), 1);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.total_pages, 3);
        assert!(!first.has_previous());
        assert!(first.has_next());
        assert_eq!(paginate(items.clone(), 2).items.len(), 10);
        let last = paginate(items.clone(), 3);
        assert_eq!(last.items, vec![20, 21, 22]);
        assert_eq!(paginate(items.clone(), 99), last);
        assert_eq!(paginate(items, 0).number, 1);
    }

    #[test]
    fn empty_listing_is_one_empty_page() {
        let page = paginate(Vec::<usize>::new(), 5);
        assert_eq!(page.number, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_entries, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn exact_multiple_of_page_size_has_no_trailing_page() {
        let page = paginate((0..20).collect::<Vec<_>>(), 9);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.number, 2);
    }

    #[test]
    fn rekey_moves_name_index() {
        let mut registry = Registry::new();
        let id = registry.insert(entry("Old")).unwrap();
        registry.insert(entry("Taken")).unwrap();
        registry.rekey(id, "New").unwrap();
        assert!(registry.get("old").is_none());
        assert_eq!(registry.get("new").map(|e| e.key()), Some("New"));
        assert!(registry.rekey(id, "taken").is_err());
        registry.rekey(id, "NEW").unwrap();
        assert_eq!(registry.get("new").map(|e| e.key()), Some("NEW"));
    }

    #[test]
    fn placeholder_keys_fill_gaps() {
        let mut registry = Registry::new();
        assert_eq!(registry.next_placeholder_key(), "unknownName0");
        registry.insert(entry("unknownName0")).unwrap();
        registry.insert(entry("unknownName2")).unwrap();
        assert_eq!(registry.next_placeholder_key(), "unknownName1");
    }

    #[test]
    fn uuid_and_ip_lookups() {
        let uuid = Uuid::new_v4();
        let mut registry = Registry::new();
        let mut a = entry("A");
        a.uuid = Some(uuid);
        a.ip = Some("1.2.3.4".into());
        let mut b = entry("B");
        b.ip = Some("1.2.3.4".into());
        registry.insert(a).unwrap();
        registry.insert(b).unwrap();
        registry.insert(entry("C")).unwrap();

        assert_eq!(registry.get_by_uuid(uuid).map(|e| e.key()), Some("A"));
        assert!(registry.get_by_uuid(Uuid::new_v4()).is_none());
        assert_eq!(keys(&registry.find_by_ip(Some("1.2.3.4"))), vec!["A", "B"]);
        assert!(registry.find_by_ip(None).is_empty());
    }
}
