//! Bookmarks, history and saved session tabs of one profile.

use blynx_protocol::{Bookmark, HistoryEntry, PageRef};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::clock::{IdClock, now_iso};
use crate::error::Result;
use crate::store::KeyedStore;

pub const BOOKMARKS: &str = "bookmarks";
pub const HISTORY: &str = "history";
pub const SESSION_TABS: &str = "session.tabs";

/// Most history entries kept per profile.
pub const HISTORY_LIMIT: usize = 1000;

/// Fields assigned here that a caller cannot override.
const RESERVED: &[&str] = &["id", "createdAt", "visitedAt"];

/// Browsing data view over a profile store.
pub struct BrowsingData<'a> {
	store: &'a KeyedStore,
	ids: &'a IdClock,
}

impl<'a> BrowsingData<'a> {
	pub fn new(store: &'a KeyedStore, ids: &'a IdClock) -> Self {
		Self { store, ids }
	}

	pub fn bookmarks(&self) -> Vec<Bookmark> {
		read_list(self.store, BOOKMARKS)
	}

	/// Appends `page` unless a bookmark with the same url exists.
	pub fn add_bookmark(&self, page: PageRef) -> Result<Vec<Bookmark>> {
		let mut bookmarks = self.bookmarks();
		if bookmarks.iter().any(|b| b.url == page.url) {
			return Ok(bookmarks);
		}
		bookmarks.push(Bookmark {
			id: self.ids.next_id(),
			url: page.url,
			title: page.title,
			created_at: now_iso(),
			extra: strip_reserved(page.extra),
		});
		write_list(self.store, BOOKMARKS, &bookmarks)?;
		Ok(bookmarks)
	}

	pub fn remove_bookmark(&self, id: i64) -> Result<Vec<Bookmark>> {
		let mut bookmarks = self.bookmarks();
		let before = bookmarks.len();
		bookmarks.retain(|b| b.id != id);
		if bookmarks.len() != before {
			write_list(self.store, BOOKMARKS, &bookmarks)?;
		}
		Ok(bookmarks)
	}

	/// Newest first.
	pub fn history(&self) -> Vec<HistoryEntry> {
		read_list(self.store, HISTORY)
	}

	/// Replaces the history with `history` as given. Anything but an array
	/// stores an empty history. Entries that cannot be read back are kept in
	/// the store but left out of the returned list.
	pub fn set_history(&self, history: Value) -> Result<Vec<HistoryEntry>> {
		let history = if history.is_array() { history } else { Value::Array(Vec::new()) };
		let items = history.as_array().cloned().unwrap_or_default();
		let stored = items.len();
		let entries: Vec<HistoryEntry> = parse_entries(items);
		if entries.len() != stored {
			warn!(
				target = "blynx.store",
				unreadable = stored - entries.len(),
				"history stored with entries lacking an id or url"
			);
		}
		self.store.set(HISTORY, history)?;
		Ok(entries)
	}

	/// Records a visit at the head of the history. An earlier visit to the
	/// same url is dropped and the list is capped at [`HISTORY_LIMIT`].
	pub fn add_history(&self, page: PageRef) -> Result<Vec<HistoryEntry>> {
		let mut history = self.history();
		history.retain(|h| h.url != page.url);
		history.insert(0, HistoryEntry {
			id: self.ids.next_id(),
			url: page.url,
			title: page.title,
			visited_at: now_iso(),
			extra: strip_reserved(page.extra),
		});
		history.truncate(HISTORY_LIMIT);
		write_list(self.store, HISTORY, &history)?;
		Ok(history)
	}

	pub fn clear_history(&self) -> Result<()> {
		write_list::<HistoryEntry>(self.store, HISTORY, &[])
	}

	/// Tabs saved for session restore, as the window stored them.
	pub fn session_tabs(&self) -> Vec<Value> {
		self.store.inspect(SESSION_TABS, |tabs| {
			tabs.and_then(Value::as_array).cloned().unwrap_or_default()
		})
	}

	pub fn set_session_tabs(&self, tabs: Value) -> Result<()> {
		let tabs = if tabs.is_array() { tabs } else { Value::Array(Vec::new()) };
		self.store.set(SESSION_TABS, tabs)
	}
}

fn read_list<T: DeserializeOwned>(store: &KeyedStore, key: &str) -> Vec<T> {
	store.inspect(key, |value| match value {
		Some(Value::Array(items)) => parse_entries(items.iter().cloned()),
		_ => Vec::new(),
	})
}

fn parse_entries<T: DeserializeOwned>(items: impl IntoIterator<Item = Value>) -> Vec<T> {
	items
		.into_iter()
		.filter_map(|item| match serde_json::from_value(item) {
			Ok(entry) => Some(entry),
			Err(err) => {
				debug!(target = "blynx.store", error = %err, "skipping malformed entry");
				None
			}
		})
		.collect()
}

fn write_list<T: Serialize>(store: &KeyedStore, key: &str, items: &[T]) -> Result<()> {
	store.set(key, serde_json::to_value(items)?)
}

fn strip_reserved(mut extra: Map<String, Value>) -> Map<String, Value> {
	for key in RESERVED {
		extra.remove(*key);
	}
	extra
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use tempfile::TempDir;

	use super::*;

	fn page(url: &str) -> PageRef {
		PageRef::new(url, format!("title of {url}"))
	}

	#[test]
	fn bookmarks_dedupe_by_url() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let ids = IdClock::new();
		let data = BrowsingData::new(&store, &ids);

		data.add_bookmark(page("https://a")).unwrap();
		let list = data.add_bookmark(page("https://a")).unwrap();
		assert_eq!(list.len(), 1);

		let list = data.add_bookmark(page("https://b")).unwrap();
		assert_eq!(list.len(), 2);
		let list = data.remove_bookmark(list[0].id).unwrap();
		assert_eq!(list.iter().map(|b| b.url.as_str()).collect::<Vec<_>>(), vec!["https://b"]);
		assert_eq!(data.remove_bookmark(-1).unwrap().len(), 1);
	}

	#[test]
	fn extra_fields_survive_but_ids_are_assigned() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let ids = IdClock::new();
		let data = BrowsingData::new(&store, &ids);

		let mut input = page("https://a");
		input.extra.insert("favicon".into(), json!("https://a/icon.png"));
		input.extra.insert("id".into(), json!(5));
		let list = data.add_bookmark(input).unwrap();
		assert_eq!(list[0].extra.get("favicon"), Some(&json!("https://a/icon.png")));
		assert_ne!(list[0].id, 5);
		assert!(!list[0].created_at.is_empty());
	}

	#[test]
	fn history_moves_revisit_to_head_and_caps() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let ids = IdClock::new();
		let data = BrowsingData::new(&store, &ids);

		let seeded: Vec<Value> = (0..HISTORY_LIMIT)
			.map(|i| json!({ "id": i, "url": format!("https://{i}"), "title": "", "visitedAt": "" }))
			.collect();
		data.set_history(Value::Array(seeded)).unwrap();

		let list = data.add_history(page("https://500")).unwrap();
		assert_eq!(list.len(), HISTORY_LIMIT);
		assert_eq!(list[0].url, "https://500");
		assert_eq!(list.iter().filter(|h| h.url == "https://500").count(), 1);

		let list = data.add_history(page("https://new")).unwrap();
		assert_eq!(list.len(), HISTORY_LIMIT);
		assert_eq!(list[0].url, "https://new");
		assert_eq!(list[1].url, "https://500");
		assert_eq!(list.last().map(|h| h.url.as_str()), Some("https://998"));
	}

	#[test]
	fn non_array_history_is_coerced_empty() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let ids = IdClock::new();
		let data = BrowsingData::new(&store, &ids);

		assert!(data.set_history(json!("garbage")).unwrap().is_empty());
		store.set(HISTORY, json!({ "not": "a list" })).unwrap();
		assert!(data.history().is_empty());
		store.set(HISTORY, json!([{ "url": "missing id" }, { "id": 1, "url": "https://ok" }])).unwrap();
		assert_eq!(data.history().len(), 1);
	}

	#[test]
	fn set_history_keeps_unreadable_entries_on_disk() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let ids = IdClock::new();
		let data = BrowsingData::new(&store, &ids);

		let raw = json!([{ "url": "https://no-id" }, { "id": 2, "url": "https://ok", "title": "" }, 7]);
		let entries = data.set_history(raw.clone()).unwrap();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].url, "https://ok");
		assert_eq!(store.get(HISTORY, json!(null)), raw);
	}

	#[test]
	fn session_tabs_round_trip() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let ids = IdClock::new();
		let data = BrowsingData::new(&store, &ids);

		assert!(data.session_tabs().is_empty());
		data.set_session_tabs(json!([{ "url": "https://a", "active": true }])).unwrap();
		assert_eq!(data.session_tabs(), vec![json!({ "url": "https://a", "active": true })]);
	}
}
