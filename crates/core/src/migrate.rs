//! Upgrades legacy global-store layouts to the current one.
//!
//! Rules run from the oldest legacy shape to the newest. A rule only fires
//! when its legacy key holds an array; the data is copied to its new home
//! unless that already holds a non-empty list, and the legacy key is then
//! removed. After the first run nothing legacy is left, so further runs only
//! check that a profile list and a current profile exist.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::Result;
use crate::profiles::default_profile;
use crate::store::registry::{DEFAULT_PROFILE, validate_component};
use crate::store::{self, KeyedStore, StoreRegistry, path};

pub const PROFILES_LIST: &str = "profiles.list";
pub const PROFILES_CURRENT: &str = "profiles.currentId";

const LEGACY_PROFILES: &str = "profiles";
const LEGACY_CURRENT: &str = "currentProfileId";

/// What a migration run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
	/// `legacy -> target` pairs whose data was copied.
	pub moved: Vec<String>,
	/// Legacy keys removed without copying because the target already had data.
	pub discarded: Vec<String>,
	/// Defaults written because the data was missing.
	pub created: Vec<String>,
}

impl MigrationReport {
	pub fn is_empty(&self) -> bool {
		self.moved.is_empty() && self.discarded.is_empty() && self.created.is_empty()
	}
}

/// Runs every rule against the stores in `stores`.
pub fn run(stores: &StoreRegistry) -> Result<MigrationReport> {
	let global = stores.global_store()?;
	let mut report = MigrationReport::default();

	nest_profile_list(&global, &mut report)?;
	rename_current_id(&global, &mut report)?;
	ensure_defaults(&global, &mut report)?;

	let default_store = Lazy::new(stores, DEFAULT_PROFILE);
	for key in ["bookmarks", "history"] {
		move_list(&global, key, &default_store, key, &mut report)?;
	}
	if global.has("profiles.default") {
		for key in ["bookmarks", "history"] {
			let legacy = path::join(["profiles", "default", key]);
			move_list(&global, &legacy, &default_store, key, &mut report)?;
		}
		prune_empty(&global, "profiles.default")?;
	}

	if global.has("profiles.data") {
		for id in listed_ids(&global) {
			let target = Lazy::new(stores, &id);
			for (suffix, key) in [
				(&["bookmarks"][..], "bookmarks"),
				(&["history"][..], "history"),
				(&["session", "tabs"][..], "session.tabs"),
			] {
				let mut segments = vec!["profiles", "data", id.as_str()];
				segments.extend_from_slice(suffix);
				let legacy = path::join(segments);
				move_list(&global, &legacy, &target, key, &mut report)?;
			}
			prune_empty(&global, &path::join(["profiles", "data", id.as_str(), "session"]))?;
			prune_empty(&global, &path::join(["profiles", "data", id.as_str()]))?;
		}
		prune_empty(&global, "profiles.data")?;
	}

	if report.is_empty() {
		debug!(target = "blynx.migrate", "store layout up to date");
	} else {
		info!(
			target = "blynx.migrate",
			moved = ?report.moved,
			discarded = ?report.discarded,
			created = ?report.created,
			"migrated store layout"
		);
	}
	Ok(report)
}

/// Oldest layout kept the profile list as a top-level `profiles` array.
fn nest_profile_list(global: &KeyedStore, report: &mut MigrationReport) -> Result<()> {
	if !global.inspect(LEGACY_PROFILES, |v| matches!(v, Some(Value::Array(_)))) {
		return Ok(());
	}
	global.mutate(|doc| {
		let list = doc.remove(LEGACY_PROFILES).unwrap_or_else(|| json!([]));
		store::insert(doc, &path::split(PROFILES_LIST), list);
	})?;
	report.moved.push(format!("{LEGACY_PROFILES} -> {PROFILES_LIST}"));
	Ok(())
}

fn rename_current_id(global: &KeyedStore, report: &mut MigrationReport) -> Result<()> {
	if !global.has(LEGACY_CURRENT) {
		return Ok(());
	}
	let moved = global.mutate(|doc| {
		let legacy = doc.remove(LEGACY_CURRENT);
		let target = path::split(PROFILES_CURRENT);
		match legacy {
			Some(Value::String(id)) if store::lookup(doc, &target).is_none() => {
				store::insert(doc, &target, Value::String(id));
				true
			}
			_ => false,
		}
	})?;
	if moved {
		report.moved.push(format!("{LEGACY_CURRENT} -> {PROFILES_CURRENT}"));
	} else {
		report.discarded.push(LEGACY_CURRENT.to_string());
	}
	Ok(())
}

fn ensure_defaults(global: &KeyedStore, report: &mut MigrationReport) -> Result<()> {
	let has_list = global.inspect(PROFILES_LIST, |v| matches!(v, Some(Value::Array(list)) if !list.is_empty()));
	if !has_list {
		let list = serde_json::to_value(vec![default_profile()])?;
		global.set(PROFILES_LIST, list)?;
		report.created.push(PROFILES_LIST.to_string());
	}
	let has_current = global.inspect(PROFILES_CURRENT, |v| matches!(v, Some(Value::String(id)) if !id.is_empty()));
	if !has_current {
		global.set(PROFILES_CURRENT, json!(DEFAULT_PROFILE))?;
		report.created.push(PROFILES_CURRENT.to_string());
	}
	Ok(())
}

/// Copies the array at `legacy` in the global store to `key` in `target`
/// unless `key` already holds a non-empty list, then removes `legacy`.
fn move_list(
	global: &KeyedStore,
	legacy: &str,
	target: &Lazy<'_>,
	key: &str,
	report: &mut MigrationReport,
) -> Result<()> {
	let Some(Value::Array(items)) = global.inspect(legacy, |v| v.filter(|v| v.is_array()).cloned()) else {
		return Ok(());
	};
	let store = target.get()?;
	let occupied = store.inspect(key, |v| matches!(v, Some(Value::Array(list)) if !list.is_empty()));
	if occupied {
		report.discarded.push(legacy.to_string());
	} else {
		store.set(key, Value::Array(items))?;
		report.moved.push(format!("{legacy} -> {}:{key}", target.id));
	}
	global.delete(legacy)
}

fn prune_empty(global: &KeyedStore, key: &str) -> Result<()> {
	if global.inspect(key, |v| matches!(v, Some(Value::Object(map)) if map.is_empty())) {
		global.delete(key)?;
	}
	Ok(())
}

/// Ids of listed profiles that can name a store directory.
fn listed_ids(global: &KeyedStore) -> Vec<String> {
	global.inspect(PROFILES_LIST, |list| {
		list.and_then(Value::as_array)
			.into_iter()
			.flatten()
			.filter_map(|p| p.get("id").and_then(Value::as_str))
			.filter(|id| validate_component("profile id", id).is_ok())
			.map(str::to_string)
			.collect()
	})
}

/// Profile store opened on first use, so a run with nothing to move opens
/// no profile stores.
struct Lazy<'a> {
	stores: &'a StoreRegistry,
	id: String,
	store: std::cell::OnceCell<Arc<KeyedStore>>,
}

impl<'a> Lazy<'a> {
	fn new(stores: &'a StoreRegistry, id: &str) -> Self {
		Self {
			stores,
			id: id.to_string(),
			store: std::cell::OnceCell::new(),
		}
	}

	fn get(&self) -> Result<&Arc<KeyedStore>> {
		if let Some(store) = self.store.get() {
			return Ok(store);
		}
		let store = self.stores.profile_store(&self.id)?;
		Ok(self.store.get_or_init(|| store))
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use tempfile::TempDir;

	use super::*;

	fn registry(dir: &TempDir) -> StoreRegistry {
		StoreRegistry::new(dir.path())
	}

	#[test]
	fn fresh_install_gets_default_profile() {
		let dir = TempDir::new().unwrap();
		let stores = registry(&dir);
		let report = run(&stores).unwrap();
		assert_eq!(report.created, vec![PROFILES_LIST, PROFILES_CURRENT]);

		let global = stores.global_store().unwrap();
		let list = global.get(PROFILES_LIST, json!(null));
		assert_eq!(list[0]["id"], json!("default"));
		assert_eq!(list[0]["name"], json!("Default"));
		assert_eq!(global.get(PROFILES_CURRENT, json!(null)), json!("default"));
	}

	#[test]
	fn second_run_changes_nothing() {
		let dir = TempDir::new().unwrap();
		let stores = registry(&dir);
		let global = stores.global_store().unwrap();
		global.set("profiles", json!([{ "id": "default", "name": "Default", "createdAt": "x" }])).unwrap();
		global.set("currentProfileId", json!("default")).unwrap();
		global.set("bookmarks", json!([{ "id": 1, "url": "https://a" }])).unwrap();

		assert!(!run(&stores).unwrap().is_empty());
		let after_first = global.all();
		let profile_after_first = stores.profile_store("default").unwrap().all();

		assert!(run(&stores).unwrap().is_empty());
		assert_eq!(global.all(), after_first);
		assert_eq!(stores.profile_store("default").unwrap().all(), profile_after_first);
	}

	#[test]
	fn legacy_profile_array_is_kept() {
		let dir = TempDir::new().unwrap();
		let stores = registry(&dir);
		let global = stores.global_store().unwrap();
		let legacy = json!([
			{ "id": "default", "name": "Default", "createdAt": "a" },
			{ "id": "user1", "name": "Work", "createdAt": "b" }
		]);
		global.set("profiles", legacy.clone()).unwrap();
		global.set("currentProfileId", json!("user1")).unwrap();

		run(&stores).unwrap();
		assert_eq!(global.get(PROFILES_LIST, json!(null)), legacy);
		assert_eq!(global.get(PROFILES_CURRENT, json!(null)), json!("user1"));
		assert!(!global.has("currentProfileId"));
	}

	#[test]
	fn legacy_current_id_never_overrides_newer() {
		let dir = TempDir::new().unwrap();
		let stores = registry(&dir);
		let global = stores.global_store().unwrap();
		global.set(PROFILES_CURRENT, json!("user2")).unwrap();
		global.set("currentProfileId", json!("user1")).unwrap();

		let report = run(&stores).unwrap();
		assert_eq!(global.get(PROFILES_CURRENT, json!(null)), json!("user2"));
		assert!(!global.has("currentProfileId"));
		assert_eq!(report.discarded, vec!["currentProfileId"]);
	}

	#[test]
	fn global_lists_move_to_default_profile_without_clobbering() {
		let dir = TempDir::new().unwrap();
		let stores = registry(&dir);
		let global = stores.global_store().unwrap();
		let default_store = stores.profile_store("default").unwrap();
		default_store.set("history", json!([{ "id": 9, "url": "https://newer" }])).unwrap();
		global.set("history", json!([{ "id": 1, "url": "https://older" }])).unwrap();
		global.set("bookmarks", json!([{ "id": 2, "url": "https://b" }])).unwrap();

		run(&stores).unwrap();
		assert_eq!(default_store.get("history", json!(null)), json!([{ "id": 9, "url": "https://newer" }]));
		assert_eq!(default_store.get("bookmarks", json!(null)), json!([{ "id": 2, "url": "https://b" }]));
		assert!(!global.has("history"));
		assert!(!global.has("bookmarks"));
	}

	#[test]
	fn non_array_legacy_values_are_left_alone() {
		let dir = TempDir::new().unwrap();
		let stores = registry(&dir);
		let global = stores.global_store().unwrap();
		global.set("bookmarks", json!("not a list")).unwrap();

		run(&stores).unwrap();
		assert_eq!(global.get("bookmarks", json!(null)), json!("not a list"));
		assert!(!stores.profile_store("default").unwrap().has("bookmarks"));
	}

	#[test]
	fn profile_scoped_keys_move_to_their_stores() {
		let dir = TempDir::new().unwrap();
		let stores = registry(&dir);
		let global = stores.global_store().unwrap();
		global
			.set(PROFILES_LIST, json!([{ "id": "default", "name": "Default" }, { "id": "user1", "name": "W" }]))
			.unwrap();
		global.set("profiles.default.bookmarks", json!([{ "id": 1, "url": "https://d" }])).unwrap();
		global.set("profiles.data.user1.history", json!([{ "id": 2, "url": "https://h" }])).unwrap();
		global.set("profiles.data.user1.session.tabs", json!([{ "url": "https://t" }])).unwrap();

		run(&stores).unwrap();
		assert_eq!(
			stores.profile_store("default").unwrap().get("bookmarks", json!(null)),
			json!([{ "id": 1, "url": "https://d" }])
		);
		let user1 = stores.profile_store("user1").unwrap();
		assert_eq!(user1.get("history", json!(null)), json!([{ "id": 2, "url": "https://h" }]));
		assert_eq!(user1.get("session.tabs", json!(null)), json!([{ "url": "https://t" }]));
		assert!(!global.has("profiles.data"));
		assert!(!global.has("profiles.default"));
	}
}
