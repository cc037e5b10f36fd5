//! `storage.local` / `storage.sync` for extensions.
//!
//! Each `(profile, extension)` pair has its own store; an area is the object
//! under the area name in that store. Keys are single segments, so a key
//! containing dots stays one flat key.

use blynx_protocol::{BroadcastEvent, KeysSpec, StorageArea, StorageChange, StorageChanges};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::notifier::ChangeNotifier;
use crate::store::{self, KeyedStore, StoreRegistry};

/// Storage API of the extensions in one profile.
pub struct ExtensionStorage<'a> {
	stores: &'a StoreRegistry,
	notifier: &'a ChangeNotifier,
	profile_id: &'a str,
}

impl<'a> ExtensionStorage<'a> {
	pub fn new(stores: &'a StoreRegistry, notifier: &'a ChangeNotifier, profile_id: &'a str) -> Self {
		Self {
			stores,
			notifier,
			profile_id,
		}
	}

	pub fn get(&self, extension_id: Option<&str>, area: StorageArea, keys: KeysSpec) -> Result<Map<String, Value>> {
		let Some(store) = self.store(extension_id)? else {
			return Ok(Map::new());
		};
		Ok(store.inspect(area.as_str(), |stored| {
			let stored = stored.and_then(Value::as_object);
			let value_of = |key: &str| stored.and_then(|area| area.get(key)).cloned();
			match keys {
				KeysSpec::All => stored.cloned().unwrap_or_default(),
				KeysSpec::One(key) => value_of(&key).map(|v| Map::from_iter([(key, v)])).unwrap_or_default(),
				KeysSpec::Many(keys) => keys
					.into_iter()
					.filter_map(|key| value_of(&key).map(|v| (key, v)))
					.collect(),
				KeysSpec::Defaults(defaults) => defaults
					.into_iter()
					.map(|(key, default)| {
						let value = value_of(&key).unwrap_or(default);
						(key, value)
					})
					.collect(),
			}
		}))
	}

	/// Writes `items` and reports the keys whose value changed.
	pub fn set(&self, extension_id: Option<&str>, area: StorageArea, items: Map<String, Value>) -> Result<StorageChanges> {
		let Some(store) = self.store(extension_id)? else {
			return Ok(StorageChanges::new());
		};
		let changes: StorageChanges = store.inspect(area.as_str(), |stored| {
			let stored = stored.and_then(Value::as_object);
			items
				.iter()
				.filter_map(|(key, new)| {
					let old = stored.and_then(|area| area.get(key));
					(old != Some(new)).then(|| {
						(key.clone(), StorageChange {
							old_value: old.cloned(),
							new_value: Some(new.clone()),
						})
					})
				})
				.collect()
		});
		if changes.is_empty() {
			return Ok(changes);
		}
		store.mutate(|doc| {
			for (key, change) in &changes {
				if let Some(value) = &change.new_value {
					store::insert(doc, &[area.as_str(), key.as_str()], value.clone());
				}
			}
		})?;
		self.announce(extension_id, area, &changes);
		Ok(changes)
	}

	pub fn remove(&self, extension_id: Option<&str>, area: StorageArea, keys: Vec<String>) -> Result<StorageChanges> {
		let Some(store) = self.store(extension_id)? else {
			return Ok(StorageChanges::new());
		};
		let changes: StorageChanges = store.inspect(area.as_str(), |stored| {
			let stored = stored.and_then(Value::as_object);
			keys.into_iter()
				.filter_map(|key| {
					let old = stored.and_then(|area| area.get(&key)).cloned()?;
					Some((key, StorageChange {
						old_value: Some(old),
						new_value: None,
					}))
				})
				.collect()
		});
		if changes.is_empty() {
			return Ok(changes);
		}
		store.mutate(|doc| {
			for key in changes.keys() {
				store::remove(doc, &[area.as_str(), key.as_str()]);
			}
		})?;
		self.announce(extension_id, area, &changes);
		Ok(changes)
	}

	/// Empties the area, reporting every key it held.
	pub fn clear(&self, extension_id: Option<&str>, area: StorageArea) -> Result<StorageChanges> {
		let Some(store) = self.store(extension_id)? else {
			return Ok(StorageChanges::new());
		};
		let changes: StorageChanges = store.inspect(area.as_str(), |stored| {
			stored
				.and_then(Value::as_object)
				.into_iter()
				.flatten()
				.map(|(key, old)| {
					(key.clone(), StorageChange {
						old_value: Some(old.clone()),
						new_value: None,
					})
				})
				.collect()
		});
		if store.has(area.as_str()) {
			store.delete(area.as_str())?;
		}
		if !changes.is_empty() {
			self.announce(extension_id, area, &changes);
		}
		Ok(changes)
	}

	/// Store of the extension, or `None` when no extension id was supplied.
	fn store(&self, extension_id: Option<&str>) -> Result<Option<std::sync::Arc<KeyedStore>>> {
		match extension_id.filter(|id| !id.is_empty()) {
			Some(id) => self.stores.extension_store(self.profile_id, id).map(Some),
			None => {
				debug!(target = "blynx.extensions", "storage call without extension id ignored");
				Ok(None)
			}
		}
	}

	fn announce(&self, extension_id: Option<&str>, area: StorageArea, changes: &StorageChanges) {
		let Some(extension_id) = extension_id else {
			return;
		};
		self.notifier.publish(BroadcastEvent::ExtStorageChanged {
			extension_id: extension_id.to_string(),
			area_name: area,
			changes: changes.clone(),
		});
	}
}
