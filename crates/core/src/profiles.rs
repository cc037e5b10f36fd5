//! Profile list and the current-profile pointer.

use std::collections::HashSet;
use std::sync::Arc;

use blynx_protocol::Profile;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::clock::now_iso;
use crate::error::Result;
use crate::migrate::{self, PROFILES_CURRENT, PROFILES_LIST};
use crate::store::registry::DEFAULT_PROFILE;
use crate::store::{KeyedStore, StoreRegistry};

const PARTITION_PREFIX: &str = "persist:blynx-";

/// Session partition holding the cookies and site storage of `profile_id`.
pub fn partition_for(profile_id: &str) -> String {
	format!("{PARTITION_PREFIX}{profile_id}")
}

pub fn default_profile() -> Profile {
	Profile {
		id: DEFAULT_PROFILE.to_string(),
		name: "Default".to_string(),
		created_at: now_iso(),
	}
}

#[derive(Debug)]
pub struct ProfileRegistry {
	stores: Arc<StoreRegistry>,
	/// Lowest `userN` suffix `create` may still hand out in this run.
	next_index: u64,
}

impl ProfileRegistry {
	pub fn new(stores: Arc<StoreRegistry>) -> Self {
		Self { stores, next_index: 1 }
	}

	pub fn list(&self) -> Result<Vec<Profile>> {
		migrate::run(&self.stores)?;
		let global = self.stores.global_store()?;
		Ok(global.inspect(PROFILES_LIST, |list| {
			list.and_then(Value::as_array)
				.into_iter()
				.flatten()
				.filter_map(parse_profile)
				.collect()
		}))
	}

	/// Id of the current profile, after making sure the layout is current.
	pub fn current(&self) -> Result<String> {
		migrate::run(&self.stores)?;
		self.current_id()
	}

	/// Id of the current profile as stored. Falls back to `default`.
	pub fn current_id(&self) -> Result<String> {
		let global = self.stores.global_store()?;
		Ok(global.inspect(PROFILES_CURRENT, |id| match id {
			Some(Value::String(id)) if !id.is_empty() => id.clone(),
			_ => DEFAULT_PROFILE.to_string(),
		}))
	}

	pub fn current_store(&self) -> Result<Arc<KeyedStore>> {
		self.stores.profile_store(&self.current_id()?)
	}

	pub fn exists(&self, profile_id: &str) -> Result<bool> {
		Ok(self.list()?.iter().any(|p| p.id == profile_id))
	}

	/// Adds a profile with the next free `userN` id. An id is free when it is
	/// not listed and has no directory left on disk from a removed profile.
	pub fn create(&mut self, name: Option<&str>) -> Result<Profile> {
		migrate::run(&self.stores)?;
		let global = self.stores.global_store()?;
		let mut list = match global.lookup(PROFILES_LIST) {
			Some(Value::Array(list)) => list,
			_ => Vec::new(),
		};
		let taken: HashSet<&str> = list.iter().filter_map(|p| p.get("id").and_then(Value::as_str)).collect();
		let mut n = self.next_index;
		while !self.is_free(&taken, &format!("user{n}")) {
			n += 1;
		}
		let profile = Profile {
			id: format!("user{n}"),
			name: match name.map(str::trim) {
				Some(name) if !name.is_empty() => name.to_string(),
				_ => format!("Profile {}", list.len() + 1),
			},
			created_at: now_iso(),
		};
		list.push(serde_json::to_value(&profile)?);
		global.set(PROFILES_LIST, Value::Array(list))?;
		self.next_index = n + 1;
		info!(target = "blynx.profiles", id = %profile.id, name = %profile.name, "profile created");
		Ok(profile)
	}

	fn is_free(&self, taken: &HashSet<&str>, id: &str) -> bool {
		!taken.contains(id) && !self.stores.profile_dir(id).exists()
	}

	/// Makes `profile_id` current. Returns `false` when it is not listed.
	pub fn switch(&self, profile_id: &str) -> Result<bool> {
		if !self.exists(profile_id)? {
			warn!(target = "blynx.profiles", id = profile_id, "switch to unknown profile");
			return Ok(false);
		}
		self.stores.global_store()?.set(PROFILES_CURRENT, json!(profile_id))?;
		info!(target = "blynx.profiles", id = profile_id, "profile switched");
		Ok(true)
	}

	/// Removes `profile_id` from the list and forgets its cached stores.
	/// The profile's files stay on disk. Returns `false` for unknown ids and
	/// for `default`, which cannot be removed.
	pub fn remove(&self, profile_id: &str) -> Result<bool> {
		if profile_id == DEFAULT_PROFILE {
			warn!(target = "blynx.profiles", "refusing to remove the default profile");
			return Ok(false);
		}
		migrate::run(&self.stores)?;
		let global = self.stores.global_store()?;
		let removed = global.mutate(|doc| {
			let list = doc
				.get_mut("profiles")
				.and_then(|p| p.get_mut("list"))
				.and_then(Value::as_array_mut);
			let Some(list) = list else {
				return false;
			};
			let before = list.len();
			list.retain(|p| p.get("id").and_then(Value::as_str) != Some(profile_id));
			before != list.len()
		})?;
		if removed {
			self.stores.evict_profile(profile_id);
			info!(target = "blynx.profiles", id = profile_id, "profile removed");
		}
		Ok(removed)
	}
}

/// Reads a stored profile record, tolerating missing name or timestamp.
fn parse_profile(value: &Value) -> Option<Profile> {
	let id = value.get("id")?.as_str().filter(|id| !id.is_empty())?;
	let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
	Some(Profile {
		id: id.to_string(),
		name: text("name").unwrap_or_else(|| id.to_string()),
		created_at: text("createdAt").unwrap_or_default(),
	})
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn registry(dir: &TempDir) -> ProfileRegistry {
		ProfileRegistry::new(Arc::new(StoreRegistry::new(dir.path())))
	}

	#[test]
	fn partition_is_prefixed_id() {
		assert_eq!(partition_for("user1"), "persist:blynx-user1");
		assert_ne!(partition_for("a"), partition_for("b"));
	}

	#[test]
	fn starts_with_default() {
		let dir = TempDir::new().unwrap();
		let profiles = registry(&dir);
		let list = profiles.list().unwrap();
		assert_eq!(list.len(), 1);
		assert_eq!(list[0].id, "default");
		assert_eq!(profiles.current().unwrap(), "default");
	}

	#[test]
	fn create_probes_first_free_id() {
		let dir = TempDir::new().unwrap();
		let mut profiles = registry(&dir);
		let first = profiles.create(None).unwrap();
		assert_eq!(first.id, "user1");
		assert_eq!(first.name, "Profile 2");
		let second = profiles.create(Some("Work")).unwrap();
		assert_eq!(second.id, "user2");
		assert_eq!(second.name, "Work");
	}

	#[test]
	fn removed_ids_are_not_reused_in_the_same_run() {
		let dir = TempDir::new().unwrap();
		let mut profiles = registry(&dir);
		let first = profiles.create(None).unwrap();
		assert!(profiles.remove(&first.id).unwrap());
		assert_eq!(profiles.create(None).unwrap().id, "user2");
	}

	#[test]
	fn leftover_profile_dirs_are_skipped() {
		let dir = TempDir::new().unwrap();
		std::fs::create_dir_all(dir.path().join("user1")).unwrap();
		let mut profiles = registry(&dir);
		assert_eq!(profiles.create(None).unwrap().id, "user2");
	}

	#[test]
	fn switch_rejects_unknown_ids() {
		let dir = TempDir::new().unwrap();
		let mut profiles = registry(&dir);
		assert!(!profiles.switch("ghost").unwrap());
		assert_eq!(profiles.current().unwrap(), "default");

		let created = profiles.create(None).unwrap();
		assert!(profiles.switch(&created.id).unwrap());
		assert_eq!(profiles.current().unwrap(), created.id);
	}

	#[test]
	fn default_cannot_be_removed() {
		let dir = TempDir::new().unwrap();
		let profiles = registry(&dir);
		assert!(!profiles.remove("default").unwrap());
		assert!(!profiles.remove("ghost").unwrap());
	}

	#[test]
	fn malformed_entries_are_skipped() {
		let dir = TempDir::new().unwrap();
		let stores = Arc::new(StoreRegistry::new(dir.path()));
		stores
			.global_store()
			.unwrap()
			.set(PROFILES_LIST, json!([{ "id": "default" }, 7, { "name": "no id" }]))
			.unwrap();
		let list = ProfileRegistry::new(stores).list().unwrap();
		assert_eq!(list.len(), 1);
		assert_eq!(list[0].name, "default");
	}
}
