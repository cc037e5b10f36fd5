//! Lazily opened, cached store handles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::KeyedStore;
use crate::error::{Error, Result};

/// Directory of the process-wide store.
pub const GLOBAL_DIR: &str = "global";
/// Per-profile directory holding one store per extension.
pub const EXT_STORAGE_DIR: &str = "ext-storage";
/// Profile used when none is named.
pub const DEFAULT_PROFILE: &str = "default";

/// Identity map from store key to open [`KeyedStore`].
///
/// Asking twice for the same key returns the same handle for the lifetime of
/// the registry, so every window writes through one in-memory document.
#[derive(Debug)]
pub struct StoreRegistry {
	root: PathBuf,
	global: Mutex<Option<Arc<KeyedStore>>>,
	profiles: DashMap<String, Arc<KeyedStore>>,
	extensions: DashMap<(String, String), Arc<KeyedStore>>,
}

impl StoreRegistry {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			global: Mutex::new(None),
			profiles: DashMap::new(),
			extensions: DashMap::new(),
		}
	}

	/// User data directory all stores live under.
	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn global_store(&self) -> Result<Arc<KeyedStore>> {
		let mut slot = self.global.lock();
		if let Some(store) = slot.as_ref() {
			return Ok(Arc::clone(store));
		}
		let store = Arc::new(KeyedStore::open(&self.root.join(GLOBAL_DIR))?);
		*slot = Some(Arc::clone(&store));
		Ok(store)
	}

	/// Store of `profile_id`; an empty id means the default profile.
	pub fn profile_store(&self, profile_id: &str) -> Result<Arc<KeyedStore>> {
		let id = normalize(profile_id);
		validate_component("profile id", id)?;
		if let Some(store) = self.profiles.get(id) {
			return Ok(Arc::clone(store.value()));
		}
		let entry = self
			.profiles
			.entry(id.to_string())
			.or_try_insert_with(|| KeyedStore::open(&self.profile_dir(id)).map(Arc::new))?;
		Ok(Arc::clone(entry.value()))
	}

	pub fn extension_store(&self, profile_id: &str, extension_id: &str) -> Result<Arc<KeyedStore>> {
		let profile = normalize(profile_id);
		validate_component("profile id", profile)?;
		validate_component("extension id", extension_id)?;
		let key = (profile.to_string(), extension_id.to_string());
		if let Some(store) = self.extensions.get(&key) {
			return Ok(Arc::clone(store.value()));
		}
		let dir = self.profile_dir(profile).join(EXT_STORAGE_DIR).join(extension_id);
		let entry = self
			.extensions
			.entry(key)
			.or_try_insert_with(|| KeyedStore::open(&dir).map(Arc::new))?;
		Ok(Arc::clone(entry.value()))
	}

	/// Drops cached handles belonging to `profile_id`. Files stay on disk.
	pub fn evict_profile(&self, profile_id: &str) {
		let id = normalize(profile_id);
		self.profiles.remove(id);
		self.extensions.retain(|(profile, _), _| profile != id);
	}

	pub fn profile_dir(&self, profile_id: &str) -> PathBuf {
		self.root.join(normalize(profile_id))
	}
}

fn normalize(profile_id: &str) -> &str {
	if profile_id.is_empty() { DEFAULT_PROFILE } else { profile_id }
}

/// Accepts ids that name exactly one directory below their parent.
pub(crate) fn validate_component(what: &str, id: &str) -> Result<()> {
	let bad = id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']);
	if bad {
		return Err(Error::invalid(format!("{what} {id:?} is not a valid directory name")));
	}
	Ok(())
}
