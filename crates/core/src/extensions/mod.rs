//! Installed and pinned extensions of a profile.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use blynx_protocol::{ExtensionAction, InstalledExtension};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::store::KeyedStore;

pub mod installer;
pub mod manifest;

pub use installer::{ExtensionInstaller, InstallPlan};
pub use manifest::Manifest;

pub const INSTALLED: &str = "extensions.installed";
pub const PINNED: &str = "extensions.pinned";
/// Per-profile directory holding unpacked packages.
pub const EXTENSIONS_DIR: &str = "extensions";

/// Extension records kept in a profile store.
pub struct ExtensionRegistry<'a> {
	store: &'a KeyedStore,
	/// Packages below this directory were unpacked by the installer and are
	/// deleted on removal. Anything else was registered in place.
	managed_dir: PathBuf,
}

impl<'a> ExtensionRegistry<'a> {
	pub fn new(store: &'a KeyedStore, managed_dir: impl Into<PathBuf>) -> Self {
		Self {
			store,
			managed_dir: managed_dir.into(),
		}
	}

	pub fn list(&self) -> Vec<InstalledExtension> {
		self.store.inspect(INSTALLED, |list| {
			list.and_then(Value::as_array)
				.into_iter()
				.flatten()
				.filter_map(|entry| serde_json::from_value(entry.clone()).ok())
				.collect()
		})
	}

	pub fn get(&self, id: &str) -> Option<InstalledExtension> {
		self.list().into_iter().find(|ext| ext.id == id)
	}

	/// Adds `extension`, replacing an earlier record with the same id.
	pub fn record(&self, extension: &InstalledExtension) -> Result<()> {
		let mut list = self.list();
		match list.iter_mut().find(|ext| ext.id == extension.id) {
			Some(slot) => *slot = extension.clone(),
			None => list.push(extension.clone()),
		}
		self.store.set(INSTALLED, serde_json::to_value(&list)?)?;
		info!(target = "blynx.extensions", id = %extension.id, name = %extension.name, "extension recorded");
		Ok(())
	}

	/// Forgets `id`, unpins it and deletes its unpacked files. Returns `false`
	/// for unknown ids.
	pub fn remove(&self, id: &str) -> Result<bool> {
		let mut list = self.list();
		let Some(index) = list.iter().position(|ext| ext.id == id) else {
			return Ok(false);
		};
		let removed = list.remove(index);
		self.store.set(INSTALLED, serde_json::to_value(&list)?)?;

		let pinned = self.pinned();
		if pinned.iter().any(|p| p == id) {
			let kept: Vec<String> = pinned.into_iter().filter(|p| p != id).collect();
			self.store.set(PINNED, serde_json::to_value(kept)?)?;
		}

		if self.is_managed(&removed.path) {
			if let Err(err) = fs::remove_dir_all(&removed.path) {
				if err.kind() != std::io::ErrorKind::NotFound {
					warn!(target = "blynx.extensions", path = %removed.path.display(), error = %err, "failed to delete package files");
				}
			}
		}
		info!(target = "blynx.extensions", id, "extension removed");
		Ok(true)
	}

	pub fn pinned(&self) -> Vec<String> {
		self.store.inspect(PINNED, |ids| {
			ids.and_then(Value::as_array)
				.into_iter()
				.flatten()
				.filter_map(Value::as_str)
				.map(str::to_string)
				.collect()
		})
	}

	/// Stores the pinned toolbar order. Unknown ids and repeats are dropped;
	/// returns what was stored.
	pub fn set_pinned(&self, ids: Vec<String>) -> Result<Vec<String>> {
		let installed: HashSet<String> = self.list().into_iter().map(|ext| ext.id).collect();
		let mut seen = HashSet::new();
		let pinned: Vec<String> = ids
			.into_iter()
			.filter(|id| installed.contains(id) && seen.insert(id.clone()))
			.collect();
		self.store.set(PINNED, serde_json::to_value(&pinned)?)?;
		Ok(pinned)
	}

	/// Absolute popup page and icon of `id`.
	pub fn action(&self, id: &str) -> Option<ExtensionAction> {
		let ext = self.get(id)?;
		Some(ExtensionAction {
			popup: ext.popup.as_deref().map(|p| ext.path.join(p.trim_start_matches('/'))),
			icon: ext.icon.as_deref().map(|p| ext.path.join(p.trim_start_matches('/'))),
		})
	}

	fn is_managed(&self, path: &Path) -> bool {
		path.starts_with(&self.managed_dir) && path != self.managed_dir
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn ext(id: &str, path: PathBuf) -> InstalledExtension {
		InstalledExtension {
			id: id.into(),
			name: format!("{id} name"),
			version: "1.0".into(),
			path,
			popup: Some("popup.html".into()),
			icon: Some("/icons/128.png".into()),
		}
	}

	#[test]
	fn record_replaces_same_id() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let registry = ExtensionRegistry::new(&store, dir.path().join("extensions"));
		registry.record(&ext("a", "/x/a".into())).unwrap();
		let mut newer = ext("a", "/x/a2".into());
		newer.version = "2.0".into();
		registry.record(&newer).unwrap();
		assert_eq!(registry.list(), vec![newer]);
	}

	#[test]
	fn pinned_filters_unknown_and_duplicates() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let registry = ExtensionRegistry::new(&store, dir.path().join("extensions"));
		registry.record(&ext("a", "/x/a".into())).unwrap();
		registry.record(&ext("b", "/x/b".into())).unwrap();

		let stored = registry
			.set_pinned(vec!["b".into(), "ghost".into(), "a".into(), "b".into()])
			.unwrap();
		assert_eq!(stored, vec!["b", "a"]);
		assert_eq!(registry.pinned(), vec!["b", "a"]);
	}

	#[test]
	fn remove_unpins_and_deletes_managed_files() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let managed = dir.path().join("extensions");
		let package = managed.join("a");
		fs::create_dir_all(&package).unwrap();
		let registry = ExtensionRegistry::new(&store, &managed);
		registry.record(&ext("a", package.clone())).unwrap();
		registry.set_pinned(vec!["a".into()]).unwrap();

		assert!(registry.remove("a").unwrap());
		assert!(registry.list().is_empty());
		assert!(registry.pinned().is_empty());
		assert!(!package.exists());
		assert!(!registry.remove("a").unwrap());
	}

	#[test]
	fn remove_keeps_in_place_directories() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let outside = dir.path().join("dev-ext");
		fs::create_dir_all(&outside).unwrap();
		let registry = ExtensionRegistry::new(&store, dir.path().join("extensions"));
		registry.record(&ext("dev", outside.clone())).unwrap();
		assert!(registry.remove("dev").unwrap());
		assert!(outside.exists());
	}

	#[test]
	fn action_paths_are_absolute() {
		let dir = TempDir::new().unwrap();
		let store = KeyedStore::open(dir.path()).unwrap();
		let registry = ExtensionRegistry::new(&store, dir.path().join("extensions"));
		registry.record(&ext("a", "/x/a".into())).unwrap();
		let action = registry.action("a").unwrap();
		assert_eq!(action.popup, Some(PathBuf::from("/x/a/popup.html")));
		assert_eq!(action.icon, Some(PathBuf::from("/x/a/icons/128.png")));
		assert_eq!(registry.action("ghost"), None);
	}
}
