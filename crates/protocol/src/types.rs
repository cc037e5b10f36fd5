//! Data records shared between the control process and windows.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An isolated browsing identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
	pub id: String,
	pub name: String,
	/// ISO-8601 UTC timestamp.
	pub created_at: String,
}

/// Payload carried by a tab drag between windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabPayload {
	#[serde(default)]
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub profile_id: Option<String>,
}

impl TabPayload {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			profile_id: None,
		}
	}
}

/// A page reference submitted by a window when bookmarking or recording a visit.
///
/// Fields other than `url` and `title` are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRef {
	pub url: String,
	#[serde(default)]
	pub title: String,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl PageRef {
	pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			title: title.into(),
			extra: Map::new(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
	pub id: i64,
	pub url: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub created_at: String,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
	pub id: i64,
	pub url: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub visited_at: String,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// One of an extension's two storage namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
	Local,
	Sync,
}

impl StorageArea {
	pub fn as_str(self) -> &'static str {
		match self {
			StorageArea::Local => "local",
			StorageArea::Sync => "sync",
		}
	}
}

impl fmt::Display for StorageArea {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Old/new pair for a single storage key. A missing side means "undefined".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub old_value: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub new_value: Option<Value>,
}

pub type StorageChanges = BTreeMap<String, StorageChange>;

/// Key selection accepted by `storage.*.get`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeysSpec {
	/// `null` or absent: the whole area.
	#[default]
	All,
	One(String),
	Many(Vec<String>),
	/// Keys with the value to report when the key is not stored.
	Defaults(Map<String, Value>),
}

/// Key selection accepted by `storage.*.remove`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyList {
	One(String),
	Many(Vec<String>),
}

impl KeyList {
	pub fn into_vec(self) -> Vec<String> {
		match self {
			KeyList::One(key) => vec![key],
			KeyList::Many(keys) => keys,
		}
	}
}

/// Where an extension package comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionSource {
	/// Remote `.crx` or `.zip` package.
	Url(String),
	/// Local `.crx` or `.zip` package.
	Archive(PathBuf),
	/// Already unpacked extension directory, registered in place.
	Directory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledExtension {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub version: String,
	pub path: PathBuf,
	/// Popup page relative to `path`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub popup: Option<String>,
	/// Toolbar icon relative to `path`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub icon: Option<String>,
}

/// Resolved toolbar action of an installed extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionAction {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub popup: Option<PathBuf>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub icon: Option<PathBuf>,
}

/// Outcome of a package install. Failures are data, not transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOutcome {
	pub ok: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub extension: Option<InstalledExtension>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl InstallOutcome {
	pub fn installed(extension: InstalledExtension) -> Self {
		Self {
			ok: true,
			extension: Some(extension),
			error: None,
		}
	}

	pub fn failed(error: impl Into<String>) -> Self {
		Self {
			ok: false,
			extension: None,
			error: Some(error.into()),
		}
	}
}

/// Last known bounds of a top-level window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
	pub width: u32,
	pub height: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub x: Option<i32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub y: Option<i32>,
}

impl Default for WindowState {
	fn default() -> Self {
		Self {
			width: 1280,
			height: 800,
			x: None,
			y: None,
		}
	}
}
