//! The few `manifest.json` fields the shell needs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub version: String,
	#[serde(default)]
	pub action: Option<Action>,
	/// Manifest v2 name of `action`.
	#[serde(default)]
	pub browser_action: Option<Action>,
	#[serde(default)]
	pub icons: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Action {
	#[serde(default)]
	pub default_popup: Option<String>,
	#[serde(default)]
	pub default_icon: Option<Icon>,
}

/// `default_icon` is either one path or a size → path map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Icon {
	Single(String),
	Sized(BTreeMap<String, String>),
}

impl Manifest {
	pub fn read(dir: &Path) -> Result<Self> {
		let file = dir.join(MANIFEST_FILE);
		let raw = fs::read_to_string(&file)
			.map_err(|e| Error::Manifest(format!("cannot read {}: {e}", file.display())))?;
		// Some packages ship a UTF-8 byte order mark.
		let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);
		serde_json::from_str(raw).map_err(|e| Error::Manifest(format!("{}: {e}", file.display())))
	}

	fn action(&self) -> Option<&Action> {
		self.action.as_ref().or(self.browser_action.as_ref())
	}

	pub fn popup(&self) -> Option<&str> {
		self.action()?.default_popup.as_deref().filter(|p| !p.is_empty())
	}

	/// Largest toolbar icon, falling back to the largest extension icon.
	pub fn icon(&self) -> Option<&str> {
		let from_action = self.action().and_then(|a| a.default_icon.as_ref()).and_then(|icon| match icon {
			Icon::Single(path) => Some(path.as_str()),
			Icon::Sized(sizes) => largest(sizes),
		});
		from_action.or_else(|| largest(&self.icons))
	}
}

fn largest(sizes: &BTreeMap<String, String>) -> Option<&str> {
	sizes
		.iter()
		.max_by_key(|(size, _)| size.parse::<u32>().unwrap_or(0))
		.map(|(_, path)| path.as_str())
}
