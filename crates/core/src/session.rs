//! Session partitions and the internal `blynx://` pages they serve.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::host::ShellHost;
use crate::profiles::partition_for;
use crate::store::registry::validate_component;

pub const INTERNAL_SCHEME: &str = "blynx";
const INTERNAL_DIR: &str = "internal";
const FALLBACK_PAGE: &str = "newtab.html";

/// Host part of a `blynx://` url and the page file it shows.
const INTERNAL_PAGES: &[(&str, &str)] = &[
	("settings", "settings.html"),
	("history", "history.html"),
	("bookmarks", "bookmarks.html"),
	("downloads", "downloads.html"),
	("extensions", "extensions.html"),
	("about", "about.html"),
	("newtab", "newtab.html"),
];

#[derive(Debug)]
pub struct SessionPartitions {
	app_dir: PathBuf,
	realized: HashSet<String>,
	extensions_loaded: HashSet<String>,
}

impl SessionPartitions {
	pub fn new(app_dir: impl Into<PathBuf>) -> Self {
		let app_dir = app_dir.into();
		let app_dir = std::path::absolute(&app_dir).unwrap_or(app_dir);
		Self {
			app_dir,
			realized: HashSet::new(),
			extensions_loaded: HashSet::new(),
		}
	}

	pub fn app_dir(&self) -> &Path {
		&self.app_dir
	}

	/// Returns the partition of `profile_id`, realizing it through `host` the
	/// first time it is asked for.
	pub fn ensure(&mut self, host: &dyn ShellHost, profile_id: &str) -> Result<String> {
		validate_component("profile id", profile_id)?;
		let partition = partition_for(profile_id);
		if !self.realized.contains(&partition) {
			host.realize_partition(&partition)?;
			self.realized.insert(partition.clone());
			debug!(target = "blynx.profiles", partition = %partition, "partition realized");
		}
		Ok(partition)
	}

	pub fn is_realized(&self, partition: &str) -> bool {
		self.realized.contains(partition)
	}

	/// Returns `true` exactly once per partition: the first caller loads the
	/// profile's extensions.
	pub fn claim_extension_load(&mut self, partition: &str) -> bool {
		self.extensions_loaded.insert(partition.to_string())
	}

	/// File shown for an internal url. Unknown pages and missing files show
	/// the new-tab page.
	pub fn resolve_internal(&self, url: &str) -> Result<PathBuf> {
		let parsed = Url::parse(url).map_err(|e| Error::invalid(format!("bad url {url:?}: {e}")))?;
		if parsed.scheme() != INTERNAL_SCHEME {
			return Err(Error::invalid(format!("not a {INTERNAL_SCHEME}:// url: {url}")));
		}
		let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
		let page = INTERNAL_PAGES
			.iter()
			.find(|(name, _)| *name == host)
			.map_or(FALLBACK_PAGE, |(_, file)| *file);
		let file = self.internal_dir().join(page);
		if file.is_file() {
			Ok(file)
		} else {
			Ok(self.internal_dir().join(FALLBACK_PAGE))
		}
	}

	/// `file://` url of the internal page file `page`.
	pub fn internal_page_url(&self, page: &str) -> Result<String> {
		validate_component("page", page)?;
		let file = self.internal_dir().join(page);
		Url::from_file_path(&file)
			.map(String::from)
			.map_err(|()| Error::invalid(format!("cannot build a file url for {}", file.display())))
	}

	fn internal_dir(&self) -> PathBuf {
		self.app_dir.join(INTERNAL_DIR)
	}
}
