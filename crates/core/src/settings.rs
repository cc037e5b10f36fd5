//! Global browser settings: search engine and window bounds.

use blynx_protocol::WindowState;
use serde_json::{Value, json};

use crate::error::Result;
use crate::store::KeyedStore;

pub const SEARCH_ENGINE: &str = "searchEngine";
pub const WINDOW_STATE: &str = "windowState";
pub const DEFAULT_ENGINE: &str = "google";

/// Query url prefix of every known search engine.
pub const SEARCH_ENGINES: &[(&str, &str)] = &[
	("google", "https://www.google.com/search?q="),
	("bing", "https://www.bing.com/search?q="),
	("duckduckgo", "https://duckduckgo.com/?q="),
	("yahoo", "https://search.yahoo.com/search?p="),
	("brave", "https://search.brave.com/search?q="),
];

fn engine_prefix(name: &str) -> Option<&'static str> {
	SEARCH_ENGINES.iter().find(|(id, _)| *id == name).map(|(_, prefix)| *prefix)
}

/// Search url for `query` on `engine`; unknown engines search with google.
pub fn search_url(engine: &str, query: &str) -> String {
	let prefix = engine_prefix(engine)
		.or_else(|| engine_prefix(DEFAULT_ENGINE))
		.unwrap_or_default();
	format!("{prefix}{}", encode_component(query))
}

/// Characters `encodeURIComponent` leaves unescaped but `urlencoding` escapes.
const COMPONENT_SAFE: &[(&str, &str)] = &[("%21", "!"), ("%27", "'"), ("%28", "("), ("%29", ")"), ("%2A", "*")];

/// Percent-encodes `query` the way `encodeURIComponent` does.
fn encode_component(query: &str) -> String {
	let mut encoded = urlencoding::encode(query).into_owned();
	for (escaped, raw) in COMPONENT_SAFE {
		encoded = encoded.replace(escaped, raw);
	}
	encoded
}

pub struct Settings<'a> {
	global: &'a KeyedStore,
}

impl<'a> Settings<'a> {
	pub fn new(global: &'a KeyedStore) -> Self {
		Self { global }
	}

	/// Configured engine name, as stored.
	pub fn search_engine(&self) -> Value {
		self.global.get(SEARCH_ENGINE, json!(DEFAULT_ENGINE))
	}

	pub fn search_url(&self, query: &str) -> String {
		let engine = self.search_engine();
		search_url(engine.as_str().unwrap_or(DEFAULT_ENGINE), query)
	}

	/// Stored window bounds, or the default size when nothing usable is stored.
	pub fn window_state(&self) -> WindowState {
		self.global
			.lookup(WINDOW_STATE)
			.and_then(|value| serde_json::from_value(value).ok())
			.unwrap_or_default()
	}

	pub fn save_window_state(&self, bounds: WindowState) -> Result<()> {
		self.global.set(WINDOW_STATE, serde_json::to_value(bounds)?)
	}
}
