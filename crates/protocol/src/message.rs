//! Request/response envelopes exchanged over the control socket.
//!
//! The stream is newline-delimited JSON. A window writes one
//! [`ClientEnvelope`] per line and reads [`ServerMessage`] lines back.
//! Responses carry the id of the request they answer; events are interleaved
//! with responses and carry no id.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::BroadcastEvent;
use crate::types::{ExtensionSource, KeyList, KeysSpec, PageRef, StorageArea, TabPayload, WindowState};

/// A request from a window to the control process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ControlRequest {
	Ping,
	/// Stops the control process after answering.
	Shutdown,

	StoreGet {
		key: String,
		#[serde(default)]
		default: Value,
	},
	StoreSet { key: String, value: Value },
	StoreDelete { key: String },

	/// Scoped to the current profile.
	ProfileStoreGet {
		key: String,
		#[serde(default)]
		default: Value,
	},
	ProfileStoreSet { key: String, value: Value },
	ProfileStoreDelete { key: String },

	ExtStorageGet {
		#[serde(default)]
		extension_id: Option<String>,
		area_name: StorageArea,
		#[serde(default)]
		keys: KeysSpec,
	},
	ExtStorageSet {
		#[serde(default)]
		extension_id: Option<String>,
		area_name: StorageArea,
		#[serde(default)]
		items: Map<String, Value>,
	},
	ExtStorageRemove {
		#[serde(default)]
		extension_id: Option<String>,
		area_name: StorageArea,
		keys: KeyList,
	},
	ExtStorageClear {
		#[serde(default)]
		extension_id: Option<String>,
		area_name: StorageArea,
	},

	ProfilesList,
	ProfilesCurrent,
	ProfilesCreate {
		#[serde(default)]
		name: Option<String>,
	},
	ProfilesSwitch { profile_id: String },
	ProfilesRemove { profile_id: String },
	EnsureProfileSession { profile_id: String },

	/// Fire-and-forget: a drag began in some window.
	TabDragStart {
		#[serde(default)]
		payload: Option<TabPayload>,
	},
	TabDragClaim,
	TabDragWasClaimed,
	CreateWindowWithTab {
		#[serde(default)]
		payload: Option<TabPayload>,
	},

	GetBookmarks,
	AddBookmark { bookmark: PageRef },
	RemoveBookmark { id: i64 },
	GetHistory,
	SetHistory {
		#[serde(default)]
		history: Value,
	},
	AddHistory { item: PageRef },
	ClearHistory,

	GetSearchEngine,
	GetSearchUrl { query: String },
	GetInternalPageUrl { page: String },
	ResolveInternalUrl { url: String },
	WindowStateGet,
	WindowStateSave { bounds: WindowState },
	SettingChanged {
		key: String,
		#[serde(default)]
		value: Value,
	},
	OpenUrlInBrowser { url: String },

	ExtensionsList,
	ExtensionsInstall {
		source: ExtensionSource,
		#[serde(default)]
		extension_id: Option<String>,
	},
	ExtensionsRemove { extension_id: String },
	ExtensionsPinnedGet,
	ExtensionsPinnedSet { ids: Vec<String> },
	ExtensionsAction { extension_id: String },
}

impl ControlRequest {
	/// Wire name of the request, used in logs.
	pub fn name(&self) -> &'static str {
		match self {
			ControlRequest::Ping { .. } => "ping",
			ControlRequest::Shutdown { .. } => "shutdown",
			ControlRequest::StoreGet { .. } => "store_get",
			ControlRequest::StoreSet { .. } => "store_set",
			ControlRequest::StoreDelete { .. } => "store_delete",
			ControlRequest::ProfileStoreGet { .. } => "profile_store_get",
			ControlRequest::ProfileStoreSet { .. } => "profile_store_set",
			ControlRequest::ProfileStoreDelete { .. } => "profile_store_delete",
			ControlRequest::ExtStorageGet { .. } => "ext_storage_get",
			ControlRequest::ExtStorageSet { .. } => "ext_storage_set",
			ControlRequest::ExtStorageRemove { .. } => "ext_storage_remove",
			ControlRequest::ExtStorageClear { .. } => "ext_storage_clear",
			ControlRequest::ProfilesList { .. } => "profiles_list",
			ControlRequest::ProfilesCurrent { .. } => "profiles_current",
			ControlRequest::ProfilesCreate { .. } => "profiles_create",
			ControlRequest::ProfilesSwitch { .. } => "profiles_switch",
			ControlRequest::ProfilesRemove { .. } => "profiles_remove",
			ControlRequest::EnsureProfileSession { .. } => "ensure_profile_session",
			ControlRequest::TabDragStart { .. } => "tab_drag_start",
			ControlRequest::TabDragClaim { .. } => "tab_drag_claim",
			ControlRequest::TabDragWasClaimed { .. } => "tab_drag_was_claimed",
			ControlRequest::CreateWindowWithTab { .. } => "create_window_with_tab",
			ControlRequest::GetBookmarks { .. } => "get_bookmarks",
			ControlRequest::AddBookmark { .. } => "add_bookmark",
			ControlRequest::RemoveBookmark { .. } => "remove_bookmark",
			ControlRequest::GetHistory { .. } => "get_history",
			ControlRequest::SetHistory { .. } => "set_history",
			ControlRequest::AddHistory { .. } => "add_history",
			ControlRequest::ClearHistory { .. } => "clear_history",
			ControlRequest::GetSearchEngine { .. } => "get_search_engine",
			ControlRequest::GetSearchUrl { .. } => "get_search_url",
			ControlRequest::GetInternalPageUrl { .. } => "get_internal_page_url",
			ControlRequest::ResolveInternalUrl { .. } => "resolve_internal_url",
			ControlRequest::WindowStateGet { .. } => "window_state_get",
			ControlRequest::WindowStateSave { .. } => "window_state_save",
			ControlRequest::SettingChanged { .. } => "setting_changed",
			ControlRequest::OpenUrlInBrowser { .. } => "open_url_in_browser",
			ControlRequest::ExtensionsList { .. } => "extensions_list",
			ControlRequest::ExtensionsInstall { .. } => "extensions_install",
			ControlRequest::ExtensionsRemove { .. } => "extensions_remove",
			ControlRequest::ExtensionsPinnedGet { .. } => "extensions_pinned_get",
			ControlRequest::ExtensionsPinnedSet { .. } => "extensions_pinned_set",
			ControlRequest::ExtensionsAction { .. } => "extensions_action",
		}
	}
}

/// Error codes carried by [`ControlResponse::Error`].
pub mod codes {
	pub const INVALID_REQUEST: &str = "invalid_request";
	pub const INVALID_INPUT: &str = "invalid_input";
	pub const IO: &str = "io_error";
	pub const INTERNAL: &str = "internal_error";
}

/// Answer to a single [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ControlResponse {
	Ok {
		#[serde(default)]
		value: Value,
	},
	Error { code: String, message: String },
}

impl ControlResponse {
	/// Successful response without a value.
	pub fn unit() -> Self {
		ControlResponse::Ok { value: Value::Null }
	}

	pub fn ok(value: impl Serialize) -> Self {
		match serde_json::to_value(value) {
			Ok(value) => ControlResponse::Ok { value },
			Err(err) => ControlResponse::error(codes::INTERNAL, err.to_string()),
		}
	}

	pub fn error(code: &str, message: impl Into<String>) -> Self {
		ControlResponse::Error {
			code: code.to_string(),
			message: message.into(),
		}
	}

	pub fn is_ok(&self) -> bool {
		matches!(self, ControlResponse::Ok { .. })
	}

	/// Returns the carried value, or `None` for an error response.
	pub fn value(&self) -> Option<&Value> {
		match self {
			ControlResponse::Ok { value } => Some(value),
			ControlResponse::Error { .. } => None,
		}
	}

	/// Decodes the carried value into `T`.
	pub fn decode<T: DeserializeOwned>(self) -> Result<T, String> {
		match self {
			ControlResponse::Ok { value } => serde_json::from_value(value).map_err(|e| e.to_string()),
			ControlResponse::Error { code, message } => Err(format!("{code}: {message}")),
		}
	}
}

/// A framed request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
	pub id: u64,
	pub request: ControlRequest,
}

/// A framed line from the control process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerMessage {
	Response {
		/// `None` when the request line could not be parsed.
		#[serde(default)]
		id: Option<u64>,
		response: ControlResponse,
	},
	Event { event: BroadcastEvent },
}
