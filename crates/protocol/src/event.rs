//! Events pushed from the control process to every connected window.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{StorageArea, StorageChanges};

/// Fan-out notification. Delivered at most once to each window connected at
/// publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum BroadcastEvent {
	/// The current profile changed; windows reload all profile-scoped state.
	ProfileChanged { profile_id: String },
	/// An extension storage area changed.
	ExtStorageChanged {
		extension_id: String,
		area_name: StorageArea,
		changes: StorageChanges,
	},
	/// The installed extension set of a profile changed.
	ExtensionsChanged { profile_id: String },
	/// The pinned toolbar extensions of a profile changed.
	ExtensionsPinnedChanged { profile_id: String, ids: Vec<String> },
	HistoryCleared { profile_id: String },
	/// A setting was changed from an internal page.
	SettingChanged { key: String, value: Value },
	/// An internal page asked the browser UI to open a url.
	NavigateTo { url: String },
	/// No window host is configured; a launcher should open a window for `url`.
	WindowRequested { url: String },
}

impl BroadcastEvent {
	/// Wire name of the event, as used in the `type` tag.
	pub fn name(&self) -> &'static str {
		match self {
			BroadcastEvent::ProfileChanged { .. } => "profile-changed",
			BroadcastEvent::ExtStorageChanged { .. } => "ext-storage-changed",
			BroadcastEvent::ExtensionsChanged { .. } => "extensions-changed",
			BroadcastEvent::ExtensionsPinnedChanged { .. } => "extensions-pinned-changed",
			BroadcastEvent::HistoryCleared { .. } => "history-cleared",
			BroadcastEvent::SettingChanged { .. } => "setting-changed",
			BroadcastEvent::NavigateTo { .. } => "navigate-to",
			BroadcastEvent::WindowRequested { .. } => "window-requested",
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn tag_matches_name() {
		let event = BroadcastEvent::ExtensionsPinnedChanged {
			profile_id: "default".into(),
			ids: vec!["abc".into()],
		};
		let value = serde_json::to_value(&event).unwrap();
		assert_eq!(value["type"], json!(event.name()));
		assert_eq!(value["profileId"], json!("default"));
	}

	#[test]
	fn storage_event_wire_shape() {
		let value = json!({
			"type": "ext-storage-changed",
			"extensionId": "ext",
			"areaName": "sync",
			"changes": { "k": { "newValue": 1 } }
		});
		let event: BroadcastEvent = serde_json::from_value(value).unwrap();
		match event {
			BroadcastEvent::ExtStorageChanged { area_name, changes, .. } => {
				assert_eq!(area_name, StorageArea::Sync);
				assert_eq!(changes["k"].new_value, Some(json!(1)));
				assert_eq!(changes["k"].old_value, None);
			}
			other => panic!("unexpected event: {other:?}"),
		}
	}
}
