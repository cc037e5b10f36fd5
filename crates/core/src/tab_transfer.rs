//! Hand-off buffer for dragging a tab from one window to another.
//!
//! The source window records the tab when the drag begins. Any window that
//! sees the drop claims it. Claiming does not clear the buffer: two windows
//! racing on the same drop may both get the tab, and the source only closes
//! its copy when it learns the tab was claimed.

use blynx_protocol::TabPayload;
use tracing::debug;

#[derive(Debug, Default)]
pub struct TabTransferBroker {
	pending: Option<TabPayload>,
	claimed: bool,
}

impl TabTransferBroker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts a new drag, replacing any earlier one. `None` empties the buffer.
	pub fn start(&mut self, payload: Option<TabPayload>) {
		debug!(target = "blynx.tabs", url = payload.as_ref().map(|p| p.url.as_str()), "tab drag started");
		self.pending = payload;
		self.claimed = false;
	}

	/// Returns the pending tab, if any, and marks it claimed.
	pub fn claim(&mut self) -> Option<TabPayload> {
		let payload = self.pending.clone()?;
		self.claimed = true;
		debug!(target = "blynx.tabs", url = %payload.url, "tab claimed");
		Some(payload)
	}

	pub fn was_claimed(&self) -> bool {
		self.claimed
	}

	pub fn pending(&self) -> Option<&TabPayload> {
		self.pending.as_ref()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn claim_keeps_payload_for_second_claimer() {
		let mut broker = TabTransferBroker::new();
		broker.start(Some(TabPayload::new("https://x")));
		assert!(!broker.was_claimed());

		assert_eq!(broker.claim(), Some(TabPayload::new("https://x")));
		assert_eq!(broker.claim(), Some(TabPayload::new("https://x")));
		assert!(broker.was_claimed());
	}

	#[test]
	fn empty_claim_does_not_mark_claimed() {
		let mut broker = TabTransferBroker::new();
		assert_eq!(broker.claim(), None);
		assert!(!broker.was_claimed());
	}

	#[test]
	fn restart_resets_claim() {
		let mut broker = TabTransferBroker::new();
		broker.start(Some(TabPayload::new("https://a")));
		broker.claim();
		broker.start(Some(TabPayload::new("https://b")));
		assert!(!broker.was_claimed());
		assert_eq!(broker.pending().map(|p| p.url.as_str()), Some("https://b"));

		broker.start(None);
		assert_eq!(broker.claim(), None);
	}
}
