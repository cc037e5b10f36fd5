//! Fan-out of [`BroadcastEvent`]s to every connected window.

use blynx_protocol::BroadcastEvent;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default number of events a slow subscriber may fall behind.
pub const DEFAULT_CAPACITY: usize = 256;

/// Publish side of the event bus. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
	tx: broadcast::Sender<BroadcastEvent>,
}

impl Default for ChangeNotifier {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

impl ChangeNotifier {
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self { tx }
	}

	/// Delivers `event` to every current subscriber and returns how many
	/// received it. Nobody listening is not an error.
	pub fn publish(&self, event: BroadcastEvent) -> usize {
		let name = event.name();
		let delivered = self.tx.send(event).unwrap_or(0);
		trace!(target = "blynx.events", event = name, delivered, "published");
		delivered
	}

	/// Starts receiving events published from now on.
	pub fn subscribe(&self) -> Subscription {
		Subscription {
			rx: self.tx.subscribe(),
		}
	}

	pub fn subscriber_count(&self) -> usize {
		self.tx.receiver_count()
	}
}

/// Receive side held by one window connection.
#[derive(Debug)]
pub struct Subscription {
	rx: broadcast::Receiver<BroadcastEvent>,
}

impl Subscription {
	/// Waits for the next event. Returns `None` once the notifier is gone.
	///
	/// A subscriber that fell behind skips the lost events and keeps going.
	pub async fn recv(&mut self) -> Option<BroadcastEvent> {
		loop {
			match self.rx.recv().await {
				Ok(event) => return Some(event),
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					warn!(target = "blynx.events", skipped, "subscriber lagged, events dropped");
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	/// Returns an already queued event without waiting.
	pub fn try_recv(&mut self) -> Option<BroadcastEvent> {
		loop {
			match self.rx.try_recv() {
				Ok(event) => return Some(event),
				Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
					warn!(target = "blynx.events", skipped, "subscriber lagged, events dropped");
				}
				Err(_) => return None,
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn nav(url: &str) -> BroadcastEvent {
		BroadcastEvent::NavigateTo { url: url.into() }
	}

	#[tokio::test]
	async fn every_subscriber_gets_each_event_once() {
		let notifier = ChangeNotifier::new(8);
		let mut a = notifier.subscribe();
		let mut b = notifier.subscribe();
		assert_eq!(notifier.publish(nav("https://a")), 2);

		assert_eq!(a.recv().await, Some(nav("https://a")));
		assert_eq!(b.recv().await, Some(nav("https://a")));
		assert_eq!(a.try_recv(), None);
	}

	#[tokio::test]
	async fn late_subscriber_misses_earlier_events() {
		let notifier = ChangeNotifier::new(8);
		assert_eq!(notifier.publish(nav("https://early")), 0);
		let mut late = notifier.subscribe();
		notifier.publish(nav("https://late"));
		assert_eq!(late.recv().await, Some(nav("https://late")));
	}

	#[tokio::test]
	async fn lagging_subscriber_continues() {
		let notifier = ChangeNotifier::new(2);
		let mut sub = notifier.subscribe();
		for i in 0..5 {
			notifier.publish(nav(&format!("https://{i}")));
		}
		assert_eq!(sub.recv().await, Some(nav("https://3")));
		assert_eq!(sub.recv().await, Some(nav("https://4")));
	}

	#[test]
	fn dropped_subscription_is_forgotten() {
		let notifier = ChangeNotifier::default();
		let sub = notifier.subscribe();
		assert_eq!(notifier.subscriber_count(), 1);
		drop(sub);
		assert_eq!(notifier.subscriber_count(), 0);
	}
}
