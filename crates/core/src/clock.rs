//! Timestamps and record ids.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{SecondsFormat, Utc};

/// Current UTC time as ISO-8601 with millisecond precision.
pub fn now_iso() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Hands out millisecond-timestamp ids that strictly increase within a
/// process, even when two records are created in the same millisecond.
#[derive(Debug, Default)]
pub struct IdClock {
	last: AtomicI64,
}

impl IdClock {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn next_id(&self) -> i64 {
		let now = Utc::now().timestamp_millis();
		let mut last = self.last.load(Ordering::Relaxed);
		loop {
			let next = now.max(last + 1);
			match self.last.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
				Ok(_) => return next,
				Err(actual) => last = actual,
			}
		}
	}
}
