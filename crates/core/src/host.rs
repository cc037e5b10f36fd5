//! Boundary to the window system and web engine.

use blynx_protocol::{BroadcastEvent, InstalledExtension};

use crate::error::Result;
use crate::notifier::ChangeNotifier;

/// Operations the control process asks of whatever owns the real windows.
pub trait ShellHost: Send + Sync {
	/// Opens a new top-level browser window showing `url`.
	fn open_window(&self, url: &str) -> Result<()>;

	/// Makes a session partition usable (protocol handlers etc.).
	fn realize_partition(&self, _partition: &str) -> Result<()> {
		Ok(())
	}

	/// Loads an installed extension into `partition`.
	fn load_extension(&self, _partition: &str, _extension: &InstalledExtension) -> Result<()> {
		Ok(())
	}
}

/// Host used when nothing can open windows directly: window requests are
/// published for a connected launcher to act on.
#[derive(Debug, Clone)]
pub struct NotifyingHost {
	notifier: ChangeNotifier,
}

impl NotifyingHost {
	pub fn new(notifier: ChangeNotifier) -> Self {
		Self { notifier }
	}
}

impl ShellHost for NotifyingHost {
	fn open_window(&self, url: &str) -> Result<()> {
		self.notifier.publish(BroadcastEvent::WindowRequested { url: url.to_string() });
		Ok(())
	}
}
