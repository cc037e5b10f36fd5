//! Stderr logging for the daemon and the client commands.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub fn default_directive(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn",
		1 => "info",
		_ => "debug",
	}
}

/// Installs the global subscriber. `RUST_LOG` overrides the `-v` count.
pub fn init_logging(verbosity: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

	// A second call (tests) keeps the first subscriber.
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.compact()
		.try_init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_raises_level() {
		assert_eq!(default_directive(0), "warn");
		assert_eq!(default_directive(1), "info");
		assert_eq!(default_directive(7), "debug");
	}
}
