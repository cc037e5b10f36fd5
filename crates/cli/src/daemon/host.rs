use blynx::ShellHost;
use blynx::error::{Error, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// Opens windows by running a configured command with the url appended.
#[derive(Debug, Clone)]
pub struct CommandWindowHost {
	argv: Vec<String>,
}

impl CommandWindowHost {
	pub fn new(argv: Vec<String>) -> Self {
		Self { argv }
	}
}

impl ShellHost for CommandWindowHost {
	fn open_window(&self, url: &str) -> Result<()> {
		let Some((program, args)) = self.argv.split_first() else {
			return Err(Error::InvalidInput("window command is empty".into()));
		};
		let child = Command::new(program)
			.args(args)
			.arg(url)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()?;
		info!(target = "blynx.daemon", program = %program, pid = ?child.id(), url, "window command started");
		Ok(())
	}
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	#[tokio::test]
	async fn runs_command_with_url() {
		let dir = tempfile::TempDir::new().unwrap();
		let out = dir.path().join("opened");
		let script = format!("printf %s \"$0\" > {}", out.display());
		let host = CommandWindowHost::new(vec!["sh".into(), "-c".into(), script]);
		host.open_window("https://a.example").unwrap();

		for _ in 0..100 {
			if std::fs::read_to_string(&out).is_ok_and(|s| s == "https://a.example") {
				return;
			}
			tokio::time::sleep(std::time::Duration::from_millis(20)).await;
		}
		panic!("window command did not run");
	}

	#[test]
	fn empty_command_is_rejected() {
		let host = CommandWindowHost::new(Vec::new());
		assert!(host.open_window("https://a.example").is_err());
	}
}
