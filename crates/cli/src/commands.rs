//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use blynx::{ChangeNotifier, ControlContext, ControlOptions, ExtensionInstaller, NotifyingHost, SharedControl, ShellHost};
use blynx_protocol::{ControlRequest, ControlResponse};
use serde_json::{Value, json};
use tracing::info;

use crate::cli::{Cli, Commands, ProfilesCommand};
use crate::config::Config;
use crate::daemon::{CommandWindowHost, Daemon, DaemonClient};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = Config::resolve(&cli)?;
	match cli.command {
		Commands::Serve { .. } => serve(config).await,
		Commands::Status => status(&config).await,
		Commands::Stop => stop(&config).await,
		Commands::Exec { request } => exec(&config, &request).await,
		Commands::Watch => watch(&config).await,
		Commands::Profiles(command) => profiles(&config, command).await,
	}
}

/// Builds the control state for `config` without binding anything.
pub fn open_control(config: &Config) -> Result<SharedControl> {
	let notifier = ChangeNotifier::new(config.event_capacity);
	let host: Arc<dyn ShellHost> = if config.window_command.is_empty() {
		Arc::new(NotifyingHost::new(notifier.clone()))
	} else {
		Arc::new(CommandWindowHost::new(config.window_command.clone()))
	};
	let options = ControlOptions {
		user_data_dir: config.user_data_dir.clone(),
		app_dir: config.app_dir.clone(),
	};
	let ctx = ControlContext::open(&options, notifier, host)
		.with_context(|| format!("Failed to open user data at {}", config.user_data_dir.display()))?;
	let installer = ExtensionInstaller::new().context("Failed to create download client")?;
	Ok(SharedControl::new(ctx, installer))
}

async fn serve(config: Config) -> Result<()> {
	if let Some(mut client) = DaemonClient::try_connect(&config.socket_path).await? {
		if client.request(ControlRequest::Ping).await.is_ok_and(|r| r.is_ok()) {
			bail!("Daemon already running at {}", config.socket_path.display());
		}
	}

	let control = Arc::new(open_control(&config)?);
	info!(target = "blynx.daemon", app_dir = %config.app_dir.display(), "starting daemon");
	Daemon::bind(&config.socket_path, control).await?.run().await
}

async fn connect(config: &Config) -> Result<DaemonClient> {
	DaemonClient::try_connect(&config.socket_path)
		.await?
		.ok_or_else(|| anyhow!("Daemon is not running at {}", config.socket_path.display()))
}

async fn status(config: &Config) -> Result<()> {
	let running = match DaemonClient::try_connect(&config.socket_path).await? {
		Some(mut client) => client.request(ControlRequest::Ping).await?.is_ok(),
		None => false,
	};
	print_json(&json!({
		"running": running,
		"socket": config.socket_path.display().to_string(),
	}))
}

async fn stop(config: &Config) -> Result<()> {
	let stopped = match DaemonClient::try_connect(&config.socket_path).await? {
		Some(mut client) => client.request(ControlRequest::Shutdown).await?.is_ok(),
		None => false,
	};
	print_json(&json!({ "stopped": stopped }))
}

async fn exec(config: &Config, request: &str) -> Result<()> {
	let request: ControlRequest = serde_json::from_str(request).context("Invalid request JSON")?;
	let mut client = connect(config).await?;
	let value = into_value(client.request(request).await?)?;
	print_json(&value)
}

async fn watch(config: &Config) -> Result<()> {
	let mut client = connect(config).await?;
	while let Some(event) = client.next_event().await? {
		println!("{}", serde_json::to_string(&event)?);
	}
	Ok(())
}

async fn profiles(config: &Config, command: ProfilesCommand) -> Result<()> {
	let request = match command {
		ProfilesCommand::List => ControlRequest::ProfilesList,
		ProfilesCommand::Current => ControlRequest::ProfilesCurrent,
		ProfilesCommand::Create { name } => ControlRequest::ProfilesCreate { name },
		ProfilesCommand::Switch { id } => ControlRequest::ProfilesSwitch { profile_id: id },
		ProfilesCommand::Remove { id } => ControlRequest::ProfilesRemove { profile_id: id },
	};
	let mut client = connect(config).await?;
	let value = into_value(client.request(request).await?)?;
	print_json(&value)
}

fn into_value(response: ControlResponse) -> Result<Value> {
	match response {
		ControlResponse::Ok { value } => Ok(value),
		ControlResponse::Error { code, message } => Err(anyhow!("daemon error {code}: {message}")),
	}
}

fn print_json(value: &Value) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

#[cfg(test)]
mod tests {
	use blynx_protocol::codes;

	use super::*;

	#[test]
	fn error_response_becomes_error() {
		let err = into_value(ControlResponse::error(codes::IO, "disk full")).unwrap_err();
		assert_eq!(err.to_string(), "daemon error io_error: disk full");
		assert_eq!(into_value(ControlResponse::ok(3)).unwrap(), json!(3));
	}
}
