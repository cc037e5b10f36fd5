//! Daemon configuration.
//!
//! Each setting comes from the first source that has it: command-line flag,
//! environment (`BLYNX_USER_DATA`, `BLYNX_SOCKET`), the JSON config file,
//! then built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use blynx::notifier::DEFAULT_CAPACITY;
use serde::Deserialize;

use crate::cli::{Cli, Commands};
use crate::daemon::default_socket_path;

pub const ENV_USER_DATA: &str = "BLYNX_USER_DATA";
pub const ENV_SOCKET: &str = "BLYNX_SOCKET";

const APP_NAME: &str = "blynx";
const CONFIG_FILE: &str = "config.json";

/// Contents of `config.json`. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
	pub user_data_dir: Option<PathBuf>,
	pub app_dir: Option<PathBuf>,
	pub socket_path: Option<PathBuf>,
	/// Program and arguments that open a window; the url is appended.
	#[serde(default)]
	pub window_command: Vec<String>,
	pub event_capacity: Option<usize>,
}

impl ConfigFile {
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		serde_json::from_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))
	}
}

/// Settings taken from flags or the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
	pub user_data_dir: Option<PathBuf>,
	pub app_dir: Option<PathBuf>,
	pub socket_path: Option<PathBuf>,
}

impl Overrides {
	fn from_cli(cli: &Cli) -> Self {
		let app_dir = match &cli.command {
			Commands::Serve { app_dir } => app_dir.clone(),
			_ => None,
		};
		Self {
			user_data_dir: cli.user_data.clone(),
			app_dir,
			socket_path: cli.socket.clone(),
		}
	}

	fn from_env() -> Self {
		let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
		Self {
			user_data_dir: var(ENV_USER_DATA),
			app_dir: None,
			socket_path: var(ENV_SOCKET),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
	pub user_data_dir: PathBuf,
	pub app_dir: PathBuf,
	pub socket_path: PathBuf,
	pub window_command: Vec<String>,
	pub event_capacity: usize,
}

impl Config {
	pub fn resolve(cli: &Cli) -> Result<Self> {
		// An explicit --config must exist; the default location is optional.
		let file = match &cli.config {
			Some(path) => ConfigFile::load(path)?,
			None => match default_config_path() {
				Some(path) if path.is_file() => ConfigFile::load(&path)?,
				_ => ConfigFile::default(),
			},
		};
		Self::from_sources(Overrides::from_cli(cli), Overrides::from_env(), file)
	}

	pub fn from_sources(flags: Overrides, env: Overrides, file: ConfigFile) -> Result<Self> {
		let user_data_dir = match flags.user_data_dir.or(env.user_data_dir).or(file.user_data_dir) {
			Some(dir) => dir,
			None => default_user_data_dir()?,
		};
		let app_dir = match flags.app_dir.or(env.app_dir).or(file.app_dir) {
			Some(dir) => dir,
			None => default_app_dir()?,
		};
		let socket_path = flags
			.socket_path
			.or(env.socket_path)
			.or(file.socket_path)
			.unwrap_or_else(default_socket_path);

		Ok(Self {
			user_data_dir,
			app_dir,
			socket_path,
			window_command: file.window_command,
			event_capacity: file.event_capacity.filter(|&n| n > 0).unwrap_or(DEFAULT_CAPACITY),
		})
	}
}

pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
}

fn default_user_data_dir() -> Result<PathBuf> {
	dirs::data_dir()
		.map(|dir| dir.join(APP_NAME))
		.ok_or_else(|| anyhow!("No data directory for this platform; pass --user-data"))
}

/// Directory of the running executable, where the shell ships `internal/`.
fn default_app_dir() -> Result<PathBuf> {
	let exe = std::env::current_exe().context("Failed to locate the executable")?;
	exe.parent()
		.map(Path::to_path_buf)
		.ok_or_else(|| anyhow!("Executable has no parent directory: {}", exe.display()))
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn file() -> ConfigFile {
		ConfigFile {
			user_data_dir: Some("/file/data".into()),
			app_dir: Some("/file/app".into()),
			socket_path: Some("/file/blynx.sock".into()),
			window_command: vec!["open-window".into()],
			event_capacity: Some(32),
		}
	}

	#[test]
	fn flag_beats_env_beats_file() {
		let flags = Overrides {
			user_data_dir: Some("/flag/data".into()),
			..Overrides::default()
		};
		let env = Overrides {
			user_data_dir: Some("/env/data".into()),
			socket_path: Some("/env/blynx.sock".into()),
			..Overrides::default()
		};
		let config = Config::from_sources(flags, env, file()).unwrap();
		assert_eq!(config.user_data_dir, PathBuf::from("/flag/data"));
		assert_eq!(config.socket_path, PathBuf::from("/env/blynx.sock"));
		assert_eq!(config.app_dir, PathBuf::from("/file/app"));
		assert_eq!(config.window_command, vec!["open-window"]);
		assert_eq!(config.event_capacity, 32);
	}

	#[test]
	fn zero_capacity_falls_back() {
		let file = ConfigFile {
			event_capacity: Some(0),
			..file()
		};
		let config = Config::from_sources(Overrides::default(), Overrides::default(), file).unwrap();
		assert_eq!(config.event_capacity, DEFAULT_CAPACITY);
	}

	#[test]
	fn file_is_camel_case() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, r#"{ "userDataDir": "/d", "windowCommand": ["x", "--new"] }"#).unwrap();
		let loaded = ConfigFile::load(&path).unwrap();
		assert_eq!(loaded.user_data_dir, Some(PathBuf::from("/d")));
		assert_eq!(loaded.window_command, vec!["x", "--new"]);
		assert_eq!(loaded.socket_path, None);
	}

	#[test]
	fn invalid_file_names_path() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.json");
		std::fs::write(&path, "{ nope").unwrap();
		let err = ConfigFile::load(&path).unwrap_err();
		assert!(format!("{err:#}").contains("config.json"));
	}
}
