use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "blynxd")]
#[command(about = "Blynx control daemon: profiles, stores, extension storage and tab hand-off")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// User data directory holding every store
	#[arg(long, global = true, value_name = "DIR")]
	pub user_data: Option<PathBuf>,

	/// Control socket path
	#[arg(long, global = true, value_name = "PATH")]
	pub socket: Option<PathBuf>,

	/// Configuration file (JSON)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run the control daemon in the foreground
	Serve {
		/// Application directory containing `internal/` pages
		#[arg(long, value_name = "DIR")]
		app_dir: Option<PathBuf>,
	},
	/// Report whether the daemon is running
	Status,
	/// Ask the daemon to shut down
	Stop,
	/// Send one request, e.g. '{"type":"store_get","key":"windowState"}'
	Exec {
		/// Request as JSON
		request: String,
	},
	/// Print broadcast events as they arrive
	Watch,
	/// Manage profiles
	#[command(subcommand)]
	Profiles(ProfilesCommand),
}

#[derive(Subcommand, Debug)]
pub enum ProfilesCommand {
	/// List profiles
	List,
	/// Print the current profile id
	Current,
	/// Create a profile
	Create {
		/// Display name (defaults to "Profile <n>")
		name: Option<String>,
	},
	/// Make a profile current
	Switch { id: String },
	/// Remove a profile from the list (its files are kept)
	Remove { id: String },
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use super::*;

	#[test]
	fn cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn global_flags_after_subcommand() {
		let cli = Cli::try_parse_from(["blynxd", "profiles", "switch", "user1", "-vv", "--user-data", "/tmp/u"]).unwrap();
		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.user_data, Some(PathBuf::from("/tmp/u")));
		match cli.command {
			Commands::Profiles(ProfilesCommand::Switch { id }) => assert_eq!(id, "user1"),
			other => panic!("unexpected command: {other:?}"),
		}
	}
}
