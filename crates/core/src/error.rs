//! Error types for the control-plane core.

use std::path::PathBuf;

use blynx_protocol::codes;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// Writing a store file failed; the in-memory state was left unchanged.
	#[error("failed to persist store {path}")]
	Persist {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid input: {0}")]
	InvalidInput(String),

	/// Fetching an extension package failed.
	#[error("download failed: {0}")]
	Download(String),

	/// The extension package is not a readable zip/crx archive.
	#[error("invalid package: {0}")]
	Archive(String),

	#[error("invalid manifest: {0}")]
	Manifest(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Error code reported to windows in an error response.
	pub fn code(&self) -> &'static str {
		match self {
			Error::Persist { .. } | Error::Io(_) => codes::IO,
			Error::InvalidInput(_) | Error::Json(_) => codes::INVALID_INPUT,
			Error::Download(_) => "download_failed",
			Error::Archive(_) | Error::Manifest(_) => "invalid_package",
		}
	}

	pub(crate) fn invalid(msg: impl Into<String>) -> Self {
		Error::InvalidInput(msg.into())
	}
}

impl From<zip::result::ZipError> for Error {
	fn from(err: zip::result::ZipError) -> Self {
		Error::Archive(err.to_string())
	}
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		Error::Download(err.to_string())
	}
}
