//! Fetching and unpacking extension packages.
//!
//! Packages are `.zip` files or Chrome `.crx` files (a zip behind a `Cr24`
//! header). They are unpacked into a hidden temporary directory next to the
//! final location and moved into place only once the manifest has been read,
//! so a broken package never replaces a working install.

use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use blynx_protocol::{ExtensionSource, InstalledExtension};
use tracing::{debug, info};
use url::Url;
use zip::ZipArchive;

use super::manifest::{MANIFEST_FILE, Manifest};
use crate::error::{Error, Result};
use crate::store::registry::validate_component;

const CRX_MAGIC: &[u8; 4] = b"Cr24";

/// Everything needed to install one package, captured while the control
/// state is locked so the install itself can run without it.
#[derive(Debug, Clone)]
pub struct InstallPlan {
	pub source: ExtensionSource,
	pub extension_id: Option<String>,
	/// `<userData>/<profileId>/extensions`.
	pub extensions_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExtensionInstaller {
	client: reqwest::Client,
}

impl ExtensionInstaller {
	pub fn new() -> Result<Self> {
		let client = reqwest::Client::builder()
			.user_agent(concat!("blynx/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(|e| Error::Download(format!("failed to create HTTP client: {e}")))?;
		Ok(Self::with_client(client))
	}

	pub fn with_client(client: reqwest::Client) -> Self {
		Self { client }
	}

	pub async fn install(&self, plan: InstallPlan) -> Result<InstalledExtension> {
		let InstallPlan {
			source,
			extension_id,
			extensions_dir,
		} = plan;

		let (bytes, fallback_id) = match source {
			ExtensionSource::Directory(dir) => return register_directory(&dir, extension_id.as_deref()),
			ExtensionSource::Archive(file) => {
				let bytes = tokio::fs::read(&file)
					.await
					.map_err(|e| Error::Download(format!("cannot read {}: {e}", file.display())))?;
				(bytes, id_from_path(&file))
			}
			ExtensionSource::Url(raw) => {
				let url = Url::parse(&raw).map_err(|e| Error::invalid(format!("bad package url {raw:?}: {e}")))?;
				let bytes = self.fetch(&url).await?;
				let stem = url.path_segments().and_then(|mut s| s.next_back()).map(Path::new).and_then(id_from_path);
				(bytes, stem)
			}
		};

		let id = choose_id(extension_id.as_deref(), fallback_id)?;
		let extension = tokio::task::spawn_blocking(move || unpack(&bytes, &extensions_dir, &id))
			.await
			.map_err(|e| Error::Io(io::Error::other(e)))??;
		info!(target = "blynx.extensions", id = %extension.id, path = %extension.path.display(), "package installed");
		Ok(extension)
	}

	async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
		if !matches!(url.scheme(), "http" | "https") {
			return Err(Error::invalid(format!("unsupported package url scheme: {}", url.scheme())));
		}
		debug!(target = "blynx.extensions", url = %url, "downloading package");
		let response = self.client.get(url.clone()).send().await?;
		if !response.status().is_success() {
			return Err(Error::Download(format!("{url} answered {}", response.status())));
		}
		let bytes = response.bytes().await?;
		debug!(target = "blynx.extensions", bytes = bytes.len(), "package downloaded");
		Ok(bytes.to_vec())
	}
}

fn register_directory(dir: &Path, requested: Option<&str>) -> Result<InstalledExtension> {
	let dir = dir
		.canonicalize()
		.map_err(|e| Error::invalid(format!("cannot open {}: {e}", dir.display())))?;
	let id = choose_id(requested, id_from_path(&dir))?;
	let manifest = Manifest::read(&dir)?;
	Ok(describe(id, dir, &manifest))
}

/// Returns the zip payload of a package, skipping a CRX header if present.
pub fn strip_crx(bytes: &[u8]) -> Result<&[u8]> {
	if !bytes.starts_with(CRX_MAGIC) {
		return Ok(bytes);
	}
	let word = |at: usize| -> Result<usize> {
		bytes
			.get(at..at + 4)
			.map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
			.ok_or_else(|| Error::Archive("truncated crx header".into()))
	};
	let offset = match word(4)? {
		2 => 16 + word(8)? + word(12)?,
		3 => 12 + word(8)?,
		other => return Err(Error::Archive(format!("unsupported crx version {other}"))),
	};
	bytes
		.get(offset..)
		.ok_or_else(|| Error::Archive("crx header runs past end of file".into()))
}

/// Unpacks `bytes` into `<extensions_dir>/<id>`, replacing an earlier copy.
pub fn unpack(bytes: &[u8], extensions_dir: &Path, id: &str) -> Result<InstalledExtension> {
	let payload = strip_crx(bytes)?;
	fs::create_dir_all(extensions_dir)?;
	let staging = tempfile::Builder::new().prefix(".unpack-").tempdir_in(extensions_dir)?;
	let content = staging.path().join("package");

	let mut archive = ZipArchive::new(Cursor::new(payload))?;
	for i in 0..archive.len() {
		let mut entry = archive.by_index(i)?;
		let Some(relative) = entry.enclosed_name() else {
			return Err(Error::Archive(format!("entry {:?} escapes the package", entry.name())));
		};
		let out = content.join(relative);
		if entry.is_dir() {
			fs::create_dir_all(&out)?;
			continue;
		}
		if let Some(parent) = out.parent() {
			fs::create_dir_all(parent)?;
		}
		let mut file = fs::File::create(&out)?;
		io::copy(&mut entry, &mut file)?;
	}

	let root = package_root(&content)?;
	let manifest = Manifest::read(&root)?;
	let target = extensions_dir.join(id);
	if target.exists() {
		fs::remove_dir_all(&target)?;
	}
	fs::rename(&root, &target)?;
	Ok(describe(id.to_string(), target, &manifest))
}

/// Directory holding `manifest.json`: the package itself, or its only
/// top-level folder.
fn package_root(content: &Path) -> Result<PathBuf> {
	if content.join(MANIFEST_FILE).is_file() {
		return Ok(content.to_path_buf());
	}
	let mut entries = fs::read_dir(content)?.collect::<io::Result<Vec<_>>>()?;
	if entries.len() == 1 {
		let only = entries.remove(0).path();
		if only.join(MANIFEST_FILE).is_file() {
			return Ok(only);
		}
	}
	Err(Error::Manifest(format!("package has no {MANIFEST_FILE}")))
}

fn describe(id: String, path: PathBuf, manifest: &Manifest) -> InstalledExtension {
	InstalledExtension {
		name: if manifest.name.is_empty() { id.clone() } else { manifest.name.clone() },
		id,
		version: manifest.version.clone(),
		path,
		popup: manifest.popup().map(str::to_string),
		icon: manifest.icon().map(str::to_string),
	}
}

fn choose_id(requested: Option<&str>, fallback: Option<String>) -> Result<String> {
	match requested.filter(|id| !id.is_empty()) {
		Some(id) if sanitize_id(id).as_deref() == Some(id) => {
			validate_component("extension id", id)?;
			Ok(id.to_string())
		}
		Some(id) => Err(Error::invalid(format!("extension id {id:?} may only use letters, digits, '-' and '_'"))),
		None => fallback.ok_or_else(|| Error::invalid("cannot derive an extension id; pass one explicitly")),
	}
}

/// Id derived from a package file or directory name.
fn id_from_path(path: &Path) -> Option<String> {
	let stem = path.file_stem()?.to_str()?;
	sanitize_id(stem)
}

fn sanitize_id(raw: &str) -> Option<String> {
	let id: String = raw
		.chars()
		.filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
		.collect();
	(!id.is_empty()).then_some(id)
}
