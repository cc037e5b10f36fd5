//! Durable, file-backed key/value namespaces with dotted-path addressing.
//!
//! A [`KeyedStore`] is one JSON document on disk (`blynx.json` inside the
//! store directory). Every mutation is applied to a copy of the document,
//! written to a temporary file in the same directory, synced, and renamed
//! over the store file; only then does the in-memory document change. A
//! failed write therefore leaves both the file and the memory untouched.
//!
//! A store file that cannot be read or parsed at open time is treated as
//! empty so one corrupt file never takes the control process down.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub mod path;
pub mod registry;

pub use registry::StoreRegistry;

/// File name of every store document.
pub const STORE_FILE: &str = "blynx.json";

pub type Document = Map<String, Value>;

#[derive(Debug)]
pub struct KeyedStore {
	file: PathBuf,
	doc: Mutex<Document>,
}

impl KeyedStore {
	/// Opens (or creates) the store living in `dir`.
	pub fn open(dir: &Path) -> Result<Self> {
		fs::create_dir_all(dir)?;
		let file = dir.join(STORE_FILE);
		let doc = load_document(&file);
		debug!(target = "blynx.store", path = %file.display(), keys = doc.len(), "store opened");
		Ok(Self {
			file,
			doc: Mutex::new(doc),
		})
	}

	pub fn file(&self) -> &Path {
		&self.file
	}

	/// Returns the value at `path`, or `default` when nothing is stored there.
	pub fn get(&self, path: &str, default: Value) -> Value {
		self.lookup(path).unwrap_or(default)
	}

	/// Returns a copy of the value at `path`.
	pub fn lookup(&self, path: &str) -> Option<Value> {
		self.inspect(path, |value| value.cloned())
	}

	/// Runs `f` against the value at `path` without copying it.
	pub fn inspect<R>(&self, path: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
		let segments = path::split(path);
		let doc = self.doc.lock();
		if segments.is_empty() {
			let root = Value::Object(doc.clone());
			return f(Some(&root));
		}
		f(lookup(&doc, &segments))
	}

	pub fn has(&self, path: &str) -> bool {
		self.inspect(path, |value| value.is_some())
	}

	/// Returns a copy of the whole document.
	pub fn all(&self) -> Document {
		self.doc.lock().clone()
	}

	pub fn set(&self, path: &str, value: Value) -> Result<()> {
		let segments = path::split(path);
		if segments.is_empty() {
			return Err(Error::invalid("cannot set an empty path"));
		}
		self.mutate(|doc| {
			insert(doc, &segments, value);
		})
	}

	/// Removes the value at `path`. Missing paths are a no-op.
	pub fn delete(&self, path: &str) -> Result<()> {
		let segments = path::split(path);
		if segments.is_empty() {
			return Err(Error::invalid("cannot delete an empty path"));
		}
		if !self.has(path) {
			return Ok(());
		}
		self.mutate(|doc| {
			remove(doc, &segments);
		})
	}

	/// Applies `f` to a copy of the document and persists the result before
	/// making it visible. Several edits made inside one call are written once.
	pub fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> R) -> Result<R> {
		let mut doc = self.doc.lock();
		let mut next = doc.clone();
		let out = f(&mut next);
		self.persist(&next)?;
		*doc = next;
		Ok(out)
	}

	fn persist(&self, doc: &Document) -> Result<()> {
		write_document(&self.file, doc).map_err(|source| Error::Persist {
			path: self.file.clone(),
			source,
		})
	}
}

/// Returns the value at `segments` below `doc`.
pub fn lookup<'a, S: AsRef<str>>(doc: &'a Document, segments: &[S]) -> Option<&'a Value> {
	let (first, rest) = segments.split_first()?;
	let mut current = doc.get(first.as_ref())?;
	for segment in rest {
		current = current.as_object()?.get(segment.as_ref())?;
	}
	Some(current)
}

/// Stores `value` at `segments`, creating intermediate objects and replacing
/// non-object intermediates.
pub fn insert<S: AsRef<str>>(doc: &mut Document, segments: &[S], value: Value) {
	let Some((last, parents)) = segments.split_last() else {
		return;
	};
	let mut current = doc;
	for segment in parents {
		let slot = current
			.entry(segment.as_ref().to_string())
			.or_insert_with(|| Value::Object(Map::new()));
		if !slot.is_object() {
			*slot = Value::Object(Map::new());
		}
		current = match slot {
			Value::Object(map) => map,
			_ => unreachable!("slot was just made an object"),
		};
	}
	current.insert(last.as_ref().to_string(), value);
}

/// Removes and returns the value at `segments`.
pub fn remove<S: AsRef<str>>(doc: &mut Document, segments: &[S]) -> Option<Value> {
	let (last, parents) = segments.split_last()?;
	let mut current = doc;
	for segment in parents {
		current = current.get_mut(segment.as_ref())?.as_object_mut()?;
	}
	current.remove(last.as_ref())
}

fn load_document(file: &Path) -> Document {
	let content = match fs::read_to_string(file) {
		Ok(content) => content,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Document::new(),
		Err(err) => {
			warn!(target = "blynx.store", path = %file.display(), error = %err, "unreadable store, starting empty");
			return Document::new();
		}
	};
	match serde_json::from_str::<Value>(&content) {
		Ok(Value::Object(map)) => map,
		Ok(_) => {
			warn!(target = "blynx.store", path = %file.display(), "store root is not an object, starting empty");
			Document::new()
		}
		Err(err) => {
			warn!(target = "blynx.store", path = %file.display(), error = %err, "corrupt store, starting empty");
			Document::new()
		}
	}
}

fn write_document(file: &Path, doc: &Document) -> std::io::Result<()> {
	let dir = file.parent().unwrap_or_else(|| Path::new("."));
	let mut tmp = NamedTempFile::new_in(dir)?;
	{
		let mut writer = BufWriter::new(tmp.as_file_mut());
		serde_json::to_writer_pretty(&mut writer, doc)?;
		writer.flush()?;
	}
	tmp.as_file().sync_all()?;
	tmp.persist(file).map_err(|err| err.error)?;
	Ok(())
}
