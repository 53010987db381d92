//! Watch Nodes: per-directory watch state
//!
//! A Watch Node owns one native handle, the [`EntryMap`] describing its
//! directory and, for the parent directory of a watched root, a
//! [`RootMarker`] restricting which entries are relevant.

pub mod diff;
pub mod entries;

pub use diff::{DiffOutcome, DirectoryDiff};
pub use entries::{ChangeVerdict, EntryInfo, EntryMap};

use crate::native::NativeWatch;
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of a Watch Node; never reused within a watcher instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
	pub fn new(id: u64) -> Self {
		Self(id)
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "node#{}", self.0)
	}
}

/// The only entry a parent-of-root Watch Node cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootMarker {
	pub entry: OsString,
	pub is_directory: bool,
}

pub struct WatchNode {
	pub id: NodeId,
	pub path: PathBuf,
	pub entries: EntryMap,
	pub root: Option<RootMarker>,
	native: Option<Box<dyn NativeWatch>>,
}

impl WatchNode {
	pub fn new(
		id: NodeId,
		path: PathBuf,
		entries: EntryMap,
		native: Option<Box<dyn NativeWatch>>,
	) -> Self {
		Self { id, path, entries, root: None, native }
	}

	pub fn with_root(mut self, marker: RootMarker) -> Self {
		self.root = Some(marker);
		self
	}

	/// Whether a raw event about `entry` matters to this node
	pub fn is_relevant(&self, entry: &OsStr) -> bool {
		self.root.as_ref().map_or(true, |m| m.entry == entry)
	}

	pub fn entry_path(&self, entry: &OsStr) -> PathBuf {
		self.path.join(entry)
	}

	/// Swap the native handle, closing the previous one
	pub fn rebind(&mut self, path: &Path, native: Box<dyn NativeWatch>) {
		self.close();
		self.path = path.to_path_buf();
		self.native = Some(native);
	}

	pub fn is_open(&self) -> bool {
		self.native.is_some()
	}

	pub fn close(&mut self) {
		if let Some(mut native) = self.native.take() {
			native.close();
		}
	}
}

impl Drop for WatchNode {
	fn drop(&mut self) {
		self.close();
	}
}

impl fmt::Debug for WatchNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WatchNode")
			.field("id", &self.id)
			.field("path", &self.path)
			.field("entries", &self.entries.len())
			.field("root", &self.root)
			.field("open", &self.is_open())
			.finish()
	}
}
