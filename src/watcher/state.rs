//! Synchronous bookkeeping of a running watcher
//!
//! Every method here runs under the engine's state lock and never awaits, so
//! the mirror, the index, the Watch Nodes, the counters and the correlator
//! always change together.

use crate::correlator::MoveCorrelator;
use crate::error::Result;
use crate::events::{FileSystemEvent, WatcherEvent};
use crate::native::NativeWatch;
use crate::node::{EntryMap, NodeId, RootMarker, WatchNode};
use crate::scan::{ScanContext, ScannedEntry};
use crate::tree::{IndexEntry, PathTree, TreeNode, TreeSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// A configured root after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WatchedRoot {
	pub path: PathBuf,
	pub is_directory: bool,
	/// Watch Node on the parent directory reporting the root's own removal
	pub marker: NodeId,
}

pub(crate) struct EngineState {
	pub nodes: HashMap<NodeId, WatchNode>,
	pub index: PathTree<IndexEntry>,
	pub mirror: PathTree<TreeNode>,
	pub correlator: MoveCorrelator,
	pub files: usize,
	pub directories: usize,
	pub roots: Vec<WatchedRoot>,
	pub stopped: bool,
	events: mpsc::UnboundedSender<WatcherEvent>,
}

/// `path` with its `base` prefix replaced by `onto`
fn rebased(path: &Path, base: &Path, onto: &Path) -> PathBuf {
	match path.strip_prefix(base) {
		Ok(rest) if rest.as_os_str().is_empty() => onto.to_path_buf(),
		Ok(rest) => onto.join(rest),
		Err(_) => path.to_path_buf(),
	}
}

impl EngineState {
	pub fn new(
		move_window: Option<Duration>,
		events: mpsc::UnboundedSender<WatcherEvent>,
	) -> Self {
		Self {
			nodes: HashMap::new(),
			index: PathTree::new(),
			mirror: PathTree::new(),
			correlator: MoveCorrelator::new(move_window),
			files: 0,
			directories: 0,
			roots: Vec::new(),
			stopped: false,
			events,
		}
	}

	pub fn send(&self, event: WatcherEvent) {
		if self.events.send(event).is_err() {
			trace!("event receiver dropped");
		}
	}

	pub fn emit(&self, event: FileSystemEvent) {
		debug!(
			"{:?} {} {}",
			event.event_type,
			event.path.display(),
			if event.is_directory { "(dir)" } else { "(file)" }
		);
		self.send(WatcherEvent::FileSystem(event));
	}

	/// Register a scanned subtree: Watch Nodes and counters. Returns its mirror
	/// and index shapes for the caller to attach. With `emit`, a Create is
	/// reported for the entry and every descendant, parents first.
	pub fn install(&mut self, entry: ScannedEntry, emit: bool) -> (TreeNode, Option<IndexEntry>) {
		match entry {
			ScannedEntry::File { path } => {
				self.files += 1;
				if emit {
					self.emit(FileSystemEvent::create(path.clone(), false));
				}
				(TreeNode::File(path), None)
			}
			ScannedEntry::Directory {
				path,
				node,
				native,
				children,
			} => {
				self.directories += 1;
				if emit {
					self.emit(FileSystemEvent::create(path.clone(), true));
				}

				let entries: EntryMap = children
					.iter()
					.map(|(name, child)| (name.clone(), child.is_directory()))
					.collect();
				self.nodes
					.insert(node, WatchNode::new(node, path, entries, Some(native)));

				let mut tree = BTreeMap::new();
				let mut index = IndexEntry::new(node);
				for (name, child) in children {
					let (child_tree, child_index) = self.install(child, emit);
					if let Some(child_index) = child_index {
						index.children.insert(name.clone(), child_index);
					}
					tree.insert(name, child_tree);
				}
				(TreeNode::Directory(tree), Some(index))
			}
		}
	}

	/// Install a whole root together with its parent's marker node
	pub fn install_root(
		&mut self,
		scanned: ScannedEntry,
		marker: NodeId,
		parent: PathBuf,
		parent_watch: Box<dyn NativeWatch>,
	) {
		let path = scanned.path().to_path_buf();
		let is_directory = scanned.is_directory();
		let Some(name) = path.file_name().map(OsString::from) else {
			warn!("root {:?} has no name, not installed", path);
			return;
		};

		let (tree, index) = self.install(scanned, false);
		self.mirror.insert_root(path.clone(), tree);
		if let Some(index) = index {
			self.index.insert_root(path.clone(), index);
		}

		let entries: EntryMap = [(name.clone(), is_directory)].into_iter().collect();
		let node = WatchNode::new(marker, parent, entries, Some(parent_watch))
			.with_root(RootMarker { entry: name, is_directory });
		self.nodes.insert(marker, node);
		self.roots.push(WatchedRoot {
			path,
			is_directory,
			marker,
		});
	}

	/// Attach an entry created at runtime below an existing directory
	pub fn attach(&mut self, scanned: ScannedEntry) {
		let path = scanned.path().to_path_buf();
		let (tree, index) = self.install(scanned, true);

		let files = tree.files();
		let directories = tree.directories();
		if self.mirror.insert(&path, tree).is_err() {
			warn!("no parent for {:?} in the tree, dropping it", path);
			if let Some(index) = index {
				self.close_nodes(&index);
			}
			self.files = self.files.saturating_sub(files);
			self.directories = self.directories.saturating_sub(directories);
			return;
		}
		if let Some(index) = index {
			if let Err(index) = self.index.insert(&path, index) {
				self.close_nodes(&index);
			}
		}
	}

	fn close_nodes(&mut self, index: &IndexEntry) {
		for id in index.node_ids() {
			self.nodes.remove(&id);
		}
	}

	/// Forget everything below `path` and report it deleted
	pub fn resolve_delete(&mut self, path: &Path, is_directory: bool) {
		if let Some(index) = self.index.remove(path) {
			self.close_nodes(&index);
		}
		if let Some(tree) = self.mirror.remove(path) {
			self.files = self.files.saturating_sub(tree.files());
			self.directories = self.directories.saturating_sub(tree.directories());
		}
		self.emit(FileSystemEvent::delete(path.to_path_buf(), is_directory));
	}

	/// A watched root disappeared: report it and release the root with its
	/// marker node
	pub fn remove_root(&mut self, marker: NodeId) {
		let Some(pos) = self.roots.iter().position(|r| r.marker == marker) else {
			return;
		};
		let root = self.roots.remove(pos);
		self.nodes.remove(&marker);
		self.resolve_delete(&root.path, root.is_directory);
	}

	/// Move the subtree at `from` to `to` in the mirror and the index,
	/// re-pointing the Watch Nodes it contains. Returns false when there was
	/// nothing to move.
	pub fn relocate(&mut self, ctx: &ScanContext, from: &Path, to: &Path) -> Result<bool> {
		let Some(mut tree) = self.mirror.remove(from) else {
			return Ok(false);
		};
		tree.rebase(from, to);
		if let Err(tree) = self.mirror.insert(to, tree) {
			self.files = self.files.saturating_sub(tree.files());
			self.directories = self.directories.saturating_sub(tree.directories());
			if let Some(index) = self.index.remove(from) {
				self.close_nodes(&index);
			}
			return Ok(false);
		}
		self.correlator.rebase(from, to);

		let Some(index) = self.index.remove(from) else {
			return Ok(true);
		};
		for id in index.node_ids() {
			let Some(node) = self.nodes.get_mut(&id) else {
				continue;
			};
			let path = rebased(&node.path, from, to);
			node.close();
			match ctx.rewatch(&path, id) {
				Ok(native) => node.rebind(&path, native),
				Err(e) if e.io_kind() == Some(io::ErrorKind::NotFound) => {
					debug!("{:?} gone before it could be watched again", path);
					node.path = path;
				}
				Err(e) => return Err(e),
			}
		}
		if let Err(index) = self.index.insert(to, index) {
			self.close_nodes(&index);
		}
		Ok(true)
	}

	pub fn snapshot(&self) -> TreeSnapshot {
		if self.stopped {
			return TreeSnapshot::default();
		}
		let roots: Vec<_> = self.mirror.roots().collect();
		match roots.as_slice() {
			[(_, TreeNode::Directory(children))] => TreeSnapshot(children.clone()),
			[(path, leaf)] => {
				let name = path
					.file_name()
					.map(OsString::from)
					.unwrap_or_else(|| path.as_os_str().to_os_string());
				TreeSnapshot([(name, TreeNode::clone(leaf))].into_iter().collect())
			}
			_ => TreeSnapshot(
				roots
					.into_iter()
					.map(|(path, node)| (path.as_os_str().to_os_string(), node.clone()))
					.collect(),
			),
		}
	}

	/// Close every native handle and forget everything
	pub fn teardown(&mut self) {
		self.stopped = true;
		self.nodes.clear();
		self.index.clear();
		self.mirror.clear();
		self.correlator.clear();
		self.roots.clear();
		self.files = 0;
		self.directories = 0;
	}
}
