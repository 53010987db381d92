//! Recursive descent building the watched tree
//!
//! Every directory gets its native watch before it is listed, so an entry
//! created while the scan runs is either listed or signalled. Children are
//! scanned concurrently on a [`JoinSet`] and joined before the directory
//! completes; failures from every branch are merged into one error.

use crate::error::{Result, WatcherError};
use crate::filter::EntryFilter;
use crate::native::{NativeWatch, SignalQueue, SignalSink, WatchBackend};
use crate::node::NodeId;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::Metadata;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

type ScanFuture = Pin<Box<dyn Future<Output = Result<Option<ScannedEntry>>> + Send>>;

/// Everything a scan needs, cheap to clone into child tasks
#[derive(Clone)]
pub struct ScanContext {
	pub backend: Arc<dyn WatchBackend>,
	pub queue: SignalQueue,
	pub filter: Arc<dyn EntryFilter>,
	pub follow_symlinks: bool,
	ids: Arc<AtomicU64>,
}

impl ScanContext {
	pub fn new(
		backend: Arc<dyn WatchBackend>,
		queue: SignalQueue,
		filter: Arc<dyn EntryFilter>,
		follow_symlinks: bool,
	) -> Self {
		Self {
			backend,
			queue,
			filter,
			follow_symlinks,
			ids: Arc::new(AtomicU64::new(1)),
		}
	}

	pub fn next_id(&self) -> NodeId {
		NodeId::new(self.ids.fetch_add(1, Ordering::Relaxed))
	}

	/// Register a native watch on `dir` for a fresh Watch Node
	pub fn watch(&self, dir: &Path) -> Result<(NodeId, Box<dyn NativeWatch>)> {
		let id = self.next_id();
		let native = self
			.backend
			.watch(dir, SignalSink::new(id, self.queue.clone()))?;
		Ok((id, native))
	}

	/// Watch `dir` on behalf of an existing Watch Node (after it moved)
	pub fn rewatch(&self, dir: &Path, id: NodeId) -> Result<Box<dyn NativeWatch>> {
		self.backend
			.watch(dir, SignalSink::new(id, self.queue.clone()))
	}

	/// `stat` or `lstat` depending on the symlink policy
	pub async fn stat(&self, path: &Path) -> io::Result<Metadata> {
		if self.follow_symlinks {
			tokio::fs::metadata(path).await
		} else {
			tokio::fs::symlink_metadata(path).await
		}
	}

	/// Whether following `path` leads back to a directory above it
	pub async fn is_loop(&self, path: &Path) -> bool {
		if !self.follow_symlinks {
			return false;
		}
		let (Some(parent), Ok(real)) = (path.parent(), tokio::fs::canonicalize(path).await) else {
			return false;
		};
		real_ancestors(parent).await.contains(&real)
	}
}

/// `dir` and everything above it, symlinks resolved
async fn real_ancestors(dir: &Path) -> Vec<PathBuf> {
	match tokio::fs::canonicalize(dir).await {
		Ok(real) => real.ancestors().map(Path::to_path_buf).collect(),
		Err(_) => Vec::new(),
	}
}

/// A scanned entry, ready to be installed
pub enum ScannedEntry {
	File {
		path: PathBuf,
	},
	Directory {
		path: PathBuf,
		node: NodeId,
		native: Box<dyn NativeWatch>,
		children: BTreeMap<OsString, ScannedEntry>,
	},
}

impl ScannedEntry {
	pub fn path(&self) -> &Path {
		match self {
			ScannedEntry::File { path } | ScannedEntry::Directory { path, .. } => path,
		}
	}

	pub fn is_directory(&self) -> bool {
		matches!(self, ScannedEntry::Directory { .. })
	}
}

impl fmt::Debug for ScannedEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ScannedEntry::File { path } => f.debug_struct("File").field("path", path).finish(),
			ScannedEntry::Directory { path, node, children, .. } => f
				.debug_struct("Directory")
				.field("path", path)
				.field("node", node)
				.field("children", children)
				.finish_non_exhaustive(),
		}
	}
}

fn entry_name(path: &Path) -> &OsStr {
	path.file_name().unwrap_or(path.as_os_str())
}

/// Scan `path` and, when it is a directory, everything below it.
///
/// Returns `None` when the filter excludes the entry. Below the root an entry
/// that vanishes mid-scan is skipped rather than reported.
pub fn scan(ctx: ScanContext, path: PathBuf) -> ScanFuture {
	Box::pin(async move {
		let ancestors = match path.parent() {
			Some(parent) if ctx.follow_symlinks => real_ancestors(parent).await,
			_ => Vec::new(),
		};
		scan_entry(ctx, path, true, ancestors).await
	})
}

fn scan_entry(
	ctx: ScanContext,
	path: PathBuf,
	is_root: bool,
	ancestors: Vec<PathBuf>,
) -> ScanFuture {
	Box::pin(async move {
		if !ctx.filter.include(&path, entry_name(&path)).await {
			trace!("filtered out {:?}", path);
			return Ok(None);
		}

		let metadata = match ctx.stat(&path).await {
			Ok(metadata) => metadata,
			Err(e) if !is_root && e.kind() == io::ErrorKind::NotFound => {
				debug!("{:?} vanished during scan", path);
				return Ok(None);
			}
			Err(e) => return Err(WatcherError::filesystem("stat", &path, e)),
		};

		if !metadata.is_dir() {
			return Ok(Some(ScannedEntry::File { path }));
		}

		scan_directory(ctx, path, is_root, ancestors).await
	})
}

async fn scan_directory(
	ctx: ScanContext,
	path: PathBuf,
	is_root: bool,
	mut ancestors: Vec<PathBuf>,
) -> Result<Option<ScannedEntry>> {
	if ctx.follow_symlinks {
		// A link back to an ancestor would recurse forever
		let real = tokio::fs::canonicalize(&path)
			.await
			.map_err(|e| WatcherError::filesystem("canonicalize", &path, e))?;
		if ancestors.contains(&real) {
			warn!("symlink loop at {:?}, not descending", path);
			return Ok(None);
		}
		ancestors.push(real);
	}

	let (node, native) = match ctx.watch(&path) {
		Ok(watch) => watch,
		Err(e) if !is_root && e.io_kind() == Some(io::ErrorKind::NotFound) => return Ok(None),
		Err(e) => return Err(e),
	};

	let mut reader = match tokio::fs::read_dir(&path).await {
		Ok(reader) => reader,
		Err(e) if !is_root && e.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(WatcherError::filesystem("readdir", &path, e)),
	};

	let mut set = JoinSet::new();
	loop {
		match reader.next_entry().await {
			Ok(Some(entry)) => {
				set.spawn(scan_entry(ctx.clone(), entry.path(), false, ancestors.clone()));
			}
			Ok(None) => break,
			Err(e) => {
				set.abort_all();
				return Err(WatcherError::filesystem("readdir", &path, e));
			}
		}
	}

	let mut children = BTreeMap::new();
	let mut errors = Vec::new();
	while let Some(joined) = set.join_next().await {
		match joined {
			Ok(Ok(Some(child))) => {
				children.insert(entry_name(child.path()).to_os_string(), child);
			}
			Ok(Ok(None)) => {}
			Ok(Err(WatcherError::Multiple(nested))) => errors.extend(nested),
			Ok(Err(e)) => errors.push(e),
			Err(e) => errors.push(WatcherError::Io(io::Error::new(io::ErrorKind::Other, e))),
		}
	}

	if !errors.is_empty() {
		return Err(WatcherError::aggregate(errors));
	}

	trace!("scanned {:?}: {} entries", path, children.len());
	Ok(Some(ScannedEntry::Directory {
		path,
		node,
		native,
		children,
	}))
}

/// Names currently listed in `dir`
pub async fn list(dir: &Path) -> io::Result<BTreeSet<OsString>> {
	let mut reader = tokio::fs::read_dir(dir).await?;
	let mut names = BTreeSet::new();
	while let Some(entry) = reader.next_entry().await? {
		names.insert(entry.file_name());
	}
	Ok(names)
}
