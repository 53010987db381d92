//! The engine task: builds the initial tree, then turns native signals into
//! semantic events one at a time, in arrival order.
//!
//! Filesystem calls happen outside the state lock. After each of them the
//! Watch Node is looked up again, so a result arriving after teardown (or
//! after its directory was released) is dropped instead of applied.

use super::state::EngineState;
use crate::error::{Result, WatcherError};
use crate::events::{FileSystemEvent, WatcherEvent};
use crate::native::NativeSignal;
use crate::node::{ChangeVerdict, DiffOutcome, DirectoryDiff, NodeId, RootMarker};
use crate::scan::{self, ScanContext, ScannedEntry};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Change resolved under the lock that still needs a scan
struct PendingScan {
	name: OsString,
	path: PathBuf,
}

pub(crate) struct Engine {
	pub state: Arc<Mutex<EngineState>>,
	pub ctx: ScanContext,
	pub change_window: Option<Duration>,
}

async fn wait_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

async fn canonical(path: &Path) -> Result<PathBuf> {
	tokio::fs::canonicalize(path)
		.await
		.map_err(|e| WatcherError::filesystem("resolve", path, e))
}

/// Absolute, normalized root path. Without symlink following only the
/// parent is canonicalized so a root that is itself a link is watched as a
/// link.
async fn resolve_root(root: &Path, follow_symlinks: bool) -> Result<PathBuf> {
	let absolute = if root.is_absolute() {
		root.to_path_buf()
	} else {
		std::env::current_dir()?.join(root)
	};
	let lexical: PathBuf = absolute.components().collect();

	let resolved = match (follow_symlinks, lexical.parent(), lexical.file_name()) {
		(false, Some(parent), Some(name)) => canonical(parent).await?.join(name),
		_ => canonical(&lexical).await?,
	};

	if resolved.parent().is_none() || resolved.file_name().is_none() {
		return Err(WatcherError::InvalidPath {
			path: resolved.display().to_string(),
		});
	}
	Ok(resolved)
}

/// Drop duplicate roots and refuse nested ones
fn disjoint_roots(mut roots: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
	let mut seen = HashSet::new();
	roots.retain(|root| seen.insert(root.clone()));

	for outer in &roots {
		if let Some(inner) = roots.iter().find(|r| *r != outer && r.starts_with(outer)) {
			return Err(WatcherError::configuration_error(
				"roots",
				"roots overlap",
				"disjoint paths",
				&format!("{} contains {}", outer.display(), inner.display()),
			));
		}
	}
	Ok(roots)
}

fn join_names(names: &[(OsString, bool)]) -> String {
	names
		.iter()
		.map(|(name, _)| name.to_string_lossy().into_owned())
		.collect::<Vec<_>>()
		.join(", ")
}

/// Debounce and report a content change of `name` in Watch Node `id`
fn register_change(
	state: &mut EngineState,
	id: NodeId,
	name: &OsStr,
	window: Option<Duration>,
) {
	if state.stopped {
		return;
	}
	let Some(node) = state.nodes.get_mut(&id) else {
		return;
	};
	if !node.is_relevant(name) {
		return;
	}
	match node.entries.register_change(name, Instant::now(), window) {
		ChangeVerdict::Emit => {
			let path = node.entry_path(name);
			state.emit(FileSystemEvent::change(path));
		}
		verdict => trace!("change of {:?} in {}: {:?}", name, id, verdict),
	}
}

/// Take `name` out of Watch Node `id`. A marker node losing its entry means
/// the root itself is gone.
fn remove_entry(
	state: &mut EngineState,
	id: NodeId,
	name: &OsStr,
	is_directory: bool,
	correlate: bool,
) {
	let Some(node) = state.nodes.get_mut(&id) else {
		return;
	};
	node.entries.remove(name);
	let is_marker = node.root.is_some();
	let path = node.entry_path(name);

	if is_marker {
		debug!("watched root {:?} removed", path);
		state.remove_root(id);
	} else if correlate && state.correlator.is_enabled() {
		trace!("holding {:?} for move correlation", path);
		state
			.correlator
			.file(name.to_os_string(), path, is_directory, Instant::now());
	} else {
		state.resolve_delete(&path, is_directory);
	}
}

impl Engine {
	pub async fn run(
		self,
		roots: Vec<PathBuf>,
		mut signals: mpsc::UnboundedReceiver<(NodeId, NativeSignal)>,
		mut shutdown: watch::Receiver<bool>,
	) {
		let built = tokio::select! {
			_ = shutdown.changed() => return,
			built = self.build(roots) => built,
		};
		if let Err(e) = built {
			self.fail(e);
			return;
		}
		{
			let state = self.state.lock();
			if state.stopped {
				return;
			}
			info!(
				"Watching {} directories and {} files",
				state.directories, state.files
			);
			state.send(WatcherEvent::Ready);
		}

		loop {
			let deadline = self.state.lock().correlator.next_deadline();
			tokio::select! {
				biased;
				_ = shutdown.changed() => break,
				received = signals.recv() => {
					let Some((node, signal)) = received else {
						break;
					};
					if let Err(e) = self.handle(node, signal).await {
						self.fail(e);
						break;
					}
				}
				_ = wait_until(deadline) => self.expire(),
			}
		}
		debug!("engine loop ended");
	}

	async fn build(&self, roots: Vec<PathBuf>) -> Result<()> {
		let mut resolved = Vec::with_capacity(roots.len());
		for root in &roots {
			resolved.push(resolve_root(root, self.ctx.follow_symlinks).await?);
		}
		let resolved = disjoint_roots(resolved)?;

		let mut set = JoinSet::new();
		for (position, path) in resolved.into_iter().enumerate() {
			let ctx = self.ctx.clone();
			set.spawn(async move {
				let parent = path
					.parent()
					.map(Path::to_path_buf)
					.ok_or_else(|| WatcherError::InvalidPath {
						path: path.display().to_string(),
					})?;
				// The parent is watched first so the root's own removal during
				// the scan is not missed
				let marker = ctx.watch(&parent)?;
				let scanned = scan::scan(ctx, path).await?;
				Ok::<_, WatcherError>((position, parent, marker, scanned))
			});
		}

		let mut built = Vec::new();
		let mut errors = Vec::new();
		while let Some(joined) = set.join_next().await {
			match joined {
				Ok(Ok(root)) => built.push(root),
				Ok(Err(WatcherError::Multiple(nested))) => errors.extend(nested),
				Ok(Err(e)) => errors.push(e),
				Err(e) => errors.push(WatcherError::Io(io::Error::new(io::ErrorKind::Other, e))),
			}
		}
		if !errors.is_empty() {
			return Err(WatcherError::aggregate(errors));
		}
		built.sort_by_key(|(position, ..)| *position);

		let mut state = self.state.lock();
		if state.stopped {
			return Ok(());
		}
		for (_, parent, (marker, parent_watch), scanned) in built {
			match scanned {
				Some(scanned) => state.install_root(scanned, marker, parent, parent_watch),
				None => debug!("root in {:?} excluded by the filter", parent),
			}
		}
		Ok(())
	}

	async fn handle(&self, node: NodeId, signal: NativeSignal) -> Result<()> {
		trace!("{} {:?}", node, signal);
		match signal {
			NativeSignal::Modify { name } => {
				register_change(&mut self.state.lock(), node, &name, self.change_window);
				Ok(())
			}
			NativeSignal::Create { name } => {
				self.diff(node, Some(name)).await?;
				Ok(())
			}
			NativeSignal::Ambiguous { hint: Some(hint) } => {
				self.diff(node, Some(hint)).await?;
				Ok(())
			}
			// Lost track of what happened: settle every difference
			NativeSignal::Ambiguous { hint: None } => {
				while self.diff(node, None).await? {}
				Ok(())
			}
			NativeSignal::Error { kind, message } => self.native_error(node, kind, message).await,
		}
	}

	async fn native_error(&self, id: NodeId, kind: io::ErrorKind, message: String) -> Result<()> {
		let path = self.state.lock().nodes.get(&id).map(|n| n.path.clone());
		let Some(path) = path else {
			return Ok(());
		};

		let error = WatcherError::Native {
			path: path.display().to_string(),
			kind,
			message,
		};
		if error.is_removal_race() && !tokio::fs::try_exists(&path).await.unwrap_or(false) {
			// The parent's Watch Node reports the removal
			warn!("{} lost its directory: {}", id, error);
			return Ok(());
		}
		Err(error)
	}

	/// Directory listing as seen by Watch Node `id`: known names, plus new
	/// names the filter accepts. `None` when the directory itself is gone.
	async fn listing(
		&self,
		dir: &Path,
		known: &[(OsString, bool)],
		marker: Option<&RootMarker>,
	) -> Result<Option<BTreeSet<OsString>>> {
		let names = match scan::list(dir).await {
			Ok(names) => names,
			// The root went away together with its parent
			Err(e) if e.kind() == io::ErrorKind::NotFound && marker.is_some() => BTreeSet::new(),
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(WatcherError::filesystem("readdir", dir, e)),
		};

		let mut listing = BTreeSet::new();
		for name in names {
			let relevant = match marker {
				Some(marker) => marker.entry == name,
				None if known.iter().any(|(k, _)| *k == name) => true,
				// Links back up were never scanned and stay out of the diff
				None => {
					let path = dir.join(&name);
					self.ctx.filter.include(&path, &name).await && !self.ctx.is_loop(&path).await
				}
			};
			if relevant {
				listing.insert(name);
			}
		}
		Ok(Some(listing))
	}

	/// Resolve at most one change in the directory of Watch Node `id`.
	/// Returns whether anything changed.
	async fn diff(&self, id: NodeId, hint: Option<OsString>) -> Result<bool> {
		let known = {
			let state = self.state.lock();
			if state.stopped {
				return Ok(false);
			}
			state
				.nodes
				.get(&id)
				.map(|n| (n.path.clone(), n.entries.snapshot(), n.root.clone()))
		};
		let Some((dir, known, marker)) = known else {
			trace!("{} already released", id);
			return Ok(false);
		};
		if let (Some(marker), Some(hint)) = (&marker, &hint) {
			if marker.entry != *hint {
				return Ok(false);
			}
		}

		let Some(listing) = self.listing(&dir, &known, marker.as_ref()).await? else {
			trace!("{:?} is gone, leaving it to its parent", dir);
			return Ok(false);
		};
		let mut diff = DirectoryDiff::new(&known, &listing, hint.as_deref());

		if diff.is_clean() {
			// Nothing appeared or vanished: the hinted entry was written to
			// or replaced in place
			if let Some(hint) = &hint {
				register_change(&mut self.state.lock(), id, hint, self.change_window);
			}
			return Ok(false);
		}

		let mut removed = None;
		for candidate in &diff.absent {
			if let Err(e) = self.ctx.stat(&dir.join(&candidate.0)).await {
				if e.kind() == io::ErrorKind::NotFound {
					removed = Some(candidate.clone());
					break;
				}
			}
		}
		if removed.is_none() && !diff.absent.is_empty() {
			return Err(WatcherError::DiffInvariant {
				directory: dir.display().to_string(),
				expected: join_names(&diff.absent),
			});
		}

		let (outcome, is_directory) = loop {
			let outcome = diff.classify(removed.as_ref());
			let name = match &outcome {
				DiffOutcome::Renamed { to, .. } => to.clone(),
				DiffOutcome::Created { name } => name.clone(),
				_ => break (outcome, false),
			};
			match self.ctx.stat(&dir.join(&name)).await {
				Ok(metadata) => break (outcome, metadata.is_dir()),
				Err(e) if e.kind() == io::ErrorKind::NotFound => diff.drop_unseen(&name),
				Err(e) => return Err(WatcherError::filesystem("stat", &dir.join(&name), e)),
			}
		};

		if outcome == DiffOutcome::Unchanged {
			// New names vanished before they could be inspected
			if let Some(hint) = &hint {
				register_change(&mut self.state.lock(), id, hint, self.change_window);
			}
			return Ok(false);
		}

		let pending = {
			let mut state = self.state.lock();
			if state.stopped || !state.nodes.contains_key(&id) {
				return Ok(false);
			}
			match self.apply(&mut state, id, outcome, is_directory)? {
				Some(pending) => pending,
				None => return Ok(true),
			}
		};

		self.create_directory(id, pending).await
	}

	/// Apply a classified change. Returns the directory still to be scanned
	/// when a new directory appeared.
	fn apply(
		&self,
		state: &mut EngineState,
		id: NodeId,
		outcome: DiffOutcome,
		is_directory: bool,
	) -> Result<Option<PendingScan>> {
		match outcome {
			DiffOutcome::Removed { name, is_directory } => {
				remove_entry(state, id, &name, is_directory, true);
				Ok(None)
			}
			// Several candidates: no guessing which one went where
			DiffOutcome::RemovedAmbiguous { name, is_directory } => {
				remove_entry(state, id, &name, is_directory, false);
				Ok(None)
			}
			DiffOutcome::Renamed {
				from,
				to,
				is_directory: was_directory,
			} => {
				if was_directory != is_directory {
					remove_entry(state, id, &from, was_directory, false);
					return self.create_entry(state, id, to, is_directory);
				}

				let Some(node) = state.nodes.get_mut(&id) else {
					return Ok(None);
				};
				node.entries.remove(&from);
				let source = node.entry_path(&from);
				let destination = node.entry_path(&to);

				if state.relocate(&self.ctx, &source, &destination)? {
					if let Some(node) = state.nodes.get_mut(&id) {
						node.entries
							.insert_new(to, is_directory, Instant::now(), self.change_window);
					}
					state.emit(FileSystemEvent::moved(source, destination, is_directory));
					Ok(None)
				} else {
					state.resolve_delete(&source, was_directory);
					self.create_entry(state, id, to, is_directory)
				}
			}
			DiffOutcome::Created { name } => self.create_entry(state, id, name, is_directory),
			DiffOutcome::Unchanged => Ok(None),
		}
	}

	/// A new entry appeared: either the destination of a parked removal or a
	/// genuine creation
	fn create_entry(
		&self,
		state: &mut EngineState,
		id: NodeId,
		name: OsString,
		is_directory: bool,
	) -> Result<Option<PendingScan>> {
		let Some(node) = state.nodes.get(&id) else {
			return Ok(None);
		};
		if node.root.is_some() {
			return Ok(None);
		}
		let path = node.entry_path(&name);

		if let Some(pending) = state.correlator.take_oldest(is_directory) {
			if pending.path == path {
				// Deleted and recreated under the same name
				state.resolve_delete(&pending.path, pending.is_directory);
			} else if state.relocate(&self.ctx, &pending.path, &path)? {
				if let Some(node) = state.nodes.get_mut(&id) {
					node.entries
						.insert_new(name, is_directory, Instant::now(), self.change_window);
				}
				state.emit(FileSystemEvent::moved(pending.path, path, is_directory));
				return Ok(None);
			} else {
				state.resolve_delete(&pending.path, pending.is_directory);
			}
		}

		if is_directory {
			return Ok(Some(PendingScan { name, path }));
		}
		if let Some(node) = state.nodes.get_mut(&id) {
			node.entries
				.insert_new(name, false, Instant::now(), self.change_window);
		}
		state.attach(ScannedEntry::File { path });
		Ok(None)
	}

	async fn create_directory(&self, id: NodeId, pending: PendingScan) -> Result<bool> {
		let scanned = match scan::scan(self.ctx.clone(), pending.path.clone()).await {
			Ok(Some(scanned)) => scanned,
			Ok(None) => return Ok(false),
			Err(e) if e.io_kind() == Some(io::ErrorKind::NotFound) => {
				debug!("{:?} vanished before it could be scanned", pending.path);
				return Ok(false);
			}
			Err(e) => return Err(e),
		};

		let mut state = self.state.lock();
		if state.stopped {
			return Ok(false);
		}
		let Some(node) = state.nodes.get_mut(&id) else {
			return Ok(false);
		};
		node.entries.insert(pending.name, scanned.is_directory());
		state.attach(scanned);
		Ok(true)
	}

	/// Parked removals nobody claimed become deletes
	fn expire(&self) {
		let mut state = self.state.lock();
		if state.stopped {
			return;
		}
		for pending in state.correlator.pop_expired(Instant::now()) {
			trace!("move window elapsed for {:?} at {:?}", pending.entry_name, pending.path);
			state.resolve_delete(&pending.path, pending.is_directory);
		}
	}

	/// Tear everything down, then report `error`. Nothing is reported after
	/// an explicit unwatch.
	fn fail(&self, error: WatcherError) {
		let mut state = self.state.lock();
		if state.stopped {
			debug!("ignoring error after unwatch: {}", error);
			return;
		}
		error!(category = error.category(), "Watcher failed: {}", error);
		state.teardown();
		state.send(WatcherEvent::Error(error));
	}
}
