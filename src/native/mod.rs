//! Native per-directory watch adapters
//!
//! The correlation engine only ever sees [`NativeSignal`]s tagged with the
//! id of the Watch Node that owns the directory. Platform quirks (how a
//! rename is reported, what a removed directory does to its own handle) are
//! handled by the backend that produces the signals.
//!
//! - [`notify_backend`] - OS notifications through the `notify` crate
//! - [`manual`] - signals injected by the caller

pub mod manual;
pub mod notify_backend;

pub use manual::ManualBackend;
pub use notify_backend::NotifyBackend;

use crate::error::Result;
use crate::node::NodeId;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Raw, per-directory, non-recursive change signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeSignal {
	/// Something may have appeared in the directory
	Create { name: OsString },
	/// Content of an entry changed
	Modify { name: OsString },
	/// Something changed; could be a create, a delete, a rename or, on some
	/// platforms, a plain content change
	Ambiguous { hint: Option<OsString> },
	Error { kind: io::ErrorKind, message: String },
}

impl NativeSignal {
	pub fn create(name: impl Into<OsString>) -> Self {
		NativeSignal::Create { name: name.into() }
	}

	pub fn modify(name: impl Into<OsString>) -> Self {
		NativeSignal::Modify { name: name.into() }
	}

	pub fn ambiguous(hint: impl Into<OsString>) -> Self {
		NativeSignal::Ambiguous { hint: Some(hint.into()) }
	}

	pub fn error(err: &io::Error) -> Self {
		NativeSignal::Error {
			kind: err.kind(),
			message: err.to_string(),
		}
	}
}

/// Queue shared by every sink of one watcher instance
pub type SignalQueue = mpsc::UnboundedSender<(NodeId, NativeSignal)>;

/// Delivery endpoint for the signals of one watched directory
#[derive(Debug, Clone)]
pub struct SignalSink {
	node: NodeId,
	queue: SignalQueue,
}

impl SignalSink {
	pub fn new(node: NodeId, queue: SignalQueue) -> Self {
		Self { node, queue }
	}

	pub fn node(&self) -> NodeId {
		self.node
	}

	/// Returns false once the watcher has shut down
	pub fn send(&self, signal: NativeSignal) -> bool {
		self.queue.send((self.node, signal)).is_ok()
	}
}

/// Source of native per-directory watches
pub trait WatchBackend: Send + Sync {
	/// Start watching `dir` (not recursively) and deliver its signals to `sink`
	fn watch(&self, dir: &Path, sink: SignalSink) -> Result<Box<dyn NativeWatch>>;
}

/// Live native watch handle; dropping it closes it
pub trait NativeWatch: Send {
	/// Release the native handle. Calling it more than once is a no-op.
	fn close(&mut self);
}

/// Directory to sinks mapping shared by the backends. Several Watch Nodes can
/// watch the same directory (e.g. two roots with the same parent).
#[derive(Debug, Default)]
pub(crate) struct RouteTable {
	routes: HashMap<PathBuf, Vec<SignalSink>>,
}

impl RouteTable {
	/// Returns true when `dir` had no sink before
	pub(crate) fn add(&mut self, dir: &Path, sink: SignalSink) -> bool {
		let sinks = self.routes.entry(dir.to_path_buf()).or_default();
		sinks.push(sink);
		sinks.len() == 1
	}

	/// Returns true when `dir` has no sink left
	pub(crate) fn remove(&mut self, dir: &Path, node: NodeId) -> bool {
		let Some(sinks) = self.routes.get_mut(dir) else {
			return false;
		};
		sinks.retain(|s| s.node() != node);
		if sinks.is_empty() {
			self.routes.remove(dir);
			true
		} else {
			false
		}
	}

	pub(crate) fn sinks(&self, dir: &Path) -> &[SignalSink] {
		self.routes.get(dir).map(Vec::as_slice).unwrap_or_default()
	}

	pub(crate) fn all(&self) -> impl Iterator<Item = &SignalSink> {
		self.routes.values().flatten()
	}

	pub(crate) fn directories(&self) -> impl Iterator<Item = &PathBuf> {
		self.routes.keys()
	}
}
