//! Backend whose signals are injected by the caller
//!
//! Useful for deterministic tests and for embedders with their own change
//! notification source: register nothing with the OS, just route
//! [`NativeSignal`]s to whichever Watch Node owns a directory.

use super::{NativeSignal, NativeWatch, RouteTable, SignalSink, WatchBackend};
use crate::error::Result;
use crate::node::NodeId;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ManualBackend {
	routes: Arc<Mutex<RouteTable>>,
}

impl ManualBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Directories currently watched, sorted
	pub fn watched(&self) -> Vec<PathBuf> {
		let mut dirs: Vec<_> = self.routes.lock().directories().cloned().collect();
		dirs.sort();
		dirs
	}

	pub fn is_watched(&self, dir: &Path) -> bool {
		!self.routes.lock().sinks(dir).is_empty()
	}

	/// Deliver `signal` to every node watching `dir`; returns how many got it
	pub fn emit(&self, dir: &Path, signal: NativeSignal) -> usize {
		let routes = self.routes.lock();
		routes
			.sinks(dir)
			.iter()
			.filter(|sink| sink.send(signal.clone()))
			.count()
	}
}

impl WatchBackend for ManualBackend {
	fn watch(&self, dir: &Path, sink: SignalSink) -> Result<Box<dyn NativeWatch>> {
		let node = sink.node();
		self.routes.lock().add(dir, sink);
		Ok(Box::new(ManualWatch {
			dir: dir.to_path_buf(),
			node,
			routes: Some(Arc::clone(&self.routes)),
		}))
	}
}

struct ManualWatch {
	dir: PathBuf,
	node: NodeId,
	routes: Option<Arc<Mutex<RouteTable>>>,
}

impl NativeWatch for ManualWatch {
	fn close(&mut self) {
		if let Some(routes) = self.routes.take() {
			routes.lock().remove(&self.dir, self.node);
		}
	}
}

impl Drop for ManualWatch {
	fn drop(&mut self) {
		self.close();
	}
}
