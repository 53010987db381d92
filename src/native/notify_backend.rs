//! `notify` based backend: one OS watcher per watcher instance, one
//! non-recursive watch per directory.

use super::{NativeSignal, NativeWatch, RouteTable, SignalSink, WatchBackend};
use crate::error::Result;
use crate::node::NodeId;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

struct Shared {
	watcher: Mutex<RecommendedWatcher>,
	routes: Arc<Mutex<RouteTable>>,
}

impl Shared {
	fn release(&self, dir: &Path, node: NodeId) {
		// Never hold the route lock while talking to the OS watcher: its
		// event thread needs that lock to dispatch.
		let last = self.routes.lock().remove(dir, node);
		if last {
			if let Err(e) = self.watcher.lock().unwatch(dir) {
				// Already gone when the directory itself was removed
				debug!("unwatch {:?}: {}", dir, e);
			}
		}
	}
}

pub struct NotifyBackend {
	shared: Arc<Shared>,
}

impl NotifyBackend {
	pub fn new() -> Result<Self> {
		let routes = Arc::new(Mutex::new(RouteTable::default()));
		let handler_routes = Arc::clone(&routes);

		let watcher = RecommendedWatcher::new(
			move |result: notify::Result<Event>| dispatch(&handler_routes, result),
			Config::default(),
		)?;

		Ok(Self {
			shared: Arc::new(Shared {
				watcher: Mutex::new(watcher),
				routes,
			}),
		})
	}
}

impl WatchBackend for NotifyBackend {
	fn watch(&self, dir: &Path, sink: SignalSink) -> Result<Box<dyn NativeWatch>> {
		let node = sink.node();
		let first = self.shared.routes.lock().add(dir, sink);

		if first {
			let watched = self
				.shared
				.watcher
				.lock()
				.watch(dir, RecursiveMode::NonRecursive);
			if let Err(e) = watched {
				self.shared.routes.lock().remove(dir, node);
				return Err(e.into());
			}
		}

		Ok(Box::new(NotifyWatch {
			dir: dir.to_path_buf(),
			node,
			shared: Some(Arc::clone(&self.shared)),
		}))
	}
}

struct NotifyWatch {
	dir: PathBuf,
	node: NodeId,
	shared: Option<Arc<Shared>>,
}

impl NativeWatch for NotifyWatch {
	fn close(&mut self) {
		if let Some(shared) = self.shared.take() {
			shared.release(&self.dir, self.node);
		}
	}
}

impl Drop for NotifyWatch {
	fn drop(&mut self) {
		self.close();
	}
}

/// Translate a notify event kind into the signal for the entry `name`
pub(crate) fn signal_for(kind: &EventKind, name: OsString) -> Option<NativeSignal> {
	match kind {
		EventKind::Create(_) => Some(NativeSignal::Create { name }),
		EventKind::Remove(_) => Some(NativeSignal::Ambiguous { hint: Some(name) }),
		EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(NativeSignal::Create { name }),
		// Both halves of the pair are also reported on their own
		EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
		EventKind::Modify(ModifyKind::Name(_)) => {
			Some(NativeSignal::Ambiguous { hint: Some(name) })
		}
		EventKind::Modify(_) => Some(NativeSignal::Modify { name }),
		EventKind::Access(_) => None,
		EventKind::Any | EventKind::Other => Some(NativeSignal::Ambiguous { hint: Some(name) }),
	}
}

fn error_signal(err: &notify::Error) -> NativeSignal {
	let kind = match &err.kind {
		notify::ErrorKind::Io(e) => e.kind(),
		notify::ErrorKind::PathNotFound | notify::ErrorKind::WatchNotFound => {
			io::ErrorKind::NotFound
		}
		_ => io::ErrorKind::Other,
	};
	NativeSignal::Error {
		kind,
		message: err.to_string(),
	}
}

fn dispatch(routes: &Mutex<RouteTable>, result: notify::Result<Event>) {
	let routes = routes.lock();

	let event = match result {
		Ok(event) => event,
		Err(err) => {
			let signal = error_signal(&err);
			if err.paths.is_empty() {
				for sink in routes.all() {
					sink.send(signal.clone());
				}
			}
			for path in &err.paths {
				// An error about a watched directory goes to that directory's
				// own nodes, anything else to the parent's
				let own = routes.sinks(path);
				let sinks = if own.is_empty() {
					path.parent().map(|p| routes.sinks(p)).unwrap_or_default()
				} else {
					own
				};
				for sink in sinks {
					sink.send(signal.clone());
				}
			}
			return;
		}
	};

	if event.need_rescan() {
		warn!("native event queue overflowed, rescanning every directory");
		for sink in routes.all() {
			sink.send(NativeSignal::Ambiguous { hint: None });
		}
		return;
	}

	for path in &event.paths {
		let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
			continue;
		};
		let Some(signal) = signal_for(&event.kind, name.to_os_string()) else {
			continue;
		};
		let sinks = routes.sinks(parent);
		if sinks.is_empty() {
			debug!("no watch node for {:?}, dropping {:?}", parent, signal);
		}
		for sink in sinks {
			sink.send(signal.clone());
		}
	}
}
