//! Orchestrator: starts the engine task and exposes the running watcher

mod engine;
mod state;

use crate::config::WatcherConfig;
use crate::error::{Result, WatcherError};
use crate::events::WatcherEvent;
use crate::native::{NotifyBackend, WatchBackend};
use crate::scan::ScanContext;
use crate::tree::TreeSnapshot;
use engine::Engine;
use parking_lot::Mutex;
use state::EngineState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Start watching with OS notifications.
///
/// Must be called from within a tokio runtime. The returned receiver yields
/// [`WatcherEvent::Ready`] once the initial tree is built, then filesystem
/// events; a [`WatcherEvent::Error`] is always the last event.
pub fn start(
	config: WatcherConfig,
) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<WatcherEvent>)> {
	config.validate()?;
	let backend = NotifyBackend::new()?;
	start_with_backend(config, Arc::new(backend))
}

/// Start watching with signals from `backend`
pub fn start_with_backend(
	config: WatcherConfig,
	backend: Arc<dyn WatchBackend>,
) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<WatcherEvent>)> {
	config.validate()?;
	let runtime =
		tokio::runtime::Handle::try_current().map_err(|_| WatcherError::NotInitialized)?;

	let (events_tx, events_rx) = mpsc::unbounded_channel();
	let (signals_tx, signals_rx) = mpsc::unbounded_channel();
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	let state = Arc::new(Mutex::new(EngineState::new(config.move_window(), events_tx)));
	let engine = Engine {
		state: Arc::clone(&state),
		ctx: ScanContext::new(
			backend,
			signals_tx,
			Arc::clone(&config.filter),
			config.follow_symlinks,
		),
		change_window: config.change_window(),
	};

	info!(
		"Starting watcher for {:?} (move window: {:?}, change window: {:?})",
		config.roots,
		config.move_window(),
		config.change_window()
	);
	let task = runtime.spawn(engine.run(config.roots.clone(), signals_rx, shutdown_rx));

	Ok((
		WatcherHandle {
			state,
			shutdown: shutdown_tx,
			task: Some(task),
		},
		events_rx,
	))
}

/// A running watcher. Dropping the handle unwatches everything.
pub struct WatcherHandle {
	state: Arc<Mutex<EngineState>>,
	shutdown: watch::Sender<bool>,
	task: Option<JoinHandle<()>>,
}

impl WatcherHandle {
	/// Watched directories, directory roots included
	pub fn directories(&self) -> usize {
		self.state.lock().directories
	}

	/// Watched files
	pub fn files(&self) -> usize {
		self.state.lock().files
	}

	/// Snapshot of the watched structure; empty once stopped
	pub fn tree(&self) -> TreeSnapshot {
		self.state.lock().snapshot()
	}

	/// Resolved paths of the roots still being watched
	pub fn roots(&self) -> Vec<PathBuf> {
		self.state
			.lock()
			.roots
			.iter()
			.map(|root| root.path.clone())
			.collect()
	}

	/// Whether the watcher is running (neither unwatched nor failed)
	pub fn is_watching(&self) -> bool {
		!self.state.lock().stopped
	}

	/// Close every native watch, drop pending moves and reset the tree and
	/// counters. No event is delivered afterwards. Calling it again is a
	/// no-op.
	pub fn unwatch(&self) {
		{
			let mut state = self.state.lock();
			if !state.stopped {
				info!("Unwatching {} directories", state.directories);
				state.teardown();
			}
		}
		self.shutdown.send_replace(true);
	}

	/// Unwatch and wait for the engine task to finish
	pub async fn stop(mut self) {
		self.unwatch();
		if let Some(task) = self.task.take() {
			if let Err(e) = task.await {
				warn!("Watcher task ended abnormally: {}", e);
			}
		}
	}
}

impl Drop for WatcherHandle {
	fn drop(&mut self) {
		self.unwatch();
	}
}
