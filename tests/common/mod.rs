//! Common test utilities for the tree-watcher library

#![allow(unused_imports, dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tree_watcher::{
	start_with_backend, FileSystemEvent, ManualBackend, WatcherConfig, WatcherEvent, WatcherHandle,
};

/// How long to wait for an event that must arrive
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

/// How long a channel must stay silent to count as quiet
pub const QUIET_PERIOD: Duration = Duration::from_millis(250);

/// Create a temporary directory for testing
pub fn setup_temp_dir() -> TempDir {
	TempDir::new().expect("Failed to create temp directory")
}

/// Create a watched root directory inside `temp`, with symlinks resolved
pub fn setup_root(temp: &TempDir) -> PathBuf {
	let root = temp
		.path()
		.canonicalize()
		.expect("Failed to canonicalize temp directory")
		.join("root");
	std::fs::create_dir(&root).expect("Failed to create root directory");
	root
}

/// Create a test file with content
pub fn create_test_file(path: &Path, content: &str) -> std::io::Result<()> {
	std::fs::write(path, content)
}

/// Create multiple test files for testing
pub fn create_test_files(dir: &Path, count: usize) -> std::io::Result<Vec<PathBuf>> {
	let mut files = Vec::new();
	for i in 0..count {
		let file_path = dir.join(format!("test_file_{i}.txt"));
		create_test_file(&file_path, &format!("Content for file {i}"))?;
		files.push(file_path);
	}
	Ok(files)
}

/// Start a watcher driven by `backend`
pub fn start_manual(
	config: WatcherConfig,
	backend: &ManualBackend,
) -> (WatcherHandle, UnboundedReceiver<WatcherEvent>) {
	start_with_backend(config, Arc::new(backend.clone())).expect("Failed to start watcher")
}

/// Wait for the ready notification, panicking on anything else
pub async fn wait_ready(rx: &mut UnboundedReceiver<WatcherEvent>) {
	match timeout(EVENT_TIMEOUT, rx.recv()).await {
		Ok(Some(WatcherEvent::Ready)) => {}
		other => panic!("Expected ready, got {other:?}"),
	}
}

/// Next filesystem event, panicking on errors or timeouts
pub async fn next_event(rx: &mut UnboundedReceiver<WatcherEvent>) -> FileSystemEvent {
	match timeout(EVENT_TIMEOUT, rx.recv()).await {
		Ok(Some(WatcherEvent::FileSystem(event))) => event,
		other => panic!("Expected a filesystem event, got {other:?}"),
	}
}

/// Next event of any kind, or `None` on timeout
pub async fn next_any(rx: &mut UnboundedReceiver<WatcherEvent>) -> Option<WatcherEvent> {
	timeout(EVENT_TIMEOUT, rx.recv()).await.ok().flatten()
}

/// Assert nothing arrives for [`QUIET_PERIOD`]
pub async fn assert_quiet(rx: &mut UnboundedReceiver<WatcherEvent>) {
	if let Ok(Some(event)) = timeout(QUIET_PERIOD, rx.recv()).await {
		panic!("Unexpected event: {event:?}");
	}
}

/// Collect filesystem events until the channel goes quiet
pub async fn collect_events(rx: &mut UnboundedReceiver<WatcherEvent>) -> Vec<FileSystemEvent> {
	let mut events = Vec::new();
	while let Ok(Some(event)) = timeout(QUIET_PERIOD, rx.recv()).await {
		match event {
			WatcherEvent::FileSystem(event) => events.push(event),
			other => panic!("Unexpected event while collecting: {other:?}"),
		}
	}
	events
}

/// Wait for a short duration to allow file system events to propagate
pub async fn wait_for_events() {
	tokio::time::sleep(Duration::from_millis(100)).await;
}
