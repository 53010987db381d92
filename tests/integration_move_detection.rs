// Integration tests for move correlation
// Deletes are held for the move window; a matching create turns them into a move

use std::fs;
use tree_watcher::{EventType, ManualBackend, NativeSignal, WatcherConfig};

mod common;

#[tokio::test]
async fn test_rename_directory_keeps_subtree() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	fs::create_dir_all(root.join("src/inner")).unwrap();
	common::create_test_file(&root.join("src/inner/f"), "x").unwrap();

	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(WatcherConfig::new(&root), &backend);
	common::wait_ready(&mut rx).await;

	fs::rename(root.join("src"), root.join("dst")).unwrap();
	backend.emit(&root, NativeSignal::ambiguous("src"));
	backend.emit(&root, NativeSignal::create("dst"));

	let events = common::collect_events(&mut rx).await;
	assert_eq!(events.len(), 1, "expected a single move, got {events:?}");
	let moved = &events[0];
	assert!(moved.is_move());
	assert_eq!(moved.source_path(), Some(&root.join("src")));
	assert_eq!(moved.path, root.join("dst"));
	assert!(moved.is_directory);

	assert_eq!((handle.directories(), handle.files()), (3, 1));
	assert!(handle.tree().lookup(["dst", "inner", "f"]).is_some());
	assert!(handle.tree().get("src").is_none());
	assert!(backend.is_watched(&root.join("dst/inner")));
	assert!(!backend.is_watched(&root.join("src/inner")));

	// The moved subtree keeps reporting under its new location
	common::create_test_file(&root.join("dst/inner/g"), "x").unwrap();
	backend.emit(&root.join("dst/inner"), NativeSignal::create("g"));
	let created = common::next_event(&mut rx).await;
	assert_eq!(created.event_type, EventType::Create);
	assert_eq!(created.path, root.join("dst/inner/g"));
}

#[tokio::test]
async fn test_move_between_directories() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	fs::create_dir(root.join("from")).unwrap();
	fs::create_dir(root.join("to")).unwrap();
	common::create_test_file(&root.join("from/doc.txt"), "x").unwrap();

	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(WatcherConfig::new(&root), &backend);
	common::wait_ready(&mut rx).await;

	fs::rename(root.join("from/doc.txt"), root.join("to/doc.txt")).unwrap();
	backend.emit(&root.join("from"), NativeSignal::ambiguous("doc.txt"));
	backend.emit(&root.join("to"), NativeSignal::create("doc.txt"));

	let moved = common::next_event(&mut rx).await;
	assert_eq!(moved.event_type, EventType::Move);
	assert_eq!(moved.source_path(), Some(&root.join("from/doc.txt")));
	assert_eq!(moved.path, root.join("to/doc.txt"));
	assert!(!moved.is_directory);
	common::assert_quiet(&mut rx).await;
	assert_eq!(handle.files(), 1);
}

#[tokio::test]
async fn test_create_after_window_is_not_a_move() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	fs::create_dir(root.join("from")).unwrap();
	fs::create_dir(root.join("to")).unwrap();
	common::create_test_file(&root.join("from/f"), "x").unwrap();

	let backend = ManualBackend::new();
	let (_handle, mut rx) = common::start_manual(
		WatcherConfig::new(&root).with_move_delay_ms(20),
		&backend,
	);
	common::wait_ready(&mut rx).await;

	fs::rename(root.join("from/f"), root.join("to/f")).unwrap();
	backend.emit(&root.join("from"), NativeSignal::ambiguous("f"));

	let deleted = common::next_event(&mut rx).await;
	assert_eq!(deleted.event_type, EventType::Delete);
	assert_eq!(deleted.path, root.join("from/f"));

	backend.emit(&root.join("to"), NativeSignal::create("f"));
	let created = common::next_event(&mut rx).await;
	assert_eq!(created.event_type, EventType::Create);
	assert_eq!(created.path, root.join("to/f"));
}

#[tokio::test]
async fn test_pending_deletes_match_in_order() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	fs::create_dir(root.join("a")).unwrap();
	fs::create_dir(root.join("b")).unwrap();
	fs::create_dir(root.join("c")).unwrap();
	common::create_test_file(&root.join("a/one"), "x").unwrap();
	common::create_test_file(&root.join("b/two"), "x").unwrap();

	let backend = ManualBackend::new();
	let (_handle, mut rx) = common::start_manual(
		WatcherConfig::new(&root).with_move_delay_ms(500),
		&backend,
	);
	common::wait_ready(&mut rx).await;

	fs::rename(root.join("a/one"), root.join("c/x")).unwrap();
	fs::rename(root.join("b/two"), root.join("c/y")).unwrap();
	backend.emit(&root.join("a"), NativeSignal::ambiguous("one"));
	backend.emit(&root.join("b"), NativeSignal::ambiguous("two"));
	common::wait_for_events().await;
	backend.emit(&root.join("c"), NativeSignal::create("x"));
	backend.emit(&root.join("c"), NativeSignal::create("y"));

	let first = common::next_event(&mut rx).await;
	let second = common::next_event(&mut rx).await;
	assert_eq!(first.source_path(), Some(&root.join("a/one")));
	assert_eq!(first.path, root.join("c/x"));
	assert_eq!(second.source_path(), Some(&root.join("b/two")));
	assert_eq!(second.path, root.join("c/y"));
}

#[tokio::test]
async fn test_file_never_matches_directory() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	common::create_test_file(&root.join("f"), "x").unwrap();

	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(
		WatcherConfig::new(&root).with_move_delay_ms(100),
		&backend,
	);
	common::wait_ready(&mut rx).await;

	fs::remove_file(root.join("f")).unwrap();
	fs::create_dir(root.join("d")).unwrap();
	backend.emit(&root, NativeSignal::ambiguous("f"));
	common::wait_for_events().await;
	backend.emit(&root, NativeSignal::create("d"));

	let events = common::collect_events(&mut rx).await;
	assert!(events.iter().all(|e| !e.is_move()), "unexpected move in {events:?}");
	assert!(events
		.iter()
		.any(|e| e.event_type == EventType::Delete && e.path == root.join("f")));
	assert!(events
		.iter()
		.any(|e| e.event_type == EventType::Create && e.path == root.join("d") && e.is_directory));
	assert_eq!((handle.directories(), handle.files()), (2, 0));
}
