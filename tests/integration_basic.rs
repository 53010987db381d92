// Integration tests for basic watcher functionality
// Drives the public API with signals injected through ManualBackend

use std::fs;
use tree_watcher::{EventType, ManualBackend, NativeSignal, TreeNode, WatcherConfig};

mod common;

#[tokio::test]
async fn test_watcher_reports_ready_with_counters() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	fs::create_dir_all(root.join("a/b")).unwrap();
	common::create_test_files(&root, 3).unwrap();
	common::create_test_file(&root.join("a/b/deep.txt"), "deep").unwrap();

	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(WatcherConfig::new(&root), &backend);
	common::wait_ready(&mut rx).await;

	assert_eq!(handle.files(), 4);
	assert_eq!(handle.directories(), 3);
	assert!(handle.is_watching());
	assert_eq!(handle.roots(), vec![root.clone()]);

	let tree = handle.tree();
	assert_eq!(tree.len(), 4);
	assert!(matches!(
		tree.lookup(["a", "b", "deep.txt"]),
		Some(TreeNode::File(path)) if *path == root.join("a/b/deep.txt")
	));

	handle.stop().await;
}

#[tokio::test]
async fn test_tree_json_shape() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	fs::create_dir(root.join("a")).unwrap();
	common::create_test_file(&root.join("a/f2"), "x").unwrap();
	common::create_test_file(&root.join("f1"), "x").unwrap();

	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(WatcherConfig::new(&root), &backend);
	common::wait_ready(&mut rx).await;

	let json = handle.tree().to_json();
	assert_eq!(json["f1"], serde_json::json!(root.join("f1").display().to_string()));
	assert_eq!(
		json["a"]["f2"],
		serde_json::json!(root.join("a/f2").display().to_string())
	);
}

#[tokio::test]
async fn test_create_and_delete_file() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(WatcherConfig::new(&root), &backend);
	common::wait_ready(&mut rx).await;

	common::create_test_file(&root.join("new.txt"), "hello").unwrap();
	backend.emit(&root, NativeSignal::create("new.txt"));

	let created = common::next_event(&mut rx).await;
	assert_eq!(created.event_type, EventType::Create);
	assert_eq!(created.path, root.join("new.txt"));
	assert!(!created.is_directory);
	assert_eq!(handle.files(), 1);

	fs::remove_file(root.join("new.txt")).unwrap();
	backend.emit(&root, NativeSignal::ambiguous("new.txt"));

	let deleted = common::next_event(&mut rx).await;
	assert_eq!(deleted.event_type, EventType::Delete);
	assert_eq!(deleted.path, root.join("new.txt"));
	assert_eq!(handle.files(), 0);
	assert!(handle.tree().is_empty());
	common::assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_nested_directories_created_at_once() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(WatcherConfig::new(&root), &backend);
	common::wait_ready(&mut rx).await;

	fs::create_dir_all(root.join("a/b")).unwrap();
	common::create_test_file(&root.join("a/b/f"), "x").unwrap();
	backend.emit(&root, NativeSignal::create("a"));

	let events = common::collect_events(&mut rx).await;
	let created: Vec<_> = events
		.iter()
		.map(|e| (e.event_type, e.path.clone(), e.is_directory))
		.collect();
	assert_eq!(
		created,
		vec![
			(EventType::Create, root.join("a"), true),
			(EventType::Create, root.join("a/b"), true),
			(EventType::Create, root.join("a/b/f"), false),
		]
	);
	assert_eq!((handle.directories(), handle.files()), (3, 1));
	assert!(backend.is_watched(&root.join("a/b")));
}

#[tokio::test]
async fn test_modify_becomes_change() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	common::create_test_file(&root.join("f1"), "x").unwrap();

	let backend = ManualBackend::new();
	let (_handle, mut rx) = common::start_manual(
		WatcherConfig::new(&root).with_change_delay_ms(0),
		&backend,
	);
	common::wait_ready(&mut rx).await;

	common::create_test_file(&root.join("f1"), "changed").unwrap();
	backend.emit(&root, NativeSignal::modify("f1"));

	let event = common::next_event(&mut rx).await;
	assert_eq!(event.event_type, EventType::Change);
	assert_eq!(event.path, root.join("f1"));
	assert!(event.source_path().is_none());
}

#[tokio::test]
async fn test_junk_files_are_ignored() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	common::create_test_file(&root.join(".DS_Store"), "x").unwrap();

	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(WatcherConfig::new(&root), &backend);
	common::wait_ready(&mut rx).await;
	assert_eq!(handle.files(), 0);

	common::create_test_file(&root.join("notes.txt.swp"), "x").unwrap();
	backend.emit(&root, NativeSignal::create("notes.txt.swp"));
	common::assert_quiet(&mut rx).await;
	assert_eq!(handle.files(), 0);
}

#[tokio::test]
async fn test_unwatch_resets_and_silences() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	fs::create_dir(root.join("a")).unwrap();
	common::create_test_file(&root.join("f1"), "x").unwrap();

	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(WatcherConfig::new(&root), &backend);
	common::wait_ready(&mut rx).await;
	assert!(!backend.watched().is_empty());

	handle.unwatch();
	handle.unwatch();

	assert!(!handle.is_watching());
	assert_eq!((handle.directories(), handle.files()), (0, 0));
	assert!(handle.tree().is_empty());
	assert!(backend.watched().is_empty());

	common::create_test_file(&root.join("f2"), "x").unwrap();
	assert_eq!(backend.emit(&root, NativeSignal::create("f2")), 0);
	assert!(common::next_any(&mut rx).await.is_none());
}

#[tokio::test]
async fn test_drop_handle_releases_watches() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	fs::create_dir(root.join("a")).unwrap();

	let backend = ManualBackend::new();
	let (handle, mut rx) = common::start_manual(WatcherConfig::new(&root), &backend);
	common::wait_ready(&mut rx).await;

	drop(handle);
	assert!(backend.watched().is_empty());
}
