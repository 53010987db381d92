// Integration tests against real OS notifications
// Run serially: they share the platform's notification queue

use serial_test::serial;
use std::fs;
use std::time::Duration;
use tokio::time::sleep;
use tree_watcher::{start, EventType, FileSystemEvent, WatcherConfig};

mod common;

fn find<'a>(
	events: &'a [FileSystemEvent],
	event_type: EventType,
	path: &std::path::Path,
) -> Option<&'a FileSystemEvent> {
	events
		.iter()
		.find(|e| e.event_type == event_type && e.path == path)
}

#[tokio::test]
#[serial]
async fn test_native_create_and_delete() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);

	let (handle, mut rx) = start(WatcherConfig::new(&root)).unwrap();
	common::wait_ready(&mut rx).await;

	fs::create_dir(root.join("dir")).unwrap();
	sleep(Duration::from_millis(50)).await;
	common::create_test_file(&root.join("dir/file.txt"), "content").unwrap();

	let events = common::collect_events(&mut rx).await;
	let dir = find(&events, EventType::Create, &root.join("dir"))
		.unwrap_or_else(|| panic!("no directory create in {events:?}"));
	assert!(dir.is_directory);
	assert!(find(&events, EventType::Create, &root.join("dir/file.txt")).is_some());
	assert_eq!((handle.directories(), handle.files()), (2, 1));

	fs::remove_dir_all(root.join("dir")).unwrap();
	let events = common::collect_events(&mut rx).await;
	assert!(
		find(&events, EventType::Delete, &root.join("dir")).is_some(),
		"no delete in {events:?}"
	);
	assert_eq!((handle.directories(), handle.files()), (1, 0));
	assert!(handle.tree().is_empty());

	handle.stop().await;
}

#[tokio::test]
#[serial]
async fn test_native_rename_is_a_move() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	fs::create_dir(root.join("a")).unwrap();
	fs::create_dir(root.join("b")).unwrap();
	common::create_test_file(&root.join("a/doc.txt"), "content").unwrap();

	let (handle, mut rx) = start(WatcherConfig::new(&root)).unwrap();
	common::wait_ready(&mut rx).await;

	fs::rename(root.join("a/doc.txt"), root.join("b/doc.txt")).unwrap();

	let events = common::collect_events(&mut rx).await;
	let moved = find(&events, EventType::Move, &root.join("b/doc.txt"))
		.unwrap_or_else(|| panic!("no move in {events:?}"));
	assert_eq!(moved.source_path(), Some(&root.join("a/doc.txt")));
	assert!(find(&events, EventType::Delete, &root.join("a/doc.txt")).is_none());
	assert!(handle.tree().lookup(["b", "doc.txt"]).is_some());
	assert_eq!(handle.files(), 1);

	handle.stop().await;
}

#[tokio::test]
#[serial]
async fn test_native_modify_reports_change() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	common::create_test_file(&root.join("f"), "before").unwrap();

	let (handle, mut rx) = start(WatcherConfig::new(&root)).unwrap();
	common::wait_ready(&mut rx).await;

	common::create_test_file(&root.join("f"), "after").unwrap();

	let events = common::collect_events(&mut rx).await;
	assert!(
		find(&events, EventType::Change, &root.join("f")).is_some(),
		"no change in {events:?}"
	);
	assert!(events.iter().all(|e| e.event_type == EventType::Change));

	handle.stop().await;
}

#[tokio::test]
#[serial]
async fn test_native_atomic_save_reports_change() {
	let temp_dir = common::setup_temp_dir();
	let root = common::setup_root(&temp_dir);
	common::create_test_file(&root.join("f"), "before").unwrap();

	let (handle, mut rx) = start(WatcherConfig::new(&root)).unwrap();
	common::wait_ready(&mut rx).await;

	// Write a sibling, then rename it over the watched file
	common::create_test_file(&root.join("tmpsave"), "after").unwrap();
	fs::rename(root.join("tmpsave"), root.join("f")).unwrap();

	let events = common::collect_events(&mut rx).await;
	let f = root.join("f");
	assert!(
		events
			.iter()
			.any(|e| e.path == f && matches!(e.event_type, EventType::Change | EventType::Move)),
		"nothing reported for the replaced file in {events:?}"
	);
	assert!(find(&events, EventType::Delete, &f).is_none());
	assert_eq!(handle.files(), 1);
	assert!(handle.tree().get("f").is_some());
	assert!(handle.tree().get("tmpsave").is_none());

	handle.stop().await;
}
