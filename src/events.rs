use crate::error::WatcherError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
	Create,
	Delete,
	Change,
	Move,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSystemEvent {
	pub id: Uuid,
	pub event_type: EventType,
	/// Affected path; for a move this is the destination
	pub path: PathBuf,
	pub timestamp: DateTime<Utc>,
	pub is_directory: bool,
	pub move_data: Option<MoveEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveEvent {
	pub source_path: PathBuf,
	pub destination_path: PathBuf,
}

impl FileSystemEvent {
	pub fn new(event_type: EventType, path: PathBuf, is_directory: bool) -> Self {
		Self {
			id: Uuid::new_v4(),
			event_type,
			path,
			timestamp: Utc::now(),
			is_directory,
			move_data: None,
		}
	}

	pub fn create(path: PathBuf, is_directory: bool) -> Self {
		Self::new(EventType::Create, path, is_directory)
	}

	pub fn delete(path: PathBuf, is_directory: bool) -> Self {
		Self::new(EventType::Delete, path, is_directory)
	}

	/// Content change; only ever reported for files
	pub fn change(path: PathBuf) -> Self {
		Self::new(EventType::Change, path, false)
	}

	pub fn moved(source: PathBuf, destination: PathBuf, is_directory: bool) -> Self {
		let mut event = Self::new(EventType::Move, destination.clone(), is_directory);
		event.move_data = Some(MoveEvent {
			source_path: source,
			destination_path: destination,
		});
		event
	}

	pub fn is_move(&self) -> bool {
		self.move_data.is_some() || self.event_type == EventType::Move
	}

	/// Source path of a move, `None` for every other event
	pub fn source_path(&self) -> Option<&PathBuf> {
		self.move_data.as_ref().map(|m| &m.source_path)
	}

	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}
}

/// Everything a running watcher reports to its consumer
#[derive(Debug)]
pub enum WatcherEvent {
	/// The initial tree has been built; emitted exactly once
	Ready,
	FileSystem(FileSystemEvent),
	/// Fatal error; the watcher has already been torn down when this arrives
	Error(WatcherError),
}
