//! Cross-directory move correlation
//!
//! A confirmed removal is parked here for the correlation window. The next
//! creation of the same kind anywhere in the tree consumes the oldest parked
//! removal and becomes a move; a removal nobody claims expires into a plain
//! delete. One correlator exists per watcher instance.
//!
//! Matching is FIFO within a kind: a parked file removal only pairs with a
//! file creation and a directory removal only with a directory creation.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// A removal waiting for a matching creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
	pub entry_name: OsString,
	pub path: PathBuf,
	pub is_directory: bool,
	pub deadline: Instant,
}

#[derive(Debug, Default)]
pub struct MoveCorrelator {
	window: Option<Duration>,
	/// Oldest first; every entry shares the same window so this is also
	/// deadline order
	pending: VecDeque<PendingMove>,
}

impl MoveCorrelator {
	pub fn new(window: Option<Duration>) -> Self {
		Self {
			window: window.filter(|w| !w.is_zero()),
			pending: VecDeque::new(),
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.window.is_some()
	}

	/// Park a removal until `now + window`
	pub fn file(
		&mut self,
		entry_name: OsString,
		path: PathBuf,
		is_directory: bool,
		now: Instant,
	) {
		self.pending.push_back(PendingMove {
			entry_name,
			path,
			is_directory,
			deadline: now + self.window.unwrap_or_default(),
		});
	}

	/// Claim the oldest parked removal of the given kind
	pub fn take_oldest(&mut self, is_directory: bool) -> Option<PendingMove> {
		let pos = self
			.pending
			.iter()
			.position(|p| p.is_directory == is_directory)?;
		self.pending.remove(pos)
	}

	/// Remove every parked removal whose window has elapsed, oldest first
	pub fn pop_expired(&mut self, now: Instant) -> Vec<PendingMove> {
		let mut expired = Vec::new();
		while self.pending.front().is_some_and(|p| p.deadline <= now) {
			if let Some(pending) = self.pending.pop_front() {
				expired.push(pending);
			}
		}
		expired
	}

	/// When the oldest parked removal expires
	pub fn next_deadline(&self) -> Option<Instant> {
		self.pending.front().map(|p| p.deadline)
	}

	/// Rewrite parked paths below `from` after a directory moved to `to`
	pub fn rebase(&mut self, from: &Path, to: &Path) {
		for pending in &mut self.pending {
			if let Ok(rest) = pending.path.strip_prefix(from) {
				pending.path = if rest.as_os_str().is_empty() {
					to.to_path_buf()
				} else {
					to.join(rest)
				};
			}
		}
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	pub fn clear(&mut self) {
		self.pending.clear();
	}
}
