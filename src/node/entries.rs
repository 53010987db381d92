use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::time::Duration;
use tokio::time::Instant;

/// What a Watch Node knows about one of its children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
	pub is_directory: bool,
	/// Debounce lock: content changes are dropped until this instant
	pub lock: Option<Instant>,
}

impl EntryInfo {
	pub fn new(is_directory: bool) -> Self {
		Self { is_directory, lock: None }
	}
}

/// Outcome of a content change signal for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeVerdict {
	Emit,
	Debounced,
	Directory,
	Unknown,
}

/// Child name to [`EntryInfo`], ordered so diffs are deterministic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMap {
	entries: BTreeMap<OsString, EntryInfo>,
}

impl EntryMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, name: OsString, is_directory: bool) {
		self.entries.insert(name, EntryInfo::new(is_directory));
	}

	/// Insert an entry that just appeared. The signals announcing it are not
	/// reported again as content changes until `now + window`.
	pub fn insert_new(
		&mut self,
		name: OsString,
		is_directory: bool,
		now: Instant,
		window: Option<Duration>,
	) {
		let mut info = EntryInfo::new(is_directory);
		info.lock = window.map(|w| now + w);
		self.entries.insert(name, info);
	}

	pub fn remove(&mut self, name: &OsStr) -> Option<EntryInfo> {
		self.entries.remove(name)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// `(name, is_directory)` pairs in name order
	pub fn snapshot(&self) -> Vec<(OsString, bool)> {
		self.entries
			.iter()
			.map(|(name, info)| (name.clone(), info.is_directory))
			.collect()
	}

	/// Apply the debounce lock to a content change of `name`.
	///
	/// With a window, the first change locks the entry until `now + window`
	/// and later changes before that instant are dropped.
	pub fn register_change(
		&mut self,
		name: &OsStr,
		now: Instant,
		window: Option<Duration>,
	) -> ChangeVerdict {
		let Some(info) = self.entries.get_mut(name) else {
			return ChangeVerdict::Unknown;
		};
		if info.is_directory {
			return ChangeVerdict::Directory;
		}
		if info.lock.is_some_and(|until| now < until) {
			return ChangeVerdict::Debounced;
		}
		info.lock = window.map(|w| now + w);
		ChangeVerdict::Emit
	}
}

impl FromIterator<(OsString, bool)> for EntryMap {
	fn from_iter<I: IntoIterator<Item = (OsString, bool)>>(iter: I) -> Self {
		Self {
			entries: iter
				.into_iter()
				.map(|(name, is_dir)| (name, EntryInfo::new(is_dir)))
				.collect(),
		}
	}
}
