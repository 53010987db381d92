//! Inclusion filters applied to every candidate entry before it is watched
//!
//! Excluded entries never reach the tree mirror, the watcher index or the
//! counters, and excluded directories are never descended into.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;

/// Asynchronous inclusion predicate over `(full path, base name)`
#[async_trait]
pub trait EntryFilter: Send + Sync {
	async fn include(&self, path: &Path, name: &OsStr) -> bool;
}

/// Skips editor swap/backup files, temporary write targets and OS junk files
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFilter;

const JUNK_PREFIXES: &[&str] = &[".goutputstream-", "._"];
const JUNK_SUFFIXES: &[&str] = &[".swp", ".swpx", ".swx", "~"];
const JUNK_NAMES: &[&str] = &[
	".DS_Store",
	"Thumbs.db",
	"ehthumbs.db",
	"desktop.ini",
	"Desktop.ini",
	".Spotlight-V100",
	".Trashes",
];

impl DefaultFilter {
	pub fn is_junk(name: &OsStr) -> bool {
		// Non UTF-8 names can't match any of the ASCII patterns
		let Some(name) = name.to_str() else {
			return false;
		};

		JUNK_NAMES.contains(&name)
			|| JUNK_PREFIXES.iter().any(|p| name.starts_with(p))
			|| JUNK_SUFFIXES.iter().any(|s| name.ends_with(s))
	}
}

#[async_trait]
impl EntryFilter for DefaultFilter {
	async fn include(&self, _path: &Path, name: &OsStr) -> bool {
		!Self::is_junk(name)
	}
}

/// Accepts every entry
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAll;

#[async_trait]
impl EntryFilter for IncludeAll {
	async fn include(&self, _path: &Path, _name: &OsStr) -> bool {
		true
	}
}

/// Adapts a synchronous closure into an [`EntryFilter`]
pub struct FnFilter<F>(pub F);

#[async_trait]
impl<F> EntryFilter for FnFilter<F>
where
	F: Fn(&Path, &OsStr) -> bool + Send + Sync,
{
	async fn include(&self, path: &Path, name: &OsStr) -> bool {
		(self.0)(path, name)
	}
}
