use crate::error::{Result, WatcherError};
use crate::filter::{DefaultFilter, EntryFilter};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default window during which a delete waits for a matching create
pub const DEFAULT_MOVE_DELAY_MS: u64 = 50;
/// Default window during which repeated content changes are folded into one
pub const DEFAULT_CHANGE_DELAY_MS: u64 = 50;

/// Configuration for a [`crate::start`]ed watcher
#[derive(Clone)]
pub struct WatcherConfig {
	/// Files or directories watched simultaneously
	pub roots: Vec<PathBuf>,
	/// Move correlation window; `None` (or zero) reports deletes and creates
	/// independently and never emits moves across directories
	pub move_delay: Option<Duration>,
	/// Content change debounce window; `None` (or zero) reports every change
	pub change_delay: Option<Duration>,
	/// Follow symbolic links (`stat`) instead of reporting the links
	/// themselves (`lstat`)
	pub follow_symlinks: bool,
	pub filter: Arc<dyn EntryFilter>,
}

impl Default for WatcherConfig {
	fn default() -> Self {
		Self {
			roots: Vec::new(),
			move_delay: Some(Duration::from_millis(DEFAULT_MOVE_DELAY_MS)),
			change_delay: Some(Duration::from_millis(DEFAULT_CHANGE_DELAY_MS)),
			follow_symlinks: false,
			filter: Arc::new(DefaultFilter),
		}
	}
}

impl fmt::Debug for WatcherConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WatcherConfig")
			.field("roots", &self.roots)
			.field("move_delay", &self.move_delay)
			.field("change_delay", &self.change_delay)
			.field("follow_symlinks", &self.follow_symlinks)
			.finish_non_exhaustive()
	}
}

fn window(ms: u64) -> Option<Duration> {
	(ms > 0).then(|| Duration::from_millis(ms))
}

impl WatcherConfig {
	/// Watch a single file or directory with default settings
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			roots: vec![root.into()],
			..Default::default()
		}
	}

	pub fn with_roots<I, P>(roots: I) -> Self
	where
		I: IntoIterator<Item = P>,
		P: Into<PathBuf>,
	{
		Self {
			roots: roots.into_iter().map(Into::into).collect(),
			..Default::default()
		}
	}

	pub fn add_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.roots.push(root.into());
		self
	}

	/// Set the move correlation window in milliseconds; 0 disables it
	pub fn with_move_delay_ms(mut self, ms: u64) -> Self {
		self.move_delay = window(ms);
		self
	}

	pub fn without_move_correlation(mut self) -> Self {
		self.move_delay = None;
		self
	}

	/// Set the change debounce window in milliseconds; 0 disables it
	pub fn with_change_delay_ms(mut self, ms: u64) -> Self {
		self.change_delay = window(ms);
		self
	}

	pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
		self.follow_symlinks = follow;
		self
	}

	pub fn with_filter(mut self, filter: impl EntryFilter + 'static) -> Self {
		self.filter = Arc::new(filter);
		self
	}

	/// Effective move window, treating zero as disabled
	pub fn move_window(&self) -> Option<Duration> {
		self.move_delay.filter(|d| !d.is_zero())
	}

	/// Effective debounce window, treating zero as disabled
	pub fn change_window(&self) -> Option<Duration> {
		self.change_delay.filter(|d| !d.is_zero())
	}

	/// Validate the configuration and return errors if invalid
	pub fn validate(&self) -> Result<()> {
		if self.roots.is_empty() {
			return Err(WatcherError::configuration_error(
				"roots",
				"nothing to watch",
				"at least one path",
				"0 paths",
			));
		}

		if let Some(empty) = self.roots.iter().position(|p| p.as_os_str().is_empty()) {
			return Err(WatcherError::configuration_error(
				"roots",
				"empty path",
				"a file or directory path",
				&format!("\"\" at index {empty}"),
			));
		}

		Ok(())
	}
}
