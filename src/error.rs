use std::io;
use std::path::Path;
use thiserror::Error;

/// Core watcher error types
///
/// Errors raised while building the initial tree abort startup. Errors raised
/// afterwards tear the whole watcher down before they are delivered as
/// [`crate::WatcherEvent::Error`].
#[derive(Error, Debug)]
pub enum WatcherError {
	#[error("IO error: {0}")]
	Io(#[from] io::Error),

	#[error("Notify error: {0}")]
	Notify(#[from] notify::Error),

	#[error("Invalid path: {path}")]
	InvalidPath { path: String },

	#[error("Watcher not initialized")]
	NotInitialized,

	#[error("Filesystem error: {operation} failed on {path} - {message}")]
	Filesystem {
		operation: String,
		path: String,
		kind: io::ErrorKind,
		message: String,
	},

	#[error("Native watch error on {path}: {message}")]
	Native {
		path: String,
		kind: io::ErrorKind,
		message: String,
	},

	/// Names disappeared from a directory listing but every one of them still
	/// exists on disk. Signals were missed or duplicated and the tree can no
	/// longer be trusted.
	#[error("Diff invariant violated in {directory}: expected one of [{expected}] to be removed")]
	DiffInvariant { directory: String, expected: String },

	#[error(
		"Configuration error: {parameter} - {reason} (expected: {expected}, actual: {actual})"
	)]
	ConfigurationError {
		parameter: String,
		reason: String,
		expected: String,
		actual: String,
	},

	#[error("{} errors while watching: {}", .0.len(), join_errors(.0))]
	Multiple(Vec<WatcherError>),
}

fn join_errors(errors: &[WatcherError]) -> String {
	errors
		.iter()
		.map(|e| e.to_string())
		.collect::<Vec<_>>()
		.join("; ")
}

impl WatcherError {
	/// Collapse a list of errors: a single error is returned as is, anything
	/// else becomes [`WatcherError::Multiple`].
	pub fn aggregate(mut errors: Vec<WatcherError>) -> Self {
		if errors.len() == 1 {
			errors.remove(0)
		} else {
			WatcherError::Multiple(errors)
		}
	}

	/// The `io::ErrorKind` behind this error, when there is one
	pub fn io_kind(&self) -> Option<io::ErrorKind> {
		match self {
			WatcherError::Io(e) => Some(e.kind()),
			WatcherError::Notify(e) => match &e.kind {
				notify::ErrorKind::Io(io) => Some(io.kind()),
				notify::ErrorKind::PathNotFound | notify::ErrorKind::WatchNotFound => {
					Some(io::ErrorKind::NotFound)
				}
				_ => None,
			},
			WatcherError::Filesystem { kind, .. } | WatcherError::Native { kind, .. } => {
				Some(*kind)
			}
			_ => None,
		}
	}

	/// Whether this error could be a side effect of the watched directory
	/// itself being removed (the parent directory reports that removal).
	pub fn is_removal_race(&self) -> bool {
		matches!(
			self.io_kind(),
			Some(io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound)
		)
	}

	/// Get error category for logging
	pub fn category(&self) -> &'static str {
		match self {
			WatcherError::Io(_) => "io",
			WatcherError::Notify(_) => "notify",
			WatcherError::InvalidPath { .. } => "configuration",
			WatcherError::NotInitialized => "initialization",
			WatcherError::Filesystem { .. } => "filesystem",
			WatcherError::Native { .. } => "native",
			WatcherError::DiffInvariant { .. } => "diff",
			WatcherError::ConfigurationError { .. } => "configuration",
			WatcherError::Multiple(_) => "multiple",
		}
	}

	/// Create a filesystem error from a failed stat/readdir
	pub fn filesystem(operation: &str, path: &Path, err: io::Error) -> Self {
		WatcherError::Filesystem {
			operation: operation.to_string(),
			path: path.display().to_string(),
			kind: err.kind(),
			message: err.to_string(),
		}
	}

	/// Create a configuration error
	pub fn configuration_error(
		parameter: &str,
		reason: &str,
		expected: &str,
		actual: &str,
	) -> Self {
		WatcherError::ConfigurationError {
			parameter: parameter.to_string(),
			reason: reason.to_string(),
			expected: expected.to_string(),
			actual: actual.to_string(),
		}
	}
}

pub type Result<T> = std::result::Result<T, WatcherError>;
