//! Recursive filesystem watching on top of per-directory native watches.
//!
//! Raw "something changed here" signals are diffed against an in-memory
//! mirror of the watched tree and turned into create, delete, change and
//! move events. Deletes are briefly held back so that a matching create
//! anywhere in the tree turns the pair into a single move.

pub mod config;
pub mod correlator;
pub mod error;
pub mod events;
pub mod filter;
pub mod native;
pub mod node;
pub mod scan;
pub mod tree;
mod watcher;

pub use config::{WatcherConfig, DEFAULT_CHANGE_DELAY_MS, DEFAULT_MOVE_DELAY_MS};
pub use error::{Result, WatcherError};
pub use events::{EventType, FileSystemEvent, MoveEvent, WatcherEvent};
pub use filter::{DefaultFilter, EntryFilter, FnFilter, IncludeAll};
pub use native::{ManualBackend, NativeSignal, NativeWatch, NotifyBackend, SignalSink, WatchBackend};
pub use tree::{TreeNode, TreeSnapshot};
pub use watcher::{start, start_with_backend, WatcherHandle};
