//! Consumer-visible mirror of the watched structure

use super::Branch;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// A directory holds its children by name, a file holds its resolved path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
	Directory(BTreeMap<OsString, TreeNode>),
	File(PathBuf),
}

impl TreeNode {
	pub fn is_directory(&self) -> bool {
		matches!(self, TreeNode::Directory(_))
	}

	/// Leaves in this subtree
	pub fn files(&self) -> usize {
		match self {
			TreeNode::File(_) => 1,
			TreeNode::Directory(children) => children.values().map(TreeNode::files).sum(),
		}
	}

	/// Internal nodes in this subtree, this one included
	pub fn directories(&self) -> usize {
		match self {
			TreeNode::File(_) => 0,
			TreeNode::Directory(children) => {
				1 + children.values().map(TreeNode::directories).sum::<usize>()
			}
		}
	}

	/// Rewrite every leaf path below `from` to live below `to`
	pub fn rebase(&mut self, from: &Path, to: &Path) {
		match self {
			TreeNode::File(path) => {
				if let Ok(rest) = path.strip_prefix(from) {
					*path = if rest.as_os_str().is_empty() {
						to.to_path_buf()
					} else {
						to.join(rest)
					};
				}
			}
			TreeNode::Directory(children) => {
				for child in children.values_mut() {
					child.rebase(from, to);
				}
			}
		}
	}

	pub fn to_json(&self) -> Value {
		match self {
			TreeNode::File(path) => Value::String(path.to_string_lossy().into_owned()),
			TreeNode::Directory(children) => children_to_json(children),
		}
	}
}

impl Branch for TreeNode {
	fn children(&self) -> Option<&BTreeMap<OsString, Self>> {
		match self {
			TreeNode::Directory(children) => Some(children),
			TreeNode::File(_) => None,
		}
	}

	fn children_mut(&mut self) -> Option<&mut BTreeMap<OsString, Self>> {
		match self {
			TreeNode::Directory(children) => Some(children),
			TreeNode::File(_) => None,
		}
	}
}

fn children_to_json(children: &BTreeMap<OsString, TreeNode>) -> Value {
	let map: Map<String, Value> = children
		.iter()
		.map(|(name, node)| (name.to_string_lossy().into_owned(), node.to_json()))
		.collect();
	Value::Object(map)
}

/// Snapshot returned by [`crate::WatcherHandle::tree`]
///
/// A single directory root is represented by its children, a single file
/// root by a mapping holding that one leaf, and several roots by a mapping
/// keyed by each root's full path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot(pub BTreeMap<OsString, TreeNode>);

impl TreeSnapshot {
	pub fn get(&self, name: impl AsRef<OsStr>) -> Option<&TreeNode> {
		self.0.get(name.as_ref())
	}

	/// Follow `names` down from the top of the snapshot
	pub fn lookup<I, S>(&self, names: I) -> Option<&TreeNode>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<OsStr>,
	{
		let mut names = names.into_iter();
		let mut node = self.0.get(names.next()?.as_ref())?;
		for name in names {
			node = node.children()?.get(name.as_ref())?;
		}
		Some(node)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn files(&self) -> usize {
		self.0.values().map(TreeNode::files).sum()
	}

	/// Internal nodes below the top level mapping
	pub fn directories(&self) -> usize {
		self.0.values().map(TreeNode::directories).sum()
	}

	pub fn to_json(&self) -> Value {
		children_to_json(&self.0)
	}
}
