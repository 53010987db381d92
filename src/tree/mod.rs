//! Path-addressed nested mappings
//!
//! Both the consumer-visible mirror ([`TreeNode`]) and the engine's index of
//! Watch Nodes ([`IndexEntry`]) are forests keyed by resolved root path,
//! nested by entry name below each root.

pub mod index;
pub mod mirror;

pub use index::IndexEntry;
pub use mirror::{TreeNode, TreeSnapshot};

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

/// A node that may own named children
pub trait Branch: Sized {
	fn children(&self) -> Option<&BTreeMap<OsString, Self>>;
	fn children_mut(&mut self) -> Option<&mut BTreeMap<OsString, Self>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTree<T> {
	roots: BTreeMap<PathBuf, T>,
}

impl<T> Default for PathTree<T> {
	fn default() -> Self {
		Self { roots: BTreeMap::new() }
	}
}

impl<T: Branch> PathTree<T> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_root(&mut self, root: PathBuf, node: T) -> Option<T> {
		self.roots.insert(root, node)
	}

	pub fn roots(&self) -> impl Iterator<Item = (&PathBuf, &T)> {
		self.roots.iter()
	}

	pub fn root_count(&self) -> usize {
		self.roots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.roots.is_empty()
	}

	pub fn clear(&mut self) {
		self.roots.clear();
	}

	/// Longest root containing `path`, and the names leading from it
	fn locate<'p>(&self, path: &'p Path) -> Option<(PathBuf, Vec<&'p OsStr>)> {
		let root = self
			.roots
			.keys()
			.filter(|root| path.starts_with(root))
			.max_by_key(|root| root.components().count())?;
		let rest = path.strip_prefix(root).ok()?;
		let names = rest
			.components()
			.filter_map(|c| match c {
				Component::Normal(name) => Some(name),
				_ => None,
			})
			.collect();
		Some((root.clone(), names))
	}

	pub fn get(&self, path: &Path) -> Option<&T> {
		let (root, names) = self.locate(path)?;
		let mut node = self.roots.get(&root)?;
		for name in names {
			node = node.children()?.get(name)?;
		}
		Some(node)
	}

	pub fn contains(&self, path: &Path) -> bool {
		self.get(path).is_some()
	}

	/// Insert `node` at `path`; its parent must already be a branch. Returns
	/// the node back when there is nowhere to put it.
	pub fn insert(&mut self, path: &Path, node: T) -> Result<Option<T>, T> {
		let Some((root, mut names)) = self.locate(path) else {
			return Err(node);
		};
		let Some(last) = names.pop() else {
			return Ok(self.roots.insert(root, node));
		};
		let Some(mut parent) = self.roots.get_mut(&root) else {
			return Err(node);
		};
		for name in names {
			match parent.children_mut().and_then(|c| c.get_mut(name)) {
				Some(child) => parent = child,
				None => return Err(node),
			}
		}
		match parent.children_mut() {
			Some(children) => Ok(children.insert(last.to_os_string(), node)),
			None => Err(node),
		}
	}

	/// Detach the node at `path` (a whole root when `path` is one)
	pub fn remove(&mut self, path: &Path) -> Option<T> {
		let (root, mut names) = self.locate(path)?;
		let Some(last) = names.pop() else {
			return self.roots.remove(&root);
		};
		let mut parent = self.roots.get_mut(&root)?;
		for name in names {
			parent = parent.children_mut()?.get_mut(name)?;
		}
		parent.children_mut()?.remove(last)
	}
}
