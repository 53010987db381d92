use super::Branch;
use crate::node::NodeId;
use std::collections::BTreeMap;
use std::ffi::OsString;

/// Watcher Index entry: the Watch Node owning a directory and the entries of
/// its watched subdirectories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
	pub node: NodeId,
	pub children: BTreeMap<OsString, IndexEntry>,
}

impl IndexEntry {
	pub fn new(node: NodeId) -> Self {
		Self {
			node,
			children: BTreeMap::new(),
		}
	}

	/// Every node in this subtree, parents before children
	pub fn node_ids(&self) -> Vec<NodeId> {
		let mut ids = Vec::new();
		self.collect(&mut ids);
		ids
	}

	fn collect(&self, ids: &mut Vec<NodeId>) {
		ids.push(self.node);
		for child in self.children.values() {
			child.collect(ids);
		}
	}
}

impl Branch for IndexEntry {
	fn children(&self) -> Option<&BTreeMap<OsString, Self>> {
		Some(&self.children)
	}

	fn children_mut(&mut self) -> Option<&mut BTreeMap<OsString, Self>> {
		Some(&mut self.children)
	}
}
