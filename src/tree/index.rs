//! Path index for O(1) node access.

use crate::types::{NodeId, NodeKind};
use std::collections::HashMap;

/// Maps `(kind, full path)` to arena slots.
///
/// Folders and leaves are kept in separate maps so both can be looked up with a
/// borrowed `&str` and a folder never shadows a leaf at the same path.
#[derive(Clone, Debug, Default)]
pub struct PathIndex {
    folders: HashMap<String, NodeId>,
    leaves: HashMap<String, NodeId>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: NodeKind) -> &HashMap<String, NodeId> {
        match kind {
            NodeKind::Folder => &self.folders,
            NodeKind::Leaf => &self.leaves,
        }
    }

    fn map_mut(&mut self, kind: NodeKind) -> &mut HashMap<String, NodeId> {
        match kind {
            NodeKind::Folder => &mut self.folders,
            NodeKind::Leaf => &mut self.leaves,
        }
    }

    pub fn get(&self, kind: NodeKind, path: &str) -> Option<NodeId> {
        self.map(kind).get(path).copied()
    }

    /// Returns the previous slot if the path was already indexed.
    pub fn insert(&mut self, kind: NodeKind, path: &str, id: NodeId) -> Option<NodeId> {
        self.map_mut(kind).insert(path.to_string(), id)
    }

    pub fn remove(&mut self, kind: NodeKind, path: &str) -> Option<NodeId> {
        self.map_mut(kind).remove(path)
    }

    pub fn len(&self) -> usize {
        self.folders.len() + self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.leaves.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn clear(&mut self) {
        self.folders.clear();
        self.leaves.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_different_kinds() {
        let mut index = PathIndex::new();
        index.insert(NodeKind::Folder, "a", NodeId(1));
        index.insert(NodeKind::Leaf, "a", NodeId(2));

        assert_eq!(index.get(NodeKind::Folder, "a"), Some(NodeId(1)));
        assert_eq!(index.get(NodeKind::Leaf, "a"), Some(NodeId(2)));
        assert_eq!(index.len(), 2);
        assert_eq!(index.leaf_count(), 1);

        assert_eq!(index.remove(NodeKind::Leaf, "a"), Some(NodeId(2)));
        assert_eq!(index.get(NodeKind::Leaf, "a"), None);
        assert_eq!(index.get(NodeKind::Folder, "a"), Some(NodeId(1)));
    }
}
