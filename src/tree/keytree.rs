//! Arena-backed key tree for a single scope.
//!
//! Nodes live in a slot vector addressed by [`NodeId`]; freed slots are
//! reused. Every folder keeps its children sorted by [`PathTag`], and a
//! [`PathIndex`] maps each node's `(kind, path)` to its slot so mutations
//! start from the target instead of searching the tree.
//!
//! Aggregate counts are maintained incrementally: an insert recomputes the
//! folders on the chain it walked, a delete subtracts the removed count from
//! the surviving ancestors. Only `bulk_load` does a full bottom-up pass.

use super::index::PathIndex;
use super::node::{FolderNode, LeafNode, TreeNode};
use crate::error::{Result, TreeError};
use crate::keypath;
use crate::types::{NodeId, NodeKind, PathTag, DEFAULT_SEPARATOR};
use std::cmp::Ordering;
use std::fmt::Write;

/// The key hierarchy of one (connection, database) scope.
#[derive(Clone, Debug)]
pub struct KeyTree {
    separator: String,
    /// Scope root; not stored in the arena and never indexed or pruned.
    root: FolderNode,
    nodes: Vec<Option<TreeNode>>,
    free: Vec<NodeId>,
    index: PathIndex,
}

impl KeyTree {
    /// Create an empty tree splitting keys on `separator`.
    pub fn new(separator: impl Into<String>) -> Result<Self> {
        let separator = separator.into();
        keypath::validate_separator(&separator)?;
        Ok(Self {
            separator,
            root: FolderNode::new("", "", None),
            nodes: Vec::new(),
            free: Vec::new(),
            index: PathIndex::new(),
        })
    }

    /// Separator keys are split on.
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// The scope root. Its count is the scope's key total.
    pub fn root(&self) -> &FolderNode {
        &self.root
    }

    /// Node in slot `id`, or `None` if the slot is free.
    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    /// Find a node by full path and kind in O(1).
    pub fn lookup(&self, path: &str, kind: NodeKind) -> Option<&TreeNode> {
        self.lookup_id(path, kind).and_then(|id| self.node(id))
    }

    /// Slot of the node at `path`, if any.
    pub fn lookup_id(&self, path: &str, kind: NodeKind) -> Option<NodeId> {
        self.index.get(kind, path)
    }

    /// Whether `key` is a leaf of the tree.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.get(NodeKind::Leaf, key).is_some()
    }

    /// Number of keys in the tree.
    pub fn key_count(&self) -> u64 {
        self.root.count
    }

    /// Number of folders and leaves (the root excluded).
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    /// Whether the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Children of a node, in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &TreeNode> + '_ {
        let ids = self.node(id).map(TreeNode::children).unwrap_or(&[]);
        ids.iter().filter_map(move |child| self.node(*child))
    }

    /// Top-level nodes, in order.
    pub fn root_children(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.root
            .children
            .iter()
            .filter_map(move |child| self.node(*child))
    }

    // --- Mutations ---

    /// Drop every node. The root also loses its expansion state.
    pub fn clear(&mut self) {
        self.root = FolderNode::new("", "", None);
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
    }

    /// Replace the tree with `keys`.
    ///
    /// Keys arrive in scan order, which is unsorted. Nodes are appended to
    /// their parent, then every folder's children are sorted once and counts
    /// are computed in a single bottom-up pass. Duplicate keys are absorbed.
    pub fn bulk_load<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.clear();
        for key in keys {
            self.append_path(key.as_ref());
        }
        self.sort_all();
        self.recompute_all();
        self.root.opened = true;
        self.root.loaded = true;
    }

    /// Insert one key. Returns `false` if the key was already present, in
    /// which case nothing changes.
    pub fn insert_key(&mut self, key: &str) -> bool {
        let (chain, created) = self.insert_path(key);
        if created {
            for at in chain.iter().rev() {
                self.recompute(*at);
            }
        }
        created
    }

    /// Remove one key and prune folders it leaves empty. Returns `false` if
    /// the key is not in the tree.
    pub fn delete_key(&mut self, key: &str) -> bool {
        match self.index.get(NodeKind::Leaf, key) {
            Some(id) => self.remove_subtree(id).is_some(),
            None => false,
        }
    }

    /// Delete `old` and insert `new`. Returns whether `old` was present;
    /// `new` is inserted either way.
    pub fn rename_key(&mut self, old: &str, new: &str) -> bool {
        let existed = self.delete_key(old);
        self.insert_key(new);
        existed
    }

    /// Remove the folder at `prefix` with everything below it.
    pub fn delete_subtree(&mut self, prefix: &str) -> bool {
        self.remove_prefix(prefix).is_some()
    }

    /// Like [`delete_subtree`](Self::delete_subtree) but reports how many
    /// keys were removed. A trailing `*` and separator are ignored.
    pub fn remove_prefix(&mut self, prefix: &str) -> Option<u64> {
        let prefix = keypath::normalize_prefix(prefix, &self.separator);
        let id = self.index.get(NodeKind::Folder, prefix)?;
        self.remove_subtree(id)
    }

    /// Replace everything below `prefix` with `keys`, keeping the folder's
    /// expansion state. An empty prefix reloads the whole tree. Returns the
    /// number of keys added.
    pub fn reload_prefix<I, S>(&mut self, prefix: &str, keys: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefix = keypath::normalize_prefix(prefix, &self.separator).to_string();
        if prefix.is_empty() {
            self.bulk_load(keys);
            return self.key_count();
        }

        let opened = self
            .lookup(&prefix, NodeKind::Folder)
            .map(TreeNode::is_opened)
            .unwrap_or(false);
        self.remove_prefix(&prefix);

        let mut added = 0;
        for key in keys {
            if self.insert_key(key.as_ref()) {
                added += 1;
            }
        }

        if let Some(id) = self.index.get(NodeKind::Folder, &prefix) {
            if let Some(folder) = self.folder_mut(Some(id)) {
                folder.opened = opened;
                folder.loaded = true;
            }
        }
        added
    }

    /// Set a folder's expansion flag. Returns `false` if there is no folder
    /// at `path`.
    pub fn set_opened(&mut self, path: &str, opened: bool) -> bool {
        let id = self.index.get(NodeKind::Folder, path);
        match id.and_then(|id| self.folder_mut(Some(id))) {
            Some(folder) => {
                folder.opened = opened;
                true
            }
            None => false,
        }
    }

    /// Record that a folder's children have been fetched.
    pub fn mark_loaded(&mut self, path: &str) -> bool {
        let id = self.index.get(NodeKind::Folder, path);
        match id.and_then(|id| self.folder_mut(Some(id))) {
            Some(folder) => {
                folder.loaded = true;
                true
            }
            None => false,
        }
    }

    /// Expand or collapse the database node.
    pub fn set_root_opened(&mut self, opened: bool) {
        self.root.opened = opened;
    }

    // --- Reads ---

    /// All keys, in tree order.
    pub fn collect_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.index.leaf_count());
        let mut stack: Vec<NodeId> = self.root.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            match self.node(id) {
                Some(TreeNode::Leaf(leaf)) => keys.push(leaf.meta.tag.path.clone()),
                Some(TreeNode::Folder(folder)) => {
                    stack.extend(folder.children.iter().rev().copied());
                }
                None => {}
            }
        }
        keys
    }

    /// Indented listing of the tree shape, one node per line:
    /// kind tag, label and aggregate count.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(NodeId, usize)> =
            self.root.children.iter().rev().map(|id| (*id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            let _ = writeln!(
                out,
                "{}{} {} ({})",
                "  ".repeat(depth),
                node.kind().tag(),
                node.label(),
                node.aggregate_count()
            );
            stack.extend(node.children().iter().rev().map(|c| (*c, depth + 1)));
        }
        out
    }

    /// Verify aggregate counts, ordering, paths, pruning and the index.
    pub fn check_invariants(&self) -> Result<()> {
        let mut visited = 0usize;
        let mut stack: Vec<Option<NodeId>> = vec![None];

        while let Some(at) = stack.pop() {
            let folder = self
                .folder(at)
                .ok_or_else(|| violation(format!("{:?} is not a live folder", at)))?;
            if at.is_some() && folder.children.is_empty() {
                return Err(violation(format!("empty folder {:?}", folder.meta.tag)));
            }

            let mut sum = 0u64;
            let mut prev: Option<&PathTag> = None;
            for &child_id in &folder.children {
                let child = self.node(child_id).ok_or_else(|| {
                    violation(format!(
                        "dangling child {:?} under {:?}",
                        child_id, folder.meta.tag
                    ))
                })?;
                visited += 1;

                if child.parent() != at {
                    return Err(violation(format!("bad parent link on {:?}", child.tag())));
                }
                if let Some(prev) = prev {
                    if prev >= child.tag() {
                        return Err(violation(format!(
                            "{:?} not ordered after {:?}",
                            child.tag(),
                            prev
                        )));
                    }
                }
                prev = Some(child.tag());

                let expected = if at.is_none() {
                    child.label().to_string()
                } else {
                    format!("{}{}{}", folder.meta.tag.path, self.separator, child.label())
                };
                if child.full_path() != expected {
                    return Err(violation(format!(
                        "{:?} does not match ancestor labels ({:?})",
                        child.tag(),
                        expected
                    )));
                }
                if self.index.get(child.kind(), child.full_path()) != Some(child_id) {
                    return Err(violation(format!("{:?} missing from index", child.tag())));
                }

                sum += child.aggregate_count();
                if !child.is_leaf() {
                    stack.push(Some(child_id));
                }
            }

            if sum != folder.count {
                return Err(violation(format!(
                    "{:?} counts {} but children sum to {}",
                    folder.meta.tag, folder.count, sum
                )));
            }
        }

        if visited != self.index.len() {
            return Err(violation(format!(
                "index holds {} entries for {} nodes",
                self.index.len(),
                visited
            )));
        }
        Ok(())
    }

    // --- Internals ---

    /// `None` addresses the root.
    fn folder(&self, at: Option<NodeId>) -> Option<&FolderNode> {
        match at {
            None => Some(&self.root),
            Some(id) => self.node(id).and_then(TreeNode::as_folder),
        }
    }

    fn folder_mut(&mut self, at: Option<NodeId>) -> Option<&mut FolderNode> {
        match at {
            None => Some(&mut self.root),
            Some(id) => self
                .nodes
                .get_mut(id.index())
                .and_then(Option::as_mut)
                .and_then(TreeNode::as_folder_mut),
        }
    }

    fn count_of(&self, id: NodeId) -> u64 {
        self.node(id).map(TreeNode::aggregate_count).unwrap_or(0)
    }

    fn cmp_child(&self, id: NodeId, kind: NodeKind, path: &str) -> Ordering {
        match self.node(id) {
            Some(node) => node.tag().cmp_parts(kind, path),
            None => Ordering::Less,
        }
    }

    fn alloc(&mut self, node: TreeNode) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.index()] = Some(node);
            id
        } else {
            let id = NodeId(self.nodes.len() as u32);
            self.nodes.push(Some(node));
            id
        }
    }

    /// Find the child of `parent` with the given tag, creating it at its
    /// sorted position if missing. Returns the child and whether it is new.
    fn find_or_create(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
        path: &str,
        label: &str,
    ) -> Option<(NodeId, bool)> {
        if let Some(id) = self.index.get(kind, path) {
            return Some((id, false));
        }

        let pos = {
            let folder = self.folder(parent)?;
            match folder
                .children
                .binary_search_by(|child| self.cmp_child(*child, kind, path))
            {
                Ok(pos) => return Some((folder.children[pos], false)),
                Err(pos) => pos,
            }
        };

        let node = match kind {
            NodeKind::Folder => TreeNode::Folder(FolderNode::new(path, label, parent)),
            NodeKind::Leaf => TreeNode::Leaf(LeafNode::new(path, label, parent)),
        };
        let id = self.alloc(node);
        if let Some(folder) = self.folder_mut(parent) {
            folder.children.insert(pos, id);
        }
        self.index.insert(kind, path, id);
        Some((id, true))
    }

    /// Walk `key`'s path, creating whatever is missing. Returns the folder
    /// chain from the root down (root first) and whether the leaf is new.
    /// Counts are left for the caller to fix up.
    fn insert_path(&mut self, key: &str) -> (Vec<Option<NodeId>>, bool) {
        let spans = keypath::segment_spans(key, &self.separator);
        let last = spans.len() - 1;
        let mut chain = Vec::with_capacity(spans.len());
        chain.push(None);
        let mut parent = None;
        let mut created = false;

        for (i, &(start, end)) in spans.iter().enumerate() {
            let kind = if i == last {
                NodeKind::Leaf
            } else {
                NodeKind::Folder
            };
            let Some((id, new)) = self.find_or_create(parent, kind, &key[..end], &key[start..end])
            else {
                break;
            };
            match kind {
                NodeKind::Folder => {
                    chain.push(Some(id));
                    parent = Some(id);
                }
                NodeKind::Leaf => created = new,
            }
        }
        (chain, created)
    }

    /// Set a folder's count from its direct children.
    fn recompute(&mut self, at: Option<NodeId>) {
        let total: u64 = match self.folder(at) {
            Some(folder) => folder.children.iter().map(|c| self.count_of(*c)).sum(),
            None => return,
        };
        if let Some(folder) = self.folder_mut(at) {
            folder.count = total;
        }
    }

    /// Append-only variant of [`insert_path`](Self::insert_path) for bulk
    /// loads. Children are left unsorted and counts untouched.
    fn append_path(&mut self, key: &str) {
        let spans = keypath::segment_spans(key, &self.separator);
        let last = spans.len() - 1;
        let mut parent = None;

        for (i, &(start, end)) in spans.iter().enumerate() {
            let kind = if i == last {
                NodeKind::Leaf
            } else {
                NodeKind::Folder
            };
            let path = &key[..end];
            let id = match self.index.get(kind, path) {
                Some(id) => id,
                None => {
                    if self.folder(parent).is_none() {
                        break;
                    }
                    let label = &key[start..end];
                    let node = match kind {
                        NodeKind::Folder => TreeNode::Folder(FolderNode::new(path, label, parent)),
                        NodeKind::Leaf => TreeNode::Leaf(LeafNode::new(path, label, parent)),
                    };
                    let id = self.alloc(node);
                    if let Some(folder) = self.folder_mut(parent) {
                        folder.children.push(id);
                    }
                    self.index.insert(kind, path, id);
                    id
                }
            };
            parent = Some(id);
        }
    }

    /// Sort the children of the root and of every folder by tag.
    fn sort_all(&mut self) {
        let folders: Vec<NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Some(TreeNode::Folder(_))))
            .map(|(i, _)| NodeId(i as u32))
            .collect();
        self.sort_children(None);
        for id in folders {
            self.sort_children(Some(id));
        }
    }

    fn sort_children(&mut self, at: Option<NodeId>) {
        let mut children = match self.folder_mut(at) {
            Some(folder) => std::mem::take(&mut folder.children),
            None => return,
        };
        children.sort_unstable_by(|a, b| match (self.node(*a), self.node(*b)) {
            (Some(x), Some(y)) => x.tag().cmp(y.tag()),
            _ => a.cmp(b),
        });
        if let Some(folder) = self.folder_mut(at) {
            folder.children = children;
        }
    }

    /// Recompute every folder, children before parents.
    fn recompute_all(&mut self) {
        let mut order = Vec::new();
        let mut stack = self.root.children.clone();
        while let Some(id) = stack.pop() {
            if let Some(TreeNode::Folder(folder)) = self.node(id) {
                order.push(id);
                stack.extend_from_slice(&folder.children);
            }
        }
        for id in order.into_iter().rev() {
            self.recompute(Some(id));
        }
        self.recompute(None);
    }

    /// Unlink `id` from its parent's child list.
    fn detach(&mut self, parent: Option<NodeId>, id: NodeId) {
        let pos = match (self.folder(parent), self.node(id)) {
            (Some(folder), Some(node)) => {
                let tag = node.tag();
                folder
                    .children
                    .binary_search_by(|child| self.cmp_child(*child, tag.kind, &tag.path))
                    .ok()
                    .or_else(|| folder.children.iter().position(|child| *child == id))
            }
            _ => None,
        };
        if let (Some(pos), Some(folder)) = (pos, self.folder_mut(parent)) {
            folder.children.remove(pos);
        }
    }

    /// Free `id` and all its descendants, dropping their index entries.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id.index()).and_then(Option::take) else {
                continue;
            };
            self.index.remove(node.kind(), node.full_path());
            stack.extend_from_slice(node.children());
            self.free.push(id);
        }
    }

    /// Remove a node with its subtree, prune ancestors left empty and
    /// subtract the removed count from the ancestors that remain.
    fn remove_subtree(&mut self, id: NodeId) -> Option<u64> {
        let node = self.node(id)?;
        let removed = node.aggregate_count();
        let mut parent = node.parent();

        self.detach(parent, id);
        self.release(id);

        while let Some(folder_id) = parent {
            let (empty, up) = match self.node(folder_id) {
                Some(TreeNode::Folder(folder)) => (folder.children.is_empty(), folder.meta.parent),
                _ => break,
            };
            if !empty {
                break;
            }
            self.detach(up, folder_id);
            self.release(folder_id);
            parent = up;
        }

        let mut at = parent;
        while let Some(folder_id) = at {
            let next = self.node(folder_id).and_then(TreeNode::parent);
            if let Some(folder) = self.folder_mut(Some(folder_id)) {
                folder.count = folder.count.saturating_sub(removed);
            }
            at = next;
        }
        self.root.count = self.root.count.saturating_sub(removed);

        Some(removed)
    }
}

impl Default for KeyTree {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            root: FolderNode::new("", "", None),
            nodes: Vec::new(),
            free: Vec::new(),
            index: PathIndex::new(),
        }
    }
}

fn violation(message: String) -> TreeError {
    TreeError::InvariantViolation(message)
}
