//! Tree node types.

use crate::types::{NodeId, NodeKind, NodeView, PathTag, Scope};

/// Fields shared by folders and leaves.
#[derive(Clone, Debug)]
pub struct NodeMeta {
    /// Kind and full path; unique within the tree.
    pub(crate) tag: PathTag,
    /// Last path segment.
    pub(crate) label: String,
    /// Enclosing folder; `None` when attached directly to the scope root.
    pub(crate) parent: Option<NodeId>,
}

/// A shared key prefix.
#[derive(Clone, Debug)]
pub struct FolderNode {
    pub(crate) meta: NodeMeta,
    /// Sorted by child tag.
    pub(crate) children: Vec<NodeId>,
    /// Number of leaves in this subtree.
    pub(crate) count: u64,
    pub(crate) opened: bool,
    pub(crate) loaded: bool,
}

impl FolderNode {
    pub(crate) fn new(path: &str, label: &str, parent: Option<NodeId>) -> Self {
        Self {
            meta: NodeMeta {
                tag: PathTag::folder(path),
                label: label.to_string(),
                parent,
            },
            children: Vec::new(),
            count: 0,
            opened: false,
            loaded: false,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn aggregate_count(&self) -> u64 {
        self.count
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn label(&self) -> &str {
        &self.meta.label
    }

    pub fn full_path(&self) -> &str {
        &self.meta.tag.path
    }

    pub fn view(&self, scope: &Scope) -> NodeView {
        NodeView {
            key: self.meta.tag.structural_key(scope),
            kind: NodeKind::Folder,
            label: self.meta.label.clone(),
            full_path: self.meta.tag.path.clone(),
            aggregate_count: self.count,
            child_count: self.children.len(),
            opened: self.opened,
            loaded: self.loaded,
        }
    }
}

/// An actual stored key.
#[derive(Clone, Debug)]
pub struct LeafNode {
    pub(crate) meta: NodeMeta,
}

impl LeafNode {
    pub(crate) fn new(path: &str, label: &str, parent: Option<NodeId>) -> Self {
        Self {
            meta: NodeMeta {
                tag: PathTag::leaf(path),
                label: label.to_string(),
                parent,
            },
        }
    }
}

/// A node in the key hierarchy.
#[derive(Clone, Debug)]
pub enum TreeNode {
    Folder(FolderNode),
    Leaf(LeafNode),
}

impl TreeNode {
    fn meta(&self) -> &NodeMeta {
        match self {
            TreeNode::Folder(folder) => &folder.meta,
            TreeNode::Leaf(leaf) => &leaf.meta,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            TreeNode::Folder(_) => NodeKind::Folder,
            TreeNode::Leaf(_) => NodeKind::Leaf,
        }
    }

    pub fn tag(&self) -> &PathTag {
        &self.meta().tag
    }

    pub fn label(&self) -> &str {
        &self.meta().label
    }

    /// Key prefix for a folder, full key for a leaf.
    pub fn full_path(&self) -> &str {
        &self.meta().tag.path
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.meta().parent
    }

    /// Leaves always count one.
    pub fn aggregate_count(&self) -> u64 {
        match self {
            TreeNode::Folder(folder) => folder.count,
            TreeNode::Leaf(_) => 1,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            TreeNode::Folder(folder) => &folder.children,
            TreeNode::Leaf(_) => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf(_))
    }

    pub fn is_opened(&self) -> bool {
        match self {
            TreeNode::Folder(folder) => folder.opened,
            TreeNode::Leaf(_) => false,
        }
    }

    pub fn is_loaded(&self) -> bool {
        match self {
            TreeNode::Folder(folder) => folder.loaded,
            TreeNode::Leaf(_) => false,
        }
    }

    pub fn as_folder(&self) -> Option<&FolderNode> {
        match self {
            TreeNode::Folder(folder) => Some(folder),
            TreeNode::Leaf(_) => None,
        }
    }

    /// Owned snapshot for the presentation layer.
    pub fn view(&self, scope: &Scope) -> NodeView {
        match self {
            TreeNode::Folder(folder) => folder.view(scope),
            TreeNode::Leaf(leaf) => NodeView {
                key: leaf.meta.tag.structural_key(scope),
                kind: NodeKind::Leaf,
                label: leaf.meta.label.clone(),
                full_path: leaf.meta.tag.path.clone(),
                aggregate_count: 1,
                child_count: 0,
                opened: false,
                loaded: false,
            },
        }
    }

    pub(crate) fn as_folder_mut(&mut self) -> Option<&mut FolderNode> {
        match self {
            TreeNode::Folder(folder) => Some(folder),
            TreeNode::Leaf(_) => None,
        }
    }
}
