//! In-memory key hierarchy.
//!
//! A [`KeyTree`] mirrors one scope's flat key space as folders (shared
//! prefixes) and leaves (stored keys). Children are kept sorted by
//! [`PathTag`](crate::types::PathTag) and every folder carries the number
//! of keys below it.

mod index;
mod keytree;
mod node;

pub use index::PathIndex;
pub use keytree::KeyTree;
pub use node::{FolderNode, LeafNode, NodeMeta, TreeNode};
