//! # Keyspace Tree
//!
//! A hierarchical, navigable view over the flat key namespace of a remote
//! key-value store. Keys such as `user:1001:name` are split on a per-connection
//! separator into folders (shared prefixes) and leaves (actual keys), and
//! every folder carries the number of keys beneath it.
//!
//! ## Core Concepts
//!
//! - **Scopes**: one independent tree per connection and database index
//! - **Tree**: arena-backed folders and leaves with O(1) lookup by path
//! - **Store**: thread-safe owner of every open scope's tree
//! - **Session**: drives a [`KeyspaceBackend`] and mirrors committed changes
//! - **Subscriptions**: change notifications for the presentation layer
//!
//! ## Example
//!
//! ```ignore
//! use keyspace_tree::{KeyTreeStore, NodeKind, Scope};
//!
//! let store = KeyTreeStore::new();
//! let scope = Scope::new("local", 0)?;
//!
//! store.bulk_load(&scope, ["user:1001:name", "user:1001:email", "user:1002:name"])?;
//! store.insert_key(&scope, "user:1003:name")?;
//!
//! let user = store.lookup(&scope, "user", NodeKind::Folder).unwrap();
//! assert_eq!(user.aggregate_count, 4);
//! ```

pub mod error;
pub mod keypath;
pub mod remote;
pub mod session;
pub mod store;
pub mod subscriptions;
pub mod tree;
pub mod types;

// Re-exports
pub use error::{Result, TreeError};
pub use remote::{
    FieldEdit, FieldEditOutcome, KeyValue, KeyspaceBackend, RemoteError, RemoteResponse,
    RemoteResult,
};
pub use session::KeyspaceSession;
pub use store::{KeyTreeStore, StoreConfig};
pub use subscriptions::{
    DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle, SubscriptionId,
    SubscriptionManager, TreeEvent,
};
pub use tree::{FolderNode, KeyTree, LeafNode, PathIndex, TreeNode};
pub use types::*;
