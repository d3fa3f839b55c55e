//! Key-tree store: every open scope's tree plus change notifications.

use crate::error::{Result, TreeError};
use crate::keypath;
use crate::subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager, TreeEvent,
};
use crate::tree::KeyTree;
use crate::types::{NodeKind, NodeView, Scope, DEFAULT_SEPARATOR};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Separator for scopes opened without one.
    pub default_separator: String,

    /// Event buffer for subscriptions created with [`KeyTreeStore::subscribe_all`].
    pub event_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_separator: DEFAULT_SEPARATOR.to_string(),
            event_buffer_size: 1024,
        }
    }
}

/// Owns one [`KeyTree`] per open scope.
///
/// Each mutation holds the write lock for its whole structural step, so
/// readers never see a half-applied insert or delete. Ordering between
/// logically dependent mutations on the same scope is the caller's job.
pub struct KeyTreeStore {
    /// Store configuration.
    config: StoreConfig,

    /// Trees by scope.
    trees: RwLock<HashMap<Scope, KeyTree>>,

    /// Change notifications.
    subscriptions: SubscriptionManager,
}

impl KeyTreeStore {
    /// Create a store with the default configuration.
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
            trees: RwLock::new(HashMap::new()),
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// Create a store with a custom configuration.
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        keypath::validate_separator(&config.default_separator)?;
        Ok(Self {
            config,
            trees: RwLock::new(HashMap::new()),
            subscriptions: SubscriptionManager::new(),
        })
    }

    /// The store's configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // --- Scope Lifecycle ---

    /// Create an empty tree for `scope` if none exists. `None` uses the
    /// configured default separator. Returns `false` if the scope was
    /// already open, in which case its tree is kept as is.
    pub fn open_scope(&self, scope: &Scope, separator: Option<&str>) -> Result<bool> {
        let separator = separator.unwrap_or(self.config.default_separator.as_str());
        let mut trees = self.trees.write();
        if trees.contains_key(scope) {
            return Ok(false);
        }
        trees.insert(scope.clone(), KeyTree::new(separator)?);
        info!(scope = %scope, separator, "opened scope");
        Ok(true)
    }

    /// Whether `scope` has a tree.
    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.trees.read().contains_key(scope)
    }

    /// All open scopes, sorted.
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = self.trees.read().keys().cloned().collect();
        scopes.sort();
        scopes
    }

    /// Empty a scope's tree but keep the scope open.
    pub fn reset_scope(&self, scope: &Scope) -> bool {
        let reset = match self.trees.write().get_mut(scope) {
            Some(tree) => {
                tree.clear();
                true
            }
            None => false,
        };
        if reset {
            info!(scope = %scope, "reset scope");
            self.subscriptions.broadcast(TreeEvent::ScopeClosed {
                scope: scope.clone(),
            });
        }
        reset
    }

    /// Discard a scope's tree.
    pub fn close_scope(&self, scope: &Scope) -> bool {
        let closed = self.trees.write().remove(scope).is_some();
        if closed {
            info!(scope = %scope, "closed scope");
            self.subscriptions.broadcast(TreeEvent::ScopeClosed {
                scope: scope.clone(),
            });
        }
        closed
    }

    /// Discard every scope belonging to `connection`. Returns how many were
    /// closed.
    pub fn close_connection(&self, connection: &str) -> usize {
        let closed: Vec<Scope> = {
            let mut trees = self.trees.write();
            let scopes: Vec<Scope> = trees
                .keys()
                .filter(|scope| scope.connection() == connection)
                .cloned()
                .collect();
            for scope in &scopes {
                trees.remove(scope);
            }
            scopes
        };

        for scope in &closed {
            self.subscriptions.broadcast(TreeEvent::ScopeClosed {
                scope: scope.clone(),
            });
        }
        info!(connection, scopes = closed.len(), "closed connection scopes");
        closed.len()
    }

    // --- Structural Operations ---

    /// Replace the scope's tree with `keys`, opening the scope with the
    /// default separator if needed. Returns the resulting key count.
    pub fn bulk_load<I, S>(&self, scope: &Scope, keys: I) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let total = {
            let mut trees = self.trees.write();
            let tree = match trees.entry(scope.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    entry.insert(KeyTree::new(self.config.default_separator.as_str())?)
                }
            };
            tree.bulk_load(keys);
            tree.key_count()
        };

        info!(scope = %scope, keys = total, "loaded key tree");
        self.subscriptions.broadcast(TreeEvent::Loaded {
            scope: scope.clone(),
            keys: total,
        });
        Ok(total)
    }

    /// Add a committed key. Returns `false` if it was already present.
    pub fn insert_key(&self, scope: &Scope, key: &str) -> Result<bool> {
        let inserted = self.with_tree_mut(scope, |tree| tree.insert_key(key))?;
        if inserted {
            debug!(scope = %scope, key, "inserted key");
            self.subscriptions.broadcast(TreeEvent::KeyInserted {
                scope: scope.clone(),
                key: key.to_string(),
            });
        }
        Ok(inserted)
    }

    /// Remove a committed key. Returns `false` if it was not in the tree.
    pub fn delete_key(&self, scope: &Scope, key: &str) -> Result<bool> {
        let deleted = self.with_tree_mut(scope, |tree| tree.delete_key(key))?;
        if deleted {
            debug!(scope = %scope, key, "deleted key");
            self.subscriptions.broadcast(TreeEvent::KeyRemoved {
                scope: scope.clone(),
                key: key.to_string(),
            });
        } else {
            debug!(scope = %scope, key, "delete of unknown key ignored");
        }
        Ok(deleted)
    }

    /// Move a key: delete `old`, then insert `new`. Returns whether `old`
    /// was present.
    pub fn rename_key(&self, scope: &Scope, old: &str, new: &str) -> Result<bool> {
        let existed = self.with_tree_mut(scope, |tree| tree.rename_key(old, new))?;
        debug!(scope = %scope, from = old, to = new, existed, "renamed key");
        self.subscriptions.broadcast(TreeEvent::Renamed {
            scope: scope.clone(),
            from: old.to_string(),
            to: new.to_string(),
        });
        Ok(existed)
    }

    /// Remove the folder at `prefix` and everything below it.
    pub fn delete_subtree(&self, scope: &Scope, prefix: &str) -> Result<bool> {
        let removed = self.with_tree_mut(scope, |tree| tree.remove_prefix(prefix))?;
        match removed {
            Some(removed) => {
                debug!(scope = %scope, prefix, removed, "deleted subtree");
                self.subscriptions.broadcast(TreeEvent::SubtreeRemoved {
                    scope: scope.clone(),
                    prefix: prefix.to_string(),
                    removed,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Replace everything below `prefix` with a fresh scan. Returns the
    /// number of keys added.
    pub fn reload_prefix<I, S>(&self, scope: &Scope, prefix: &str, keys: I) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let added = self.with_tree_mut(scope, |tree| tree.reload_prefix(prefix, keys))?;
        debug!(scope = %scope, prefix, added, "reloaded prefix");
        self.subscriptions.broadcast(TreeEvent::Reloaded {
            scope: scope.clone(),
            prefix: prefix.to_string(),
            keys: added,
        });
        Ok(added)
    }

    // --- Expansion State ---

    /// Expand or collapse a folder. Returns `false` if there is no folder
    /// at `path`.
    pub fn set_opened(&self, scope: &Scope, path: &str, opened: bool) -> Result<bool> {
        let changed = self.with_tree_mut(scope, |tree| tree.set_opened(path, opened))?;
        if changed {
            self.subscriptions.broadcast(TreeEvent::Expanded {
                scope: scope.clone(),
                path: path.to_string(),
                opened,
            });
        }
        Ok(changed)
    }

    /// Record that a folder's children were fetched. Returns `false` if
    /// there is no folder at `path`.
    pub fn mark_loaded(&self, scope: &Scope, path: &str) -> Result<bool> {
        self.with_tree_mut(scope, |tree| tree.mark_loaded(path))
    }

    /// Expand or collapse the database node.
    pub fn set_root_opened(&self, scope: &Scope, opened: bool) -> Result<()> {
        self.with_tree_mut(scope, |tree| tree.set_root_opened(opened))
    }

    // --- Reads ---

    /// O(1) node lookup by full path and kind.
    pub fn lookup(&self, scope: &Scope, full_path: &str, kind: NodeKind) -> Option<NodeView> {
        self.read(scope, |tree| {
            tree.lookup(full_path, kind).map(|node| node.view(scope))
        })
        .flatten()
    }

    /// View of the scope root (the database node).
    pub fn root(&self, scope: &Scope) -> Option<NodeView> {
        self.read(scope, |tree| tree.root().view(scope))
    }

    /// Children of the folder at `path`, in order.
    pub fn children(&self, scope: &Scope, path: &str) -> Option<Vec<NodeView>> {
        self.read(scope, |tree| {
            let id = tree.lookup_id(path, NodeKind::Folder)?;
            Some(tree.children(id).map(|node| node.view(scope)).collect())
        })
        .flatten()
    }

    /// Top-level nodes, in order.
    pub fn root_children(&self, scope: &Scope) -> Option<Vec<NodeView>> {
        self.read(scope, |tree| {
            tree.root_children().map(|node| node.view(scope)).collect()
        })
    }

    /// Every key of the scope, in tree order.
    pub fn collect_keys(&self, scope: &Scope) -> Option<Vec<String>> {
        self.read(scope, KeyTree::collect_keys)
    }

    /// Number of keys in the scope.
    pub fn key_count(&self, scope: &Scope) -> Option<u64> {
        self.read(scope, KeyTree::key_count)
    }

    /// Number of folders and leaves in the scope.
    pub fn node_count(&self, scope: &Scope) -> Option<usize> {
        self.read(scope, KeyTree::node_count)
    }

    /// Run `f` against the scope's tree under the read lock.
    pub fn read<R>(&self, scope: &Scope, f: impl FnOnce(&KeyTree) -> R) -> Option<R> {
        self.trees.read().get(scope).map(f)
    }

    /// Verify the scope's tree. Fails with `ScopeNotFound` if it is not open.
    pub fn check_invariants(&self, scope: &Scope) -> Result<()> {
        self.read(scope, KeyTree::check_invariants)
            .unwrap_or_else(|| Err(TreeError::ScopeNotFound(scope.clone())))
    }

    // --- Subscriptions ---

    /// Subscribe to tree events.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    /// Subscribe to everything with the configured buffer size.
    pub fn subscribe_all(&self) -> SubscriptionHandle {
        self.subscriptions.subscribe(SubscriptionConfig {
            buffer_size: self.config.event_buffer_size,
            ..Default::default()
        })
    }

    /// Cancel a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id)
    }

    fn with_tree_mut<R>(&self, scope: &Scope, f: impl FnOnce(&mut KeyTree) -> R) -> Result<R> {
        let mut trees = self.trees.write();
        let tree = trees
            .get_mut(scope)
            .ok_or_else(|| TreeError::ScopeNotFound(scope.clone()))?;
        Ok(f(tree))
    }
}

impl Default for KeyTreeStore {
    fn default() -> Self {
        Self::new()
    }
}
