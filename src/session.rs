//! Session: drives a backend and mirrors committed changes into the tree.
//!
//! Every mutating call runs the remote command first. The tree is touched
//! only after the backend reports success; on failure the error is returned
//! as [`TreeError::Remote`] and the tree is left exactly as it was.

use crate::error::{Result, TreeError};
use crate::keypath;
use crate::remote::{FieldEdit, FieldEditOutcome, KeyValue, KeyspaceBackend, RemoteResult};
use crate::store::KeyTreeStore;
use crate::types::{ConnectionConfig, DatabaseInfo, NodeKind, NodeView, Scope};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Connection profiles, open connections and their key trees.
pub struct KeyspaceSession<B> {
    backend: B,
    store: KeyTreeStore,
    /// Profiles by connection name.
    profiles: RwLock<HashMap<String, ConnectionConfig>>,
    /// Groups created explicitly; groups named by a profile exist implicitly.
    groups: RwLock<BTreeSet<String>>,
    /// Databases of each open connection.
    databases: RwLock<HashMap<String, Vec<DatabaseInfo>>>,
}

impl<B: KeyspaceBackend> KeyspaceSession<B> {
    /// Create a session with a default store.
    pub fn new(backend: B) -> Self {
        Self::with_store(backend, KeyTreeStore::new())
    }

    /// Create a session over an existing store.
    pub fn with_store(backend: B, store: KeyTreeStore) -> Self {
        Self {
            backend,
            store,
            profiles: RwLock::new(HashMap::new()),
            groups: RwLock::new(BTreeSet::new()),
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// The remote backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The key trees of every open database.
    pub fn store(&self) -> &KeyTreeStore {
        &self.store
    }

    // --- Profiles ---

    /// Register or replace a connection profile.
    pub fn add_profile(&self, config: ConnectionConfig) -> Result<()> {
        if config.name.is_empty() {
            return Err(TreeError::InvalidScope(
                "connection name must not be empty".to_string(),
            ));
        }
        keypath::validate_separator(config.separator())?;
        self.profiles.write().insert(config.name.clone(), config);
        Ok(())
    }

    /// Profile of `name`, if registered.
    pub fn profile(&self, name: &str) -> Option<ConnectionConfig> {
        self.profiles.read().get(name).cloned()
    }

    /// Profiles sorted by group, then name.
    pub fn profiles(&self) -> Vec<ConnectionConfig> {
        let mut profiles: Vec<ConnectionConfig> = self.profiles.read().values().cloned().collect();
        profiles.sort_by(|a, b| a.group.cmp(&b.group).then_with(|| a.name.cmp(&b.name)));
        profiles
    }

    /// Forget a profile, closing its connection first if open.
    pub fn remove_profile(&self, name: &str) -> Result<bool> {
        if self.is_connected(name) {
            self.close_connection(name)?;
        }
        Ok(self.profiles.write().remove(name).is_some())
    }

    // --- Groups ---

    /// Every group name, explicit or used by a profile, sorted. The
    /// ungrouped bucket `""` is not listed.
    pub fn groups(&self) -> Vec<String> {
        let mut groups = self.groups.read().clone();
        groups.extend(
            self.profiles
                .read()
                .values()
                .filter(|p| !p.group.is_empty())
                .map(|p| p.group.clone()),
        );
        groups.into_iter().collect()
    }

    /// Register an empty group.
    pub fn create_group(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(TreeError::InvalidScope(
                "group name must not be empty".to_string(),
            ));
        }
        if self.has_group(name) {
            return Err(TreeError::GroupExists(name.to_string()));
        }
        self.groups.write().insert(name.to_string());
        debug!(group = name, "created group");
        Ok(())
    }

    /// Rename a group, moving its profiles. Returns how many moved.
    pub fn rename_group(&self, name: &str, new_name: &str) -> Result<usize> {
        if name == new_name {
            return Ok(0);
        }
        if !self.has_group(name) {
            return Err(TreeError::GroupNotFound(name.to_string()));
        }
        if new_name.is_empty() || self.has_group(new_name) {
            return Err(TreeError::GroupExists(new_name.to_string()));
        }

        let mut moved = 0;
        for profile in self.profiles.write().values_mut() {
            if profile.group == name {
                profile.group = new_name.to_string();
                moved += 1;
            }
        }
        let mut groups = self.groups.write();
        groups.remove(name);
        groups.insert(new_name.to_string());
        info!(group = name, new_name, profiles = moved, "renamed group");
        Ok(moved)
    }

    /// Delete a group. Its profiles are removed too when
    /// `include_connections` is set, otherwise they become ungrouped.
    /// Returns how many profiles were affected.
    pub fn delete_group(&self, name: &str, include_connections: bool) -> Result<usize> {
        if !self.has_group(name) {
            return Err(TreeError::GroupNotFound(name.to_string()));
        }

        let members: Vec<String> = self
            .profiles
            .read()
            .values()
            .filter(|p| p.group == name)
            .map(|p| p.name.clone())
            .collect();
        if include_connections {
            for member in &members {
                self.remove_profile(member)?;
            }
        } else {
            for profile in self.profiles.write().values_mut() {
                if profile.group == name {
                    profile.group.clear();
                }
            }
        }
        self.groups.write().remove(name);
        info!(group = name, profiles = members.len(), include_connections, "deleted group");
        Ok(members.len())
    }

    fn has_group(&self, name: &str) -> bool {
        !name.is_empty()
            && (self.groups.read().contains(name)
                || self.profiles.read().values().any(|p| p.group == name))
    }

    // --- Connections ---

    /// Connect and record the connection's databases.
    pub fn open_connection(&self, name: &str) -> Result<Vec<DatabaseInfo>> {
        if !self.profiles.read().contains_key(name) {
            return Err(TreeError::ConnectionNotFound(name.to_string()));
        }
        let dbs = remote(self.backend.open_connection(name))?;
        info!(connection = name, databases = dbs.len(), "opened connection");
        self.databases.write().insert(name.to_string(), dbs.clone());
        Ok(dbs)
    }

    /// Disconnect and discard every tree of the connection.
    pub fn close_connection(&self, name: &str) -> Result<()> {
        remote(self.backend.close_connection(name))?;
        self.databases.write().remove(name);
        self.store.close_connection(name);
        info!(connection = name, "closed connection");
        Ok(())
    }

    /// Whether `name` has been opened and not closed since.
    pub fn is_connected(&self, name: &str) -> bool {
        self.databases.read().contains_key(name)
    }

    /// Databases listed when `name` was opened.
    pub fn databases(&self, name: &str) -> Option<Vec<DatabaseInfo>> {
        self.databases.read().get(name).cloned()
    }

    /// Close every open connection.
    pub fn close_all(&self) -> Result<()> {
        let names: Vec<String> = self.databases.read().keys().cloned().collect();
        for name in names {
            self.close_connection(&name)?;
        }
        Ok(())
    }

    // --- Databases ---

    /// Scan a database and build its tree. Returns the number of keys.
    pub fn open_database(&self, connection: &str, db: u32) -> Result<u64> {
        let profile = self.connected_profile(connection)?;
        let scope = Scope::new(connection, db)?;

        let keys = remote(self.backend.scan_keys(connection, db, profile.filter()))?;
        self.store.open_scope(&scope, Some(profile.separator()))?;
        let total = self.store.bulk_load(&scope, keys)?;

        if let Some(info) = self
            .databases
            .write()
            .get_mut(connection)
            .and_then(|dbs| dbs.get_mut(db as usize))
        {
            info.keys = total;
        }
        Ok(total)
    }

    /// Drop a database's tree so the next open rescans it.
    pub fn reopen_database(&self, connection: &str, db: u32) -> Result<bool> {
        let scope = Scope::new(connection, db)?;
        Ok(self.store.reset_scope(&scope))
    }

    /// Rescan everything below `prefix` and replace that part of the tree.
    /// An empty prefix rescans the whole database.
    pub fn load_keys(&self, connection: &str, db: u32, prefix: &str) -> Result<u64> {
        let profile = self.connected_profile(connection)?;
        let scope = Scope::new(connection, db)?;
        let pattern = keypath::scan_pattern(prefix, profile.separator());

        let keys = remote(self.backend.scan_keys(connection, db, &pattern))?;
        self.store.open_scope(&scope, Some(profile.separator()))?;
        self.store.reload_prefix(&scope, prefix, keys)
    }

    // --- Key Mutations ---

    /// Write a key and add it to the tree. Returns whether the key is new to
    /// the tree.
    pub fn set_key(
        &self,
        connection: &str,
        db: u32,
        key: &str,
        value: &KeyValue,
        ttl: Option<i64>,
    ) -> Result<bool> {
        let scope = Scope::new(connection, db)?;
        remote(self.backend.set_key(connection, db, key, value, ttl))?;
        debug!(scope = %scope, key, kind = value.type_name(), "set key");
        self.when_open(&scope, |store| store.insert_key(&scope, key))
    }

    /// Delete a key and remove it from the tree.
    pub fn delete_key(&self, connection: &str, db: u32, key: &str) -> Result<bool> {
        let scope = Scope::new(connection, db)?;
        remote(self.backend.delete_key(connection, db, key))?;
        self.when_open(&scope, |store| store.delete_key(&scope, key))
    }

    /// Delete every key under `prefix` (a trailing `*` or separator is
    /// accepted) and drop that folder from the tree.
    pub fn delete_key_prefix(&self, connection: &str, db: u32, prefix: &str) -> Result<bool> {
        if prefix.is_empty() {
            return Ok(false);
        }
        let separator = self.separator_for(connection);
        let scope = Scope::new(connection, db)?;
        let folder = keypath::normalize_prefix(prefix, &separator);
        if folder.is_empty() {
            return Ok(false);
        }
        let pattern = keypath::scan_pattern(folder, &separator);

        remote(self.backend.delete_key(connection, db, &pattern))?;
        self.when_open(&scope, |store| store.delete_subtree(&scope, folder))
    }

    /// Rename a key and move it in the tree. Returns whether the old key
    /// was in the tree.
    pub fn rename_key(&self, connection: &str, db: u32, key: &str, new_key: &str) -> Result<bool> {
        let scope = Scope::new(connection, db)?;
        remote(self.backend.rename_key(connection, db, key, new_key))?;
        self.when_open(&scope, |store| store.rename_key(&scope, key, new_key))
    }

    /// Apply a field-level edit. Edits can create a collection key or, by
    /// removing its last member, delete it; the tree follows either way.
    pub fn edit_field(
        &self,
        connection: &str,
        db: u32,
        key: &str,
        edit: &FieldEdit,
    ) -> Result<FieldEditOutcome> {
        let scope = Scope::new(connection, db)?;
        let outcome = remote(self.backend.edit_field(connection, db, key, edit))?;
        self.when_open(&scope, |store| {
            if outcome.key_removed {
                store.delete_key(&scope, key)
            } else {
                store.insert_key(&scope, key)
            }
        })?;
        Ok(outcome)
    }

    /// Reset a key's expiry. The tree does not track TTLs.
    pub fn set_ttl(&self, connection: &str, db: u32, key: &str, ttl: i64) -> Result<()> {
        remote(self.backend.set_ttl(connection, db, key, ttl))
    }

    // --- Presentation ---

    /// Expand or collapse a folder; an empty path targets the database node.
    pub fn toggle_expanded(&self, connection: &str, db: u32, path: &str, opened: bool) -> Result<bool> {
        let scope = Scope::new(connection, db)?;
        if path.is_empty() {
            self.store.set_root_opened(&scope, opened)?;
            return Ok(true);
        }
        self.store.set_opened(&scope, path, opened)
    }

    /// View of the node at `path` in an open database.
    pub fn lookup(&self, connection: &str, db: u32, path: &str, kind: NodeKind) -> Option<NodeView> {
        let scope = Scope::new(connection, db).ok()?;
        self.store.lookup(&scope, path, kind)
    }

    // --- Internals ---

    fn connected_profile(&self, connection: &str) -> Result<ConnectionConfig> {
        if !self.is_connected(connection) {
            return Err(TreeError::ConnectionNotFound(connection.to_string()));
        }
        self.profile(connection)
            .ok_or_else(|| TreeError::ConnectionNotFound(connection.to_string()))
    }

    fn separator_for(&self, connection: &str) -> String {
        self.profiles
            .read()
            .get(connection)
            .map(|p| p.separator().to_string())
            .unwrap_or_else(|| self.store.config().default_separator.clone())
    }

    /// Mirror a committed change into the scope's tree if the database is
    /// open. An unopened database, including one closed while the remote
    /// command ran, has no tree to update.
    fn when_open(
        &self,
        scope: &Scope,
        apply: impl FnOnce(&KeyTreeStore) -> Result<bool>,
    ) -> Result<bool> {
        match apply(&self.store) {
            Err(TreeError::ScopeNotFound(_)) => {
                debug!(scope = %scope, "database not open, tree unchanged");
                Ok(false)
            }
            result => result,
        }
    }
}

/// Lift a remote failure into the session error, logging it once.
fn remote<T>(result: RemoteResult<T>) -> Result<T> {
    result.map_err(|e| {
        warn!(error = %e, "remote command failed");
        TreeError::Remote(e)
    })
}
