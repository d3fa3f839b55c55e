//! Contract with the remote key-value store.
//!
//! The tree never talks to the store itself. A [`KeyspaceBackend`] executes
//! commands and reports a discriminated result; the session applies the tree
//! change only after a success.

use crate::error::Result;
use crate::types::DatabaseInfo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A command the remote store rejected or could not run (connectivity,
/// auth, wrong type, ...).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of one remote command.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Response envelope used by JSON-speaking backends:
/// `{"success": true, "msg": "", "data": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

impl<T> RemoteResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            msg: String::new(),
            data: Some(data),
        }
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
            data: None,
        }
    }
}

impl<T: DeserializeOwned> RemoteResponse<T> {
    /// Parse an envelope. Malformed JSON is a [`TreeError::Serialization`](crate::TreeError::Serialization),
    /// not a remote failure.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<T: Default> RemoteResponse<T> {
    /// Collapse into a result. A success without `data` yields `T::default()`.
    pub fn into_result(self) -> RemoteResult<T> {
        if self.success {
            Ok(self.data.unwrap_or_default())
        } else if self.msg.is_empty() {
            Err(RemoteError::new("remote command failed"))
        } else {
            Err(RemoteError::new(self.msg))
        }
    }
}

/// Value written by a whole-key set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum KeyValue {
    String(String),
    Hash(Vec<(String, String)>),
    List(Vec<String>),
    Set(Vec<String>),
    ZSet(Vec<(String, f64)>),
}

impl KeyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            KeyValue::String(_) => "string",
            KeyValue::Hash(_) => "hash",
            KeyValue::List(_) => "list",
            KeyValue::Set(_) => "set",
            KeyValue::ZSet(_) => "zset",
        }
    }
}

/// Field-level edit of a collection key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldEdit {
    /// Update a hash field; a different `new_field` renames it.
    SetHashField {
        field: String,
        new_field: String,
        value: String,
    },
    /// Add hash fields, optionally overwriting existing ones.
    AddHashFields {
        overwrite: bool,
        fields: Vec<(String, String)>,
    },
    RemoveHashField { field: String },
    /// Push to the head (`tail == false`) or tail of a list.
    PushListItems { tail: bool, values: Vec<String> },
    SetListItem { index: i64, value: String },
    RemoveListItem { index: i64 },
    AddSetMembers { values: Vec<String> },
    UpdateSetMember { value: String, new_value: String },
    RemoveSetMember { value: String },
    AddZSetMembers {
        overwrite: bool,
        members: Vec<(String, f64)>,
    },
    UpdateZSetMember {
        value: String,
        new_value: String,
        score: f64,
    },
    RemoveZSetMember { value: String },
}

/// What a field edit changed on the remote side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEditOutcome {
    /// Fields or members written, with their new values.
    #[serde(default)]
    pub updated: BTreeMap<String, String>,
    /// Fields or members removed.
    #[serde(default)]
    pub removed: Vec<String>,
    /// Items pushed to a list, in list order.
    #[serde(default)]
    pub items: Vec<String>,
    /// The edit emptied the collection and the store dropped the key.
    #[serde(default)]
    pub key_removed: bool,
}

/// Remote key-value command interface.
///
/// Calls block until the store answers; timeouts are the implementation's
/// concern. `db` is the database index within the connection.
pub trait KeyspaceBackend {
    /// Connect and list the connection's databases.
    fn open_connection(&self, name: &str) -> RemoteResult<Vec<DatabaseInfo>>;

    fn close_connection(&self, name: &str) -> RemoteResult<()>;

    /// Full names of every key matching `pattern` (`*` wildcard).
    fn scan_keys(&self, connection: &str, db: u32, pattern: &str) -> RemoteResult<Vec<String>>;

    /// Create or overwrite a key. `ttl` in seconds; `None` keeps it persistent.
    fn set_key(
        &self,
        connection: &str,
        db: u32,
        key: &str,
        value: &KeyValue,
        ttl: Option<i64>,
    ) -> RemoteResult<()>;

    /// Delete a key, or every key matching a `*` pattern.
    fn delete_key(&self, connection: &str, db: u32, key: &str) -> RemoteResult<()>;

    fn rename_key(&self, connection: &str, db: u32, key: &str, new_key: &str)
        -> RemoteResult<()>;

    fn edit_field(
        &self,
        connection: &str,
        db: u32,
        key: &str,
        edit: &FieldEdit,
    ) -> RemoteResult<FieldEditOutcome>;

    /// Reset a key's expiry. A negative `ttl` removes it.
    fn set_ttl(&self, connection: &str, db: u32, key: &str, ttl: i64) -> RemoteResult<()>;
}
