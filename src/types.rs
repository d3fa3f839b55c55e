//! Core types for the key tree.

use crate::error::{Result, TreeError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Separator used when a connection does not configure its own.
pub const DEFAULT_SEPARATOR: &str = ":";

/// One independent key tree: a connection plus a database index.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    connection: String,
    db: u32,
}

impl Scope {
    /// Create a scope. The connection name must be non-empty.
    pub fn new(connection: impl Into<String>, db: u32) -> Result<Self> {
        let connection = connection.into();
        if connection.is_empty() {
            return Err(TreeError::InvalidScope(
                "connection name must not be empty".to_string(),
            ));
        }
        Ok(Self { connection, db })
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn db(&self) -> u32 {
        self.db
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({}/db{})", self.connection, self.db)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/db{}", self.connection, self.db)
    }
}

/// Whether a node is a shared prefix or an actual stored key.
///
/// The declaration order is significant: folders sort before leaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Folder,
    Leaf,
}

impl NodeKind {
    /// Single-character discriminator embedded in structural keys.
    pub fn tag(self) -> char {
        match self {
            NodeKind::Folder => 'F',
            NodeKind::Leaf => 'L',
        }
    }
}

/// Identity of a node within its scope: node kind plus full path.
///
/// A folder and a leaf with the same path are distinct tags, so a key
/// `a` and a prefix `a:` can coexist as siblings. Ordering compares the
/// kind first and then the path byte-wise, which is the same order as the
/// rendered structural key string within one scope.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathTag {
    pub kind: NodeKind,
    pub path: String,
}

impl PathTag {
    pub fn new(kind: NodeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn folder(path: impl Into<String>) -> Self {
        Self::new(NodeKind::Folder, path)
    }

    pub fn leaf(path: impl Into<String>) -> Self {
        Self::new(NodeKind::Leaf, path)
    }

    /// Compare against a borrowed `(kind, path)` pair without allocating.
    pub fn cmp_parts(&self, kind: NodeKind, path: &str) -> Ordering {
        self.kind
            .cmp(&kind)
            .then_with(|| self.path.as_bytes().cmp(path.as_bytes()))
    }

    /// Render the scope-qualified structural key, e.g. `local/db0#F/user:1001`.
    pub fn structural_key(&self, scope: &Scope) -> String {
        format!("{}#{}/{}", scope, self.kind.tag(), self.path)
    }
}

impl Ord for PathTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_parts(other.kind, &other.path)
    }
}

impl PartialOrd for PathTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for PathTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathTag({}/{})", self.kind.tag(), self.path)
    }
}

/// Arena slot of a node inside one tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Owned, read-only snapshot of a node for rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    /// Scope-qualified structural key.
    pub key: String,
    pub kind: NodeKind,
    pub label: String,
    pub full_path: String,
    pub aggregate_count: u64,
    pub child_count: usize,
    pub opened: bool,
    pub loaded: bool,
}

/// Database summary reported when a connection opens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub name: String,
    pub keys: u64,
    #[serde(default)]
    pub expires: u64,
    #[serde(default)]
    pub avg_ttl: u64,
}

/// Connection profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_filter: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_separator: String,
    /// Connect timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conn_timeout: Option<u32>,
    /// Command timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mark_color: String,
}

impl ConnectionConfig {
    /// Profile with only a name; everything else defaulted.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a profile from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Key separator, falling back to [`DEFAULT_SEPARATOR`].
    pub fn separator(&self) -> &str {
        if self.key_separator.is_empty() {
            DEFAULT_SEPARATOR
        } else {
            &self.key_separator
        }
    }

    /// Filter used for a full database scan.
    pub fn filter(&self) -> &str {
        if self.default_filter.is_empty() {
            "*"
        } else {
            &self.default_filter
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_rejects_empty_connection() {
        assert!(matches!(Scope::new("", 0), Err(TreeError::InvalidScope(_))));
        let scope = Scope::new("local", 3).unwrap();
        assert_eq!(scope.to_string(), "local/db3");
    }

    #[test]
    fn test_folders_sort_before_leaves() {
        let folder = PathTag::folder("b");
        let leaf = PathTag::leaf("a");
        assert!(folder < leaf);
        assert!(PathTag::leaf("a:b") < PathTag::leaf("a:c"));
    }

    #[test]
    fn test_tag_order_matches_rendered_key_order() {
        let scope = Scope::new("local", 0).unwrap();
        let mut tags = vec![
            PathTag::leaf("user:2"),
            PathTag::folder("user:10"),
            PathTag::leaf("user:10"),
            PathTag::folder("user:1"),
        ];
        tags.sort();
        let rendered: Vec<String> = tags.iter().map(|t| t.structural_key(&scope)).collect();
        let mut sorted = rendered.clone();
        sorted.sort();
        assert_eq!(rendered, sorted);
        assert_eq!(rendered[0], "local/db0#F/user:1");
    }

    #[test]
    fn test_connection_config_json() {
        let config = ConnectionConfig::from_json(
            r#"{"name":"local","addr":"127.0.0.1","port":6379,"keySeparator":"/"}"#,
        )
        .unwrap();
        assert_eq!(config.separator(), "/");
        assert_eq!(config.port, Some(6379));
        assert_eq!(config.filter(), "*");

        let plain = ConnectionConfig::named("other");
        assert_eq!(plain.separator(), DEFAULT_SEPARATOR);
    }
}
