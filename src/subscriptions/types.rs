//! Subscription types for tree change notifications.

use crate::types::Scope;
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1024
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Only events for this connection (None = all connections).
    pub connection: Option<String>,

    /// Only events for this exact scope (None = all scopes).
    pub scope: Option<Scope>,

    /// Include loads, inserts, removals and renames.
    pub include_structure: bool,

    /// Include folder expand/collapse events.
    pub include_expansion: bool,

    /// Include scope close events.
    pub include_lifecycle: bool,
}

impl SubscriptionFilter {
    /// Everything, from every scope.
    pub fn all() -> Self {
        Self {
            include_structure: true,
            include_expansion: true,
            include_lifecycle: true,
            ..Default::default()
        }
    }

    /// Everything from one connection's databases.
    pub fn connection(name: impl Into<String>) -> Self {
        Self {
            connection: Some(name.into()),
            ..Self::all()
        }
    }

    /// Everything from one scope.
    pub fn scope(scope: Scope) -> Self {
        Self {
            scope: Some(scope),
            ..Self::all()
        }
    }

    /// Structural changes only.
    pub fn structure() -> Self {
        Self {
            include_structure: true,
            ..Default::default()
        }
    }

    pub(crate) fn matches_scope(&self, scope: &Scope) -> bool {
        if let Some(ref connection) = self.connection {
            if connection != scope.connection() {
                return false;
            }
        }
        match self.scope {
            Some(ref wanted) => wanted == scope,
            None => true,
        }
    }
}

/// Events emitted after a tree mutation has completed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeEvent {
    // --- Structure Events ---
    /// A scope's tree was (re)built from a full key list.
    Loaded { scope: Scope, keys: u64 },

    /// A folder's contents were replaced from a prefix scan.
    Reloaded {
        scope: Scope,
        prefix: String,
        keys: u64,
    },

    /// A key was added.
    KeyInserted { scope: Scope, key: String },

    /// A key was removed.
    KeyRemoved { scope: Scope, key: String },

    /// A folder and everything below it was removed.
    SubtreeRemoved {
        scope: Scope,
        prefix: String,
        removed: u64,
    },

    /// A key was moved.
    Renamed {
        scope: Scope,
        from: String,
        to: String,
    },

    // --- Expansion Events ---
    /// A folder was expanded or collapsed.
    Expanded {
        scope: Scope,
        path: String,
        opened: bool,
    },

    // --- Lifecycle Events ---
    /// A scope's tree was cleared or discarded.
    ScopeClosed { scope: Scope },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

impl TreeEvent {
    pub fn scope(&self) -> Option<&Scope> {
        match self {
            TreeEvent::Loaded { scope, .. }
            | TreeEvent::Reloaded { scope, .. }
            | TreeEvent::KeyInserted { scope, .. }
            | TreeEvent::KeyRemoved { scope, .. }
            | TreeEvent::SubtreeRemoved { scope, .. }
            | TreeEvent::Renamed { scope, .. }
            | TreeEvent::Expanded { scope, .. }
            | TreeEvent::ScopeClosed { scope } => Some(scope),
            TreeEvent::Dropped { .. } => None,
        }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<TreeEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<TreeEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<TreeEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<TreeEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<TreeEvent> {
        self.receiver.try_iter().collect()
    }
}
