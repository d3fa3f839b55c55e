//! Subscription manager for broadcasting tree events.

use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use super::types::{
    DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle, SubscriptionId,
    TreeEvent,
};

/// Internal subscription state.
struct Subscription {
    filter: SubscriptionFilter,
    sender: Sender<TreeEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if buffer is full (subscriber will be dropped).
    fn try_send(&self, event: TreeEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => false,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }

    fn matches(&self, event: &TreeEvent) -> bool {
        let wanted = match event {
            TreeEvent::Loaded { .. }
            | TreeEvent::Reloaded { .. }
            | TreeEvent::KeyInserted { .. }
            | TreeEvent::KeyRemoved { .. }
            | TreeEvent::SubtreeRemoved { .. }
            | TreeEvent::Renamed { .. } => self.filter.include_structure,
            TreeEvent::Expanded { .. } => self.filter.include_expansion,
            TreeEvent::ScopeClosed { .. } => self.filter.include_lifecycle,
            TreeEvent::Dropped { .. } => true,
        };
        if !wanted {
            return false;
        }

        match event.scope() {
            Some(scope) => self.filter.matches_scope(scope),
            None => true,
        }
    }
}

/// Manages subscriptions and broadcasts events.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        let subscription = Subscription {
            filter: config.filter,
            sender,
        };

        self.subscriptions.write().insert(id, subscription);

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Send dropped event (best effort)
            let _ = sub.sender.try_send(TreeEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Deliver an event to every matching subscription. Drops subscribers
    /// that fail to receive.
    pub fn broadcast(&self, event: TreeEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            if subs.is_empty() {
                return;
            }
            for (id, sub) in subs.iter() {
                if sub.matches(&event) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        // Remove dropped subscriptions
        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    warn!(subscription = id.0, "dropping slow tree subscriber");
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sub.sender.try_send(TreeEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
