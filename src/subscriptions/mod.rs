//! Subscription system for tree change notifications.
//!
//! The presentation layer subscribes to learn which scopes changed without
//! polling the tree. Events are sent after a mutation has completed, so a
//! subscriber that reads the tree on receipt sees the post-mutation state.
//!
//! Subscriptions support:
//! - Filtering by connection, scope, and event category
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::connection("local"),
//!     ..Default::default()
//! });
//!
//! loop {
//!     match handle.recv() {
//!         Ok(TreeEvent::KeyInserted { scope, key }) => redraw(&scope, &key),
//!         Ok(TreeEvent::Dropped { .. }) | Err(_) => break,
//!         Ok(_) => {}
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle, SubscriptionId,
    TreeEvent,
};
