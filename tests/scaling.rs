//! Scaling tests with synthetic 100k-key databases.
//!
//! Measures the operations a browser hits on a large keyspace:
//! - Bulk load of a full scan
//! - Incremental inserts and deletes
//! - Lookups by path
//! - Subtree removal and prefix reload
//! - A single wide folder fed in scan order

use keyspace_tree::{KeyTree, KeyTreeStore, NodeKind, Scope};
use std::time::Instant;

const KEY_COUNT: usize = 100_000;

/// Timing helper
struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    fn report(&self) {
        println!("  {} took {:.2}ms", self.name, self.elapsed_ms());
    }

    fn report_with_count(&self, count: usize) {
        let ms = self.elapsed_ms();
        let per_item = if count > 0 { ms / count as f64 } else { 0.0 };
        println!(
            "  {} took {:.2}ms ({} items, {:.4}ms/item)",
            self.name, ms, count, per_item
        );
    }
}

/// `tenant:{t}:user:{u}:{field}` keys, 10 tenants deep.
fn synthetic_keys(count: usize) -> Vec<String> {
    let fields = ["name", "email", "session", "prefs"];
    (0..count)
        .map(|i| {
            format!(
                "tenant:{}:user:{}:{}",
                i % 10,
                i / fields.len(),
                fields[i % fields.len()]
            )
        })
        .collect()
}

// =============================================================================
// Test: 100k keys, wide and deep
// =============================================================================

#[test]
fn test_scaling_100k_bulk_load() {
    println!("\n=== 100k Keys, Bulk Load ===");

    let keys = synthetic_keys(KEY_COUNT);

    let timer = Timer::new("Bulk load 100k keys");
    let mut tree = KeyTree::default();
    tree.bulk_load(&keys);
    timer.report_with_count(KEY_COUNT);

    assert_eq!(tree.key_count(), KEY_COUNT as u64);
    println!("  Tree has {} nodes", tree.node_count());

    let timer = Timer::new("Check invariants");
    tree.check_invariants().unwrap();
    timer.report();

    let timer = Timer::new("Lookup 10k leaves");
    for key in keys.iter().step_by(10) {
        assert!(tree.lookup(key, NodeKind::Leaf).is_some());
    }
    timer.report_with_count(KEY_COUNT / 10);

    let tenant = tree.lookup("tenant:3", NodeKind::Folder).unwrap();
    assert_eq!(tenant.aggregate_count(), (KEY_COUNT / 10) as u64);

    println!("  ✓ Bulk load test passed");
}

// =============================================================================
// Test: incremental churn on a loaded tree
// =============================================================================

#[test]
fn test_scaling_incremental_churn() {
    println!("\n=== 100k Keys, Incremental Churn ===");

    let keys = synthetic_keys(KEY_COUNT);
    let mut tree = KeyTree::default();
    tree.bulk_load(&keys);

    let timer = Timer::new("Insert 10k new keys");
    for i in 0..10_000 {
        assert!(tree.insert_key(&format!("tenant:{}:job:{}", i % 10, i)));
    }
    timer.report_with_count(10_000);
    assert_eq!(tree.key_count(), (KEY_COUNT + 10_000) as u64);

    let timer = Timer::new("Delete 10k keys");
    for key in keys.iter().take(10_000) {
        assert!(tree.delete_key(key));
    }
    timer.report_with_count(10_000);
    assert_eq!(tree.key_count(), KEY_COUNT as u64);

    let timer = Timer::new("Check invariants");
    tree.check_invariants().unwrap();
    timer.report();

    println!("  ✓ Churn test passed");
}

// =============================================================================
// Test: subtree removal and reload through the store
// =============================================================================

#[test]
fn test_scaling_subtree_operations() {
    println!("\n=== 100k Keys, Subtree Operations ===");

    let store = KeyTreeStore::new();
    let scope = Scope::new("bench", 0).unwrap();
    let keys = synthetic_keys(KEY_COUNT);
    store.bulk_load(&scope, &keys).unwrap();

    let timer = Timer::new("Delete tenant:0 subtree");
    assert!(store.delete_subtree(&scope, "tenant:0").unwrap());
    timer.report();
    assert_eq!(store.key_count(&scope), Some((KEY_COUNT - KEY_COUNT / 10) as u64));

    let reloaded: Vec<&String> = keys.iter().filter(|k| k.starts_with("tenant:1:")).collect();
    let timer = Timer::new("Reload tenant:1 prefix");
    let added = store.reload_prefix(&scope, "tenant:1", reloaded.iter().copied()).unwrap();
    timer.report_with_count(added as usize);
    assert_eq!(added as usize, reloaded.len());

    store.check_invariants(&scope).unwrap();
    println!("  ✓ Subtree test passed");
}

// =============================================================================
// Test: one wide folder loaded in scan order
// =============================================================================

/// Keys in a fixed pseudo-random order, the way a remote scan returns them.
fn scan_order(count: usize) -> Vec<String> {
    // 7919 is prime and coprime with `count`, so every index is visited once
    (0..count)
        .map(|i| format!("k:{:012}", (i * 7919) % count))
        .collect()
}

#[test]
fn test_scaling_wide_folder_scan_order() {
    println!("\n=== 200k Keys, One Wide Folder ===");

    let count = 2 * KEY_COUNT;
    let shuffled = scan_order(count);
    let mut sorted = shuffled.clone();
    sorted.sort();

    let timer = Timer::new("Bulk load sorted");
    let mut tree = KeyTree::default();
    tree.bulk_load(&sorted);
    let sorted_ms = timer.elapsed_ms();
    timer.report_with_count(count);

    let timer = Timer::new("Bulk load in scan order");
    let mut wide = KeyTree::default();
    wide.bulk_load(&shuffled);
    let shuffled_ms = timer.elapsed_ms();
    timer.report_with_count(count);

    assert_eq!(wide.key_count(), count as u64);
    wide.check_invariants().unwrap();
    assert_eq!(wide.collect_keys(), sorted);

    // Scan order costs a sort, not a quadratic number of shifts
    assert!(
        shuffled_ms < sorted_ms * 10.0 + 500.0,
        "scan-order load took {:.0}ms against {:.0}ms sorted",
        shuffled_ms,
        sorted_ms
    );

    println!("  ✓ Wide folder test passed");
}
