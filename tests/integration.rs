//! Integration tests for the key-tree store.

use keyspace_tree::{
    KeyTreeStore, NodeKind, Scope, SubscriptionConfig, SubscriptionFilter, TreeEvent,
};

fn scope() -> Scope {
    Scope::new("local", 0).unwrap()
}

fn count(store: &KeyTreeStore, path: &str) -> Option<u64> {
    store
        .lookup(&scope(), path, NodeKind::Folder)
        .map(|view| view.aggregate_count)
}

fn labels(store: &KeyTreeStore, path: &str) -> Vec<String> {
    store
        .children(&scope(), path)
        .unwrap_or_default()
        .into_iter()
        .map(|view| view.label)
        .collect()
}

fn scenario_a() -> KeyTreeStore {
    let store = KeyTreeStore::new();
    store
        .bulk_load(&scope(), ["a:b:c", "a:b:d", "a:x"])
        .unwrap();
    store
}

// --- Worked Scenarios ---

#[test]
fn test_scenario_a_bulk_load() {
    let store = scenario_a();

    assert_eq!(count(&store, "a"), Some(3));
    assert_eq!(count(&store, "a:b"), Some(2));
    assert_eq!(labels(&store, "a"), vec!["b", "x"]);
    assert_eq!(labels(&store, "a:b"), vec!["c", "d"]);

    let x = store.lookup(&scope(), "a:x", NodeKind::Leaf).unwrap();
    assert_eq!(x.aggregate_count, 1);
    assert_eq!(x.key, "local/db0#L/a:x");
    store.check_invariants(&scope()).unwrap();
}

#[test]
fn test_scenario_b_delete_leaf() {
    let store = scenario_a();
    assert!(store.delete_key(&scope(), "a:b:c").unwrap());

    assert_eq!(count(&store, "a"), Some(2));
    assert_eq!(count(&store, "a:b"), Some(1));
    assert_eq!(labels(&store, "a:b"), vec!["d"]);
    assert!(store.lookup(&scope(), "a:b:c", NodeKind::Leaf).is_none());
    store.check_invariants(&scope()).unwrap();
}

#[test]
fn test_scenario_c_prune_empty_folder() {
    let store = scenario_a();
    store.delete_key(&scope(), "a:b:c").unwrap();
    assert!(store.delete_key(&scope(), "a:b:d").unwrap());

    assert!(store.lookup(&scope(), "a:b", NodeKind::Folder).is_none());
    assert_eq!(count(&store, "a"), Some(1));
    assert_eq!(labels(&store, "a"), vec!["x"]);
    store.check_invariants(&scope()).unwrap();
}

#[test]
fn test_scenario_d_rename() {
    let store = scenario_a();
    store.delete_key(&scope(), "a:b:c").unwrap();
    store.delete_key(&scope(), "a:b:d").unwrap();

    assert!(store.rename_key(&scope(), "a:x", "a:y").unwrap());

    assert!(store.lookup(&scope(), "a:x", NodeKind::Leaf).is_none());
    assert!(store.lookup(&scope(), "a:y", NodeKind::Leaf).is_some());
    assert_eq!(count(&store, "a"), Some(1));
    assert_eq!(labels(&store, "a"), vec!["y"]);
    store.check_invariants(&scope()).unwrap();
}

#[test]
fn test_scenario_e_insert_is_idempotent() {
    let store = scenario_a();
    let before = store.read(&scope(), |tree| tree.outline()).unwrap();

    assert!(!store.insert_key(&scope(), "a:b:c").unwrap());

    let after = store.read(&scope(), |tree| tree.outline()).unwrap();
    assert_eq!(before, after);
    assert_eq!(store.key_count(&scope()), Some(3));
}

// --- Realistic Workflows ---

#[test]
fn test_key_and_prefix_coexist() {
    let store = KeyTreeStore::new();
    store
        .bulk_load(&scope(), ["session", "session:1", "session:2"])
        .unwrap();

    let top = store.root_children(&scope()).unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].kind, NodeKind::Folder);
    assert_eq!(top[0].aggregate_count, 2);
    assert_eq!(top[1].kind, NodeKind::Leaf);
    assert_eq!(top[1].full_path, "session");
    assert_eq!(store.root(&scope()).unwrap().aggregate_count, 3);

    store.delete_key(&scope(), "session").unwrap();
    assert_eq!(store.root_children(&scope()).unwrap().len(), 1);
    store.check_invariants(&scope()).unwrap();
}

#[test]
fn test_browse_edit_refresh_workflow() {
    let store = KeyTreeStore::new();
    store
        .bulk_load(
            &scope(),
            ["user:1:name", "user:1:email", "user:2:name", "cache:home"],
        )
        .unwrap();

    // User expands a folder, then edits keys beneath it
    assert!(store.set_opened(&scope(), "user", true).unwrap());
    store.insert_key(&scope(), "user:3:name").unwrap();
    store.delete_key(&scope(), "user:1:email").unwrap();
    assert_eq!(count(&store, "user"), Some(3));
    assert!(store.lookup(&scope(), "user", NodeKind::Folder).unwrap().opened);

    // Refresh the folder from a fresh scan; expansion survives
    let added = store
        .reload_prefix(&scope(), "user", ["user:1:name", "user:9:name"])
        .unwrap();
    assert_eq!(added, 2);
    let user = store.lookup(&scope(), "user", NodeKind::Folder).unwrap();
    assert!(user.opened);
    assert!(user.loaded);
    assert_eq!(user.aggregate_count, 2);
    assert_eq!(store.root(&scope()).unwrap().aggregate_count, 3);

    // Drop the whole prefix
    assert!(store.delete_subtree(&scope(), "user:*").unwrap());
    assert_eq!(
        store.collect_keys(&scope()).unwrap(),
        vec!["cache:home".to_string()]
    );
    store.check_invariants(&scope()).unwrap();
}

#[test]
fn test_subscriber_sees_post_mutation_state() {
    let store = KeyTreeStore::new();
    let handle = store.subscribe(SubscriptionConfig {
        filter: SubscriptionFilter::scope(scope()),
        ..Default::default()
    });

    store.bulk_load(&scope(), ["a:1", "a:2"]).unwrap();
    store.delete_key(&scope(), "a:1").unwrap();

    let events = handle.drain();
    assert_eq!(events.len(), 2);
    match &events[1] {
        TreeEvent::KeyRemoved { scope: s, key } => {
            assert_eq!(s, &scope());
            assert_eq!(key, "a:1");
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(count(&store, "a"), Some(1));
}

#[test]
fn test_concurrent_readers_and_writer() {
    use std::sync::Arc;
    use std::thread;

    let store = Arc::new(KeyTreeStore::new());
    store.bulk_load(&scope(), ["seed:0"]).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..500 {
                store.insert_key(&scope(), &format!("w:{}:{}", i % 10, i)).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    // Every snapshot a reader sees is internally consistent
                    store.check_invariants(&scope()).unwrap();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(store.key_count(&scope()), Some(501));
    assert_eq!(count(&store, "w"), Some(500));
}
