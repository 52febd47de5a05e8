//! Shared helpers for integration tests.
//!
//! `init_tracing` installs a console subscriber filtered by `RUST_LOG`
//! (default `warn`), so `RUST_LOG=pbtree=debug cargo test` shows the tree's
//! split, restore and bulk-load events.

#![allow(dead_code)]

use std::sync::Once;

use pbtree::BPlusTreeMap;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// Tree holding `keys` with each value equal to ten times its key.
pub fn tree_with(capacity: usize, keys: &[i32]) -> BPlusTreeMap<i32, i32> {
    let mut tree = BPlusTreeMap::new(capacity).unwrap();
    for &key in keys {
        tree.insert(key, key * 10);
    }
    tree
}

pub fn collect_keys(tree: &BPlusTreeMap<i32, i32>) -> Vec<i32> {
    tree.keys().copied().collect()
}
