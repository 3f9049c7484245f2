use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use strata_trie::{
    Cache, EMPTY_TRIE_HASH, InMemoryKeyValueStore, KeyValueStore, Trie, TrieConfig, TrieError,
};

/// Store whose writes fail while `broken` is set
#[derive(Clone, Default)]
struct FlakyStore {
    inner: InMemoryKeyValueStore,
    broken: Arc<AtomicBool>,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        self.inner.get(key)
    }

    fn put_batch(&self, key_values: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), TrieError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(TrieError::DbError(anyhow::anyhow!("disk full")));
        }
        self.inner.put_batch(key_values)
    }

    fn delete_batch(&self, keys: Vec<Vec<u8>>) -> Result<(), TrieError> {
        self.inner.delete_batch(keys)
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, TrieError> {
        self.inner.keys()
    }
}

fn fill(trie: &Trie, count: u8) {
    for i in 0..count {
        trie.update(&[i, i], &[i; 40]).unwrap();
    }
}

#[test]
fn small_dirty_cache_stays_warm() {
    let trie = Trie::new(Box::new(InMemoryKeyValueStore::new_empty()));
    fill(&trie, 2);
    let cached = trie.cache().len().unwrap();
    trie.sync().unwrap();

    assert_eq!(trie.cache().len().unwrap(), cached);
    assert!(!trie.cache().is_dirty().unwrap());

    // A clean cache is always flushed
    trie.sync().unwrap();
    assert!(trie.cache().is_empty().unwrap());
}

#[test]
fn oversized_cache_goes_cold() {
    let store = InMemoryKeyValueStore::new_empty();
    let trie = Trie::with_config(
        Box::new(store.clone()),
        *EMPTY_TRIE_HASH,
        TrieConfig::default().with_cache_flush_threshold(4),
    );
    fill(&trie, 16);
    assert!(trie.cache().len().unwrap() > 4);
    trie.sync().unwrap();

    assert!(trie.cache().is_empty().unwrap());
    assert!(!store.is_empty().unwrap());
    // Reads go back to the store
    assert_eq!(trie.get(&[3, 3]).unwrap(), Some(vec![3; 40]));
    assert!(!trie.cache().is_empty().unwrap());
}

#[test]
fn sync_without_flush_keeps_nodes() {
    let store = InMemoryKeyValueStore::new_empty();
    let trie = Trie::with_config(
        Box::new(store.clone()),
        *EMPTY_TRIE_HASH,
        TrieConfig::default().with_cache_flush_threshold(0),
    );
    fill(&trie, 8);
    let cached = trie.cache().len().unwrap();
    trie.sync_without_flush().unwrap();
    assert_eq!(trie.cache().len().unwrap(), cached);
    assert_eq!(store.len().unwrap(), cached);

    trie.sync_with(true).unwrap();
    assert!(trie.cache().is_empty().unwrap());
}

#[test]
fn failed_commit_can_be_retried() {
    let store = FlakyStore::default();
    let trie = Trie::new(Box::new(store.clone()));
    fill(&trie, 4);

    store.broken.store(true, Ordering::SeqCst);
    assert!(matches!(trie.sync(), Err(TrieError::DbError(_))));
    assert!(trie.cache().is_dirty().unwrap());
    assert!(store.inner.is_empty().unwrap());

    store.broken.store(false, Ordering::SeqCst);
    trie.sync().unwrap();
    assert!(!trie.cache().is_dirty().unwrap());

    let root = trie.root_hash().unwrap();
    let reopened = Trie::open(Box::new(store.inner.clone()), root);
    assert_eq!(reopened.get(&[2, 2]).unwrap(), Some(vec![2; 40]));
}

#[test]
fn set_db_moves_committed_and_pending_nodes() {
    let old_store = InMemoryKeyValueStore::new_empty();
    let trie = Trie::new(Box::new(old_store.clone()));
    fill(&trie, 4);
    trie.sync().unwrap();
    let committed = old_store.len().unwrap();
    trie.update(&[9, 9], &[9; 40]).unwrap();

    let new_store = InMemoryKeyValueStore::new_empty();
    trie.cache().set_db(Box::new(new_store.clone())).unwrap();
    assert_eq!(new_store.len().unwrap(), committed);
    assert!(trie.cache().is_dirty().unwrap());

    trie.sync().unwrap();
    let root = trie.root_hash().unwrap();
    let reopened = Trie::open(Box::new(new_store), root);
    assert_eq!(reopened.get(&[9, 9]).unwrap(), Some(vec![9; 40]));
    assert_eq!(reopened.get(&[1, 1]).unwrap(), Some(vec![1; 40]));
}

#[test]
fn shared_cache_serves_several_tries() {
    let store = InMemoryKeyValueStore::new_empty();
    let cache = Arc::new(Cache::new(Box::new(store)));
    let first = Trie::from_cache(Arc::clone(&cache), *EMPTY_TRIE_HASH, TrieConfig::default());
    fill(&first, 3);
    let root = first.root_hash().unwrap();

    let second = Trie::from_cache(cache, root, TrieConfig::default());
    assert_eq!(second.get(&[2, 2]).unwrap(), Some(vec![2; 40]));
}

#[test]
fn tries_can_be_used_across_threads() {
    let trie = Arc::new(Trie::new(Box::new(InMemoryKeyValueStore::new_empty())));
    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let trie = Arc::clone(&trie);
            std::thread::spawn(move || {
                for i in 0..8u8 {
                    trie.update(&[t, i], &[t ^ i; 40]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = Trie::stateless();
    for t in 0..4u8 {
        for i in 0..8u8 {
            assert_eq!(trie.get(&[t, i]).unwrap(), Some(vec![t ^ i; 40]));
            expected.update(&[t, i], &[t ^ i; 40]).unwrap();
        }
    }
    assert_eq!(trie.root_hash().unwrap(), expected.root_hash().unwrap());
}

#[test]
fn reads_never_miss_nodes_pruned_by_concurrent_writes() {
    let trie = Arc::new(Trie::with_config(
        Box::new(InMemoryKeyValueStore::new_empty()),
        *EMPTY_TRIE_HASH,
        TrieConfig::default().with_pruning(true),
    ));
    trie.update(b"key", &[0; 40]).unwrap();

    let writer = {
        let trie = Arc::clone(&trie);
        std::thread::spawn(move || {
            for i in 0..20_000u32 {
                trie.update(b"key", &[(i % 251) as u8 + 1; 40]).unwrap();
                if i % 64 == 0 {
                    trie.sync().unwrap();
                }
            }
        })
    };
    for _ in 0..20_000 {
        let value = trie.get(b"key").unwrap();
        assert!(value.is_some_and(|value| value.len() == 40));
    }
    writer.join().unwrap();
}

#[test]
fn reads_never_miss_nodes_dropped_by_concurrent_undo() {
    let trie = Arc::new(Trie::new(Box::new(InMemoryKeyValueStore::new_empty())));
    trie.update(b"key", &[0; 40]).unwrap();
    trie.sync().unwrap();

    let writer = {
        let trie = Arc::clone(&trie);
        std::thread::spawn(move || {
            for i in 0..20_000u32 {
                trie.update(b"key", &[(i % 251) as u8 + 1; 40]).unwrap();
                trie.undo().unwrap();
            }
        })
    };
    for _ in 0..20_000 {
        assert!(trie.get(b"key").unwrap().is_some());
    }
    writer.join().unwrap();
}
