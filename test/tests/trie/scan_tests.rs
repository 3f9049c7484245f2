use std::collections::HashSet;

use strata_trie::{EMPTY_TRIE_HASH, InMemoryKeyValueStore, KeyValueStore, Trie};

fn trie_with(store: &InMemoryKeyValueStore, keys: std::ops::Range<u8>) -> Trie {
    let trie = Trie::new(Box::new(store.clone()));
    for i in keys {
        trie.update(&[i, 0xaa], &[i; 40]).unwrap();
    }
    trie.sync().unwrap();
    trie
}

#[test]
fn full_export_copies_reachable_nodes() {
    let store = InMemoryKeyValueStore::new_empty();
    let trie = trie_with(&store, 0..20);
    let root = trie.root_hash().unwrap();

    let target = InMemoryKeyValueStore::new_empty();
    let written = trie.save_full_state_to_database(root, &target).unwrap();
    assert_eq!(written as usize, trie.trie_size(root).unwrap());
    assert_eq!(target.len().unwrap(), written as usize);

    let copy = Trie::open(Box::new(target), root);
    assert!(copy.validate().unwrap());
    assert_eq!(copy.get(&[7, 0xaa]).unwrap(), Some(vec![7; 40]));
}

#[test]
fn diff_export_only_visits_new_nodes() {
    let store = InMemoryKeyValueStore::new_empty();
    let trie = trie_with(&store, 0..20);
    let old_root = trie.root_hash().unwrap();
    let old_nodes = trie.trie_keys(old_root).unwrap();

    for i in 20..24 {
        trie.update(&[i, 0xaa], &[i; 40]).unwrap();
    }
    trie.update(&[3, 0xaa], &[0xff; 40]).unwrap();
    trie.sync().unwrap();
    let new_root = trie.root_hash().unwrap();
    let new_nodes = trie.trie_keys(new_root).unwrap();

    let target = InMemoryKeyValueStore::new_empty();
    trie.save_full_state_to_database(old_root, &target).unwrap();
    let written = trie.save_diff_state_to_database(new_root, &target).unwrap();

    let expected: HashSet<_> = new_nodes.difference(&old_nodes).copied().collect();
    assert_eq!(written as usize, expected.len());
    let target_keys: HashSet<Vec<u8>> = target.keys().unwrap().into_iter().collect();
    for hash in &expected {
        assert!(target_keys.contains(hash.as_bytes()));
    }
    assert_eq!(target_keys.len(), old_nodes.union(&new_nodes).count());

    // Nothing left to export
    assert_eq!(trie.save_diff_state_to_database(new_root, &target).unwrap(), 0);
}

#[test]
fn missing_nodes_are_reported() {
    let store = InMemoryKeyValueStore::new_empty();
    let trie = trie_with(&store, 0..20);
    let root = trie.root_hash().unwrap();
    assert!(trie.get_missing_nodes(root.as_bytes()).unwrap().is_empty());

    // A fresh trie over a store holding only the root
    let partial = InMemoryKeyValueStore::new_empty();
    let root_node = store.get(root.as_bytes()).unwrap().unwrap();
    partial.put(root.as_bytes().to_vec(), root_node.clone()).unwrap();
    let partial_trie = Trie::open(Box::new(partial), root);

    let missing = partial_trie.get_missing_nodes(root.as_bytes()).unwrap();
    let all = trie.trie_keys(root).unwrap();
    assert!(!missing.is_empty());
    assert!(!missing.contains(&root));
    assert!(missing.is_subset(&all));
    assert_eq!(
        partial_trie.get_missing_nodes(&root_node).unwrap(),
        missing
    );
    assert!(!partial_trie.validate().unwrap());
}

#[test]
fn referenced_nodes_are_bounded() {
    let store = InMemoryKeyValueStore::new_empty();
    let trie = trie_with(&store, 0..40);
    let root = trie.root_hash().unwrap();
    let total = trie.trie_size(root).unwrap();

    let some = trie.get_referenced_trie_nodes(root.as_bytes(), 5).unwrap();
    assert_eq!(some.len(), 5);
    assert!(some.contains_key(&root));

    let all = trie
        .get_referenced_trie_nodes(root.as_bytes(), usize::MAX)
        .unwrap();
    assert_eq!(all.len(), total);
    for (hash, encoded) in &all {
        assert_eq!(store.get(hash.as_bytes()).unwrap().as_ref(), Some(encoded));
    }
}

#[test]
fn empty_root_has_nothing_to_scan() {
    let trie = Trie::new(Box::new(InMemoryKeyValueStore::new_empty()));
    let target = InMemoryKeyValueStore::new_empty();
    assert_eq!(
        trie.save_full_state_to_database(*EMPTY_TRIE_HASH, &target)
            .unwrap(),
        0
    );
    assert_eq!(trie.trie_size(*EMPTY_TRIE_HASH).unwrap(), 0);
    assert!(trie.validate().unwrap());
    assert_eq!(
        trie.trie_dump(*EMPTY_TRIE_HASH).unwrap(),
        format!("root: {:#x}\n", *EMPTY_TRIE_HASH)
    );
}
