use ethereum_types::H256;

use crate::{
    EMPTY_TRIE_HASH, KeyValueStore, Trie, TrieConfig, TrieError, ValueRLP, node_hash::keccak,
};

/// Trie keyed by the keccak hash of the logical key.
///
/// Hashed keys spread entries evenly and keep identical subtrees from
/// appearing under different parents, which makes pruning safe.
pub struct SecureTrie {
    trie: Trie,
}

impl SecureTrie {
    pub fn new(db: Box<dyn KeyValueStore>) -> Self {
        Self::with_config(db, *EMPTY_TRIE_HASH, TrieConfig::default())
    }

    pub fn open(db: Box<dyn KeyValueStore>, root: H256) -> Self {
        Self::with_config(db, root, TrieConfig::default())
    }

    pub fn with_config(db: Box<dyn KeyValueStore>, root: H256, config: TrieConfig) -> Self {
        Self {
            trie: Trie::with_config(db, root, config),
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<ValueRLP>, TrieError> {
        self.trie.get(keccak(key).as_bytes())
    }

    pub fn update(&self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        self.trie.update(keccak(key).as_bytes(), value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), TrieError> {
        self.trie.delete(keccak(key).as_bytes())
    }

    pub fn root_hash(&self) -> Result<H256, TrieError> {
        self.trie.root_hash()
    }

    pub fn set_root(&self, root: H256) -> Result<(), TrieError> {
        self.trie.set_root(root)
    }

    pub fn sync(&self) -> Result<(), TrieError> {
        self.trie.sync()
    }

    pub fn undo(&self) -> Result<(), TrieError> {
        self.trie.undo()
    }

    /// The underlying trie, addressed by hashed keys
    pub fn inner(&self) -> &Trie {
        &self.trie
    }
}

impl From<Trie> for SecureTrie {
    fn from(trie: Trie) -> Self {
        Self { trie }
    }
}
