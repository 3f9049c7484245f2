use crate::error::TrieError;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

/// Backing store the node cache reads from and commits to.
///
/// Keys are node hashes and values their canonical encoding, but implementors
/// are free to hold other rows: only `keys` exposes them.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError>;
    fn put_batch(&self, key_values: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), TrieError>;
    fn delete_batch(&self, keys: Vec<Vec<u8>>) -> Result<(), TrieError>;
    fn keys(&self) -> Result<Vec<Vec<u8>>, TrieError>;

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError> {
        self.put_batch(vec![(key, value)])
    }

    fn contains(&self, key: &[u8]) -> Result<bool, TrieError> {
        Ok(self.get(key)?.is_some())
    }

    /// Writes `puts` and then applies `deletes`.
    /// Stores with transactions should override this to submit both in one unit.
    fn commit_batch(
        &self,
        puts: Vec<(Vec<u8>, Vec<u8>)>,
        deletes: Vec<Vec<u8>>,
    ) -> Result<(), TrieError> {
        self.put_batch(puts)?;
        self.delete_batch(deletes)
    }

    fn close(&self) -> Result<(), TrieError> {
        Ok(())
    }
}

pub type NodeMap = Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>;

/// InMemory implementation for the KeyValueStore trait.
/// Cloning it yields a handle over the same rows.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    inner: NodeMap,
}

impl InMemoryKeyValueStore {
    pub const fn new(map: NodeMap) -> Self {
        Self { inner: map }
    }

    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Amount of rows held
    pub fn len(&self) -> Result<usize, TrieError> {
        Ok(self.inner.lock().map_err(|_| TrieError::LockError)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, TrieError> {
        Ok(self.len()? == 0)
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| TrieError::LockError)?
            .get(key)
            .cloned())
    }

    fn put_batch(&self, key_values: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), TrieError> {
        let mut db = self.inner.lock().map_err(|_| TrieError::LockError)?;
        db.extend(key_values);
        Ok(())
    }

    fn delete_batch(&self, keys: Vec<Vec<u8>>) -> Result<(), TrieError> {
        let mut db = self.inner.lock().map_err(|_| TrieError::LockError)?;
        for key in keys {
            db.remove(&key);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, TrieError> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| TrieError::LockError)?
            .keys()
            .cloned()
            .collect())
    }

    fn commit_batch(
        &self,
        puts: Vec<(Vec<u8>, Vec<u8>)>,
        deletes: Vec<Vec<u8>>,
    ) -> Result<(), TrieError> {
        let mut db = self.inner.lock().map_err(|_| TrieError::LockError)?;
        db.extend(puts);
        for key in deletes {
            db.remove(&key);
        }
        Ok(())
    }
}
