use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use ethereum_types::H256;
use tracing::{debug, error, trace};

use crate::{db::KeyValueStore, error::TrieError, node::Node, node_hash::NodeHash};

#[derive(Debug, Clone)]
struct CachedNode {
    node: Node,
    /// Created or modified since the last commit
    dirty: bool,
}

#[derive(Default)]
struct CacheInner {
    db: Option<Arc<dyn KeyValueStore>>,
    nodes: HashMap<H256, CachedNode>,
    removed: HashSet<H256>,
    dirty: bool,
}

/// Write-back node cache.
///
/// Resolves node hashes from memory first and from the backing store second,
/// holds every new node until [`Cache::commit`] writes them out in one batch
/// together with the deletions queued by [`Cache::mark_removed`].
///
/// The cache carries its own lock so it can be shared by several tries
/// through an `Arc`. Snapshots get a [`Cache::fork`] instead.
#[derive(Default)]
pub struct Cache {
    inner: Mutex<CacheInner>,
}

impl Cache {
    /// Creates a cache backed by `db`
    pub fn new(db: Box<dyn KeyValueStore>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                db: Some(Arc::from(db)),
                ..Default::default()
            }),
        }
    }

    /// Creates a cache without backing store. Commits never write anything.
    pub fn detached() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheInner>, TrieError> {
        self.inner.lock().map_err(|_| TrieError::LockError)
    }

    /// Returns a cache over the same store holding a copy of every node in
    /// memory, dirty flags included. Queued removals stay with this cache.
    pub fn fork(&self) -> Result<Cache, TrieError> {
        let inner = self.lock()?;
        let nodes = inner.nodes.clone();
        let dirty = nodes.values().any(|cached| cached.dirty);
        Ok(Self {
            inner: Mutex::new(CacheInner {
                db: inner.db.clone(),
                nodes,
                removed: HashSet::new(),
                dirty,
            }),
        })
    }

    /// Returns the node stored under `hash`, loading and memoizing it from the
    /// backing store if it is not in memory.
    pub fn get(&self, hash: H256) -> Result<Option<Node>, TrieError> {
        let mut inner = self.lock()?;
        if let Some(cached) = inner.nodes.get(&hash) {
            return Ok(Some(cached.node.clone()));
        }
        let Some(encoded) = inner
            .db
            .as_ref()
            .map(|db| db.get(hash.as_bytes()))
            .transpose()?
            .flatten()
        else {
            return Ok(None);
        };
        let node = Node::decode_raw(&encoded)?;
        trace!("Loaded trie node {hash:#x} from store");
        inner.nodes.insert(
            hash,
            CachedNode {
                node: node.clone(),
                dirty: false,
            },
        );
        Ok(Some(node))
    }

    /// Returns the node a reference points to.
    /// Embedded nodes are decoded in place, hashed ones must be resolvable.
    pub fn resolve(&self, reference: &NodeHash) -> Result<Node, TrieError> {
        match reference {
            NodeHash::Hashed(hash) => self.get(*hash)?.ok_or(TrieError::MissingNode(*hash)),
            inline if inline.is_empty() => Ok(Node::Empty),
            inline => Ok(Node::decode_raw(inline.as_ref())?),
        }
    }

    /// Returns true if `hash` resolves from memory or from the store
    pub fn contains(&self, hash: H256) -> Result<bool, TrieError> {
        let inner = self.lock()?;
        if inner.nodes.contains_key(&hash) {
            return Ok(true);
        }
        match inner.db.as_ref() {
            Some(db) => db.contains(hash.as_bytes()),
            None => Ok(false),
        }
    }

    /// Stores `node` if its encoding is too big to be embedded in its parent,
    /// and returns the reference the parent should hold.
    pub fn put(&self, node: &Node) -> Result<NodeHash, TrieError> {
        let reference = node.compute_hash();
        let Some(hash) = reference.as_hash() else {
            return Ok(reference);
        };
        let mut inner = self.lock()?;
        inner.nodes.insert(
            hash,
            CachedNode {
                node: node.clone(),
                dirty: true,
            },
        );
        inner.removed.remove(&hash);
        inner.dirty = true;
        Ok(reference)
    }

    /// Queues `hash` for deletion from the store and evicts it from memory
    pub fn mark_removed(&self, hash: H256) -> Result<(), TrieError> {
        let mut inner = self.lock()?;
        trace!("Marking trie node {hash:#x} as removed");
        inner.nodes.remove(&hash);
        inner.removed.insert(hash);
        Ok(())
    }

    /// Writes every dirty node and applies every queued deletion.
    ///
    /// With `flush_all` the memory map is emptied afterwards, otherwise the
    /// nodes stay cached as clean entries. If the store fails nothing is
    /// cleared, so the commit can be retried.
    pub fn commit(&self, flush_all: bool) -> Result<(), TrieError> {
        let mut inner = self.lock()?;
        let CacheInner {
            db,
            nodes,
            removed,
            dirty,
        } = &mut *inner;

        let Some(db) = db.as_ref().filter(|_| *dirty || !removed.is_empty()) else {
            if flush_all {
                nodes.clear();
            }
            return Ok(());
        };

        let puts: Vec<_> = nodes
            .iter()
            .filter(|(_, cached)| cached.dirty)
            .map(|(hash, cached)| (hash.as_bytes().to_vec(), cached.node.encode_raw()))
            .collect();
        let deletes: Vec<_> = removed.iter().map(|hash| hash.as_bytes().to_vec()).collect();
        debug!(
            writes = puts.len(),
            deletes = deletes.len(),
            flush_all,
            "Committing trie nodes"
        );
        db.commit_batch(puts, deletes)?;

        if flush_all {
            nodes.clear();
        } else {
            nodes.values_mut().for_each(|cached| cached.dirty = false);
        }
        removed.clear();
        *dirty = false;
        Ok(())
    }

    /// Drops every change made since the last commit: dirty nodes and queued deletions
    pub fn undo(&self) -> Result<(), TrieError> {
        let mut inner = self.lock()?;
        inner.nodes.retain(|_, cached| !cached.dirty);
        inner.removed.clear();
        inner.dirty = false;
        Ok(())
    }

    /// True if a commit would write or delete something
    pub fn is_dirty(&self) -> Result<bool, TrieError> {
        let inner = self.lock()?;
        Ok(inner.dirty || !inner.removed.is_empty())
    }

    /// Amount of nodes held in memory
    pub fn len(&self) -> Result<usize, TrieError> {
        Ok(self.lock()?.nodes.len())
    }

    pub fn is_empty(&self) -> Result<bool, TrieError> {
        Ok(self.len()? == 0)
    }

    /// Evicts from memory every node whose hash is not in `keep`.
    /// Returns the amount of evicted nodes.
    pub fn retain(&self, keep: &HashSet<H256>) -> Result<usize, TrieError> {
        let mut inner = self.lock()?;
        let before = inner.nodes.len();
        inner.nodes.retain(|hash, _| keep.contains(hash));
        Ok(before - inner.nodes.len())
    }

    /// Swaps the backing store.
    ///
    /// Every row of the current store (or, without one, every clean cached
    /// node) is copied into `db` first. Dirty nodes stay dirty and will be
    /// written to `db` on the next commit. The old store is closed afterwards,
    /// a failure to close it is logged and ignored.
    pub fn set_db(&self, db: Box<dyn KeyValueStore>) -> Result<(), TrieError> {
        let mut inner = self.lock()?;
        let rows = match inner.db.as_ref() {
            Some(old) => {
                let mut rows = Vec::new();
                for key in old.keys()? {
                    if let Some(value) = old.get(&key)? {
                        rows.push((key, value));
                    }
                }
                rows
            }
            None => inner
                .nodes
                .iter()
                .filter(|(_, cached)| !cached.dirty)
                .map(|(hash, cached)| (hash.as_bytes().to_vec(), cached.node.encode_raw()))
                .collect(),
        };
        debug!(rows = rows.len(), "Moving trie nodes to a new store");
        db.put_batch(rows)?;

        if let Some(old) = inner.db.replace(Arc::from(db))
            && let Err(err) = old.close()
        {
            error!("Unable to close previous trie store: {err}");
        }
        Ok(())
    }
}
