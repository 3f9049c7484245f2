pub mod cache;
pub mod config;
pub mod db;
pub mod error;
mod nibbles;
mod node;
mod node_hash;
mod rlp;
pub mod scan;
mod secure;

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use ethereum_types::H256;
use lazy_static::lazy_static;
use sha3::{Digest, Keccak256};
use strata_rlp::constants::RLP_NULL;
use tracing::debug;

pub use self::cache::Cache;
pub use self::config::TrieConfig;
pub use self::db::{InMemoryKeyValueStore, KeyValueStore};
pub use self::error::TrieError;
pub use self::nibbles::{Nibbles, TERMINATOR};
pub use self::node::{BranchNode, ExtensionNode, LeafNode, Node, ValueOrHash};
pub use self::node_hash::{INLINE_THRESHOLD, NodeHash, keccak};
pub use self::secure::SecureTrie;

use self::scan::{
    CollectNodeHashes, CountNodes, ExtractToDatabase, NodeSource, TraceAllNodes,
};

lazy_static! {
    // Hash value for an empty trie, equal to keccak(RLP_NULL)
    pub static ref EMPTY_TRIE_HASH: H256 = H256::from_slice(
        Keccak256::new()
            .chain_update([RLP_NULL])
            .finalize()
            .as_slice(),
    );
}

/// RLP-encoded trie path
pub type PathRLP = Vec<u8>;
/// RLP-encoded trie value
pub type ValueRLP = Vec<u8>;
/// RLP-encoded trie node
pub type NodeRLP = Vec<u8>;

#[derive(Debug, Clone, Copy, Default)]
struct TrieState {
    /// Reference to the current root node
    root: NodeHash,
    /// Root as of the last sync, restored by `undo`
    prev_root: NodeHash,
}

/// Ethereum compatible Merkle Patricia Trie over a write-back node cache.
///
/// Every operation takes `&self`: the root is guarded by the trie's own lock,
/// the nodes by the cache's, so a trie can be shared across threads.
pub struct Trie {
    cache: Arc<Cache>,
    state: Mutex<TrieState>,
    config: TrieConfig,
}

impl Trie {
    /// Creates an empty trie over `db`
    pub fn new(db: Box<dyn KeyValueStore>) -> Self {
        Self::with_config(db, *EMPTY_TRIE_HASH, TrieConfig::default())
    }

    /// Creates a trie from an already-initialized DB and sets root as the root node of the trie
    pub fn open(db: Box<dyn KeyValueStore>, root: H256) -> Self {
        Self::with_config(db, root, TrieConfig::default())
    }

    pub fn with_config(db: Box<dyn KeyValueStore>, root: H256, config: TrieConfig) -> Self {
        Self::from_cache(Arc::new(Cache::new(db)), root, config)
    }

    /// Creates a trie over an existing cache, which may be shared with other tries
    pub fn from_cache(cache: Arc<Cache>, root: H256, config: TrieConfig) -> Self {
        let root = root_reference(root);
        Self {
            cache,
            state: Mutex::new(TrieState {
                root,
                prev_root: root,
            }),
            config,
        }
    }

    /// Creates a new stateless trie. This trie won't be able to store any nodes so all data will be lost after calculating the hash
    /// Only use it for computing a hash from an iterator
    pub fn stateless() -> Trie {
        Self::from_cache(
            Arc::new(Cache::detached()),
            *EMPTY_TRIE_HASH,
            TrieConfig::default(),
        )
    }

    /// Builds an in-memory trie from the given elements and returns its hash
    pub fn compute_hash_from_unsorted_iter(
        iter: impl Iterator<Item = (PathRLP, ValueRLP)>,
    ) -> Result<H256, TrieError> {
        let trie = Trie::stateless();
        for (path, value) in iter {
            trie.update(&path, &value)?;
        }
        trie.root_hash()
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, TrieState>, TrieError> {
        self.state.lock().map_err(|_| TrieError::LockError)
    }

    /// Retrieves the value stored under `key`, `None` if the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<ValueRLP>, TrieError> {
        let state = self.lock_state()?;
        self.get_inner(state.root, Nibbles::from_bytes(key))
    }

    fn get_inner(&self, root: NodeHash, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        let path = path.as_ref();
        let mut current = root;
        let mut pos = 0;
        loop {
            match self.cache.resolve(&current)? {
                Node::Empty => return Ok(None),
                Node::Leaf(leaf) => {
                    return Ok((leaf.partial.as_ref() == &path[pos..]).then_some(leaf.value));
                }
                Node::Extension(ext) => {
                    if !path[pos..].starts_with(ext.prefix.as_ref()) {
                        return Ok(None);
                    }
                    pos += ext.prefix.len();
                    current = ext.child;
                }
                Node::Branch(branch) => match path.get(pos) {
                    Some(&TERMINATOR) => {
                        return Ok((!branch.value.is_empty()).then_some(branch.value));
                    }
                    Some(&choice) => {
                        current = branch.choices[choice as usize];
                        pos += 1;
                    }
                    None => return Ok(None),
                },
            }
        }
    }

    /// Inserts `value` under `key`, replacing any previous value.
    /// Empty values are rejected: use [`Trie::delete`] to remove a key.
    pub fn update(&self, key: &[u8], value: &[u8]) -> Result<(), TrieError> {
        if value.is_empty() {
            return Err(TrieError::InvalidInput);
        }
        let mut state = self.lock_state()?;
        state.root = self.insert(state.root, Nibbles::from_bytes(key), value.to_vec())?;
        Ok(())
    }

    fn insert(
        &self,
        reference: NodeHash,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<NodeHash, TrieError> {
        let node = match self.cache.resolve(&reference)? {
            Node::Empty => LeafNode::new(path, value).into(),
            Node::Leaf(leaf) if leaf.partial == path => {
                if leaf.value == value {
                    return Ok(reference);
                }
                LeafNode::new(path, value).into()
            }
            Node::Branch(mut branch) => {
                let Some(&choice) = path.as_ref().first() else {
                    return Err(TrieError::InconsistentTree);
                };
                if choice == TERMINATOR {
                    if branch.value == value {
                        return Ok(reference);
                    }
                    branch.value = value;
                } else {
                    let slot = &mut branch.choices[choice as usize];
                    let child = self.insert(*slot, path.offset(1), value)?;
                    if child == *slot {
                        return Ok(reference);
                    }
                    *slot = child;
                }
                Node::Branch(branch)
            }
            pair => {
                let Some((own_path, item)) = pair.into_pair() else {
                    return Err(TrieError::InconsistentTree);
                };
                let matched = path.count_prefix(&own_path);
                if matched == own_path.len() {
                    // Only an extension can be a strict prefix of a full path
                    let ValueOrHash::Hash(child) = item else {
                        return Err(TrieError::InconsistentTree);
                    };
                    let new_child = self.insert(child, path.offset(matched), value)?;
                    if new_child == child {
                        return Ok(reference);
                    }
                    ExtensionNode::new(own_path, new_child).into()
                } else {
                    let mut branch = BranchNode::default();
                    self.place(&mut branch, own_path.offset(matched), item)?;
                    self.place(
                        &mut branch,
                        path.offset(matched),
                        ValueOrHash::Value(value),
                    )?;
                    if matched == 0 {
                        branch.into()
                    } else {
                        let branch = self.cache.put(&branch.into())?;
                        ExtensionNode::new(path.slice(0, matched), branch).into()
                    }
                }
            }
        };
        self.replace(&reference, &node)
    }

    /// Places `item` in the branch slot named by the first nibble of `path`,
    /// wrapping it in a pair node when more path remains.
    fn place(
        &self,
        branch: &mut BranchNode,
        path: Nibbles,
        item: ValueOrHash,
    ) -> Result<(), TrieError> {
        let Some((&choice, rest)) = path.as_ref().split_first() else {
            return Err(TrieError::InconsistentTree);
        };
        if choice == TERMINATOR {
            let ValueOrHash::Value(value) = item else {
                return Err(TrieError::InconsistentTree);
            };
            branch.value = value;
            return Ok(());
        }
        branch.choices[choice as usize] = match item {
            ValueOrHash::Hash(child) if rest.is_empty() => child,
            ValueOrHash::Value(_) if rest.is_empty() => return Err(TrieError::InconsistentTree),
            item => self
                .cache
                .put(&Node::pair(Nibbles::from_hex(rest.to_vec()), item))?,
        };
        Ok(())
    }

    /// Removes `key` and its value. Removing an absent key is a no-op.
    pub fn delete(&self, key: &[u8]) -> Result<(), TrieError> {
        let mut state = self.lock_state()?;
        state.root = self.remove(state.root, Nibbles::from_bytes(key))?;
        Ok(())
    }

    fn remove(&self, reference: NodeHash, path: Nibbles) -> Result<NodeHash, TrieError> {
        let node = match self.cache.resolve(&reference)? {
            Node::Empty => return Ok(reference),
            Node::Leaf(leaf) => {
                if leaf.partial != path {
                    return Ok(reference);
                }
                Node::Empty
            }
            Node::Extension(ext) => {
                if !path.as_ref().starts_with(ext.prefix.as_ref()) {
                    return Ok(reference);
                }
                let child = self.remove(ext.child, path.offset(ext.prefix.len()))?;
                if child == ext.child {
                    return Ok(reference);
                }
                match self.cache.resolve(&child)? {
                    Node::Empty => Node::Empty,
                    Node::Branch(_) => ExtensionNode::new(ext.prefix, child).into(),
                    pair => self.merge_pair(ext.prefix, &child, pair)?,
                }
            }
            Node::Branch(mut branch) => {
                let Some(&choice) = path.as_ref().first() else {
                    return Err(TrieError::InconsistentTree);
                };
                if choice == TERMINATOR {
                    if branch.value.is_empty() {
                        return Ok(reference);
                    }
                    branch.value.clear();
                } else {
                    let slot = &mut branch.choices[choice as usize];
                    let child = self.remove(*slot, path.offset(1))?;
                    if child == *slot {
                        return Ok(reference);
                    }
                    *slot = child;
                }
                self.collapse(*branch)?
            }
        };
        self.replace(&reference, &node)
    }

    /// Rewrites a branch left with less than two occupied slots
    fn collapse(&self, branch: BranchNode) -> Result<Node, TrieError> {
        if branch.occupied_slots() > 1 {
            return Ok(branch.into());
        }
        if !branch.value.is_empty() {
            return Ok(LeafNode::new(Nibbles::from_hex(vec![TERMINATOR]), branch.value).into());
        }
        let Some((choice, child)) = branch
            .choices
            .iter()
            .enumerate()
            .find(|(_, child)| !child.is_empty())
        else {
            return Ok(Node::Empty);
        };
        let prefix = Nibbles::from_hex(vec![choice as u8]);
        match self.cache.resolve(child)? {
            Node::Branch(_) => Ok(ExtensionNode::new(prefix, *child).into()),
            Node::Empty => Err(TrieError::InconsistentTree),
            pair => self.merge_pair(prefix, child, pair),
        }
    }

    /// Absorbs the pair node `child` into a pair covering `prefix` followed by the child's path
    fn merge_pair(
        &self,
        prefix: Nibbles,
        reference: &NodeHash,
        child: Node,
    ) -> Result<Node, TrieError> {
        let Some((path, item)) = child.into_pair() else {
            return Err(TrieError::InconsistentTree);
        };
        self.prune(reference)?;
        Ok(Node::pair(prefix.concat(&path), item))
    }

    /// Stores `node` in place of the node `old` points to
    fn replace(&self, old: &NodeHash, node: &Node) -> Result<NodeHash, TrieError> {
        let new = self.cache.put(node)?;
        if new != *old {
            self.prune(old)?;
        }
        Ok(new)
    }

    fn prune(&self, reference: &NodeHash) -> Result<(), TrieError> {
        if let Some(hash) = reference.as_hash().filter(|_| self.config.pruning_enabled) {
            self.cache.mark_removed(hash)?;
        }
        Ok(())
    }

    /// Returns the hash of the trie's root node.
    /// An embedded root is hashed on demand without being stored.
    pub fn root_hash(&self) -> Result<H256, TrieError> {
        Ok(self.lock_state()?.root.finalize())
    }

    /// Points the trie at a previously committed root
    pub fn set_root(&self, root: H256) -> Result<(), TrieError> {
        self.lock_state()?.root = root_reference(root);
        Ok(())
    }

    /// Returns true if `root` can be resolved, either from memory or from the store
    pub fn is_valid_root(&self, root: H256) -> Result<bool, TrieError> {
        Ok(root == *EMPTY_TRIE_HASH || self.cache.contains(root)?)
    }

    /// Commits pending changes, emptying the cache when it is clean or has
    /// grown past the configured threshold.
    pub fn sync(&self) -> Result<(), TrieError> {
        let mut state = self.lock_state()?;
        let flush_all =
            !self.cache.is_dirty()? || self.cache.len()? > self.config.cache_flush_threshold;
        self.commit(&mut state, flush_all)
    }

    pub fn sync_with(&self, flush_all: bool) -> Result<(), TrieError> {
        let mut state = self.lock_state()?;
        self.commit(&mut state, flush_all)
    }

    /// Commits pending changes and keeps every node cached
    pub fn sync_without_flush(&self) -> Result<(), TrieError> {
        self.sync_with(false)
    }

    fn commit(&self, state: &mut TrieState, flush_all: bool) -> Result<(), TrieError> {
        self.cache.commit(flush_all)?;
        state.prev_root = state.root;
        Ok(())
    }

    /// Discards every change made since the last sync
    pub fn undo(&self) -> Result<(), TrieError> {
        let mut state = self.lock_state()?;
        self.cache.undo()?;
        state.root = state.prev_root;
        Ok(())
    }

    /// Returns a trie at the current root over a fork of this trie's cache.
    ///
    /// Both tries read and commit to the same store, but undo and pruning on
    /// one of them cannot evict the in-memory nodes the other resolves.
    pub fn snapshot(&self) -> Result<Trie, TrieError> {
        let state = self.lock_state()?;
        Ok(Self {
            cache: Arc::new(self.cache.fork()?),
            state: Mutex::new(TrieState {
                root: state.root,
                prev_root: state.root,
            }),
            config: self.config,
        })
    }

    /// Returns the hashes reachable from `key_or_value` that cannot be resolved
    pub fn get_missing_nodes(&self, key_or_value: &[u8]) -> Result<HashSet<H256>, TrieError> {
        let state = self.lock_state()?;
        scan::collect_missing(&self.source(&state)?, key_or_value)
    }

    /// Returns up to `limit` nodes reachable from `key_or_value`, keyed by hash
    pub fn get_referenced_trie_nodes(
        &self,
        key_or_value: &[u8],
        limit: usize,
    ) -> Result<HashMap<H256, NodeRLP>, TrieError> {
        let state = self.lock_state()?;
        scan::collect_referenced(&self.source(&state)?, key_or_value, limit)
    }

    /// Copies every node reachable from `root` into `target`.
    /// Returns the amount of nodes written.
    pub fn save_full_state_to_database(
        &self,
        root: H256,
        target: &dyn KeyValueStore,
    ) -> Result<u64, TrieError> {
        let state = self.lock_state()?;
        let mut action = ExtractToDatabase::new(target);
        scan::scan_tree(&self.source(&state)?, root, &mut action)?;
        let count = action.finish()?;
        debug!(count, "Exported full trie state");
        Ok(count)
    }

    /// Copies the nodes reachable from `root` that `target` does not hold yet.
    /// Returns the amount of nodes written.
    pub fn save_diff_state_to_database(
        &self,
        root: H256,
        target: &dyn KeyValueStore,
    ) -> Result<u64, TrieError> {
        let state = self.lock_state()?;
        let mut action = ExtractToDatabase::new(target);
        scan::scan_tree_diff(&self.source(&state)?, root, &mut action, target)?;
        let count = action.finish()?;
        debug!(count, "Exported trie state diff");
        Ok(count)
    }

    /// Renders every node reachable from `root`, one per line
    pub fn trie_dump(&self, root: H256) -> Result<String, TrieError> {
        let state = self.lock_state()?;
        let mut action = TraceAllNodes::default();
        scan::scan_tree(&self.source(&state)?, root, &mut action)?;
        Ok(format!("root: {root:#x}\n{}", action.output))
    }

    /// Hashes of every stored node reachable from `root`
    pub fn trie_keys(&self, root: H256) -> Result<HashSet<H256>, TrieError> {
        let state = self.lock_state()?;
        let mut action = CollectNodeHashes::default();
        scan::scan_tree(&self.source(&state)?, root, &mut action)?;
        Ok(action.hashes)
    }

    /// Amount of stored nodes reachable from `root`
    pub fn trie_size(&self, root: H256) -> Result<usize, TrieError> {
        let state = self.lock_state()?;
        let mut action = CountNodes::default();
        scan::scan_tree(&self.source(&state)?, root, &mut action)?;
        Ok(action.count)
    }

    /// Returns true if every node reachable from the current root resolves and decodes
    pub fn validate(&self) -> Result<bool, TrieError> {
        let state = self.lock_state()?;
        let source = self.source(&state)?;
        match scan::scan_tree(&source, state.root.finalize(), &mut CountNodes::default()) {
            Ok(()) => Ok(true),
            Err(TrieError::LockError) => Err(TrieError::LockError),
            Err(err) => {
                debug!("Trie validation failed: {err}");
                Ok(false)
            }
        }
    }

    /// Evicts every cached node that is not reachable from the current root.
    /// Returns the amount of evicted nodes.
    pub fn clean_cache(&self) -> Result<usize, TrieError> {
        let state = self.lock_state()?;
        let mut action = CollectNodeHashes::default();
        scan::scan_tree(&self.source(&state)?, state.root.finalize(), &mut action)?;
        let evicted = self.cache.retain(&action.hashes)?;
        debug!(kept = action.hashes.len(), evicted, "Cleaned trie cache");
        Ok(evicted)
    }

    /// Node lookup for the scanners, aware of an embedded current root
    fn source(&self, state: &TrieState) -> Result<RootedSource<'_>, TrieError> {
        let root = match state.root {
            NodeHash::Inline(_) if !state.root.is_empty() => Some((
                state.root.finalize(),
                Node::decode_raw(state.root.as_ref())?,
            )),
            _ => None,
        };
        Ok(RootedSource {
            cache: &self.cache,
            root,
        })
    }
}

/// Resolves hashes through the cache, plus the hash of an embedded root,
/// which is never stored on its own.
struct RootedSource<'a> {
    cache: &'a Cache,
    root: Option<(H256, Node)>,
}

impl NodeSource for RootedSource<'_> {
    fn node(&self, hash: H256) -> Result<Option<Node>, TrieError> {
        match &self.root {
            Some((root, node)) if *root == hash => Ok(Some(node.clone())),
            _ => self.cache.get(hash),
        }
    }
}

fn root_reference(root: H256) -> NodeHash {
    if root == *EMPTY_TRIE_HASH {
        NodeHash::default()
    } else {
        NodeHash::Hashed(root)
    }
}
