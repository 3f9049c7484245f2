//! Breadth-first traversals over the stored nodes of a trie.
//!
//! Only nodes referenced by hash are visited on their own: embedded nodes are
//! part of their parent and a branch's terminal value is never a reference.

use std::collections::{HashMap, HashSet, VecDeque};

use ethereum_types::H256;
use tracing::{debug, warn};

use crate::{
    EMPTY_TRIE_HASH, NodeRLP, cache::Cache, db::KeyValueStore, error::TrieError, node::Node,
};

/// Resolves node hashes for the scanners
pub trait NodeSource {
    fn node(&self, hash: H256) -> Result<Option<Node>, TrieError>;
}

impl NodeSource for Cache {
    fn node(&self, hash: H256) -> Result<Option<Node>, TrieError> {
        self.get(hash)
    }
}

/// Visitor invoked once per stored node reached by a scan
pub trait ScanAction {
    fn on_node(&mut self, hash: H256, node: &Node) -> Result<(), TrieError>;
}

/// Collects the hash of every visited node
#[derive(Debug, Default)]
pub struct CollectNodeHashes {
    pub hashes: HashSet<H256>,
}

impl ScanAction for CollectNodeHashes {
    fn on_node(&mut self, hash: H256, _node: &Node) -> Result<(), TrieError> {
        self.hashes.insert(hash);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CountNodes {
    pub count: usize,
}

impl ScanAction for CountNodes {
    fn on_node(&mut self, _hash: H256, _node: &Node) -> Result<(), TrieError> {
        self.count += 1;
        Ok(())
    }
}

/// Collects every visited node together with its encoding
#[derive(Debug, Default)]
pub struct CollectMappings {
    pub nodes: HashMap<H256, NodeRLP>,
}

impl ScanAction for CollectMappings {
    fn on_node(&mut self, hash: H256, node: &Node) -> Result<(), TrieError> {
        self.nodes.insert(hash, node.encode_raw());
        Ok(())
    }
}

/// Copies every visited node into another store.
/// Rows are buffered and written in a single batch by [`ExtractToDatabase::finish`].
pub struct ExtractToDatabase<'a> {
    target: &'a dyn KeyValueStore,
    batch: Vec<(Vec<u8>, Vec<u8>)>,
}

impl<'a> ExtractToDatabase<'a> {
    pub fn new(target: &'a dyn KeyValueStore) -> Self {
        Self {
            target,
            batch: Vec::new(),
        }
    }

    /// Writes the collected rows and returns how many were written
    pub fn finish(self) -> Result<u64, TrieError> {
        let count = self.batch.len() as u64;
        if count > 0 {
            self.target.put_batch(self.batch)?;
        }
        Ok(count)
    }
}

impl ScanAction for ExtractToDatabase<'_> {
    fn on_node(&mut self, hash: H256, node: &Node) -> Result<(), TrieError> {
        self.batch
            .push((hash.as_bytes().to_vec(), node.encode_raw()));
        Ok(())
    }
}

/// Renders one line per visited node
#[derive(Debug, Default)]
pub struct TraceAllNodes {
    pub output: String,
}

impl ScanAction for TraceAllNodes {
    fn on_node(&mut self, hash: H256, node: &Node) -> Result<(), TrieError> {
        let line = match node {
            Node::Empty => "empty".to_string(),
            Node::Leaf(leaf) => format!(
                "leaf [{}] => 0x{}",
                hex::encode(leaf.partial.encode_compact()),
                hex::encode(&leaf.value)
            ),
            Node::Extension(ext) => format!(
                "extension [{}] => 0x{}",
                hex::encode(ext.prefix.encode_compact()),
                hex::encode(ext.child)
            ),
            Node::Branch(branch) => {
                let mut line = String::from("branch [");
                for (choice, child) in branch.choices.iter().enumerate() {
                    if !child.is_empty() {
                        line.push_str(&format!(" {choice:x}: 0x{}", hex::encode(child)));
                    }
                }
                if !branch.value.is_empty() {
                    line.push_str(&format!(" value: 0x{}", hex::encode(&branch.value)));
                }
                line.push_str(" ]");
                line
            }
        };
        self.output.push_str(&format!("{hash:#x} => {line}\n"));
        Ok(())
    }
}

/// Visits every stored node reachable from `root`.
/// Fails with [`TrieError::MissingNode`] on the first reference that cannot be resolved.
pub fn scan_tree(
    source: &impl NodeSource,
    root: H256,
    action: &mut impl ScanAction,
) -> Result<(), TrieError> {
    if root == *EMPTY_TRIE_HASH {
        return Ok(());
    }
    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(hash) = queue.pop_front() {
        let node = source.node(hash)?.ok_or(TrieError::MissingNode(hash))?;
        action.on_node(hash, &node)?;
        for child in node.child_hashes() {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }
    debug!(nodes = visited.len(), "Full trie scan finished");
    Ok(())
}

/// Visits the nodes reachable from `root` that `target` does not hold yet.
///
/// Subtrees whose root is already present in `target` are not descended into,
/// and nodes missing from `source` are skipped.
pub fn scan_tree_diff(
    source: &impl NodeSource,
    root: H256,
    action: &mut impl ScanAction,
    target: &dyn KeyValueStore,
) -> Result<(), TrieError> {
    if root == *EMPTY_TRIE_HASH || target.contains(root.as_bytes())? {
        return Ok(());
    }
    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    let mut skipped = 0usize;
    while let Some(hash) = queue.pop_front() {
        let Some(node) = source.node(hash)? else {
            warn!("Skipped node {hash:#x}: not found locally");
            skipped += 1;
            continue;
        };
        action.on_node(hash, &node)?;
        for child in node.child_hashes() {
            if !target.contains(child.as_bytes())? && visited.insert(child) {
                queue.push_back(child);
            }
        }
    }
    debug!(nodes = visited.len(), skipped, "Diff trie scan finished");
    Ok(())
}

/// Collects up to `limit` nodes reachable from `start`, along with their encoding.
/// Unresolvable references are skipped.
pub fn collect_referenced(
    source: &impl NodeSource,
    start: &[u8],
    limit: usize,
) -> Result<HashMap<H256, NodeRLP>, TrieError> {
    let mut collected = HashMap::new();
    let mut queue: VecDeque<H256> = start_hashes(start)?.into();
    let mut visited: HashSet<H256> = queue.iter().copied().collect();
    while collected.len() < limit {
        let Some(hash) = queue.pop_front() else {
            break;
        };
        let Some(node) = source.node(hash)? else {
            continue;
        };
        for child in node.child_hashes() {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
        collected.insert(hash, node.encode_raw());
    }
    Ok(collected)
}

/// Returns every hash reachable from `start` that `source` cannot resolve
pub fn collect_missing(
    source: &impl NodeSource,
    start: &[u8],
) -> Result<HashSet<H256>, TrieError> {
    let mut missing = HashSet::new();
    let mut queue: VecDeque<H256> = start_hashes(start)?.into();
    let mut visited: HashSet<H256> = queue.iter().copied().collect();
    while let Some(hash) = queue.pop_front() {
        let Some(node) = source.node(hash)? else {
            missing.insert(hash);
            continue;
        };
        for child in node.child_hashes() {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }
    Ok(missing)
}

/// Initial work list of a scan started from a key or a value:
/// a 32 byte input is a node hash, anything else an encoded node whose hashed
/// children are the starting points.
pub fn start_hashes(key_or_value: &[u8]) -> Result<Vec<H256>, TrieError> {
    if key_or_value.len() == 32 {
        return Ok(vec![H256::from_slice(key_or_value)]);
    }
    Ok(Node::decode_raw(key_or_value)?.child_hashes())
}
