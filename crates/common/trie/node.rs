use ethereum_types::H256;
use strata_rlp::{decode::RLPDecode, encode::RLPEncode, error::RLPDecodeError};

use crate::{NodeRLP, ValueRLP, nibbles::Nibbles, node_hash::NodeHash};

/// Number of child slots of a branch, one per nibble value.
pub const BRANCH_CHOICES: usize = 16;
/// Number of items of an encoded branch: the children plus the terminal value.
pub const BRANCH_ITEMS: usize = BRANCH_CHOICES + 1;

/// Pair node whose path ends with the terminator nibble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub partial: Nibbles,
    pub value: ValueRLP,
}

/// Pair node whose path has no terminator and continues into a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionNode {
    pub prefix: Nibbles,
    pub child: NodeHash,
}

/// 17 item node: a child per nibble plus the value of the key ending here
/// (empty when no key ends at this node).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNode {
    pub choices: [NodeHash; BRANCH_CHOICES],
    pub value: ValueRLP,
}

impl LeafNode {
    pub const fn new(partial: Nibbles, value: ValueRLP) -> Self {
        Self { partial, value }
    }
}

impl ExtensionNode {
    pub const fn new(prefix: Nibbles, child: NodeHash) -> Self {
        Self { prefix, child }
    }
}

impl BranchNode {
    pub const fn new(choices: [NodeHash; BRANCH_CHOICES]) -> Self {
        Self {
            choices,
            value: Vec::new(),
        }
    }

    /// Amount of non-empty slots, terminal value included
    pub fn occupied_slots(&self) -> usize {
        self.choices.iter().filter(|child| !child.is_empty()).count()
            + usize::from(!self.value.is_empty())
    }
}

impl Default for BranchNode {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

/// Second element of a pair node, or an item of a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueOrHash {
    Value(ValueRLP),
    Hash(NodeHash),
}

/// A decoded trie node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Node {
    #[default]
    Empty,
    Leaf(LeafNode),
    Extension(ExtensionNode),
    Branch(Box<BranchNode>),
}

impl From<LeafNode> for Node {
    fn from(value: LeafNode) -> Self {
        Node::Leaf(value)
    }
}

impl From<ExtensionNode> for Node {
    fn from(value: ExtensionNode) -> Self {
        Node::Extension(value)
    }
}

impl From<BranchNode> for Node {
    fn from(value: BranchNode) -> Self {
        Node::Branch(Box::new(value))
    }
}

impl Node {
    /// Builds the pair node covering `path`: a leaf when the path carries the
    /// terminator, an extension into `item` otherwise.
    pub fn pair(path: Nibbles, item: ValueOrHash) -> Node {
        match item {
            ValueOrHash::Value(value) => LeafNode::new(path, value).into(),
            ValueOrHash::Hash(child) => ExtensionNode::new(path, child).into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    /// True for the 2 item nodes, leaves and extensions alike
    pub fn is_pair(&self) -> bool {
        matches!(self, Node::Leaf(_) | Node::Extension(_))
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Branch(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// True for a pair without terminator whose child is stored by hash.
    /// Extensions into an embedded child are walked as part of their parent.
    pub fn is_extension(&self) -> bool {
        matches!(self, Node::Extension(ext) if ext.child.is_hashed())
    }

    /// Path of a pair node, terminator included for leaves
    pub fn path(&self) -> Option<&Nibbles> {
        match self {
            Node::Leaf(leaf) => Some(&leaf.partial),
            Node::Extension(ext) => Some(&ext.prefix),
            _ => None,
        }
    }

    /// Compact encoding of a pair node's path
    pub fn encoded_path(&self) -> Option<Vec<u8>> {
        self.path().map(Nibbles::encode_compact)
    }

    /// Splits a pair node into its path and second element
    pub fn into_pair(self) -> Option<(Nibbles, ValueOrHash)> {
        match self {
            Node::Leaf(leaf) => Some((leaf.partial, ValueOrHash::Value(leaf.value))),
            Node::Extension(ext) => Some((ext.prefix, ValueOrHash::Hash(ext.child))),
            _ => None,
        }
    }

    /// Second element of a pair node: the leaf value or the extension's child
    pub fn key_object(&self) -> Option<ValueOrHash> {
        match self {
            Node::Leaf(leaf) => Some(ValueOrHash::Value(leaf.value.clone())),
            Node::Extension(ext) => Some(ValueOrHash::Hash(ext.child)),
            _ => None,
        }
    }

    /// Item `index` of a branch node, 16 being the terminal value.
    /// Returns `None` for other node kinds.
    ///
    /// # Panics
    /// If `index` is not lower than 17.
    pub fn branch_item(&self, index: usize) -> Option<ValueOrHash> {
        assert!(index < BRANCH_ITEMS, "branch item index out of range: {index}");
        match self {
            Node::Branch(branch) if index == BRANCH_CHOICES => {
                Some(ValueOrHash::Value(branch.value.clone()))
            }
            Node::Branch(branch) => Some(ValueOrHash::Hash(branch.choices[index])),
            _ => None,
        }
    }

    /// Children that are stored on their own and must be visited separately
    /// when walking the trie. The terminal value of a branch is never one.
    pub fn child_hashes(&self) -> Vec<H256> {
        match self {
            Node::Extension(ext) => ext.child.as_hash().into_iter().collect(),
            Node::Branch(branch) => branch
                .choices
                .iter()
                .filter_map(NodeHash::as_hash)
                .collect(),
            Node::Empty | Node::Leaf(_) => Vec::new(),
        }
    }

    /// Encodes the node into its canonical form
    pub fn encode_raw(&self) -> NodeRLP {
        self.encode_to_vec()
    }

    /// Decodes a node from its canonical form
    pub fn decode_raw(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        Self::decode(rlp)
    }

    /// Returns the reference a parent uses to point at this node
    pub fn compute_hash(&self) -> NodeHash {
        if self.is_empty() {
            return NodeHash::default();
        }
        NodeHash::from_encoded_raw(&self.encode_raw())
    }
}
