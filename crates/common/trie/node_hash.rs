use ethereum_types::H256;
use sha3::{Digest, Keccak256};
use strata_rlp::{
    constants::RLP_NULL,
    decode::decode_rlp_item,
    error::RLPDecodeError,
};

use crate::EMPTY_TRIE_HASH;

/// Encodings at least this long are stored under their hash instead of being embedded.
pub const INLINE_THRESHOLD: usize = 32;

/// Reference from a parent to a child node.
///
/// Nodes whose encoding is shorter than [`INLINE_THRESHOLD`] travel inside their
/// parent (`Inline`), bigger ones are stored separately and referenced by the
/// keccak hash of their encoding (`Hashed`). An inline reference with no bytes
/// stands for an empty slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeHash {
    Hashed(H256),
    Inline(([u8; 31], u8)),
}

impl Default for NodeHash {
    fn default() -> Self {
        NodeHash::Inline(([0; 31], 0))
    }
}

impl NodeHash {
    /// Returns the reference a node with the given encoding gets from its parent
    pub fn from_encoded_raw(encoded: &[u8]) -> NodeHash {
        if encoded.len() >= INLINE_THRESHOLD {
            NodeHash::Hashed(keccak(encoded))
        } else {
            let mut buffer = [0; 31];
            buffer[..encoded.len()].copy_from_slice(encoded);
            NodeHash::Inline((buffer, encoded.len() as u8))
        }
    }

    /// Parses a child reference as it appears inside a parent's encoding
    /// (prefix included): the empty string, a 32 byte hash or an embedded node.
    pub fn decode_child(item: &[u8]) -> Result<NodeHash, RLPDecodeError> {
        let (is_list, payload, _) = decode_rlp_item(item)?;
        if is_list {
            if item.len() >= INLINE_THRESHOLD {
                return Err(RLPDecodeError::Custom(format!(
                    "Embedded node of {} bytes exceeds the inline limit",
                    item.len()
                )));
            }
            return Ok(NodeHash::from_encoded_raw(item));
        }
        match payload.len() {
            0 => Ok(NodeHash::default()),
            32 => Ok(NodeHash::Hashed(H256::from_slice(payload))),
            n => Err(RLPDecodeError::Custom(format!(
                "Invalid child reference, expected 0 or 32 bytes, got {n}"
            ))),
        }
    }

    /// Returns the hash used to address the node.
    /// Inline nodes are hashed on demand, the empty reference maps to [`EMPTY_TRIE_HASH`].
    pub fn finalize(&self) -> H256 {
        match self {
            NodeHash::Hashed(hash) => *hash,
            NodeHash::Inline(_) if self.is_empty() => *EMPTY_TRIE_HASH,
            NodeHash::Inline(_) => keccak(self.as_ref()),
        }
    }

    /// Returns true for the reference of an empty slot
    pub fn is_empty(&self) -> bool {
        matches!(self, NodeHash::Inline((_, 0)))
    }

    pub fn is_hashed(&self) -> bool {
        matches!(self, NodeHash::Hashed(_))
    }

    /// Returns the hash if the reference points to a separately stored node
    pub fn as_hash(&self) -> Option<H256> {
        match self {
            NodeHash::Hashed(hash) => Some(*hash),
            NodeHash::Inline(_) => None,
        }
    }

    /// Writes the reference the way a parent node embeds it
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            NodeHash::Hashed(hash) => {
                buf.push(RLP_NULL + 32);
                buf.extend_from_slice(hash.as_bytes());
            }
            NodeHash::Inline(_) if self.is_empty() => buf.push(RLP_NULL),
            NodeHash::Inline(_) => buf.extend_from_slice(self.as_ref()),
        }
    }
}

impl From<H256> for NodeHash {
    fn from(value: H256) -> Self {
        NodeHash::Hashed(value)
    }
}

impl AsRef<[u8]> for NodeHash {
    fn as_ref(&self) -> &[u8] {
        match self {
            NodeHash::Hashed(hash) => hash.as_bytes(),
            NodeHash::Inline((buffer, len)) => &buffer[..*len as usize],
        }
    }
}

/// Keccak-256 of `data`
pub fn keccak(data: &[u8]) -> H256 {
    H256::from_slice(Keccak256::new().chain_update(data).finalize().as_slice())
}
