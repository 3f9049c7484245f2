// Contains RLP encoding and decoding implementations for trie nodes
use bytes::BufMut;
use strata_rlp::{
    constants::RLP_NULL,
    decode::{RLPDecode, decode_bytes, decode_list_items},
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::Encoder,
};

use crate::{
    nibbles::Nibbles,
    node::{BRANCH_CHOICES, BRANCH_ITEMS, BranchNode, ExtensionNode, LeafNode, Node},
    node_hash::NodeHash,
};

fn child_rlp(child: &NodeHash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(33);
    child.encode_into(&mut buf);
    buf
}

impl RLPEncode for LeafNode {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_bytes(&self.partial.encode_compact())
            .encode_bytes(&self.value)
            .finish()
    }
}

impl RLPEncode for ExtensionNode {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_bytes(&self.prefix.encode_compact())
            .encode_raw(&child_rlp(&self.child))
            .finish()
    }
}

impl RLPEncode for BranchNode {
    fn encode(&self, buf: &mut dyn BufMut) {
        let mut encoder = Encoder::new(buf);
        for child in &self.choices {
            encoder = encoder.encode_raw(&child_rlp(child));
        }
        encoder.encode_bytes(&self.value).finish()
    }
}

impl RLPEncode for Node {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            Node::Empty => buf.put_u8(RLP_NULL),
            Node::Leaf(leaf) => leaf.encode(buf),
            Node::Extension(ext) => ext.encode(buf),
            Node::Branch(branch) => branch.encode(buf),
        }
    }
}

impl RLPDecode for Node {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        if rlp.first() == Some(&RLP_NULL) {
            return Ok((Node::Empty, &rlp[1..]));
        }
        let (items, rest) = decode_list_items(rlp)?;
        let node = match items.as_slice() {
            [path, item] => decode_pair(path, item)?,
            items if items.len() == BRANCH_ITEMS => decode_branch(items)?,
            items => {
                return Err(RLPDecodeError::Custom(format!(
                    "Invalid arg count for Node, expected 2 or 17, got {}",
                    items.len()
                )));
            }
        };
        Ok((node, rest))
    }
}

fn decode_pair(path: &[u8], item: &[u8]) -> Result<Node, RLPDecodeError> {
    let (compact, _) = decode_bytes(path).map_err(|err| err.with_context("node path"))?;
    let path = Nibbles::decode_compact(compact);
    if path.is_leaf() {
        let (value, _) = decode_bytes(item).map_err(|err| err.with_context("leaf value"))?;
        Ok(LeafNode::new(path, value.to_vec()).into())
    } else {
        let child = NodeHash::decode_child(item)?;
        if child.is_empty() {
            return Err(RLPDecodeError::Custom(
                "Extension node without child".to_string(),
            ));
        }
        Ok(ExtensionNode::new(path, child).into())
    }
}

fn decode_branch(items: &[&[u8]]) -> Result<Node, RLPDecodeError> {
    let mut branch = BranchNode::default();
    for (choice, item) in branch.choices.iter_mut().zip(&items[..BRANCH_CHOICES]) {
        *choice = NodeHash::decode_child(item)?;
    }
    let (value, _) = decode_bytes(items[BRANCH_CHOICES])
        .map_err(|err| err.with_context("branch value"))?;
    branch.value = value.to_vec();
    Ok(branch.into())
}
