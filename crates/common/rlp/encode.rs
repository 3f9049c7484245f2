use bytes::BufMut;

use super::constants::{RLP_EMPTY_LIST, RLP_NULL, SHORT_PAYLOAD_LIMIT};

/// Function for encoding a value to RLP.
/// For encoding the value into a buffer directly, use [`RLPEncode::encode`].
pub fn encode<T: RLPEncode + ?Sized>(value: &T) -> Vec<u8> {
    value.encode_to_vec()
}

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn length(&self) -> usize {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf.len()
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Big endian bytes of `len` without leading zeros.
fn be_len_bytes(len: usize) -> ([u8; 8], usize) {
    let bytes = (len as u64).to_be_bytes();
    let start = (len as u64).leading_zeros() as usize / 8;
    (bytes, start.min(7))
}

fn encode_prefix(len: usize, short_base: u8, long_base: u8, buf: &mut dyn BufMut) {
    if len < SHORT_PAYLOAD_LIMIT {
        buf.put_u8(short_base + len as u8);
    } else {
        let (bytes, start) = be_len_bytes(len);
        let len_of_len = bytes.len() - start;
        buf.put_u8(long_base + len_of_len as u8);
        buf.put_slice(&bytes[start..]);
    }
}

/// Writes the list prefix for a payload of `payload_len` bytes.
#[inline]
pub fn encode_length(payload_len: usize, buf: &mut dyn BufMut) {
    encode_prefix(payload_len, RLP_EMPTY_LIST, 0xf7, buf);
}

/// Total encoded size of a list whose payload takes `payload_len` bytes.
#[inline]
pub const fn list_length(payload_len: usize) -> usize {
    if payload_len < SHORT_PAYLOAD_LIMIT {
        1 + payload_len
    } else {
        let be_len = payload_len.ilog2() / 8 + 1;
        1 + be_len as usize + payload_len
    }
}

impl RLPEncode for [u8] {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        if let [single] = self
            && *single < RLP_NULL
        {
            buf.put_u8(*single);
            return;
        }
        encode_prefix(self.len(), RLP_NULL, 0xb7, buf);
        buf.put_slice(self);
    }

    fn length(&self) -> usize {
        match self {
            [single] if *single < RLP_NULL => 1,
            _ => list_length(self.len()),
        }
    }
}
