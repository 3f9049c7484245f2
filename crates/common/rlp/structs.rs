use super::encode::{RLPEncode, encode_length};
use bytes::BufMut;

/// # Struct encoding helper
///
/// Used to encode a heterogeneous list.
/// The items are written in the order they are passed to the `encode_*` methods,
/// and the list prefix is emitted by [`Encoder::finish`].
///
/// # Examples
///
/// ```
/// # use strata_rlp::structs::Encoder;
/// let mut buf = vec![];
/// Encoder::new(&mut buf)
///     .encode_bytes(b"hi")
///     .encode_raw(&[0x82, b'y', b'o'])
///     .finish();
///
/// assert_eq!(buf, vec![0xc6, 0x82, b'h', b'i', 0x82, b'y', b'o']);
/// ```
#[must_use = "`Encoder` must be consumed with `finish` to perform the encoding"]
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    temp_buf: Vec<u8>,
}

// NOTE: BufMut doesn't implement Debug, so we can't derive Debug for Encoder.
impl core::fmt::Debug for Encoder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Encoder")
            .field("buf", &"...")
            .field("temp_buf", &self.temp_buf)
            .finish()
    }
}

impl<'a> Encoder<'a> {
    /// Creates a new encoder that writes to the given buffer.
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            temp_buf: Vec::with_capacity(64),
        }
    }

    /// Stores a field to be encoded as a byte string.
    pub fn encode_bytes(mut self, value: &[u8]) -> Self {
        value.encode(&mut self.temp_buf);
        self
    }

    /// Adds an already encoded item to the list
    pub fn encode_raw(mut self, value: &[u8]) -> Self {
        self.temp_buf.put_slice(value);
        self
    }

    /// Finishes encoding the list and writes the result to the buffer.
    pub fn finish(self) {
        encode_length(self.temp_buf.len(), self.buf);
        self.buf.put_slice(&self.temp_buf);
    }
}
