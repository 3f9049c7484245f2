use super::{
    constants::{RLP_EMPTY_LIST, RLP_NULL},
    error::RLPDecodeError,
};

/// Max payload size accepted when decoding.
/// Trie nodes are tiny compared to this, anything bigger is corrupt input.
const MAX_RLP_BYTES: usize = 1024 * 1024 * 1024;

/// Trait for decoding RLP encoded slices of data.
/// Implementors provide [`decode_unfinished`](RLPDecode::decode_unfinished), which returns the
/// decoded value along with the bytes following it. Consumers usually call
/// [`decode`](RLPDecode::decode), which also checks that the whole input was used.
pub trait RLPDecode: Sized {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError>;

    fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (decoded, remaining) = Self::decode_unfinished(rlp)?;
        if !remaining.is_empty() {
            return Err(RLPDecodeError::invalid_length());
        }

        Ok(decoded)
    }
}

/// Reads the big endian length that follows a long-form prefix.
fn long_length(data: &[u8], length_of_length: usize) -> Result<usize, RLPDecodeError> {
    let length_bytes = data
        .get(1..length_of_length + 1)
        .ok_or(RLPDecodeError::invalid_length())?;
    let length = usize::from_be_bytes(static_left_pad(length_bytes)?);
    if length > MAX_RLP_BYTES {
        return Err(RLPDecodeError::invalid_length());
    }
    Ok(length)
}

/// Returns `(is_list, header_len, payload_len)` for the item at the start of `data`.
fn item_header(data: &[u8]) -> Result<(bool, usize, usize), RLPDecodeError> {
    let first_byte = *data.first().ok_or(RLPDecodeError::invalid_length())?;
    let (is_list, header_len, payload_len) = match first_byte {
        0..=0x7f => (false, 0, 1),
        RLP_NULL..=0xb7 => (false, 1, (first_byte - RLP_NULL) as usize),
        0xb8..=0xbf => {
            let length_of_length = (first_byte - 0xb7) as usize;
            let len = long_length(data, length_of_length)?;
            (false, 1 + length_of_length, len)
        }
        RLP_EMPTY_LIST..=0xf7 => (true, 1, (first_byte - RLP_EMPTY_LIST) as usize),
        0xf8..=0xff => {
            let length_of_length = (first_byte - 0xf7) as usize;
            let len = long_length(data, length_of_length)?;
            (true, 1 + length_of_length, len)
        }
    };
    if data.len() < header_len + payload_len {
        return Err(RLPDecodeError::invalid_length());
    }
    Ok((is_list, header_len, payload_len))
}

/// Decodes an RLP item from a slice of bytes.
/// It returns a 3-element tuple with the following elements:
/// - A boolean indicating if the item is a list or not.
/// - The payload of the item, without its prefix.
/// - The remaining bytes after the item.
pub fn decode_rlp_item(data: &[u8]) -> Result<(bool, &[u8], &[u8]), RLPDecodeError> {
    let (is_list, header_len, payload_len) = item_header(data)?;
    let end = header_len + payload_len;
    Ok((is_list, &data[header_len..end], &data[end..]))
}

/// Splits an RLP item in two:
/// - The first item including its prefix
/// - The remaining bytes after the item
pub fn get_item_with_prefix(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (_, header_len, payload_len) = item_header(data)?;
    Ok(data.split_at(header_len + payload_len))
}

/// Splits an RLP list into its items, each one still carrying its own prefix.
/// Returns the items and the bytes following the list.
pub fn decode_list_items(data: &[u8]) -> Result<(Vec<&[u8]>, &[u8]), RLPDecodeError> {
    let (is_list, mut payload, rest) = decode_rlp_item(data)?;
    if !is_list {
        return Err(RLPDecodeError::unexpected_string());
    }
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, remaining) = get_item_with_prefix(payload)?;
        items.push(item);
        payload = remaining;
    }
    Ok((items, rest))
}

/// Decodes the payload of an RLP string item.
/// Returns the payload and the remaining bytes after the item.
pub fn decode_bytes(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (is_list, payload, rest) = decode_rlp_item(data)?;
    if is_list {
        return Err(RLPDecodeError::unexpected_list());
    }
    Ok((payload, rest))
}

/// Pads a slice of bytes with zeros on the left to make it a fixed size slice.
/// Leading zero bytes are rejected as non canonical.
#[inline]
pub fn static_left_pad<const N: usize>(data: &[u8]) -> Result<[u8; N], RLPDecodeError> {
    let mut result = [0; N];

    if data.is_empty() {
        return Ok(result);
    }
    if data[0] == 0 {
        return Err(RLPDecodeError::malformed_data());
    }
    if data.len() > N {
        return Err(RLPDecodeError::invalid_length());
    }
    result[N - data.len()..].copy_from_slice(data);
    Ok(result)
}
