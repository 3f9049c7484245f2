/// Encoding of the empty byte string, also used as the "null" marker.
pub const RLP_NULL: u8 = 0x80;
/// Encoding of the empty list.
pub const RLP_EMPTY_LIST: u8 = 0xc0;
/// Payloads shorter than this use the single-byte prefix form.
pub const SHORT_PAYLOAD_LIMIT: usize = 56;
