use strata_rlp::constants::{RLP_EMPTY_LIST, RLP_NULL};
use strata_rlp::decode::{decode_bytes, decode_list_items, decode_rlp_item, get_item_with_prefix};
use strata_rlp::error::RLPDecodeError;

#[test]
fn test_decode_empty_string() {
    let (decoded, rest) = decode_bytes(&[RLP_NULL]).unwrap();
    assert!(decoded.is_empty());
    assert!(rest.is_empty());
}

#[test]
fn test_decode_single_bytes() {
    assert_eq!(decode_bytes(&[0x00]).unwrap().0, &[0x00]);
    assert_eq!(decode_bytes(&[0x7f]).unwrap().0, &[0x7f]);
    assert_eq!(decode_bytes(&[RLP_NULL + 1, 0x80]).unwrap().0, &[0x80]);
}

#[test]
fn test_decode_dog() {
    let rlp = vec![0x83, b'd', b'o', b'g'];
    let (is_list, payload, rest) = decode_rlp_item(&rlp).unwrap();
    assert!(!is_list);
    assert_eq!(payload, b"dog");
    assert!(rest.is_empty());
}

#[test]
fn test_decode_list_of_strings() {
    // ["cat", "dog"]
    let rlp = vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g'];
    let (items, rest) = decode_list_items(&rlp).unwrap();
    assert!(rest.is_empty());
    assert_eq!(items, vec![&rlp[1..5], &rlp[5..9]]);
    assert_eq!(decode_bytes(items[0]).unwrap().0, b"cat");
    assert_eq!(decode_bytes(items[1]).unwrap().0, b"dog");
}

#[test]
fn test_decode_empty_list() {
    let (items, rest) = decode_list_items(&[RLP_EMPTY_LIST, 0x01]).unwrap();
    assert!(items.is_empty());
    assert_eq!(rest, &[0x01]);
}

#[test]
fn test_decode_nested_list_keeps_prefix() {
    // [[], "a"]
    let rlp = vec![0xc2, RLP_EMPTY_LIST, b'a'];
    let (items, _) = decode_list_items(&rlp).unwrap();
    assert_eq!(items, vec![&[RLP_EMPTY_LIST][..], &[b'a'][..]]);

    let (first, rest) = get_item_with_prefix(&rlp[1..]).unwrap();
    assert_eq!(first, &[RLP_EMPTY_LIST]);
    assert_eq!(rest, &[b'a']);
}

#[test]
fn test_decode_long_string() {
    let payload = vec![b'x'; 60];
    let mut rlp = vec![0xb8, 60];
    rlp.extend_from_slice(&payload);

    let (is_list, decoded, rest) = decode_rlp_item(&rlp).unwrap();
    assert!(!is_list);
    assert_eq!(decoded, payload.as_slice());
    assert!(rest.is_empty());
}

#[test]
fn test_decode_bytes_keeps_remainder() {
    let rlp = vec![0x82, 0x01, 0x02, 0x03];
    let (decoded, rest) = decode_bytes(&rlp).unwrap();
    assert_eq!(decoded, &[0x01, 0x02]);
    assert_eq!(rest, &[0x03]);
}

#[test]
fn test_decode_truncated_input() {
    let rlp = vec![0x85, 0x01, 0x02];
    assert!(matches!(
        decode_bytes(&rlp),
        Err(RLPDecodeError::InvalidLength(_))
    ));
}

#[test]
fn test_decode_list_as_string_fails() {
    assert_eq!(
        decode_bytes(&[0xc1, 0x01]),
        Err(RLPDecodeError::unexpected_list())
    );
}

#[test]
fn test_decode_non_canonical_length_fails() {
    // long form length with a leading zero byte
    let mut rlp = vec![0xb9, 0x00, 60];
    rlp.extend_from_slice(&[b'x'; 60]);
    assert!(decode_rlp_item(&rlp).is_err());
}
