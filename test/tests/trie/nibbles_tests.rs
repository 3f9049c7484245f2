use strata_trie::{Nibbles, TERMINATOR};

#[test]
fn count_prefix_all() {
    let a = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
    let b = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
    assert_eq!(a.count_prefix(&b), a.len());
}

#[test]
fn count_prefix_partial() {
    let a = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
    let b = Nibbles::from_hex(vec![1, 2, 3]);
    assert_eq!(a.count_prefix(&b), b.len());
}

#[test]
fn count_prefix_none() {
    let a = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
    let b = Nibbles::from_hex(vec![2, 3, 4, 5, 6]);
    assert_eq!(a.count_prefix(&b), 0);
}

#[test]
fn keys_expand_to_terminated_paths() {
    let path = Nibbles::from_bytes(b"cat");
    assert_eq!(path.as_ref(), &[6, 3, 6, 1, 7, 4, TERMINATOR]);
    assert!(path.is_leaf());
}

#[test]
fn compact_decoding_restores_terminator() {
    for hex in [
        vec![],
        vec![TERMINATOR],
        vec![0xa],
        vec![0xa, 0xb, TERMINATOR],
        vec![0, 0, 0, 1, TERMINATOR],
        vec![0xf, 0x0, 0x1],
    ] {
        let nibbles = Nibbles::from_hex(hex);
        assert_eq!(Nibbles::decode_compact(&nibbles.encode_compact()), nibbles);
    }
    assert!(Nibbles::decode_compact(&[]).is_empty());
}

#[test]
fn concat_and_offset() {
    let a = Nibbles::from_hex(vec![1, 2]);
    let b = Nibbles::from_hex(vec![3, TERMINATOR]);
    let joined = a.concat(&b);
    assert_eq!(joined.as_ref(), &[1, 2, 3, TERMINATOR]);
    assert_eq!(joined.offset(2), b);
    assert_eq!(joined.slice(0, 2), a);
}
