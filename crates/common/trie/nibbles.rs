/// Nibble value marking the end of a key. Paths ending with it belong to leaves.
pub const TERMINATOR: u8 = 16;

/// A sequence of 4-bit values used to walk the trie.
///
/// Keys are expanded two nibbles per byte, high half first, and get a trailing
/// [`TERMINATOR`] so that a key which is a prefix of another one still ends in
/// its own slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nibbles {
    data: Vec<u8>,
}

impl Nibbles {
    /// Create `Nibbles` from hex-encoded nibbles
    pub const fn from_hex(hex: Vec<u8>) -> Self {
        Self { data: hex }
    }

    /// Splits incoming bytes into nibbles and appends the leaf flag (a 16 nibble at the end)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_raw(bytes, true)
    }

    /// Splits incoming bytes into nibbles and appends the leaf flag if `is_leaf` is true
    pub fn from_raw(bytes: &[u8], is_leaf: bool) -> Self {
        let mut data = Vec::with_capacity(bytes.len() * 2 + usize::from(is_leaf));
        for byte in bytes {
            data.push(byte >> 4);
            data.push(byte & 0x0f);
        }
        if is_leaf {
            data.push(TERMINATOR);
        }
        Self { data }
    }

    /// Returns the amount of nibbles
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there are no nibbles
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the amount of leading nibbles both sequences have in common
    pub fn count_prefix(&self, other: &Nibbles) -> usize {
        self.data
            .iter()
            .zip(other.data.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Returns the nibbles after the given offset
    pub fn offset(&self, offset: usize) -> Nibbles {
        self.slice(offset, self.len())
    }

    /// Returns the nibbles between the start and end indexes
    pub fn slice(&self, start: usize, end: usize) -> Nibbles {
        Nibbles::from_hex(self.data[start..end].to_vec())
    }

    /// Concatenates self and another Nibbles returning a new Nibbles
    pub fn concat(&self, other: &Nibbles) -> Nibbles {
        let mut data = Vec::with_capacity(self.len() + other.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&other.data);
        Nibbles { data }
    }

    /// Returns true if the nibbles contain the leaf flag (16) at the end
    pub fn is_leaf(&self) -> bool {
        self.data.last() == Some(&TERMINATOR)
    }

    /// Encodes the nibbles in compact (hex-prefix) form.
    ///
    /// The first nibble is a flag: bit 1 set for leaves, bit 0 set for odd
    /// lengths. Odd paths keep their first nibble next to the flag, even ones
    /// pad with a zero nibble.
    pub fn encode_compact(&self) -> Vec<u8> {
        let is_leaf = self.is_leaf();
        let mut hex = if is_leaf {
            &self.data[..self.len() - 1]
        } else {
            &self.data[..]
        };
        let mut flag = if is_leaf { 0x20 } else { 0x00 };
        if hex.len() % 2 == 1 {
            flag |= 0x10 | hex[0];
            hex = &hex[1..];
        }

        let mut compact = Vec::with_capacity(1 + hex.len() / 2);
        compact.push(flag);
        compact.extend(hex.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]));
        compact
    }

    /// Decodes nibbles from their compact form, restoring the leaf flag if present
    pub fn decode_compact(compact: &[u8]) -> Self {
        let Some((&first, rest)) = compact.split_first() else {
            return Self::default();
        };
        let flag = first >> 4;
        let mut data = Vec::with_capacity(rest.len() * 2 + 2);
        if flag & 0x1 != 0 {
            data.push(first & 0x0f);
        }
        for byte in rest {
            data.push(byte >> 4);
            data.push(byte & 0x0f);
        }
        if flag & 0x2 != 0 {
            data.push(TERMINATOR);
        }
        Self { data }
    }
}

impl AsRef<[u8]> for Nibbles {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
