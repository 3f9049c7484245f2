//! Recursive Length Prefix codec used to serialize trie nodes.
//!
//! Only the subset the state trie needs lives here: byte strings and lists
//! split into their raw items, plus the [`structs::Encoder`] to build a
//! heterogeneous list field by field.

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;
