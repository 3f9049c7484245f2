use ethereum_types::H256;
use strata_rlp::error::RLPDecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrieError {
    #[error(transparent)]
    RLPDecode(#[from] RLPDecodeError),
    #[error("Invalid trie state: missing node {0:#x}")]
    MissingNode(H256),
    #[error("Inconsistent internal tree structure")]
    InconsistentTree,
    #[error("Lock Error: Panicked when trying to acquire a lock")]
    LockError,
    #[error("Database error: {0}")]
    DbError(anyhow::Error),
    #[error("Invalid trie input: values must not be empty")]
    InvalidInput,
}
