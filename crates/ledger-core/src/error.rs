use crate::Hash;
use std::error::Error as StdError;
use thiserror::Error;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Broad category of a failure, used by callers to decide how to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected outcome of a request; nothing was written.
    Operational,
    /// Stored data contradicts a chain invariant.
    Integrity,
    /// The storage engine itself failed.
    Resource,
}

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("codec failure: {0}")]
    Codec(String),

    #[error("block stored under {} decodes to hash {}", hex::encode(.key), hex::encode(.found))]
    HashMismatch { key: Hash, found: Hash },

    #[error("block {} is referenced but missing from the store", hex::encode(.0))]
    MissingBlock(Hash),

    #[error("block {} does not satisfy its proof of work", hex::encode(.0))]
    InvalidProof(Hash),

    #[error("tip pointer holds {0} bytes, expected 32")]
    MalformedTip(usize),

    #[error("output {index} of transaction {} is consumed by more than one input", hex::encode(.txid))]
    DuplicateSpend { txid: Hash, index: u32 },
}

impl From<bincode::Error> for IntegrityError {
    fn from(err: bincode::Error) -> Self {
        IntegrityError::Codec(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("a chain already exists at this location")]
    AlreadyExists,

    #[error("no chain found at this location")]
    NotFound,

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("amount must be greater than zero")]
    InvalidAmount,

    #[error("output {index} of transaction {} is already spent", hex::encode(.txid))]
    DoubleSpend { txid: Hash, index: u32 },

    #[error("output {index} of transaction {} is created in the same block", hex::encode(.txid))]
    SameBlockSpend { txid: Hash, index: u32 },

    #[error("chain tip moved before the new block could be committed")]
    TipMoved,

    #[error("nonce search ended without finding a block")]
    NoBlockFound,

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("storage failure: {0}")]
    Storage(#[source] Box<dyn StdError + Send + Sync>),
}

impl LedgerError {
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        LedgerError::Storage(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Integrity(_) => ErrorKind::Integrity,
            LedgerError::Storage(_) => ErrorKind::Resource,
            _ => ErrorKind::Operational,
        }
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Integrity(err.into())
    }
}
