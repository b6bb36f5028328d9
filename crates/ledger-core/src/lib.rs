//! Core of a single-node, append-only ledger: hash-linked blocks sealed by
//! proof-of-work, carrying UTXO-model transactions.

pub mod chain;
pub mod constants;
pub mod error;
#[cfg(test)]
mod mem_store;
pub mod mine;
pub mod pow;
pub mod tx;
pub mod utxo;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use chain::{Chain, ChainIterator, ChainStore};
pub use error::{ErrorKind, IntegrityError, LedgerError, LedgerResult};
pub use tx::{OutPoint, Transaction, TxInput, TxOutput};
pub use utxo::SpendableOutputs;

pub type Hash = [u8; 32];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: Hash,
    pub transactions: Vec<Transaction>,
    /// `None` marks the genesis block.
    pub previous_hash: Option<Hash>,
    pub nonce: u64,
}

impl Block {
    /// A block with its fields set but hash and nonce still zeroed.
    pub fn unmined(transactions: Vec<Transaction>, previous_hash: Option<Hash>) -> Self {
        Self {
            hash: [0u8; 32],
            transactions,
            previous_hash,
            nonce: 0,
        }
    }

    /// Assembles and mines a block. Blocks the calling thread until a nonce is found.
    pub fn create(transactions: Vec<Transaction>, previous_hash: Option<Hash>) -> LedgerResult<Self> {
        mine::mine_block(transactions, previous_hash, None).ok_or(LedgerError::NoBlockFound)
    }

    pub fn genesis(coinbase: Transaction) -> LedgerResult<Self> {
        Self::create(vec![coinbase], None)
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_none()
    }

    /// `SHA-256` over the concatenated transaction ids, in block order.
    pub fn transactions_digest(&self) -> Hash {
        let mut hasher = Sha256::new();
        for tx in &self.transactions {
            hasher.update(tx.id);
        }
        hasher.finalize().into()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, IntegrityError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, IntegrityError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Re-checks the stored nonce and hash against the proof-of-work target.
    pub fn has_valid_proof(&self) -> bool {
        pow::ProofOfWork::new(self).validate(self)
    }
}
