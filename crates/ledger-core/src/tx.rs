//! Transactions under the UTXO model.
//!
//! Locking is a plain string comparison between an output's address and the
//! spender's address. It is a placeholder for signatures, not a security
//! mechanism.

use crate::constants::COINBASE_REWARD;
use crate::error::IntegrityError;
use crate::Hash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Output index carried by the coinbase input, which spends nothing.
pub const COINBASE_OUT_INDEX: i64 = -1;

/// A reference to one output of one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutPoint {
    pub txid: Hash,
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub lock_address: String,
}

impl TxOutput {
    pub fn new(value: u64, lock_address: impl Into<String>) -> Self {
        Self {
            value,
            lock_address: lock_address.into(),
        }
    }

    pub fn is_locked_to(&self, address: &str) -> bool {
        self.lock_address == address
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// `None` only for the coinbase input.
    pub txid: Option<Hash>,
    pub out_index: i64,
    pub unlock_token: String,
}

impl TxInput {
    pub fn spending(outpoint: OutPoint, unlock_token: impl Into<String>) -> Self {
        Self {
            txid: Some(outpoint.txid),
            out_index: i64::from(outpoint.index),
            unlock_token: unlock_token.into(),
        }
    }

    pub fn can_unlock(&self, address: &str) -> bool {
        self.unlock_token == address
    }

    /// The output this input consumes, if it consumes one.
    pub fn outpoint(&self) -> Option<OutPoint> {
        let txid = self.txid?;
        let index = u32::try_from(self.out_index).ok()?;
        Some(OutPoint { txid, index })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Builds a transaction and assigns its content-addressed id.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self, IntegrityError> {
        let mut tx = Self {
            id: [0u8; 32],
            inputs,
            outputs,
        };
        tx.id = tx.compute_id()?;
        Ok(tx)
    }

    /// Issues the fixed block reward to `recipient`. An empty memo becomes
    /// `"Coins to <recipient>"`.
    pub fn coinbase(recipient: &str, memo: &str) -> Result<Self, IntegrityError> {
        let memo = if memo.is_empty() {
            format!("Coins to {recipient}")
        } else {
            memo.to_string()
        };
        let input = TxInput {
            txid: None,
            out_index: COINBASE_OUT_INDEX,
            unlock_token: memo,
        };
        Self::new(vec![input], vec![TxOutput::new(COINBASE_REWARD, recipient)])
    }

    /// SHA-256 of the bincode encoding of the transaction with its id left out.
    pub fn compute_id(&self) -> Result<Hash, IntegrityError> {
        let preimage = bincode::serialize(&(&self.inputs, &self.outputs))?;
        Ok(Sha256::digest(&preimage).into())
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(
            self.inputs.as_slice(),
            [only] if only.txid.is_none() && only.out_index == COINBASE_OUT_INDEX
        )
    }

    /// Outputs paired with their index, in order.
    pub fn indexed_outputs(&self) -> impl Iterator<Item = (u32, &TxOutput)> + '_ {
        (0u32..).zip(self.outputs.iter())
    }

    /// Outputs consumed by this transaction. Empty for a coinbase.
    pub fn spent_outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        let coinbase = self.is_coinbase();
        self.inputs
            .iter()
            .filter(move |_| !coinbase)
            .filter_map(TxInput::outpoint)
    }
}
