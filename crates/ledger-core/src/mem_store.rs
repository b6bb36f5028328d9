//! In-memory `ChainStore` used by unit tests. Mirrors the on-disk key layout.

use crate::chain::ChainStore;
use crate::constants::TIP_KEY;
use crate::error::{IntegrityError, LedgerError, LedgerResult};
use crate::{Block, Hash};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemStore {
    kv: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn raw_insert(&self, key: &[u8], value: Vec<u8>) {
        self.kv.lock().unwrap().insert(key.to_vec(), value);
    }

    pub fn raw_remove(&self, key: &[u8]) {
        self.kv.lock().unwrap().remove(key);
    }
}

fn decode_tip(bytes: &[u8]) -> LedgerResult<Hash> {
    Hash::try_from(bytes).map_err(|_| IntegrityError::MalformedTip(bytes.len()).into())
}

impl ChainStore for MemStore {
    fn tip_hash(&self) -> LedgerResult<Option<Hash>> {
        let kv = self.kv.lock().unwrap();
        kv.get(TIP_KEY).map(|v| decode_tip(v)).transpose()
    }

    fn get_block(&self, hash: &Hash) -> LedgerResult<Option<Block>> {
        let kv = self.kv.lock().unwrap();
        let Some(bytes) = kv.get(&hash[..]) else {
            return Ok(None);
        };
        let block = Block::deserialize(bytes)?;
        if block.hash != *hash {
            return Err(IntegrityError::HashMismatch {
                key: *hash,
                found: block.hash,
            }
            .into());
        }
        Ok(Some(block))
    }

    fn commit_block(&self, block: &Block, expected_tip: Option<Hash>) -> LedgerResult<()> {
        let mut kv = self.kv.lock().unwrap();
        let current = kv.get(TIP_KEY).map(|v| decode_tip(v)).transpose()?;
        if current != expected_tip {
            return Err(match expected_tip {
                None => LedgerError::AlreadyExists,
                Some(_) => LedgerError::TipMoved,
            });
        }
        kv.insert(block.hash.to_vec(), block.serialize()?);
        kv.insert(TIP_KEY.to_vec(), block.hash.to_vec());
        Ok(())
    }

    fn flush(&self) -> LedgerResult<()> {
        Ok(())
    }
}
