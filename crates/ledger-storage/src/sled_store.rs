use ledger_core::constants::TIP_KEY;
use ledger_core::{Block, ChainStore, Hash, IntegrityError, LedgerError, LedgerResult};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec};
use std::path::Path;
use tracing::{debug, info};

/// Blocks live in the default tree keyed by their hash, next to the `"lh"` tip pointer.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
    let path = path.as_ref();
    let db = sled::open(path).map_err(LedgerError::storage)?;
    info!(path = %path.display(), "sled store opened");
    Ok(Self { db })
  }

  /// Like [`SledStore::open`] but refuses to create a fresh directory.
  pub fn open_existing<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
    if !path.as_ref().exists() {
      return Err(LedgerError::NotFound);
    }
    Self::open(path)
  }

  /// Raw handle, for inspection in tests and tools.
  pub fn db(&self) -> &Db {
    &self.db
  }
}

fn decode_tip(value: &IVec) -> Result<Hash, IntegrityError> {
  Hash::try_from(value.as_ref()).map_err(|_| IntegrityError::MalformedTip(value.len()))
}

impl ChainStore for SledStore {
  fn tip_hash(&self) -> LedgerResult<Option<Hash>> {
    let value = self.db.get(TIP_KEY).map_err(LedgerError::storage)?;
    Ok(value.as_ref().map(decode_tip).transpose()?)
  }

  fn get_block(&self, hash: &Hash) -> LedgerResult<Option<Block>> {
    let Some(bytes) = self.db.get(hash).map_err(LedgerError::storage)? else {
      return Ok(None);
    };
    let block = Block::deserialize(&bytes)?;
    if block.hash != *hash {
      return Err(
        IntegrityError::HashMismatch {
          key: *hash,
          found: block.hash,
        }
        .into(),
      );
    }
    Ok(Some(block))
  }

  fn commit_block(&self, block: &Block, expected_tip: Option<Hash>) -> LedgerResult<()> {
    let bytes = block.serialize()?;

    let result = self.db.transaction(|tx| {
      let current = match tx.get(TIP_KEY)? {
        Some(value) => Some(
          decode_tip(&value).map_err(|e| ConflictableTransactionError::Abort(LedgerError::from(e)))?,
        ),
        None => None,
      };
      if current != expected_tip {
        let err = match expected_tip {
          None => LedgerError::AlreadyExists,
          Some(_) => LedgerError::TipMoved,
        };
        return Err(ConflictableTransactionError::Abort(err));
      }
      tx.insert(&block.hash[..], bytes.as_slice())?;
      tx.insert(TIP_KEY, &block.hash[..])?;
      Ok(())
    });

    match result {
      Ok(()) => {
        debug!(
          bytes = bytes.len(),
          "committed block {} as tip",
          hex::encode(block.hash)
        );
        Ok(())
      }
      Err(TransactionError::Abort(err)) => Err(err),
      Err(TransactionError::Storage(err)) => Err(LedgerError::storage(err)),
    }
  }

  fn flush(&self) -> LedgerResult<()> {
    self.db.flush().map_err(LedgerError::storage)?;
    Ok(())
  }
}
