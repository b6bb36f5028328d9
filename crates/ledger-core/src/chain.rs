use crate::constants::GENESIS_MEMO;
use crate::error::{IntegrityError, LedgerError, LedgerResult};
use crate::tx::OutPoint;
use crate::{mine, Block, Hash, Transaction};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Transactional contract the chain needs from a storage backend.
/// This lives in `ledger-core` to avoid a circular dependency.
pub trait ChainStore: Send + Sync {
    /// Current value of the tip pointer, `None` when no chain has been created.
    fn tip_hash(&self) -> LedgerResult<Option<Hash>>;

    /// Block stored under `hash`. Implementations must reject a block whose
    /// decoded hash differs from its key.
    fn get_block(&self, hash: &Hash) -> LedgerResult<Option<Block>>;

    /// In one write transaction: store `block` under its hash and move the tip
    /// pointer to it, provided the tip still equals `expected_tip`. On mismatch
    /// nothing is written and the error is `AlreadyExists` when `expected_tip`
    /// is `None`, otherwise `TipMoved`.
    fn commit_block(&self, block: &Block, expected_tip: Option<Hash>) -> LedgerResult<()>;

    fn flush(&self) -> LedgerResult<()>;
}

/// Chain façade over a [`ChainStore`]. Holds the tip hash as a mirror of the
/// persisted pointer, updated only after a commit succeeds.
#[derive(Clone)]
pub struct Chain<S: ChainStore> {
    store: Arc<S>,
    tip: Hash,
}

impl<S: ChainStore> Chain<S> {
    /// Creates the genesis block paying the coinbase reward to `address`.
    pub fn initialize(store: Arc<S>, address: &str) -> LedgerResult<Self> {
        if store.tip_hash()?.is_some() {
            return Err(LedgerError::AlreadyExists);
        }
        let coinbase = Transaction::coinbase(address, GENESIS_MEMO)?;
        let genesis = Block::genesis(coinbase)?;
        store.commit_block(&genesis, None)?;
        store.flush()?;
        info!(address, "genesis block {} created", hex::encode(genesis.hash));
        Ok(Self {
            store,
            tip: genesis.hash,
        })
    }

    /// Opens an existing chain. The tip pointer must resolve to a stored block.
    pub fn open(store: Arc<S>) -> LedgerResult<Self> {
        let tip = store.tip_hash()?.ok_or(LedgerError::NotFound)?;
        if store.get_block(&tip)?.is_none() {
            return Err(IntegrityError::MissingBlock(tip).into());
        }
        Ok(Self { store, tip })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn tip(&self) -> Hash {
        self.tip
    }

    /// Mines a block over `transactions` on top of the persisted tip and
    /// commits it. Returns the new tip hash.
    pub fn append(&mut self, transactions: Vec<Transaction>) -> LedgerResult<Hash> {
        self.append_until(transactions, None)?
            .ok_or(LedgerError::NoBlockFound)
    }

    /// As [`Chain::append`], but mining stops at `deadline`. `Ok(None)` means no
    /// block was found in time and nothing was written.
    pub fn append_until(
        &mut self,
        transactions: Vec<Transaction>,
        deadline: Option<Instant>,
    ) -> LedgerResult<Option<Hash>> {
        let previous = self.store.tip_hash()?.ok_or(LedgerError::NotFound)?;
        self.check_double_spends(&transactions)?;

        let Some(block) = mine::mine_block(transactions, Some(previous), deadline) else {
            warn!("no block found before the mining deadline");
            return Ok(None);
        };
        if let Err(err) = self.store.commit_block(&block, Some(previous)) {
            warn!(error = %err, "append rejected");
            return Err(err);
        }
        self.store.flush()?;
        self.tip = block.hash;
        info!(
            txs = block.transactions.len(),
            "appended block {}",
            hex::encode(block.hash)
        );
        Ok(Some(block.hash))
    }

    /// Backward cursor from the current tip to genesis.
    pub fn iter(&self) -> ChainIterator<'_, S> {
        ChainIterator {
            current: Some(self.tip),
            store: self.store.as_ref(),
        }
    }

    /// Number of blocks from tip to genesis.
    pub fn height(&self) -> LedgerResult<u64> {
        let mut count = 0u64;
        for block in self.iter() {
            block?;
            count += 1;
        }
        Ok(count)
    }

    /// Every output consumed by some input anywhere on the chain.
    pub fn spent_outpoints(&self) -> LedgerResult<BTreeSet<OutPoint>> {
        let mut spent = BTreeSet::new();
        for block in self.iter() {
            let block = block?;
            for tx in &block.transactions {
                spent.extend(tx.spent_outpoints());
            }
        }
        Ok(spent)
    }

    fn check_double_spends(&self, transactions: &[Transaction]) -> LedgerResult<()> {
        let wanted: Vec<OutPoint> = transactions
            .iter()
            .flat_map(|tx| tx.spent_outpoints())
            .collect();
        if wanted.is_empty() {
            return Ok(());
        }
        // discovery walks a block in order, so an output must not be spent in its own block
        let batch_ids: BTreeSet<Hash> = transactions.iter().map(|tx| tx.id).collect();
        if let Some(op) = wanted.iter().find(|op| batch_ids.contains(&op.txid)) {
            return Err(LedgerError::SameBlockSpend {
                txid: op.txid,
                index: op.index,
            });
        }
        let mut seen = self.spent_outpoints()?;
        for outpoint in wanted {
            if !seen.insert(outpoint) {
                return Err(LedgerError::DoubleSpend {
                    txid: outpoint.txid,
                    index: outpoint.index,
                });
            }
        }
        Ok(())
    }

    /// Walks the whole chain checking proof-of-work, hash links and that no
    /// output is consumed twice. Returns the number of blocks checked.
    pub fn verify(&self) -> LedgerResult<u64> {
        let mut spent = BTreeSet::new();
        let mut count = 0u64;
        for block in self.iter() {
            let block = block?;
            if !block.has_valid_proof() {
                return Err(IntegrityError::InvalidProof(block.hash).into());
            }
            for outpoint in block.transactions.iter().flat_map(|tx| tx.spent_outpoints()) {
                if !spent.insert(outpoint) {
                    return Err(IntegrityError::DuplicateSpend {
                        txid: outpoint.txid,
                        index: outpoint.index,
                    }
                    .into());
                }
            }
            count += 1;
        }
        Ok(count)
    }
}

/// Lazy cursor yielding blocks from tip to genesis. It ends after the genesis
/// block and after the first error; start a fresh one with [`Chain::iter`].
pub struct ChainIterator<'a, S: ChainStore> {
    current: Option<Hash>,
    store: &'a S,
}

impl<S: ChainStore> ChainIterator<'_, S> {
    pub fn current_hash(&self) -> Option<Hash> {
        self.current
    }
}

impl<S: ChainStore> Iterator for ChainIterator<'_, S> {
    type Item = LedgerResult<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current.take()?;
        match self.store.get_block(&hash) {
            Ok(Some(block)) => {
                self.current = block.previous_hash;
                Some(Ok(block))
            }
            Ok(None) => Some(Err(IntegrityError::MissingBlock(hash).into())),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<S: ChainStore> std::iter::FusedIterator for ChainIterator<'_, S> {}
