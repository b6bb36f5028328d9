use crate::constants::MINING_BATCH;
use crate::pow::ProofOfWork;
use crate::{Block, Hash, Transaction};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Searches nonces from 0 upward in batches of [`MINING_BATCH`], each batch
/// spread across the rayon pool. `find_first` keeps the result identical to a
/// sequential scan: the smallest satisfying nonce wins.
pub fn search_nonce(pow: &ProofOfWork, deadline: Option<Instant>) -> Option<(u64, Hash)> {
    search_from(pow, 0, deadline)
}

fn search_from(pow: &ProofOfWork, mut start: u64, deadline: Option<Instant>) -> Option<(u64, Hash)> {
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!(tried = start, "mining deadline reached");
            return None;
        }
        let end = start.saturating_add(MINING_BATCH);
        let found = (start..end)
            .into_par_iter()
            .find_first(|nonce| pow.is_valid_nonce(*nonce));
        if let Some(nonce) = found {
            return Some((nonce, pow.hash_with_nonce(nonce)));
        }
        if end == u64::MAX {
            // the half-open batches stop short of the last nonce
            return pow
                .is_valid_nonce(u64::MAX)
                .then(|| (u64::MAX, pow.hash_with_nonce(u64::MAX)));
        }
        start = end;
    }
}

/// Assembles a block over `transactions` linked to `previous_hash` and mines it.
/// Returns `None` if `deadline` passes first.
pub fn mine_block(
    transactions: Vec<Transaction>,
    previous_hash: Option<Hash>,
    deadline: Option<Instant>,
) -> Option<Block> {
    let mut block = Block::unmined(transactions, previous_hash);
    let pow = ProofOfWork::new(&block);
    let started = Instant::now();
    let (nonce, hash) = search_nonce(&pow, deadline)?;
    block.nonce = nonce;
    block.hash = hash;

    info!(
        nonce,
        txs = block.transactions.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "mined block {}",
        hex::encode(hash)
    );
    Some(block)
}
