pub mod sled_store;

pub use sled_store::SledStore;

use ledger_core::{Chain, LedgerResult};
use std::path::Path;
use std::sync::Arc;

/// Creates a new chain in the sled directory at `path`, paying the genesis
/// reward to `address`.
pub fn create_chain<P: AsRef<Path>>(path: P, address: &str) -> LedgerResult<Chain<SledStore>> {
    let store = SledStore::open(path)?;
    Chain::initialize(Arc::new(store), address)
}

/// Opens the chain persisted at `path`. A missing directory is `NotFound`.
pub fn open_chain<P: AsRef<Path>>(path: P) -> LedgerResult<Chain<SledStore>> {
    let store = SledStore::open_existing(path)?;
    Chain::open(Arc::new(store))
}
