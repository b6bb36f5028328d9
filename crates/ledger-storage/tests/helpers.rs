#![allow(dead_code)]

use std::fs;

use ledger_core::Chain;
use ledger_storage::sled_store::SledStore;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

pub fn create_temp_dir() -> (TempDir, std::path::PathBuf) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("blocks");
    (temp_dir, db_path)
}

pub fn create_temp_store() -> (TempDir, Arc<SledStore>) {
    let (temp_dir, db_path) = create_temp_dir();
    let store = SledStore::open(&db_path).expect("Failed to open SledStore");
    (temp_dir, Arc::new(store))
}

pub fn create_temp_chain(address: &str) -> (TempDir, Chain<SledStore>) {
    let (temp_dir, store) = create_temp_store();
    let chain = Chain::initialize(store, address).expect("Failed to create chain");
    (temp_dir, chain)
}

pub fn teardown(temp_dir: TempDir) {
    let db_path = temp_dir.path().to_path_buf();
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    // Verify the directory is removed
    assert!(!db_path.exists(), "Database directory should be removed");
}
