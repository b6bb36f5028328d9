pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
pub const HASH_BITS: u32 = (HASH_SIZE * BYTE) as u32;

/// Leading zero bits every block hash must carry. Hashed into the PoW preimage.
pub const POW_DIFFICULTY: u32 = 18;
/// Nonces handed to the rayon pool per search round; deadlines are checked between rounds.
pub const MINING_BATCH: u64 = 1 << 16;

pub const COINBASE_REWARD: u64 = 100;
pub const GENESIS_MEMO: &str = "First Transaction from Initialising Chain";

/// Store key holding the hash of the latest block.
pub const TIP_KEY: &[u8] = b"lh";

const _: () = assert!(POW_DIFFICULTY > 0 && POW_DIFFICULTY < HASH_BITS);
