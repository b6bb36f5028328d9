use crate::constants::{BYTE, HASH_BITS, HASH_SIZE, POW_DIFFICULTY};
use crate::{mine, Block, Hash};
use sha2::{Digest, Sha256};
use std::time::Instant;

/// `2^(256 - difficulty)` as a big-endian 256-bit integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target([u8; HASH_SIZE]);

impl Target {
    /// Difficulty is clamped to `1..=255` so the target fits in 256 bits.
    pub fn from_difficulty(difficulty: u32) -> Self {
        let shift = (HASH_BITS - difficulty.clamp(1, HASH_BITS - 1)) as usize;
        let mut bytes = [0u8; HASH_SIZE];
        bytes[HASH_SIZE - 1 - shift / BYTE] = 1 << (shift % BYTE);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Big-endian byte order makes lexicographic comparison numeric.
    pub fn is_met_by(&self, hash: &Hash) -> bool {
        *hash < self.0
    }
}

/// Proof-of-work over one block. The nonce-independent part of the preimage
/// (`previous_hash ‖ transactions_digest`) is computed once up front.
#[derive(Clone, Debug)]
pub struct ProofOfWork {
    prefix: Vec<u8>,
    difficulty: u32,
    target: Target,
}

impl ProofOfWork {
    pub fn new(block: &Block) -> Self {
        Self::with_difficulty(block, POW_DIFFICULTY)
    }

    pub fn with_difficulty(block: &Block, difficulty: u32) -> Self {
        let previous = block.previous_hash.as_ref().map_or(&[][..], |h| &h[..]);
        let mut prefix = Vec::with_capacity(previous.len() + HASH_SIZE);
        prefix.extend_from_slice(previous);
        prefix.extend_from_slice(&block.transactions_digest());
        Self {
            prefix,
            difficulty,
            target: Target::from_difficulty(difficulty),
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// `SHA-256(previous_hash ‖ transactions_digest ‖ be64(nonce) ‖ be64(difficulty))`
    pub fn hash_with_nonce(&self, nonce: u64) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(&self.prefix);
        hasher.update(nonce.to_be_bytes());
        hasher.update(u64::from(self.difficulty).to_be_bytes());
        hasher.finalize().into()
    }

    pub fn is_valid_nonce(&self, nonce: u64) -> bool {
        self.target.is_met_by(&self.hash_with_nonce(nonce))
    }

    /// Smallest nonce whose hash meets the target. `None` only if the whole
    /// nonce range is exhausted.
    pub fn run(&self) -> Option<(u64, Hash)> {
        mine::search_nonce(self, None)
    }

    /// As [`ProofOfWork::run`], but gives up once `deadline` has passed.
    pub fn run_until(&self, deadline: Instant) -> Option<(u64, Hash)> {
        mine::search_nonce(self, Some(deadline))
    }

    /// Recomputes the hash from the block's stored nonce and checks it against
    /// both the target and the stored hash.
    pub fn validate(&self, block: &Block) -> bool {
        let hash = self.hash_with_nonce(block.nonce);
        hash == block.hash && self.target.is_met_by(&hash)
    }
}

pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 8;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}
