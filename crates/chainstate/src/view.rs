//! Collaborator traits consumed by the stake kernel.
//!
//! The kernel never touches disk, the network, or cryptography directly;
//! every external fact arrives through one of these seams. Implementations
//! are injected per call, so validation has no hidden global state.

use std::fmt;

use stakd_consensus::Hash256;
use stakd_primitives::{Block, Transaction};

use crate::blockindex::BlockIndexEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record for the requested block.
    NotFound,
    /// The stored record exists but cannot be used.
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "block record not found"),
            StoreError::Corrupt(message) => write!(f, "corrupt block record: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// One logical view of the active chain. Lookups and link traversal must
/// be consistent with a single chain snapshot at the time of each call.
pub trait ChainView {
    fn lookup(&self, hash: &Hash256) -> Option<BlockIndexEntry>;

    /// Successor of `entry` on the active chain, if any.
    fn next(&self, entry: &BlockIndexEntry) -> Option<BlockIndexEntry>;

    /// Predecessor of `entry` on the active chain, if any.
    fn prev(&self, entry: &BlockIndexEntry) -> Option<BlockIndexEntry>;

    fn tip(&self) -> Option<BlockIndexEntry>;

    fn tip_height(&self) -> i32 {
        self.tip().map(|entry| entry.height).unwrap_or(-1)
    }
}

/// Block record retrieval. Implementations take their own lock for the
/// minimal span covering the read; callers never hold it across hashing.
pub trait BlockStore {
    fn read_block(&self, entry: &BlockIndexEntry) -> Result<Block, StoreError>;
}

/// Confirmed-transaction lookup. Returns the transaction and the hash of
/// its containing block; `None` while the chain is still syncing.
pub trait TxLookup {
    fn find_transaction(&self, txid: &Hash256) -> Option<(Transaction, Hash256)>;
}

/// Byte offset of a transaction inside its block. Consumed only for
/// hash-domain separation in the kernel preimage.
pub trait TxPositionIndex {
    fn tx_offset(&self, txid: &Hash256) -> Option<u32>;
}

/// Script/signature verification for one spend of `prev_tx` by `tx`.
pub trait SignatureVerifier {
    fn verify_spend(
        &self,
        prev_tx: &Transaction,
        tx: &Transaction,
        input_index: usize,
        coinstake_mode: bool,
    ) -> bool;
}

/// Compact difficulty bits the next block must meet, from the external
/// retarget algorithm. `tip` is `None` before any block is indexed.
pub trait DifficultyProvider {
    fn next_required_target(&self, tip: Option<&BlockIndexEntry>, proof_of_stake: bool) -> u32;
}
