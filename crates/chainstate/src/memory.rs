//! In-memory collaborator implementations, used by tests and embedders
//! that keep the whole index resident.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use stakd_consensus::Hash256;
use stakd_primitives::{Block, Transaction};

use crate::blockindex::BlockIndexEntry;
use crate::view::{
    BlockStore, ChainView, DifficultyProvider, SignatureVerifier, StoreError, TxLookup,
    TxPositionIndex,
};

#[derive(Default)]
struct ChainInner {
    entries: Vec<BlockIndexEntry>,
    by_hash: HashMap<Hash256, usize>,
}

/// A contiguous run of the active chain starting at an arbitrary base
/// height. Interior `RwLock` so concurrent validation threads share one
/// snapshot-consistent view.
#[derive(Default)]
pub struct MemoryChain {
    inner: RwLock<ChainInner>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry; heights must be contiguous and the parent link
    /// must match the previous appended entry.
    pub fn push(&self, entry: BlockIndexEntry) {
        let mut inner = self.inner.write().expect("chain lock");
        if let Some(last) = inner.entries.last() {
            assert_eq!(entry.height, last.height + 1, "non-contiguous height");
            assert_eq!(
                entry.prev_hash,
                Some(last.hash),
                "parent link does not match chain"
            );
        }
        let slot = inner.entries.len();
        inner.by_hash.insert(entry.hash, slot);
        inner.entries.push(entry);
    }

    /// Persists a freshly computed stake modifier onto an indexed block.
    /// Returns false if the block is unknown.
    pub fn set_stake_modifier(&self, hash: &Hash256, modifier: Hash256) -> bool {
        let mut inner = self.inner.write().expect("chain lock");
        let Some(slot) = inner.by_hash.get(hash).copied() else {
            return false;
        };
        inner.entries[slot].stake_modifier = modifier;
        true
    }

    /// Persists the proof hash recorded for a proof-of-stake block.
    pub fn set_proof_hash(&self, hash: &Hash256, proof: Hash256) -> bool {
        let mut inner = self.inner.write().expect("chain lock");
        let Some(slot) = inner.by_hash.get(hash).copied() else {
            return false;
        };
        inner.entries[slot].hash_proof_of_stake = proof;
        true
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("chain lock").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_at_slot(&self, slot: usize) -> Option<BlockIndexEntry> {
        self.inner
            .read()
            .expect("chain lock")
            .entries
            .get(slot)
            .cloned()
    }

    fn slot_of(&self, hash: &Hash256) -> Option<usize> {
        self.inner
            .read()
            .expect("chain lock")
            .by_hash
            .get(hash)
            .copied()
    }
}

impl ChainView for MemoryChain {
    fn lookup(&self, hash: &Hash256) -> Option<BlockIndexEntry> {
        let slot = self.slot_of(hash)?;
        self.entry_at_slot(slot)
    }

    fn next(&self, entry: &BlockIndexEntry) -> Option<BlockIndexEntry> {
        let slot = self.slot_of(&entry.hash)?;
        self.entry_at_slot(slot + 1)
    }

    fn prev(&self, entry: &BlockIndexEntry) -> Option<BlockIndexEntry> {
        let slot = self.slot_of(&entry.hash)?;
        slot.checked_sub(1).and_then(|prev| self.entry_at_slot(prev))
    }

    fn tip(&self) -> Option<BlockIndexEntry> {
        self.inner
            .read()
            .expect("chain lock")
            .entries
            .last()
            .cloned()
    }
}

/// Block records held in memory behind a `Mutex`; the lock is scoped to
/// each read, mirroring the on-disk store's discipline.
#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: Mutex<HashMap<Hash256, Block>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, block: Block) {
        let mut blocks = self.blocks.lock().expect("block store lock");
        blocks.insert(block.hash(), block);
    }
}

impl BlockStore for MemoryBlockStore {
    fn read_block(&self, entry: &BlockIndexEntry) -> Result<Block, StoreError> {
        let blocks = self.blocks.lock().expect("block store lock");
        blocks.get(&entry.hash).cloned().ok_or(StoreError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryTxLookup {
    txs: Mutex<HashMap<Hash256, (Transaction, Hash256)>>,
}

impl MemoryTxLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tx: Transaction, block_hash: Hash256) {
        let mut txs = self.txs.lock().expect("tx lookup lock");
        txs.insert(tx.txid(), (tx, block_hash));
    }
}

impl TxLookup for MemoryTxLookup {
    fn find_transaction(&self, txid: &Hash256) -> Option<(Transaction, Hash256)> {
        let txs = self.txs.lock().expect("tx lookup lock");
        txs.get(txid).cloned()
    }
}

#[derive(Default)]
pub struct MemoryTxIndex {
    offsets: Mutex<HashMap<Hash256, u32>>,
}

impl MemoryTxIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, txid: Hash256, offset: u32) {
        let mut offsets = self.offsets.lock().expect("tx index lock");
        offsets.insert(txid, offset);
    }
}

impl TxPositionIndex for MemoryTxIndex {
    fn tx_offset(&self, txid: &Hash256) -> Option<u32> {
        let offsets = self.offsets.lock().expect("tx index lock");
        offsets.get(txid).copied()
    }
}

/// Fixed compact bits regardless of tip state.
pub struct StaticDifficulty {
    pub bits: u32,
}

impl DifficultyProvider for StaticDifficulty {
    fn next_required_target(&self, _tip: Option<&BlockIndexEntry>, _proof_of_stake: bool) -> u32 {
        self.bits
    }
}

pub struct AcceptAllSignatures;

impl SignatureVerifier for AcceptAllSignatures {
    fn verify_spend(
        &self,
        _prev_tx: &Transaction,
        _tx: &Transaction,
        _input_index: usize,
        _coinstake_mode: bool,
    ) -> bool {
        true
    }
}

pub struct RejectAllSignatures;

impl SignatureVerifier for RejectAllSignatures {
    fn verify_spend(
        &self,
        _prev_tx: &Transaction,
        _tx: &Transaction,
        _input_index: usize,
        _coinstake_mode: bool,
    ) -> bool {
        false
    }
}
