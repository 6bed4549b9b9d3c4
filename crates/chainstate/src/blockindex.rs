//! Read-only view of one position on the active chain.

use stakd_consensus::{is_null_hash256, Hash256, NULL_HASH256};

/// Everything the kernel reads about an indexed block. Entries are owned
/// by the chain index; the kernel only derives new modifier values and
/// hands them back for persistence.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockIndexEntry {
    pub height: i32,
    pub hash: Hash256,
    pub prev_hash: Option<Hash256>,
    /// Header timestamp of the indexed block.
    pub time: u32,
    pub stake_modifier: Hash256,
    pub hash_proof_of_stake: Hash256,
}

impl BlockIndexEntry {
    pub fn genesis(hash: Hash256, time: u32) -> Self {
        Self {
            height: 0,
            hash,
            prev_hash: None,
            time,
            stake_modifier: NULL_HASH256,
            hash_proof_of_stake: NULL_HASH256,
        }
    }

    pub fn has_stake_modifier(&self) -> bool {
        !is_null_hash256(&self.stake_modifier)
    }
}
