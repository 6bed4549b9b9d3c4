//! Stake modifier derivation.
//!
//! The modifier stops an output's owner from precomputing future stake
//! proofs at confirmation time: the kernel must hash against a modifier
//! selected a lookahead interval *after* the block holding the staked
//! output, so the entropy did not exist yet when the output confirmed.

use std::fmt;

use stakd_chainstate::BlockIndexEntry;
use stakd_consensus::{forks, hash256_to_hex, Hash256, NULL_HASH256};
use stakd_primitives::encoding::Encoder;
use stakd_primitives::hash::sha256d;
use stakd_primitives::Transaction;

use crate::StakeContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifierError {
    /// The reference block is not in the active-chain index yet.
    NotIndexed,
    /// The chain does not extend far enough past the reference block, or
    /// the selected block lacks two indexed ancestors.
    InsufficientDepth,
    /// The kernel input's source transaction is not visible on the
    /// active chain yet.
    PrevTxNotFound,
    /// The source transaction's block record could not be read.
    BlockReadFailed,
    /// Null transaction with a previous index, or the reverse. A caller
    /// bug, not a chain condition.
    InvalidGenesisState,
}

impl ModifierError {
    /// Whether the caller should simply retry once the chain has caught
    /// up, as opposed to rejecting the candidate outright.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ModifierError::NotIndexed
                | ModifierError::InsufficientDepth
                | ModifierError::PrevTxNotFound
                | ModifierError::BlockReadFailed
        )
    }
}

impl fmt::Display for ModifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierError::NotIndexed => write!(f, "reference block not indexed"),
            ModifierError::InsufficientDepth => {
                write!(f, "chain too shallow past the reference block")
            }
            ModifierError::PrevTxNotFound => write!(f, "previous transaction not on active chain"),
            ModifierError::BlockReadFailed => write!(f, "failed to read source block"),
            ModifierError::InvalidGenesisState => {
                write!(f, "null transaction and previous index disagree")
            }
        }
    }
}

impl std::error::Error for ModifierError {}

/// Double-SHA256 over the (modifier, proof-hash) pairs of three
/// consecutive chain positions, newest first. Both modifier paths feed
/// this same stream so the layout cannot drift between them.
fn modifier_digest(
    newest: &BlockIndexEntry,
    parent: &BlockIndexEntry,
    grandparent: &BlockIndexEntry,
) -> Hash256 {
    let mut encoder = Encoder::new();
    for entry in [newest, parent, grandparent] {
        encoder.write_hash_le(&entry.stake_modifier);
        encoder.write_hash_le(&entry.hash_proof_of_stake);
    }
    sha256d(&encoder.into_inner())
}

/// Selects the stake modifier for a kernel whose staked output confirmed
/// in the block `block_from_hash`: walk the lookahead distance forward
/// from that block and hash the ancestry of the block found there.
///
/// The lookahead is decided by the *current tip* height. Running out of
/// forward links is expected during initial sync.
pub fn kernel_stake_modifier(
    ctx: &StakeContext,
    block_from_hash: &Hash256,
) -> Result<Hash256, ModifierError> {
    let Some(mut cursor) = ctx.chain.lookup(block_from_hash) else {
        stakd_log::log_debug!(
            "stake modifier: block {} not indexed",
            hash256_to_hex(block_from_hash)
        );
        return Err(ModifierError::NotIndexed);
    };

    let mut blocks_to_go = forks::modifier_lookahead(ctx.params, ctx.chain.tip_height());
    while blocks_to_go > 0 {
        match ctx.chain.next(&cursor) {
            Some(next) => {
                cursor = next;
                blocks_to_go -= 1;
            }
            None => break,
        }
    }
    if blocks_to_go > 0 {
        stakd_log::log_debug!(
            "stake modifier: ran out of indexes with {} blocks still to go",
            blocks_to_go
        );
        return Err(ModifierError::InsufficientDepth);
    }

    let parent = ctx
        .chain
        .prev(&cursor)
        .ok_or(ModifierError::InsufficientDepth)?;
    let grandparent = ctx
        .chain
        .prev(&parent)
        .ok_or(ModifierError::InsufficientDepth)?;

    Ok(modifier_digest(&cursor, &parent, &grandparent))
}

/// Computes the modifier a new block stores, given the index entry of its
/// parent and the transaction that classifies it.
///
/// The coinbase path hashes the parent's own ancestry directly; it seeds
/// the very first modifiers before enough forward depth exists. The
/// coinstake path resolves the kernel input's source block and goes
/// through [`kernel_stake_modifier`]. The asymmetry is deliberate and
/// preserved from the chain's history.
pub fn compute_next_stake_modifier(
    ctx: &StakeContext,
    prev_index: Option<&BlockIndexEntry>,
    tx: &Transaction,
) -> Result<Hash256, ModifierError> {
    if tx.is_null() {
        // Genesis stores the null modifier by definition.
        return match prev_index {
            None => Ok(NULL_HASH256),
            Some(_) => Err(ModifierError::InvalidGenesisState),
        };
    }

    let Some(prev) = prev_index else {
        return Err(ModifierError::InvalidGenesisState);
    };

    if tx.is_coinbase() {
        // The first three blocks lack the ancestry to seed a modifier
        // and keep it null.
        let Some(parent) = ctx.chain.prev(prev) else {
            return Ok(NULL_HASH256);
        };
        let Some(grandparent) = ctx.chain.prev(&parent) else {
            return Ok(NULL_HASH256);
        };
        return Ok(modifier_digest(prev, &parent, &grandparent));
    }

    let Some(kernel_input) = tx.vin.first() else {
        return Err(ModifierError::InvalidGenesisState);
    };

    let Some((_, containing_hash)) = ctx.txs.find_transaction(&kernel_input.prevout.hash) else {
        // May occur during initial download.
        stakd_log::log_debug!(
            "compute next stake modifier: previous tx {} not found",
            hash256_to_hex(&kernel_input.prevout.hash)
        );
        return Err(ModifierError::PrevTxNotFound);
    };

    let Some(index) = ctx.chain.lookup(&containing_hash) else {
        return Err(ModifierError::NotIndexed);
    };

    let block = ctx.blocks.read_block(&index).map_err(|err| {
        stakd_log::log_debug!(
            "compute next stake modifier: read block {} failed: {}",
            hash256_to_hex(&index.hash),
            err
        );
        ModifierError::BlockReadFailed
    })?;

    kernel_stake_modifier(ctx, &block.hash())
}
