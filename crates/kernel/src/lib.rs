//! Proof-of-stake kernel validation.
//!
//! The kernel decides whether a coinstake transaction is a valid stake
//! proof and how the chain-wide stake modifier advances block by block.
//! Everything here is deterministic consensus code: for fixed inputs and
//! a fixed chain view, every node must compute bit-identical results.

pub mod modifier;
pub mod stake;
pub mod target;

pub use modifier::{compute_next_stake_modifier, kernel_stake_modifier, ModifierError};
pub use stake::{check_proof_of_stake, check_stake_kernel_hash, KernelError, StakeError, TargetError};
pub use target::{compact_to_u256, u256_to_compact, CompactError};

use stakd_chainstate::{
    BlockStore, ChainView, DifficultyProvider, SignatureVerifier, TxLookup, TxPositionIndex,
};
use stakd_consensus::ConsensusParams;

/// The collaborators one validation call reads through, composed once at
/// the call site and threaded by reference.
pub struct StakeContext<'a> {
    pub params: &'a ConsensusParams,
    pub chain: &'a dyn ChainView,
    pub blocks: &'a dyn BlockStore,
    pub txs: &'a dyn TxLookup,
    pub positions: &'a dyn TxPositionIndex,
    pub signatures: &'a dyn SignatureVerifier,
    pub difficulty: &'a dyn DifficultyProvider,
}
