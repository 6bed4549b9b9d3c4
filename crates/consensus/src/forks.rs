//! Height-gated kernel rule changes.
//!
//! Two independent fork boundaries govern the stake kernel. The first
//! (`stake_modifier_fork_height`) switches the modifier lookahead from 5
//! to 180 blocks and, strictly above it, turns on the reduced-hash target
//! comparison. The second (`tx_offset_fork_height`) retires the legacy
//! 80-byte transaction-offset correction. Every rule is a total function
//! of height so historical blocks always re-validate identically.

use crate::params::ConsensusParams;

pub const SHORT_MODIFIER_LOOKAHEAD: i64 = 5;
pub const LONG_MODIFIER_LOOKAHEAD: i64 = 180;

/// Legacy serialized-header size added to transaction offsets below the
/// offset fork.
pub const LEGACY_HEADER_OFFSET: u32 = 80;

/// Forward distance the modifier selector walks, decided by the height of
/// the active tip rather than the reference block.
pub fn modifier_lookahead(params: &ConsensusParams, tip_height: i32) -> i64 {
    if tip_height >= params.stake_modifier_fork_height {
        LONG_MODIFIER_LOOKAHEAD
    } else {
        SHORT_MODIFIER_LOOKAHEAD
    }
}

/// Whether a kernel at this height must meet the reduced-hash target. At
/// exactly the fork height the raw hash is still the accepted proof.
pub fn uses_target_reduction(params: &ConsensusParams, height: i32) -> bool {
    height > params.stake_modifier_fork_height
}

/// Whether a kernel at this height adds the legacy 80-byte correction to
/// the stored transaction offset.
pub fn uses_offset_correction(params: &ConsensusParams, height: i32) -> bool {
    height < params.tx_offset_fork_height
}

/// The rule set for one validation, evaluated once and threaded through
/// the kernel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KernelRules {
    pub modifier_lookahead: i64,
    pub target_reduction: bool,
    pub offset_correction: bool,
}

impl KernelRules {
    /// `candidate_height` is the height the coinstake would occupy;
    /// `tip_height` is the current active tip, which alone decides the
    /// lookahead distance.
    pub fn evaluate(params: &ConsensusParams, candidate_height: i32, tip_height: i32) -> Self {
        Self {
            modifier_lookahead: modifier_lookahead(params, tip_height),
            target_reduction: uses_target_reduction(params, candidate_height),
            offset_correction: uses_offset_correction(params, candidate_height),
        }
    }
}
