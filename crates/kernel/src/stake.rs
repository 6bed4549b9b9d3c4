//! Coinstake kernel validation.
//!
//! The kernel (input 0) of a coinstake must meet the protocol formula
//!
//! ```text
//! hash(modifier ++ blockFrom.time ++ txPrev.offset ++ txPrev.time
//!      ++ prevout.n ++ tx.time)
//! ```
//!
//! so the chance of staking is proportional to coin age. The modifier
//! scrambles the preimage with entropy from after the staked output
//! confirmed; the block time, offset, transaction time, and output index
//! keep simultaneous stakers from colliding on one preimage. Block and
//! transaction hashes stay out of the stream: they can be ground out in
//! vast quantities, which would degrade the scheme back into
//! proof-of-work.

use std::fmt;

use primitive_types::U256;
use stakd_consensus::{forks, hash256_to_hex, Hash256};
use stakd_primitives::encoding::Encoder;
use stakd_primitives::hash::sha256d;
use stakd_primitives::{Block, OutPoint, Transaction};

use crate::modifier::{kernel_stake_modifier, ModifierError};
use crate::target::{compact_to_u256, CompactError};
use crate::StakeContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetError {
    Negative,
    Overflow,
    Zero,
    AboveLimit,
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::Negative => write!(f, "target has negative sign bit"),
            TargetError::Overflow => write!(f, "target overflows 256 bits"),
            TargetError::Zero => write!(f, "target is zero"),
            TargetError::AboveLimit => write!(f, "target above proof-of-stake limit"),
        }
    }
}

impl std::error::Error for TargetError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Candidate timestamp earlier than the staked transaction's.
    TimestampViolation,
    /// The staked output has not reached the minimum age.
    MinimumAgeViolation,
    /// The kernel outpoint does not address an output of its source
    /// transaction.
    PrevoutOutOfRange,
    /// Age weight collapsed to zero or below.
    NonPositiveWeight,
    /// The stake modifier could not be selected.
    ModifierUnavailable(ModifierError),
    /// The active difficulty target is malformed or out of bounds; may
    /// point at a consensus-parameter bug rather than a bad candidate.
    InvalidTarget(TargetError),
    /// The reduced hash did not meet the target. An ordinary losing
    /// candidate, not a fault.
    TargetNotMet,
}

impl KernelError {
    pub fn is_transient(&self) -> bool {
        matches!(self, KernelError::ModifierUnavailable(cause) if cause.is_transient())
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::TimestampViolation => write!(f, "candidate time before stake time"),
            KernelError::MinimumAgeViolation => write!(f, "minimum stake age not reached"),
            KernelError::PrevoutOutOfRange => write!(f, "kernel outpoint out of range"),
            KernelError::NonPositiveWeight => write!(f, "non-positive time weight"),
            KernelError::ModifierUnavailable(cause) => {
                write!(f, "stake modifier unavailable: {cause}")
            }
            KernelError::InvalidTarget(cause) => write!(f, "invalid stake target: {cause}"),
            KernelError::TargetNotMet => write!(f, "kernel hash does not meet target"),
        }
    }
}

impl std::error::Error for KernelError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakeError {
    /// The candidate is not flagged as a coinstake at all.
    NotCoinstake,
    /// The kernel input's source transaction is not confirmed on the
    /// active chain yet.
    PrevTxNotFound,
    /// The source transaction's block is not in the index yet.
    NotIndexed,
    /// The source block record could not be read.
    BlockReadFailed,
    /// The kernel input does not validly spend the previous output.
    SignatureInvalid,
    KernelCheckFailed(KernelError),
}

impl StakeError {
    pub fn is_transient(&self) -> bool {
        match self {
            StakeError::PrevTxNotFound | StakeError::NotIndexed | StakeError::BlockReadFailed => {
                true
            }
            StakeError::KernelCheckFailed(cause) => cause.is_transient(),
            _ => false,
        }
    }
}

impl fmt::Display for StakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakeError::NotCoinstake => write!(f, "not a coinstake transaction"),
            StakeError::PrevTxNotFound => write!(f, "previous transaction not on active chain"),
            StakeError::NotIndexed => write!(f, "source block not indexed"),
            StakeError::BlockReadFailed => write!(f, "failed to read source block"),
            StakeError::SignatureInvalid => write!(f, "coinstake signature verification failed"),
            StakeError::KernelCheckFailed(cause) => write!(f, "kernel check failed: {cause}"),
        }
    }
}

impl std::error::Error for StakeError {}

/// Checks one kernel against the stake protocol. On success returns the
/// proof hash exactly as computed, before any target-comparison shifting;
/// that unshifted value is what the caller persists.
///
/// `rules` carries the height-gated behavior, evaluated once per
/// validation; `height` is the height the coinstake would occupy.
#[allow(clippy::too_many_arguments)]
pub fn check_stake_kernel_hash(
    ctx: &StakeContext,
    rules: &forks::KernelRules,
    height: i32,
    block_from: &Block,
    prev_tx_offset: u32,
    prev_tx: &Transaction,
    prevout: &OutPoint,
    time_tx: u32,
) -> Result<Hash256, KernelError> {
    if time_tx < prev_tx.time {
        return Err(KernelError::TimestampViolation);
    }

    let time_block_from = block_from.time();
    let min_age = ctx.params.stake_min_age;
    if i64::from(time_block_from) + min_age > i64::from(time_tx) {
        return Err(KernelError::MinimumAgeViolation);
    }

    let Some(staked_output) = prev_tx.vout.get(prevout.index as usize) else {
        return Err(KernelError::PrevoutOutOfRange);
    };
    let value_in = staked_output.value;

    // Weight starts from zero at the minimum age, so newly eligible coins
    // participate while aged coins keep their advantage.
    let time_weight = i64::from(time_tx) - i64::from(prev_tx.time) - min_age;
    if time_weight <= 0 {
        stakd_log::log_debug!("kernel check at height {}: time weight <= 0", height);
        return Err(KernelError::NonPositiveWeight);
    }

    let stake_modifier =
        kernel_stake_modifier(ctx, &block_from.hash()).map_err(KernelError::ModifierUnavailable)?;

    // Field order is consensus-critical.
    let mut encoder = Encoder::new();
    encoder.write_hash_le(&stake_modifier);
    encoder.write_u32_le(time_block_from);
    encoder.write_u32_le(prev_tx_offset);
    encoder.write_u32_le(prev_tx.time);
    encoder.write_u32_le(prevout.index);
    encoder.write_u32_le(time_tx);
    let hash_proof_of_stake = sha256d(&encoder.into_inner());

    if rules.target_reduction {
        check_reduced_target(ctx, height, &hash_proof_of_stake, time_weight, value_in)?;
    }

    Ok(hash_proof_of_stake)
}

/// Post-fork target competition: the proof hash, shifted right by a fixed
/// 20 bits and then by an amount derived from the stake's age-value
/// weight, must not exceed the required target. Older and larger stakes
/// produce fewer zero digits in the weight, a smaller shift, and so a
/// smaller reduction is needed to win.
fn check_reduced_target(
    ctx: &StakeContext,
    height: i32,
    hash_proof_of_stake: &Hash256,
    time_weight: i64,
    value_in: i64,
) -> Result<(), KernelError> {
    let tip = ctx.chain.tip();
    let bits = ctx.difficulty.next_required_target(tip.as_ref(), true);
    let target = compact_to_u256(bits).map_err(|err| {
        let cause = match err {
            CompactError::Negative => TargetError::Negative,
            CompactError::Overflow => TargetError::Overflow,
        };
        stakd_log::log_warn!("stake target bits {:#010x} rejected: {}", bits, cause);
        KernelError::InvalidTarget(cause)
    })?;

    if target.is_zero() {
        stakd_log::log_warn!("stake target bits {:#010x} decode to zero", bits);
        return Err(KernelError::InvalidTarget(TargetError::Zero));
    }
    if target > U256::from_little_endian(&ctx.params.pos_limit) {
        stakd_log::log_warn!("stake target bits {:#010x} above pos limit", bits);
        return Err(KernelError::InvalidTarget(TargetError::AboveLimit));
    }

    // Satoshis staked times seconds past the minimum age.
    let reduction = U256::from(time_weight as u64) * U256::from(value_in as u64);
    let shift = reduction_shift(reduction);

    // The pos limit is led by 20 zero bits; align the hash with it before
    // applying the weight-derived reduction.
    let reduced = (U256::from_little_endian(hash_proof_of_stake) >> 20) >> shift;

    if reduced > target {
        stakd_log::log_debug!(
            "kernel check at height {}: reduced hash {:x} > target {:x}",
            height,
            reduced,
            target
        );
        return Err(KernelError::TargetNotMet);
    }
    stakd_log::log_debug!(
        "kernel check at height {}: reduced hash {:x} <= target {:x}",
        height,
        reduced,
        target
    );
    Ok(())
}

/// Shift amount derived from the weight's magnitude: 64 minus the number
/// of zero digits in its full-width hexadecimal rendering.
fn reduction_shift(reduction: U256) -> u32 {
    let mut zero_digits = 0u32;
    for byte in reduction.to_big_endian() {
        if byte >> 4 == 0 {
            zero_digits += 1;
        }
        if byte & 0x0f == 0 {
            zero_digits += 1;
        }
    }
    64 - zero_digits
}

/// Validates a coinstake transaction end to end: structure, kernel-input
/// signature, and the kernel hash with the height-appropriate offset.
pub fn check_proof_of_stake(
    ctx: &StakeContext,
    height: i32,
    tx: &Transaction,
) -> Result<Hash256, StakeError> {
    if !tx.is_coinstake() {
        stakd_log::log_debug!(
            "check proof of stake called on non-coinstake {}",
            hash256_to_hex(&tx.txid())
        );
        return Err(StakeError::NotCoinstake);
    }

    // is_coinstake guarantees the kernel input exists.
    let kernel_input = &tx.vin[0];

    let Some((prev_tx, containing_hash)) = ctx.txs.find_transaction(&kernel_input.prevout.hash)
    else {
        // May occur during initial download.
        return Err(StakeError::PrevTxNotFound);
    };

    if !ctx.signatures.verify_spend(&prev_tx, tx, 0, true) {
        stakd_log::log_debug!(
            "signature verification failed on coinstake {}",
            hash256_to_hex(&tx.txid())
        );
        return Err(StakeError::SignatureInvalid);
    }

    let Some(index) = ctx.chain.lookup(&containing_hash) else {
        return Err(StakeError::NotIndexed);
    };
    let block = ctx.blocks.read_block(&index).map_err(|err| {
        stakd_log::log_debug!(
            "read block {} failed for coinstake {}: {}",
            hash256_to_hex(&index.hash),
            hash256_to_hex(&tx.txid()),
            err
        );
        StakeError::BlockReadFailed
    })?;

    // The position index trails the chain during sync; treat a miss the
    // same as a missing previous transaction.
    let Some(offset) = ctx.positions.tx_offset(&prev_tx.txid()) else {
        return Err(StakeError::PrevTxNotFound);
    };

    let rules = forks::KernelRules::evaluate(ctx.params, height, ctx.chain.tip_height());
    let offset = if rules.offset_correction {
        offset + forks::LEGACY_HEADER_OFFSET
    } else {
        offset
    };

    check_stake_kernel_hash(
        ctx,
        &rules,
        height,
        &block,
        offset,
        &prev_tx,
        &kernel_input.prevout,
        tx.time,
    )
    .map_err(|err| {
        stakd_log::log_debug!(
            "kernel check failed on coinstake {} at height {}: {}",
            hash256_to_hex(&tx.txid()),
            height,
            err
        );
        StakeError::KernelCheckFailed(err)
    })
}
