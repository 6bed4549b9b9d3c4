//! End-to-end proof-of-stake validation scenarios, including both
//! hard-fork boundaries.

use stakd_chainstate::{
    AcceptAllSignatures, BlockIndexEntry, ChainView, MemoryBlockStore, MemoryChain, MemoryTxIndex,
    MemoryTxLookup, RejectAllSignatures, SignatureVerifier, StaticDifficulty,
};
use stakd_consensus::forks::{KernelRules, LEGACY_HEADER_OFFSET};
use stakd_consensus::{consensus_params, ConsensusParams, Hash256, Network};
use stakd_kernel::{
    check_proof_of_stake, check_stake_kernel_hash, kernel_stake_modifier, KernelError,
    ModifierError, StakeContext, StakeError, TargetError,
};
use stakd_primitives::encoding::Encoder;
use stakd_primitives::hash::sha256d;
use stakd_primitives::{Block, BlockHeader, OutPoint, Transaction, TxIn, TxOut};

const STAKED_VALUE: i64 = 2_000_000_000;
const PREV_TX_OFFSET: u32 = 81;
const BLOCK_FROM_TIME: u32 = 1_600_000_000;
/// One day past the block, one hour past the mainnet minimum age.
const GOOD_TIME: u32 = BLOCK_FROM_TIME + 90_000;

/// Compact form of a target just under the proof-of-stake limit; any
/// reasonable kernel wins against it.
const EASY_BITS: u32 = 0x1e0fffff;
/// Decodes to 256; no kernel can win against it.
const TINY_BITS: u32 = 0x0400_0001;

fn synthetic_hash(tag: u64) -> Hash256 {
    let mut hash = [0u8; 32];
    hash[..8].copy_from_slice(&tag.to_le_bytes());
    hash[8] = 0x5a;
    hash
}

struct Harness {
    params: ConsensusParams,
    chain: MemoryChain,
    blocks: MemoryBlockStore,
    txs: MemoryTxLookup,
    positions: MemoryTxIndex,
    difficulty: StaticDifficulty,
    prev_tx: Transaction,
    block_from: Block,
}

/// A chain whose first entry is a real block holding the staked
/// transaction, extended with synthetic entries to the requested length.
fn harness(base_height: i32, length: usize, bits: u32) -> Harness {
    let params = consensus_params(Network::Mainnet);

    let prev_tx = Transaction {
        version: 1,
        time: BLOCK_FROM_TIME,
        vin: vec![TxIn::from_prevout(OutPoint::new(synthetic_hash(0xfeed), 0))],
        vout: vec![
            TxOut {
                value: 1_000_000_000,
                script_pubkey: vec![0x51],
            },
            TxOut {
                value: STAKED_VALUE,
                script_pubkey: vec![0x51],
            },
        ],
        lock_time: 0,
    };
    let block_from = Block {
        header: BlockHeader {
            version: 1,
            prev_block: synthetic_hash(0xa0),
            merkle_root: [0u8; 32],
            time: BLOCK_FROM_TIME,
            bits: 0x1d00ffff,
            nonce: 7,
        },
        txs: vec![prev_tx.clone()],
    };

    let chain = MemoryChain::new();
    chain.push(BlockIndexEntry {
        height: base_height,
        hash: block_from.hash(),
        prev_hash: None,
        time: BLOCK_FROM_TIME,
        stake_modifier: synthetic_hash(0x1000),
        hash_proof_of_stake: synthetic_hash(0x2000),
    });
    for slot in 1..length as u64 {
        chain.push(BlockIndexEntry {
            height: base_height + slot as i32,
            hash: synthetic_hash(slot),
            prev_hash: Some(if slot == 1 {
                block_from.hash()
            } else {
                synthetic_hash(slot - 1)
            }),
            time: BLOCK_FROM_TIME + slot as u32 * 60,
            stake_modifier: synthetic_hash(0x1000 + slot),
            hash_proof_of_stake: synthetic_hash(0x2000 + slot),
        });
    }

    let blocks = MemoryBlockStore::new();
    blocks.insert(block_from.clone());
    let txs = MemoryTxLookup::new();
    txs.insert(prev_tx.clone(), block_from.hash());
    let positions = MemoryTxIndex::new();
    positions.insert(prev_tx.txid(), PREV_TX_OFFSET);

    Harness {
        params,
        chain,
        blocks,
        txs,
        positions,
        difficulty: StaticDifficulty { bits },
        prev_tx,
        block_from,
    }
}

impl Harness {
    fn context<'a>(&'a self, signatures: &'a dyn SignatureVerifier) -> StakeContext<'a> {
        StakeContext {
            params: &self.params,
            chain: &self.chain,
            blocks: &self.blocks,
            txs: &self.txs,
            positions: &self.positions,
            signatures,
            difficulty: &self.difficulty,
        }
    }

    fn coinstake(&self, time: u32) -> Transaction {
        Transaction {
            version: 1,
            time,
            vin: vec![TxIn::from_prevout(OutPoint::new(self.prev_tx.txid(), 1))],
            vout: vec![
                TxOut::empty(),
                TxOut {
                    value: STAKED_VALUE + 500_000,
                    script_pubkey: vec![0x51],
                },
            ],
            lock_time: 0,
        }
    }

    fn rules_at(&self, height: i32) -> KernelRules {
        KernelRules::evaluate(&self.params, height, self.chain.tip_height())
    }
}

/// The kernel preimage computed independently of the implementation.
fn expected_proof_hash(
    modifier: &Hash256,
    block_time: u32,
    offset: u32,
    prev_tx_time: u32,
    prevout_index: u32,
    time_tx: u32,
) -> Hash256 {
    let mut encoder = Encoder::new();
    encoder.write_hash_le(modifier);
    encoder.write_u32_le(block_time);
    encoder.write_u32_le(offset);
    encoder.write_u32_le(prev_tx_time);
    encoder.write_u32_le(prevout_index);
    encoder.write_u32_le(time_tx);
    sha256d(&encoder.into_inner())
}

#[test]
fn kernel_hash_is_deterministic_and_matches_layout() {
    let h = harness(100, 8, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);
    let rules = h.rules_at(110);
    let prevout = OutPoint::new(h.prev_tx.txid(), 1);

    let first = check_stake_kernel_hash(
        &ctx,
        &rules,
        110,
        &h.block_from,
        PREV_TX_OFFSET,
        &h.prev_tx,
        &prevout,
        GOOD_TIME,
    )
    .expect("kernel ok");
    let second = check_stake_kernel_hash(
        &ctx,
        &rules,
        110,
        &h.block_from,
        PREV_TX_OFFSET,
        &h.prev_tx,
        &prevout,
        GOOD_TIME,
    )
    .expect("kernel ok");
    assert_eq!(first, second);

    let modifier = kernel_stake_modifier(&ctx, &h.block_from.hash()).expect("modifier");
    assert_eq!(
        first,
        expected_proof_hash(
            &modifier,
            BLOCK_FROM_TIME,
            PREV_TX_OFFSET,
            BLOCK_FROM_TIME,
            1,
            GOOD_TIME
        )
    );
}

#[test]
fn age_gate_is_monotonic() {
    let h = harness(100, 8, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);
    let rules = h.rules_at(110);
    let prevout = OutPoint::new(h.prev_tx.txid(), 1);
    let min_age = h.params.stake_min_age as u32;

    let check = |time_tx: u32| {
        check_stake_kernel_hash(
            &ctx,
            &rules,
            110,
            &h.block_from,
            PREV_TX_OFFSET,
            &h.prev_tx,
            &prevout,
            time_tx,
        )
    };

    // Before the staked transaction itself.
    assert_eq!(
        check(BLOCK_FROM_TIME - 1).expect_err("too early"),
        KernelError::TimestampViolation
    );
    // Past the transaction but short of the minimum age.
    assert_eq!(
        check(BLOCK_FROM_TIME + min_age - 1).expect_err("too young"),
        KernelError::MinimumAgeViolation
    );
    // Exactly at the minimum age the weight is still zero.
    assert_eq!(
        check(BLOCK_FROM_TIME + min_age).expect_err("zero weight"),
        KernelError::NonPositiveWeight
    );
    // One second of weight suffices below the target fork.
    check(BLOCK_FROM_TIME + min_age + 1).expect("kernel ok");
}

#[test]
fn kernel_rejects_out_of_range_prevout() {
    let h = harness(100, 8, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);
    let rules = h.rules_at(110);
    let prevout = OutPoint::new(h.prev_tx.txid(), 9);

    assert_eq!(
        check_stake_kernel_hash(
            &ctx,
            &rules,
            110,
            &h.block_from,
            PREV_TX_OFFSET,
            &h.prev_tx,
            &prevout,
            GOOD_TIME,
        )
        .expect_err("bad prevout"),
        KernelError::PrevoutOutOfRange
    );
}

#[test]
fn kernel_propagates_modifier_failures() {
    // Four entries cannot satisfy the five-block walk.
    let h = harness(100, 4, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);
    let rules = h.rules_at(110);
    let prevout = OutPoint::new(h.prev_tx.txid(), 1);

    let err = check_stake_kernel_hash(
        &ctx,
        &rules,
        110,
        &h.block_from,
        PREV_TX_OFFSET,
        &h.prev_tx,
        &prevout,
        GOOD_TIME,
    )
    .expect_err("shallow chain");
    assert_eq!(
        err,
        KernelError::ModifierUnavailable(ModifierError::InsufficientDepth)
    );
    assert!(err.is_transient());

    // A block the index has never seen.
    let h = harness(100, 8, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);
    let rules = h.rules_at(110);
    let mut foreign = h.block_from.clone();
    foreign.header.nonce = 999;
    let err = check_stake_kernel_hash(
        &ctx,
        &rules,
        110,
        &foreign,
        PREV_TX_OFFSET,
        &h.prev_tx,
        &prevout,
        GOOD_TIME,
    )
    .expect_err("unindexed block");
    assert_eq!(
        err,
        KernelError::ModifierUnavailable(ModifierError::NotIndexed)
    );
}

#[test]
fn target_comparison_switches_exactly_at_fork_height() {
    let h = harness(100, 8, TINY_BITS);
    let ctx = h.context(&AcceptAllSignatures);
    let fork = h.params.stake_modifier_fork_height;
    let prevout = OutPoint::new(h.prev_tx.txid(), 1);

    // At the fork height itself the impossible target is never consulted.
    let at_fork = check_stake_kernel_hash(
        &ctx,
        &h.rules_at(fork),
        fork,
        &h.block_from,
        PREV_TX_OFFSET,
        &h.prev_tx,
        &prevout,
        GOOD_TIME,
    )
    .expect("no target check at fork height");

    // One block above it the same kernel loses to the target.
    let err = check_stake_kernel_hash(
        &ctx,
        &h.rules_at(fork + 1),
        fork + 1,
        &h.block_from,
        PREV_TX_OFFSET,
        &h.prev_tx,
        &prevout,
        GOOD_TIME,
    )
    .expect_err("tiny target");
    assert_eq!(err, KernelError::TargetNotMet);
    assert!(!err.is_transient());

    // Against a winnable target the raw proof hash is identical on both
    // sides of the fork: the gate changes the verdict, not the hash.
    let h = harness(100, 8, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);
    let above_fork = check_stake_kernel_hash(
        &ctx,
        &h.rules_at(fork + 1),
        fork + 1,
        &h.block_from,
        PREV_TX_OFFSET,
        &h.prev_tx,
        &prevout,
        GOOD_TIME,
    )
    .expect("easy target");
    assert_eq!(above_fork, at_fork);
}

#[test]
fn malformed_targets_are_rejected_above_fork() {
    let fork = consensus_params(Network::Mainnet).stake_modifier_fork_height;
    let prevout_index = 1u32;

    let cases = [
        (0x0180_0001, TargetError::Negative),
        (0x0000_0000, TargetError::Zero),
        (0x207f_ffff, TargetError::AboveLimit),
        (0x2300_ffff, TargetError::Overflow),
    ];
    for (bits, expected) in cases {
        let h = harness(100, 8, bits);
        let ctx = h.context(&AcceptAllSignatures);
        let prevout = OutPoint::new(h.prev_tx.txid(), prevout_index);
        let err = check_stake_kernel_hash(
            &ctx,
            &h.rules_at(fork + 1),
            fork + 1,
            &h.block_from,
            PREV_TX_OFFSET,
            &h.prev_tx,
            &prevout,
            GOOD_TIME,
        )
        .expect_err("bad target");
        assert_eq!(err, KernelError::InvalidTarget(expected));
    }
}

#[test]
fn validator_applies_legacy_offset_below_its_fork() {
    let h = harness(100, 8, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);
    let coinstake = h.coinstake(GOOD_TIME);

    // Height 110 sits below both forks: no target check, offset + 80.
    let proof = check_proof_of_stake(&ctx, 110, &coinstake).expect("stake ok");
    let modifier = kernel_stake_modifier(&ctx, &h.block_from.hash()).expect("modifier");
    assert_eq!(
        proof,
        expected_proof_hash(
            &modifier,
            BLOCK_FROM_TIME,
            PREV_TX_OFFSET + LEGACY_HEADER_OFFSET,
            BLOCK_FROM_TIME,
            1,
            GOOD_TIME
        )
    );
}

#[test]
fn offset_correction_switches_exactly_at_its_fork_height() {
    let params = consensus_params(Network::Mainnet);
    let fork = params.tx_offset_fork_height;
    // Tip above the modifier fork: the selector needs 180 forward links.
    let h = harness(fork - 175, 185, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);
    let coinstake = h.coinstake(GOOD_TIME);
    let modifier = kernel_stake_modifier(&ctx, &h.block_from.hash()).expect("modifier");

    let below = check_proof_of_stake(&ctx, fork - 1, &coinstake).expect("stake ok");
    assert_eq!(
        below,
        expected_proof_hash(
            &modifier,
            BLOCK_FROM_TIME,
            PREV_TX_OFFSET + LEGACY_HEADER_OFFSET,
            BLOCK_FROM_TIME,
            1,
            GOOD_TIME
        )
    );

    let at_fork = check_proof_of_stake(&ctx, fork, &coinstake).expect("stake ok");
    assert_eq!(
        at_fork,
        expected_proof_hash(
            &modifier,
            BLOCK_FROM_TIME,
            PREV_TX_OFFSET,
            BLOCK_FROM_TIME,
            1,
            GOOD_TIME
        )
    );

    assert_ne!(below, at_fork);
}

#[test]
fn validator_rejects_structural_failures() {
    let h = harness(100, 8, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);

    // Not a coinstake at all.
    let plain = Transaction {
        version: 1,
        time: GOOD_TIME,
        vin: vec![TxIn::from_prevout(OutPoint::new(h.prev_tx.txid(), 1))],
        vout: vec![TxOut {
            value: 1,
            script_pubkey: vec![0x51],
        }],
        lock_time: 0,
    };
    assert_eq!(
        check_proof_of_stake(&ctx, 110, &plain).expect_err("not coinstake"),
        StakeError::NotCoinstake
    );

    // Kernel input spending a transaction nobody has seen.
    let mut orphan = h.coinstake(GOOD_TIME);
    orphan.vin[0].prevout = OutPoint::new(synthetic_hash(0xbeef), 0);
    let err = check_proof_of_stake(&ctx, 110, &orphan).expect_err("unknown prev");
    assert_eq!(err, StakeError::PrevTxNotFound);
    assert!(err.is_transient());

    // A failed signature is fatal, not transient.
    let rejecting = RejectAllSignatures;
    let ctx = h.context(&rejecting);
    let err = check_proof_of_stake(&ctx, 110, &h.coinstake(GOOD_TIME)).expect_err("bad sig");
    assert_eq!(err, StakeError::SignatureInvalid);
    assert!(!err.is_transient());
}

#[test]
fn validator_surfaces_lookup_and_storage_gaps() {
    let h = harness(100, 8, EASY_BITS);

    // Source transaction claims a containing block the index lacks.
    let mut wandering = h.prev_tx.clone();
    wandering.lock_time = 1;
    h.txs.insert(wandering.clone(), synthetic_hash(0xcafe));
    h.positions.insert(wandering.txid(), PREV_TX_OFFSET);
    let mut coinstake = h.coinstake(GOOD_TIME);
    coinstake.vin[0].prevout = OutPoint::new(wandering.txid(), 1);
    let ctx = h.context(&AcceptAllSignatures);
    assert_eq!(
        check_proof_of_stake(&ctx, 110, &coinstake).expect_err("unindexed"),
        StakeError::NotIndexed
    );

    // Indexed block whose record is missing from storage.
    let mut stranded = h.prev_tx.clone();
    stranded.lock_time = 2;
    h.txs.insert(stranded.clone(), synthetic_hash(3));
    h.positions.insert(stranded.txid(), PREV_TX_OFFSET);
    let mut coinstake = h.coinstake(GOOD_TIME);
    coinstake.vin[0].prevout = OutPoint::new(stranded.txid(), 1);
    let ctx = h.context(&AcceptAllSignatures);
    let err = check_proof_of_stake(&ctx, 110, &coinstake).expect_err("no record");
    assert_eq!(err, StakeError::BlockReadFailed);
    assert!(err.is_transient());

    // Known transaction with no position index entry yet.
    let mut unplaced = h.prev_tx.clone();
    unplaced.lock_time = 3;
    h.txs.insert(unplaced.clone(), h.block_from.hash());
    let mut coinstake = h.coinstake(GOOD_TIME);
    coinstake.vin[0].prevout = OutPoint::new(unplaced.txid(), 1);
    let ctx = h.context(&AcceptAllSignatures);
    assert_eq!(
        check_proof_of_stake(&ctx, 110, &coinstake).expect_err("no position"),
        StakeError::PrevTxNotFound
    );
}

#[test]
fn validator_wraps_kernel_failures_with_cause() {
    let h = harness(100, 8, EASY_BITS);
    let ctx = h.context(&AcceptAllSignatures);

    // Candidate younger than the minimum age.
    let eager = h.coinstake(BLOCK_FROM_TIME + 600);
    assert_eq!(
        check_proof_of_stake(&ctx, 110, &eager).expect_err("too young"),
        StakeError::KernelCheckFailed(KernelError::MinimumAgeViolation)
    );

    // Candidate predating its own stake.
    let backwards = h.coinstake(BLOCK_FROM_TIME - 600);
    assert_eq!(
        check_proof_of_stake(&ctx, 110, &backwards).expect_err("backwards"),
        StakeError::KernelCheckFailed(KernelError::TimestampViolation)
    );
}
