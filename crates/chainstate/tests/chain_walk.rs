use stakd_chainstate::{
    BlockIndexEntry, BlockStore, ChainView, MemoryBlockStore, MemoryChain, StoreError,
};
use stakd_consensus::NULL_HASH256;
use stakd_primitives::{Block, BlockHeader};

fn entry(height: i32, seed: u8, prev: Option<u8>) -> BlockIndexEntry {
    BlockIndexEntry {
        height,
        hash: [seed; 32],
        prev_hash: prev.map(|p| [p; 32]),
        time: 1_000_000 + height as u32 * 60,
        stake_modifier: NULL_HASH256,
        hash_proof_of_stake: NULL_HASH256,
    }
}

fn three_block_chain() -> MemoryChain {
    let chain = MemoryChain::new();
    chain.push(entry(10, 1, None));
    chain.push(entry(11, 2, Some(1)));
    chain.push(entry(12, 3, Some(2)));
    chain
}

#[test]
fn walks_forward_and_back() {
    let chain = three_block_chain();

    let first = chain.lookup(&[1; 32]).expect("indexed");
    assert_eq!(first.height, 10);

    let second = chain.next(&first).expect("successor");
    assert_eq!(second.height, 11);
    assert_eq!(chain.prev(&second).expect("predecessor").hash, first.hash);

    let tip = chain.tip().expect("tip");
    assert_eq!(tip.height, 12);
    assert_eq!(chain.tip_height(), 12);
    assert!(chain.next(&tip).is_none());
    assert!(chain.prev(&first).is_none());
}

#[test]
fn unknown_hash_is_not_indexed() {
    let chain = three_block_chain();
    assert!(chain.lookup(&[9; 32]).is_none());
    assert!(!chain.set_stake_modifier(&[9; 32], [5; 32]));
}

#[test]
fn modifier_persistence_is_visible_to_lookup() {
    let chain = three_block_chain();
    assert!(chain.set_stake_modifier(&[2; 32], [0xaa; 32]));
    assert!(chain.set_proof_hash(&[2; 32], [0xbb; 32]));

    let entry = chain.lookup(&[2; 32]).expect("indexed");
    assert_eq!(entry.stake_modifier, [0xaa; 32]);
    assert_eq!(entry.hash_proof_of_stake, [0xbb; 32]);
    assert!(entry.has_stake_modifier());
}

#[test]
fn block_store_misses_are_not_found() {
    let store = MemoryBlockStore::new();
    let block = Block {
        header: BlockHeader {
            version: 1,
            prev_block: NULL_HASH256,
            merkle_root: NULL_HASH256,
            time: 1_000_000,
            bits: 0x1d00ffff,
            nonce: 0,
        },
        txs: Vec::new(),
    };
    let hash = block.hash();
    store.insert(block.clone());

    let mut indexed = entry(0, 0, None);
    indexed.hash = hash;
    assert_eq!(store.read_block(&indexed).expect("stored"), block);

    let missing = entry(1, 7, None);
    assert_eq!(
        store.read_block(&missing).expect_err("missing"),
        StoreError::NotFound
    );
}
