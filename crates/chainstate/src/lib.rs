//! Chain-index views and the collaborator seams the stake kernel reads
//! through.

pub mod blockindex;
pub mod memory;
pub mod view;

pub use blockindex::BlockIndexEntry;
pub use memory::{
    AcceptAllSignatures, MemoryBlockStore, MemoryChain, MemoryTxIndex, MemoryTxLookup,
    RejectAllSignatures, StaticDifficulty,
};
pub use view::{
    BlockStore, ChainView, DifficultyProvider, SignatureVerifier, StoreError, TxLookup,
    TxPositionIndex,
};
