use core::time::Duration;

use thiserror::Error;

use crate::block::BlockId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("block {block_id:?} has already been verified")]
    AlreadyVerified { block_id: BlockId },
    #[error("block {block_id:?} has already been decided")]
    AlreadyDecided { block_id: BlockId },
    #[error("block {block_id:?} does not support verification with context")]
    VerifyContextUnsupported { block_id: BlockId },
    #[error("block {block_id:?} is not an oracle block")]
    NotOracle { block_id: BlockId },
    #[error("block {block_id:?} not found")]
    NotFound { block_id: BlockId },
    #[error("no accepted block at height {height}")]
    HeightNotFound { height: u64 },
    #[error("cannot replace last accepted block while {count} blocks are processing")]
    BlocksProcessing { count: usize },
    #[error("lifecycle state backing block {block_id:?} has been dropped")]
    StateReleased { block_id: BlockId },
    #[error("could not obtain cache lock in {} ms", timeout.as_millis())]
    LockTimeout { timeout: Duration },
}
