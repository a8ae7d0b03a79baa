use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::block::{Block, BlockContext, BlockId};

/// Block source backing a [`ChainState`](crate::ChainState).
#[async_trait]
pub trait ChainVm: Send + Sync {
    /// Returns `Ok(None)` if the VM does not know the block.
    async fn get_block(&self, block_id: BlockId) -> Result<Option<Arc<dyn Block>>>;

    async fn parse_block(&self, bytes: &[u8]) -> Result<Arc<dyn Block>>;

    async fn build_block(&self) -> Result<Arc<dyn Block>>;

    /// VMs that do not build differently under a context can rely on the default.
    async fn build_block_with_context(&self, _context: &BlockContext) -> Result<Arc<dyn Block>> {
        self.build_block().await
    }

    /// Returns the ID of the accepted block at `height`, or `Ok(None)` if there is none.
    async fn get_block_id_at_height(&self, height: u64) -> Result<Option<BlockId>>;
}
