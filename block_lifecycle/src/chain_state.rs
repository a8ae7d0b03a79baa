use core::time::Duration;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use eviction_cache::EvictionCache;
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::{
    block::{Block, BlockContext, BlockId},
    block_handle::BlockHandle,
    cache_config::CacheConfig,
    chain_vm::ChainVm,
    error::Error,
    lifecycle_state::LifecycleState,
    misc::BlockStatus,
};

struct LookupCaches {
    missing_blocks: EvictionCache<BlockId, ()>,
    bytes_to_id: EvictionCache<Box<[u8]>, BlockId>,
}

/// Serves blocks to the consensus engine from the lifecycle caches, going to the VM only on a
/// miss.
///
/// Blocks the VM reported as unknown are remembered so repeated lookups do not reach the VM
/// again. Parsed bytes are mapped to block IDs so reparsing a cached block is free.
pub struct ChainState {
    lifecycle: Arc<LifecycleState>,
    vm: Arc<dyn ChainVm>,
    lookups: Mutex<LookupCaches>,
    lock_timeout: Duration,
}

impl ChainState {
    #[must_use]
    pub fn new(
        config: &CacheConfig,
        vm: Arc<dyn ChainVm>,
        last_accepted_block: Arc<dyn Block>,
    ) -> Self {
        Self {
            lifecycle: LifecycleState::new(config, last_accepted_block),
            vm,
            lookups: Mutex::new(LookupCaches {
                missing_blocks: EvictionCache::new(config.missing_cache_size),
                bytes_to_id: EvictionCache::new(config.bytes_to_id_cache_size),
            }),
            lock_timeout: config.lock_timeout,
        }
    }

    #[must_use]
    pub const fn lifecycle(&self) -> &Arc<LifecycleState> {
        &self.lifecycle
    }

    pub async fn get_block(&self, block_id: BlockId) -> Result<Arc<BlockHandle>> {
        if let Some(handle) = self.lifecycle.get_cached(block_id)? {
            return Ok(handle);
        }

        if self.is_missing(block_id)? {
            bail!(Error::NotFound { block_id });
        }

        let Some(block) = self.vm.get_block(block_id).await? else {
            self.record_missing(block_id)?;
            bail!(Error::NotFound { block_id });
        };

        self.lifecycle.track(block)
    }

    pub async fn parse_block(&self, bytes: &[u8]) -> Result<Arc<BlockHandle>> {
        if let Some(block_id) = self.cached_id(bytes)? {
            if let Some(handle) = self.lifecycle.get_cached(block_id)? {
                return Ok(handle);
            }
        }

        let block = self.vm.parse_block(bytes).await?;

        self.record_known(bytes, block.id())?;
        self.lifecycle.track(block)
    }

    pub async fn build_block(&self) -> Result<Arc<BlockHandle>> {
        let block = self.vm.build_block().await?;
        self.register_built(block)
    }

    pub async fn build_block_with_context(
        &self,
        context: &BlockContext,
    ) -> Result<Arc<BlockHandle>> {
        let block = self.vm.build_block_with_context(context).await?;
        self.register_built(block)
    }

    pub async fn get_block_id_at_height(&self, height: u64) -> Result<BlockId> {
        let last_accepted_block = self.lifecycle.last_accepted_block()?;

        if last_accepted_block.height() == height {
            return Ok(last_accepted_block.id());
        }

        self.vm
            .get_block_id_at_height(height)
            .await?
            .ok_or_else(|| anyhow!(Error::HeightNotFound { height }))
    }

    pub fn last_accepted(&self) -> Result<BlockId> {
        self.lifecycle.last_accepted()
    }

    pub fn last_accepted_block(&self) -> Result<Arc<BlockHandle>> {
        self.lifecycle.last_accepted_block()
    }

    pub fn is_processing(&self, block_id: BlockId) -> Result<bool> {
        self.lifecycle.is_processing(block_id)
    }

    pub fn status(&self, block_id: BlockId) -> Result<BlockStatus> {
        self.lifecycle.status(block_id)
    }

    pub fn set_last_accepted_block(&self, block: Arc<dyn Block>) -> Result<Arc<BlockHandle>> {
        let handle = self.lifecycle.set_last_accepted_block(block)?;
        self.flush_lookups()?;
        Ok(handle)
    }

    pub fn flush(&self) -> Result<()> {
        self.lifecycle.flush()?;
        self.flush_lookups()
    }

    fn register_built(&self, block: Arc<dyn Block>) -> Result<Arc<BlockHandle>> {
        debug!("built block {:?} at height {}", block.id(), block.height());

        self.record_known(block.bytes(), block.id())?;
        self.lifecycle.track(block)
    }

    fn is_missing(&self, block_id: BlockId) -> Result<bool> {
        Ok(self.try_lock()?.missing_blocks.contains(&block_id))
    }

    fn record_missing(&self, block_id: BlockId) -> Result<()> {
        debug!("block {block_id:?} is unknown to the VM");

        self.try_lock()?.missing_blocks.put(block_id, ());

        Ok(())
    }

    fn cached_id(&self, bytes: &[u8]) -> Result<Option<BlockId>> {
        Ok(self.try_lock()?.bytes_to_id.get(bytes).copied())
    }

    fn record_known(&self, bytes: &[u8], block_id: BlockId) -> Result<()> {
        let mut lookups = self.try_lock()?;

        lookups.missing_blocks.evict(&block_id);
        lookups.bytes_to_id.put(bytes.into(), block_id);

        Ok(())
    }

    fn flush_lookups(&self) -> Result<()> {
        let mut lookups = self.try_lock()?;

        lookups.missing_blocks.flush();
        lookups.bytes_to_id.flush();

        Ok(())
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, LookupCaches>> {
        let timeout = self.lock_timeout;

        self.lookups.try_lock_for(timeout).ok_or_else(|| {
            let error = Error::LockTimeout { timeout };

            warn!("{error:?}");

            anyhow!(error)
        })
    }
}
