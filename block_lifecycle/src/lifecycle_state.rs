use core::time::Duration;
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use anyhow::{anyhow, bail, Result};
use eviction_cache::EvictionCache;
use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::{
    block::{Block, BlockId},
    block_handle::BlockHandle,
    cache_config::CacheConfig,
    error::Error,
    misc::{BlockStatus, CacheSizes},
};

struct Caches {
    unverified_blocks: EvictionCache<BlockId, Arc<BlockHandle>>,
    verified_blocks: HashMap<BlockId, Arc<BlockHandle>>,
    decided_blocks: EvictionCache<BlockId, Arc<BlockHandle>>,
    last_accepted_block: Arc<BlockHandle>,
}

impl Caches {
    fn get_cached(&mut self, block_id: BlockId) -> Option<Arc<BlockHandle>> {
        if let Some(handle) = self.verified_blocks.get(&block_id) {
            return Some(Arc::clone(handle));
        }

        if let Some(handle) = self.decided_blocks.get(&block_id) {
            return Some(Arc::clone(handle));
        }

        self.unverified_blocks.get(&block_id).map(Arc::clone)
    }

    fn status(&self, block_id: BlockId) -> BlockStatus {
        if self.verified_blocks.contains_key(&block_id) {
            BlockStatus::Processing
        } else if self.decided_blocks.contains(&block_id) {
            BlockStatus::Decided
        } else if self.unverified_blocks.contains(&block_id) {
            BlockStatus::Unverified
        } else {
            BlockStatus::Unknown
        }
    }

    fn put_unverified(&mut self, handle: Arc<BlockHandle>) {
        if let Some((evicted_id, _)) = self.unverified_blocks.put(handle.id(), handle) {
            debug!("evicted unverified block {evicted_id:?}");
        }
    }

    fn put_decided(&mut self, handle: Arc<BlockHandle>) {
        if let Some((evicted_id, _)) = self.decided_blocks.put(handle.id(), handle) {
            debug!("evicted decided block {evicted_id:?}");
        }
    }

    fn decide(&mut self, handle: &Arc<BlockHandle>) {
        let block_id = handle.id();

        self.verified_blocks.remove(&block_id);
        self.unverified_blocks.evict(&block_id);
        self.put_decided(Arc::clone(handle));
    }
}

/// Block caches shared by every [`BlockHandle`] created from the same state.
///
/// A block identifier is present in at most one of the unverified, verified and decided caches.
/// Once decided, an identifier never moves back.
/// The state only stores and evicts entries. Moves between caches are driven by [`BlockHandle`].
///
/// All caches and the last accepted block are guarded by a single lock.
/// Handles refer back to the state through [`Weak`] pointers, so dropping the last [`Arc`] to the
/// state releases every cached handle.
pub struct LifecycleState {
    caches: Mutex<Caches>,
    lock_timeout: Duration,
}

impl LifecycleState {
    /// `last_accepted_block` is the genesis block or whatever block the VM last accepted.
    /// It becomes the tip and is cached as decided.
    #[must_use]
    pub fn new(config: &CacheConfig, last_accepted_block: Arc<dyn Block>) -> Arc<Self> {
        Arc::new_cyclic(|state| {
            let last_accepted_block =
                Arc::new(BlockHandle::new(last_accepted_block, Weak::clone(state)));

            let mut decided_blocks = EvictionCache::new(config.decided_cache_size);
            decided_blocks.put(last_accepted_block.id(), Arc::clone(&last_accepted_block));

            Self {
                caches: Mutex::new(Caches {
                    unverified_blocks: EvictionCache::new(config.unverified_cache_size),
                    verified_blocks: HashMap::new(),
                    decided_blocks,
                    last_accepted_block,
                }),
                lock_timeout: config.lock_timeout,
            }
        })
    }

    /// Wraps `block` without caching it.
    #[must_use]
    pub fn wrap(self: &Arc<Self>, block: Arc<dyn Block>) -> Arc<BlockHandle> {
        Arc::new(BlockHandle::new(block, Arc::downgrade(self)))
    }

    /// Returns the cached handle for `block` if there is one.
    /// Otherwise wraps it and caches it as decided if it is not above the last accepted block,
    /// or as unverified if it is.
    pub fn track(self: &Arc<Self>, block: Arc<dyn Block>) -> Result<Arc<BlockHandle>> {
        let mut caches = self.try_lock()?;

        if let Some(handle) = caches.get_cached(block.id()) {
            return Ok(handle);
        }

        let handle = self.wrap(block);

        if handle.height() <= caches.last_accepted_block.height() {
            caches.put_decided(Arc::clone(&handle));
        } else {
            caches.put_unverified(Arc::clone(&handle));
        }

        Ok(handle)
    }

    /// Looks in the verified, decided and unverified caches, in that order.
    /// A hit counts as a use of the entry.
    pub fn get_cached(&self, block_id: BlockId) -> Result<Option<Arc<BlockHandle>>> {
        Ok(self.try_lock()?.get_cached(block_id))
    }

    pub fn unverified_block(&self, block_id: BlockId) -> Result<Option<Arc<BlockHandle>>> {
        Ok(self
            .try_lock()?
            .unverified_blocks
            .peek(&block_id)
            .map(Arc::clone))
    }

    pub fn verified_block(&self, block_id: BlockId) -> Result<Option<Arc<BlockHandle>>> {
        Ok(self
            .try_lock()?
            .verified_blocks
            .get(&block_id)
            .map(Arc::clone))
    }

    pub fn decided_block(&self, block_id: BlockId) -> Result<Option<Arc<BlockHandle>>> {
        Ok(self
            .try_lock()?
            .decided_blocks
            .peek(&block_id)
            .map(Arc::clone))
    }

    pub fn status(&self, block_id: BlockId) -> Result<BlockStatus> {
        Ok(self.try_lock()?.status(block_id))
    }

    pub fn is_processing(&self, block_id: BlockId) -> Result<bool> {
        Ok(self.try_lock()?.verified_blocks.contains_key(&block_id))
    }

    pub fn processing_count(&self) -> Result<usize> {
        Ok(self.try_lock()?.verified_blocks.len())
    }

    pub fn cache_sizes(&self) -> Result<CacheSizes> {
        let caches = self.try_lock()?;

        Ok(CacheSizes {
            unverified: caches.unverified_blocks.len(),
            verified: caches.verified_blocks.len(),
            decided: caches.decided_blocks.len(),
        })
    }

    pub fn last_accepted_block(&self) -> Result<Arc<BlockHandle>> {
        Ok(Arc::clone(&self.try_lock()?.last_accepted_block))
    }

    pub fn last_accepted(&self) -> Result<BlockId> {
        Ok(self.try_lock()?.last_accepted_block.id())
    }

    /// Replaces the tip outside of consensus, e.g. after state sync.
    ///
    /// Fails if any block is processing, since those blocks were verified against the old tip.
    /// Flushes the unverified and decided caches.
    pub fn set_last_accepted_block(
        self: &Arc<Self>,
        block: Arc<dyn Block>,
    ) -> Result<Arc<BlockHandle>> {
        let mut caches = self.try_lock()?;

        let count = caches.verified_blocks.len();

        if count > 0 {
            bail!(Error::BlocksProcessing { count });
        }

        let handle = self.wrap(block);

        warn!(
            "replacing last accepted block {:?} with {:?} at height {}",
            caches.last_accepted_block.id(),
            handle.id(),
            handle.height(),
        );

        caches.unverified_blocks.flush();
        caches.decided_blocks.flush();
        caches.put_decided(Arc::clone(&handle));
        caches.last_accepted_block = Arc::clone(&handle);

        Ok(handle)
    }

    /// Empties the unverified and decided caches.
    /// Processing blocks and the last accepted block stay cached.
    pub fn flush(&self) -> Result<()> {
        let mut caches = self.try_lock()?;

        caches.unverified_blocks.flush();
        caches.decided_blocks.flush();

        let last_accepted_block = Arc::clone(&caches.last_accepted_block);
        caches.put_decided(last_accepted_block);

        Ok(())
    }

    pub(crate) fn ensure_verifiable(&self, block_id: BlockId) -> Result<()> {
        match self.try_lock()?.status(block_id) {
            BlockStatus::Processing => bail!(Error::AlreadyVerified { block_id }),
            BlockStatus::Decided => bail!(Error::AlreadyDecided { block_id }),
            BlockStatus::Unknown | BlockStatus::Unverified => Ok(()),
        }
    }

    pub(crate) fn mark_verified(&self, handle: &Arc<BlockHandle>) -> Result<()> {
        let block_id = handle.id();
        let mut caches = self.try_lock()?;

        // The block may have been decided while its verification was in flight.
        if caches.decided_blocks.contains(&block_id) {
            bail!(Error::AlreadyDecided { block_id });
        }

        caches.unverified_blocks.evict(&block_id);
        caches.verified_blocks.insert(block_id, Arc::clone(handle));

        debug!("block {block_id:?} verified at height {}", handle.height());

        Ok(())
    }

    pub(crate) fn mark_accepted(&self, handle: &Arc<BlockHandle>) -> Result<()> {
        let mut caches = self.try_lock()?;

        caches.decide(handle);
        caches.last_accepted_block = Arc::clone(handle);

        debug!(
            "block {:?} accepted at height {}",
            handle.id(),
            handle.height(),
        );

        Ok(())
    }

    pub(crate) fn mark_rejected(&self, handle: &Arc<BlockHandle>) -> Result<()> {
        self.try_lock()?.decide(handle);

        debug!(
            "block {:?} rejected at height {}",
            handle.id(),
            handle.height(),
        );

        Ok(())
    }

    fn try_lock(&self) -> Result<MutexGuard<'_, Caches>> {
        let timeout = self.lock_timeout;

        self.caches.try_lock_for(timeout).ok_or_else(|| {
            let error = Error::LockTimeout { timeout };

            warn!("{error:?}");

            anyhow!(error)
        })
    }
}
