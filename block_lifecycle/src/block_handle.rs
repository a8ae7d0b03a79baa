use std::sync::{Arc, Weak};

use anyhow::{anyhow, bail, Result};
use derive_more::Debug;
use log::error;

use crate::{
    block::{Block, BlockContext, BlockId, WithVerifyContext},
    error::Error,
    lifecycle_state::LifecycleState,
};

/// A [`Block`] whose verification and decision move it between the caches of a
/// [`LifecycleState`].
///
/// Verification failures are returned as-is and leave no trace in the caches, because the failure
/// may be temporary and the block may become valid later.
///
/// `accept` and `reject` update the caches *before* delegating to the block.
/// If the block then fails to accept or reject, the caches already consider it decided
/// (and, for `accept`, the tip already points at it) while the VM does not.
/// That state is not rolled back. The error is logged and returned unchanged, and the node is
/// expected to treat it as fatal.
#[derive(Debug)]
#[debug("BlockHandle({block_id:?})")]
pub struct BlockHandle {
    block_id: BlockId,
    block: Arc<dyn Block>,
    state: Weak<LifecycleState>,
}

impl BlockHandle {
    pub(crate) fn new(block: Arc<dyn Block>, state: Weak<LifecycleState>) -> Self {
        Self {
            block_id: block.id(),
            block,
            state,
        }
    }

    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.block_id
    }

    #[must_use]
    pub fn parent_id(&self) -> BlockId {
        self.block.parent_id()
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.block.height()
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.block.bytes()
    }

    #[must_use]
    pub const fn block(&self) -> &Arc<dyn Block> {
        &self.block
    }

    /// Verifying a block that is already verified or decided is a caller error.
    /// The block is not consulted in that case.
    pub async fn verify(self: &Arc<Self>) -> Result<()> {
        let state = self.state()?;

        state.ensure_verifiable(self.block_id)?;

        self.block.verify().await?;

        state.mark_verified(self)
    }

    /// Uses context-aware verification if the block supports it and asks for it.
    /// Falls back to [`BlockHandle::verify`] otherwise.
    pub async fn verify_with_context(self: &Arc<Self>, context: &BlockContext) -> Result<()> {
        match self.block.as_verify_with_context() {
            Some(block) => self.verify_with_capability(block, context).await,
            None => self.verify().await,
        }
    }

    /// Like [`BlockHandle::verify_with_context`], but fails if the block does not support
    /// context-aware verification at all.
    pub async fn verify_with_required_context(
        self: &Arc<Self>,
        context: &BlockContext,
    ) -> Result<()> {
        let Some(block) = self.block.as_verify_with_context() else {
            bail!(Error::VerifyContextUnsupported {
                block_id: self.block_id,
            });
        };

        self.verify_with_capability(block, context).await
    }

    /// Does not touch the caches.
    pub async fn should_verify_with_context(&self) -> Result<bool> {
        match self.block.as_verify_with_context() {
            Some(block) => block.should_verify_with_context().await,
            None => Ok(false),
        }
    }

    pub async fn accept(self: &Arc<Self>) -> Result<()> {
        self.state()?.mark_accepted(self)?;

        self.block.accept().await.inspect_err(|error| {
            error!(
                "block {:?} is cached as accepted but the VM failed to accept it: {error:?}",
                self.block_id,
            )
        })
    }

    pub async fn reject(self: &Arc<Self>) -> Result<()> {
        self.state()?.mark_rejected(self)?;

        self.block.reject().await.inspect_err(|error| {
            error!(
                "block {:?} is cached as rejected but the VM failed to reject it: {error:?}",
                self.block_id,
            )
        })
    }

    /// Returns both children of an oracle block, cached the same way as freshly parsed blocks.
    pub async fn options(&self) -> Result<[Arc<Self>; 2]> {
        let Some(oracle) = self.block.as_oracle() else {
            bail!(Error::NotOracle {
                block_id: self.block_id,
            });
        };

        let [first, second] = oracle.options().await?;
        let state = self.state()?;

        Ok([state.track(first)?, state.track(second)?])
    }

    async fn verify_with_capability(
        self: &Arc<Self>,
        block: &dyn WithVerifyContext,
        context: &BlockContext,
    ) -> Result<()> {
        if !block.should_verify_with_context().await? {
            return self.verify().await;
        }

        let state = self.state()?;

        state.ensure_verifiable(self.block_id)?;

        block.verify_with_context(context).await?;

        state.mark_verified(self)
    }

    fn state(&self) -> Result<Arc<LifecycleState>> {
        self.state.upgrade().ok_or_else(|| {
            anyhow!(Error::StateReleased {
                block_id: self.block_id,
            })
        })
    }
}
