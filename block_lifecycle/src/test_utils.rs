use core::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use std::{collections::HashMap, sync::Arc};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    block::{Block, BlockContext, BlockId, OracleBlock, WithVerifyContext},
    chain_vm::ChainVm,
};

#[derive(Debug, Error)]
pub enum TestError {
    #[error("block {block_id:?} failed verification")]
    VerificationFailed { block_id: BlockId },
    #[error("block {block_id:?} could not be decided")]
    DecisionFailed { block_id: BlockId },
    #[error("bytes do not encode a known block")]
    UnknownBytes,
    #[error("no block to build")]
    NothingToBuild,
}

#[derive(Default)]
pub struct TestBlock {
    id: BlockId,
    height: u64,
    bytes: Box<[u8]>,
    fail_verification: AtomicBool,
    fail_decisions: bool,
    verify_context: Option<bool>,
    verify_delay: Option<Duration>,
    options: Option<[Arc<TestBlock>; 2]>,
    verify_calls: AtomicUsize,
    accept_calls: AtomicUsize,
    reject_calls: AtomicUsize,
    verified_contexts: Mutex<Vec<BlockContext>>,
}

impl TestBlock {
    pub fn new(seed: u64, height: u64) -> Self {
        Self {
            id: BlockId::from_low_u64_be(seed),
            height,
            bytes: seed.to_be_bytes().into(),
            ..Self::default()
        }
    }

    /// `should_verify` is what `should_verify_with_context` will answer.
    pub const fn with_verify_context(mut self, should_verify: bool) -> Self {
        self.verify_context = Some(should_verify);
        self
    }

    pub const fn with_verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = Some(delay);
        self
    }

    pub const fn with_failing_decisions(mut self) -> Self {
        self.fail_decisions = true;
        self
    }

    pub fn with_options(mut self, options: [Arc<Self>; 2]) -> Self {
        self.options = Some(options);
        self
    }

    pub fn into_dyn(self) -> Arc<dyn Block> {
        Arc::new(self)
    }

    pub fn clone_dyn(self: &Arc<Self>) -> Arc<dyn Block> {
        Arc::<Self>::clone(self)
    }

    pub fn toggle_verification_failure(&self) {
        self.fail_verification.fetch_xor(true, Ordering::SeqCst);
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn accept_calls(&self) -> usize {
        self.accept_calls.load(Ordering::SeqCst)
    }

    pub fn reject_calls(&self) -> usize {
        self.reject_calls.load(Ordering::SeqCst)
    }

    pub fn verified_contexts(&self) -> Vec<BlockContext> {
        self.verified_contexts.lock().clone()
    }

    fn check_verification(&self) -> Result<()> {
        if self.fail_verification.load(Ordering::SeqCst) {
            bail!(TestError::VerificationFailed { block_id: self.id });
        }

        Ok(())
    }

    fn check_decision(&self) -> Result<()> {
        if self.fail_decisions {
            bail!(TestError::DecisionFailed { block_id: self.id });
        }

        Ok(())
    }
}

#[async_trait]
impl Block for TestBlock {
    fn id(&self) -> BlockId {
        self.id
    }

    fn parent_id(&self) -> BlockId {
        BlockId::zero()
    }

    fn height(&self) -> u64 {
        self.height
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    async fn verify(&self) -> Result<()> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.verify_delay {
            tokio::time::sleep(delay).await;
        }

        self.check_verification()
    }

    async fn accept(&self) -> Result<()> {
        self.accept_calls.fetch_add(1, Ordering::SeqCst);
        self.check_decision()
    }

    async fn reject(&self) -> Result<()> {
        self.reject_calls.fetch_add(1, Ordering::SeqCst);
        self.check_decision()
    }

    fn as_verify_with_context(&self) -> Option<&dyn WithVerifyContext> {
        match self.verify_context {
            Some(_) => Some(self),
            None => None,
        }
    }

    fn as_oracle(&self) -> Option<&dyn OracleBlock> {
        match self.options {
            Some(_) => Some(self),
            None => None,
        }
    }
}

#[async_trait]
impl WithVerifyContext for TestBlock {
    async fn should_verify_with_context(&self) -> Result<bool> {
        Ok(self.verify_context.unwrap_or_default())
    }

    async fn verify_with_context(&self, context: &BlockContext) -> Result<()> {
        self.check_verification()?;
        self.verified_contexts.lock().push(*context);
        Ok(())
    }
}

#[async_trait]
impl OracleBlock for TestBlock {
    async fn options(&self) -> Result<[Arc<dyn Block>; 2]> {
        let Some(options) = self.options.as_ref() else {
            bail!("block {:?} has no options", self.id);
        };

        Ok(options.each_ref().map(Self::clone_dyn))
    }
}

#[derive(Default)]
pub struct TestVm {
    blocks: Mutex<HashMap<BlockId, Arc<TestBlock>>>,
    accepted_heights: Mutex<HashMap<u64, BlockId>>,
    next_block: Mutex<Option<Arc<TestBlock>>>,
    get_calls: AtomicUsize,
    parse_calls: AtomicUsize,
}

impl TestVm {
    pub fn add_block(&self, block: &Arc<TestBlock>) {
        self.blocks.lock().insert(block.id(), Arc::clone(block));
    }

    pub fn add_accepted_block(&self, block: &Arc<TestBlock>) {
        self.add_block(block);
        self.accepted_heights
            .lock()
            .insert(block.height(), block.id());
    }

    pub fn set_next_block(&self, block: &Arc<TestBlock>) {
        self.add_block(block);
        *self.next_block.lock() = Some(Arc::clone(block));
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn parse_calls(&self) -> usize {
        self.parse_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainVm for TestVm {
    async fn get_block(&self, block_id: BlockId) -> Result<Option<Arc<dyn Block>>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        Ok(self.blocks.lock().get(&block_id).map(TestBlock::clone_dyn))
    }

    async fn parse_block(&self, bytes: &[u8]) -> Result<Arc<dyn Block>> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);

        let blocks = self.blocks.lock();

        let Some(block) = blocks.values().find(|block| block.bytes() == bytes) else {
            bail!(TestError::UnknownBytes);
        };

        Ok(block.clone_dyn())
    }

    async fn build_block(&self) -> Result<Arc<dyn Block>> {
        let Some(block) = self.next_block.lock().take() else {
            bail!(TestError::NothingToBuild);
        };

        Ok(block.clone_dyn())
    }

    async fn get_block_id_at_height(&self, height: u64) -> Result<Option<BlockId>> {
        Ok(self.accepted_heights.lock().get(&height).copied())
    }
}
