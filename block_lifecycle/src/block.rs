use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use fixed_hash::construct_fixed_hash;

construct_fixed_hash! {
    pub struct BlockId(32);
}

/// View of the chain a block is verified against when it opts into context-aware verification.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct BlockContext {
    pub validator_set_height: u64,
}

/// A block as produced or loaded by a VM.
///
/// `id` must be unique and must return the same value on every call.
/// Errors returned by `verify`, `accept` and `reject` are passed through to the consensus engine
/// unchanged.
///
/// Optional capabilities are discovered through the `as_*` methods.
/// Implementations that support a capability override the method to return `Some(self)`.
#[async_trait]
pub trait Block: Send + Sync {
    fn id(&self) -> BlockId;

    fn parent_id(&self) -> BlockId;

    fn height(&self) -> u64;

    fn bytes(&self) -> &[u8];

    async fn verify(&self) -> Result<()>;

    async fn accept(&self) -> Result<()>;

    async fn reject(&self) -> Result<()>;

    fn as_verify_with_context(&self) -> Option<&dyn WithVerifyContext> {
        None
    }

    fn as_oracle(&self) -> Option<&dyn OracleBlock> {
        None
    }
}

#[async_trait]
pub trait WithVerifyContext: Send + Sync {
    /// Must not have side effects. It may be called any number of times.
    async fn should_verify_with_context(&self) -> Result<bool>;

    async fn verify_with_context(&self, context: &BlockContext) -> Result<()>;
}

/// A block with two valid children, one of which is picked by the consensus engine's oracle.
#[async_trait]
pub trait OracleBlock: Send + Sync {
    async fn options(&self) -> Result<[Arc<dyn Block>; 2]>;
}
