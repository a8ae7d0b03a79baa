//! Caching layer between a VM's blocks and the consensus engine.
//!
//! Every block handed to consensus is wrapped in a [`BlockHandle`]. The handle forwards
//! verification and decisions to the wrapped [`Block`] and moves the block between three caches
//! kept in a [`LifecycleState`]:
//!
//! ```text
//!             verify            accept / reject
//! unverified ────────> verified ───────────────> decided
//!  (bounded)          (live in                  (bounded)
//!                     consensus)
//! ```
//!
//! A block is in at most one of the caches at a time. Decided is terminal.
//! The unverified and decided caches evict least recently used entries, so a block may silently
//! disappear from them. The verified cache is bounded by consensus itself, since the engine
//! eventually decides every block it has verified.
//!
//! [`ChainState`] sits on top and answers `get_block`, `parse_block` and `build_block` from the
//! caches before asking the [`ChainVm`].
//!
//! Optional block capabilities ([`WithVerifyContext`], [`OracleBlock`]) are exposed through
//! accessor methods on [`Block`] rather than discovered by downcasting.

pub use crate::{
    block::{Block, BlockContext, BlockId, OracleBlock, WithVerifyContext},
    block_handle::BlockHandle,
    cache_config::{CacheConfig, DEFAULT_CACHE_LOCK_TIMEOUT_MILLIS, DEFAULT_CACHE_SIZE},
    chain_state::ChainState,
    chain_vm::ChainVm,
    error::Error,
    lifecycle_state::LifecycleState,
    misc::{BlockStatus, CacheSizes},
};

mod block;
mod block_handle;
mod cache_config;
mod chain_state;
mod chain_vm;
mod error;
mod lifecycle_state;
mod misc;

#[cfg(test)]
mod test_utils;
