use core::{num::NonZeroUsize, time::Duration};

use nonzero_ext::nonzero;

pub const DEFAULT_CACHE_SIZE: NonZeroUsize = nonzero!(2048_usize);
pub const DEFAULT_CACHE_LOCK_TIMEOUT_MILLIS: u64 = 1000;

#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    pub unverified_cache_size: NonZeroUsize,
    pub decided_cache_size: NonZeroUsize,
    pub missing_cache_size: NonZeroUsize,
    pub bytes_to_id_cache_size: NonZeroUsize,
    pub lock_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            unverified_cache_size: DEFAULT_CACHE_SIZE,
            decided_cache_size: DEFAULT_CACHE_SIZE,
            missing_cache_size: DEFAULT_CACHE_SIZE,
            bytes_to_id_cache_size: DEFAULT_CACHE_SIZE,
            lock_timeout: Duration::from_millis(DEFAULT_CACHE_LOCK_TIMEOUT_MILLIS),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn with_cache_sizes(size: NonZeroUsize) -> Self {
        Self {
            unverified_cache_size: size,
            decided_cache_size: size,
            missing_cache_size: size,
            bytes_to_id_cache_size: size,
            lock_timeout: Duration::from_millis(DEFAULT_CACHE_LOCK_TIMEOUT_MILLIS),
        }
    }
}
