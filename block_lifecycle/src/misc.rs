/// Where a block identifier currently sits in the lifecycle caches.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockStatus {
    /// Not present in any cache. It may never have been seen or may have been evicted.
    Unknown,
    Unverified,
    /// Verified and live in consensus.
    Processing,
    Decided,
}

impl BlockStatus {
    #[must_use]
    pub const fn is_processing(self) -> bool {
        matches!(self, Self::Processing)
    }

    #[must_use]
    pub const fn is_decided(self) -> bool {
        matches!(self, Self::Decided)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct CacheSizes {
    pub unverified: usize,
    pub verified: usize,
    pub decided: usize,
}
