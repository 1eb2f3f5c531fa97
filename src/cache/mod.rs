//! Decode-side caches
//!
//! - Page: fixed-size byte pages pulled from the backing source
//! - Node: slab-paged cache of materialized records and values

pub mod node;
pub mod page;

pub use node::{NodeCache, SLAB_SIZE};
pub use page::{BytePageCache, PAGE_SIZE};

/// Counters shared by both cache kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Entries currently held
    pub resident: usize,
}

impl CacheStats {
    /// Field-wise sum, used to report several caches as one
    pub fn merge(self, other: CacheStats) -> CacheStats {
        CacheStats {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            evictions: self.evictions + other.evictions,
            resident: self.resident + other.resident,
        }
    }

    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
