//! Node materialization cache
//!
//! Maps a dense item index to a lazily built value. Storage is a sparse
//! table of [`SLAB_SIZE`]-slot slabs allocated on first use, so a document
//! with millions of records only pays for the regions actually visited.
//! The slab table itself grows only as far as the highest index touched.
//!
//! The cache holds at most `max_size` entries. A miss at that bound first
//! compacts: slabs are dropped from the highest index downwards until only
//! the compaction floor remains.

use super::CacheStats;
use crate::error::{BexError, Result};
use std::cmp::Ordering;
use std::ops::Range;
use tracing::trace;

const SLAB_BITS: usize = 7;

/// Slots per slab
pub const SLAB_SIZE: usize = 1 << SLAB_BITS;

const SLAB_MASK: usize = SLAB_SIZE - 1;

struct Slab<T> {
    len: usize,
    items: Box<[Option<T>]>,
}

impl<T> Slab<T> {
    fn new() -> Self {
        Slab {
            len: 0,
            items: (0..SLAB_SIZE).map(|_| None).collect(),
        }
    }
}

/// Bounded, slab-paged index -> value cache
pub struct NodeCache<T> {
    slabs: Vec<Option<Slab<T>>>,
    len: usize,
    min_size: usize,
    max_size: usize,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<T: Clone> NodeCache<T> {
    /// Cache for indices `0..capacity`, keeping between `min_size` and `max_size` entries
    pub fn new(min_size: usize, max_size: usize, capacity: usize) -> Self {
        let mut cache = NodeCache {
            slabs: Vec::new(),
            len: 0,
            min_size,
            max_size: max_size.max(1),
            capacity: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        };
        cache.set_capacity(capacity);
        cache
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_min_size(&mut self, min_size: usize) {
        self.min_size = min_size;
    }

    /// Change the upper bound; compacts at once if the cache already holds that many
    pub fn set_max_size(&mut self, max_size: usize) -> Result<()> {
        self.max_size = max_size.max(1);
        if self.len >= self.max_size {
            self.compact_to(self.floor())?;
        }
        Ok(())
    }

    /// Change the index universe; drops every entry
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.slabs.clear();
        self.len = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            resident: self.len,
        }
    }

    /// Compaction target; one below `max_size` so an insert never exceeds it
    fn floor(&self) -> usize {
        self.min_size.min(self.max_size - 1)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.capacity {
            return Err(BexError::corrupt(format!(
                "index {} out of range 0..{}",
                index, self.capacity
            )));
        }
        Ok(())
    }

    /// Resident value at `index`, without creating it
    pub fn peek(&self, index: usize) -> Option<&T> {
        self.slabs
            .get(index >> SLAB_BITS)?
            .as_ref()?
            .items[index & SLAB_MASK]
            .as_ref()
    }

    /// Value at `index`, built by `factory` on a miss
    ///
    /// A factory returning `None` means the index has no backing data.
    pub fn get<F>(&mut self, index: usize, factory: F) -> Result<T>
    where
        F: FnOnce(usize) -> Result<Option<T>>,
    {
        self.check_index(index)?;
        if let Some(item) = self.peek(index).cloned() {
            self.hits += 1;
            return Ok(item);
        }

        self.misses += 1;
        let item = factory(index)?
            .ok_or_else(|| BexError::corrupt(format!("no item for index {}", index)))?;
        if self.len >= self.max_size {
            self.compact_to(self.floor())?;
        }

        let slot = index >> SLAB_BITS;
        if slot >= self.slabs.len() {
            self.slabs.resize_with(slot + 1, || None);
        }
        let slab = self.slabs[slot].get_or_insert_with(Slab::new);
        slab.items[index & SLAB_MASK] = Some(item.clone());
        slab.len += 1;
        self.len += 1;
        Ok(item)
    }

    /// Evict one entry, returning it if it was resident
    pub fn clear(&mut self, index: usize) -> Result<Option<T>> {
        self.check_index(index)?;
        let Some(slot) = self.slabs.get_mut(index >> SLAB_BITS) else {
            return Ok(None);
        };
        let Some(slab) = slot else {
            return Ok(None);
        };
        let item = slab.items[index & SLAB_MASK].take();
        if item.is_some() {
            slab.len -= 1;
            self.len -= 1;
            if slab.len == 0 {
                *slot = None;
            }
        }
        Ok(item)
    }

    /// Evict everything
    pub fn clear_all(&mut self) {
        if self.len == 0 {
            return;
        }
        self.slabs.iter_mut().for_each(|s| *s = None);
        self.len = 0;
    }

    /// Evict down to `min_size` entries
    pub fn compact(&mut self) -> Result<()> {
        self.compact_to(self.min_size)
    }

    fn compact_to(&mut self, target: usize) -> Result<()> {
        if self.len <= target {
            return Ok(());
        }
        let mut excess = self.len - target;
        let before = self.len;

        for slot in self.slabs.iter_mut().rev() {
            let Some(slab) = slot else {
                continue;
            };
            if slab.len <= excess {
                excess -= slab.len;
                *slot = None;
            } else {
                for item in slab.items.iter_mut().rev() {
                    if item.take().is_some() {
                        slab.len -= 1;
                        excess -= 1;
                        if excess == 0 {
                            break;
                        }
                    }
                }
                if excess != 0 {
                    return Err(BexError::corrupt("node cache slab count is inconsistent"));
                }
            }
            if excess == 0 {
                break;
            }
        }

        if excess != 0 {
            return Err(BexError::corrupt("node cache size is inconsistent"));
        }
        self.len = target;
        self.evictions += (before - target) as u64;
        trace!(from = before, to = target, "compacted node cache");
        Ok(())
    }

    /// Binary search all indices `0..capacity`
    ///
    /// `cmp` orders a value against the target. The values must be sorted
    /// by index for the result to be meaningful.
    pub fn find<F, C>(&mut self, factory: F, cmp: C) -> Result<Option<(usize, T)>>
    where
        F: FnMut(usize) -> Result<Option<T>>,
        C: FnMut(&T) -> Ordering,
    {
        let capacity = self.capacity;
        self.find_range(0..capacity, factory, cmp)
    }

    /// Binary search a contiguous index range
    pub fn find_range<F, C>(&mut self, range: Range<usize>, mut factory: F, mut cmp: C) -> Result<Option<(usize, T)>>
    where
        F: FnMut(usize) -> Result<Option<T>>,
        C: FnMut(&T) -> Ordering,
    {
        let (mut lo, mut hi) = (range.start, range.end);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let item = self.get(mid, &mut factory)?;
            match cmp(&item) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Some((mid, item))),
            }
        }
        Ok(None)
    }

    /// Binary search the given sorted indices
    pub fn find_in<F, C>(&mut self, indices: &[usize], mut factory: F, mut cmp: C) -> Result<Option<(usize, T)>>
    where
        F: FnMut(usize) -> Result<Option<T>>,
        C: FnMut(&T) -> Ordering,
    {
        let (mut lo, mut hi) = (0, indices.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let index = indices[mid];
            let item = self.get(index, &mut factory)?;
            match cmp(&item) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Some((index, item))),
            }
        }
        Ok(None)
    }

    /// Resident `(index, value)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slabs
            .iter()
            .enumerate()
            .filter_map(|(s, slab)| slab.as_ref().map(|slab| (s, slab)))
            .flat_map(|(s, slab)| {
                slab.items
                    .iter()
                    .enumerate()
                    .filter_map(move |(i, item)| item.as_ref().map(|v| ((s << SLAB_BITS) | i, v)))
            })
    }
}
