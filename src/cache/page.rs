//! Byte page cache
//!
//! The decoder never holds the encoded document in memory. Bytes are pulled
//! from the backing [`DataSource`] in fixed [`PAGE_SIZE`] pages that are kept
//! in a sparse page table and evicted by a frequency-biased policy:
//!
//! 1. The target is half the page limit.
//! 2. Each resident page's use counter is capped at `i32::MAX / resident - i`
//!    (`i` is the page index), which keeps the sum from overflowing and ages
//!    high pages slightly faster.
//! 3. The average use count is subtracted from every page; pages whose
//!    counter drops to zero or below are evicted.
//!
//! Steps 2 and 3 repeat until the target is met. Pages that keep getting hit
//! build up a counter that survives many rounds.

use super::CacheStats;
use crate::error::{BexError, Result};
use crate::io::DataSource;
use tracing::trace;

/// Bytes per page
pub const PAGE_SIZE: usize = 1024;

struct BytePage {
    data: Box<[u8]>,
    uses: i64,
}

/// Paged, bounded view of a [`DataSource`]
pub struct BytePageCache {
    source: Box<dyn DataSource + Send>,
    /// Absolute source position of byte 0
    base: u64,
    pages: Vec<Option<BytePage>>,
    resident: usize,
    page_limit: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl BytePageCache {
    /// Cache `source` starting at its current position
    pub fn new(mut source: Box<dyn DataSource + Send>, page_limit: usize) -> Result<Self> {
        let base = source.position()?;
        Ok(Self::with_base(source, base, page_limit))
    }

    /// Cache `source` starting at absolute position `base`
    pub fn with_base(source: Box<dyn DataSource + Send>, base: u64, page_limit: usize) -> Self {
        BytePageCache {
            source,
            base,
            pages: Vec::new(),
            resident: 0,
            page_limit: page_limit.max(1),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn page_limit(&self) -> usize {
        self.page_limit
    }

    /// Number of pages currently held
    pub fn resident(&self) -> usize {
        self.resident
    }

    pub fn is_resident(&self, index: usize) -> bool {
        matches!(self.pages.get(index), Some(Some(_)))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            resident: self.resident,
        }
    }

    /// Drop every page
    pub fn clear(&mut self) {
        self.pages.clear();
        self.resident = 0;
    }

    /// Bytes of page `index`; shorter than [`PAGE_SIZE`] at the end of data
    pub fn page(&mut self, index: usize) -> Result<&[u8]> {
        if let Some(Some(page)) = self.pages.get_mut(index) {
            page.uses = page.uses.saturating_add(1);
            self.hits += 1;
        } else {
            self.misses += 1;
            if self.resident >= self.page_limit {
                self.evict();
            }
            let data = self.load(index)?;
            if self.pages.len() <= index {
                self.pages.resize_with(index + 1, || None);
            }
            self.pages[index] = Some(BytePage { data, uses: 1 });
            self.resident += 1;
        }

        match &self.pages[index] {
            Some(page) => Ok(&page.data),
            None => Err(BexError::corrupt(format!("page {} vanished", index))),
        }
    }

    fn load(&mut self, index: usize) -> Result<Box<[u8]>> {
        let position = self.base + (index as u64) * PAGE_SIZE as u64;
        self.source.seek(position)?;
        let mut data = vec![0u8; PAGE_SIZE];
        let n = self.source.read_fully(&mut data)?;
        data.truncate(n);
        Ok(data.into_boxed_slice())
    }

    fn evict(&mut self) {
        let target = self.page_limit / 2;
        while self.resident > target {
            let count = self.resident as i64;
            let max_uses = i32::MAX as i64 / count;

            let mut total = 0i64;
            for (i, slot) in self.pages.iter_mut().enumerate() {
                if let Some(page) = slot {
                    page.uses = page.uses.min(max_uses - i as i64);
                    total += page.uses;
                }
            }

            let min_uses = total / count;
            let mut evicted = 0usize;
            for slot in self.pages.iter_mut() {
                let expired = match slot {
                    Some(page) => {
                        page.uses -= min_uses;
                        page.uses <= 0
                    }
                    None => false,
                };
                if expired {
                    *slot = None;
                    evicted += 1;
                }
            }

            self.resident -= evicted;
            self.evictions += evicted as u64;
            trace!(evicted, min_uses, resident = self.resident, "evicted byte pages");
        }
    }

    /// Fill `buf` from absolute document offset `position`, across pages if needed
    ///
    /// Running out of data is `CorruptData`: the caller only asks for bytes
    /// the layout says exist.
    pub fn read_at(&mut self, position: u64, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        let mut pos = position;
        while filled < buf.len() {
            let index = (pos / PAGE_SIZE as u64) as usize;
            let offset = (pos % PAGE_SIZE as u64) as usize;
            let page = self.page(index)?;
            if offset >= page.len() {
                return Err(BexError::corrupt(format!(
                    "read of {} bytes at {} runs past the end of data",
                    buf.len(),
                    position
                )));
            }
            let n = (page.len() - offset).min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&page[offset..offset + n]);
            filled += n;
            pos += n as u64;
        }
        Ok(())
    }

    /// Read an unsigned big-endian value of `width` bytes
    pub fn read_uint(&mut self, position: u64, width: u8) -> Result<u32> {
        let mut buf = [0u8; 4];
        let width = width as usize;
        self.read_at(position, &mut buf[4 - width..])?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_bytes(&mut self, position: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(position, &mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cache(pages: usize, limit: usize) -> BytePageCache {
        let data: Vec<u8> = (0..pages * PAGE_SIZE).map(|i| (i / PAGE_SIZE) as u8).collect();
        BytePageCache::new(Box::new(Cursor::new(data)), limit).unwrap()
    }

    #[test]
    fn test_hit_and_miss() {
        let mut c = cache(4, 8);
        assert_eq!(c.page(2).unwrap()[0], 2);
        assert_eq!(c.page(2).unwrap().len(), PAGE_SIZE);
        let stats = c.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.resident, 1);
    }

    #[test]
    fn test_resident_pages_stay_bounded() {
        let mut c = cache(100, 8);
        for i in 0..100 {
            c.page(i).unwrap();
            assert!(c.resident() <= 8, "resident {} after page {}", c.resident(), i);
        }
        assert!(c.stats().evictions >= 92);
    }

    #[test]
    fn test_hot_page_survives() {
        let mut c = cache(64, 4);
        for cold in 1..64 {
            c.page(0).unwrap();
            c.page(cold).unwrap();
        }
        assert!(c.is_resident(0));
        assert!(c.resident() <= 4);
    }

    #[test]
    fn test_limit_of_one() {
        let mut c = cache(3, 0);
        assert_eq!(c.page_limit(), 1);
        c.page(0).unwrap();
        c.page(1).unwrap();
        assert_eq!(c.resident(), 1);
        assert!(c.is_resident(1));
    }

    #[test]
    fn test_read_across_pages() {
        let mut c = cache(3, 2);
        let mut buf = [0u8; 4];
        c.read_at(PAGE_SIZE as u64 - 2, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 1, 1]);
        assert_eq!(c.read_uint(2 * PAGE_SIZE as u64 - 1, 2).unwrap(), 0x0102);
        assert_eq!(c.read_uint(5, 0).unwrap(), 0);
    }

    #[test]
    fn test_read_past_end_is_corrupt() {
        let mut c = cache(1, 2);
        let err = c.read_bytes(PAGE_SIZE as u64 - 1, 2).unwrap_err();
        assert!(matches!(err, BexError::CorruptData(_)));
    }

    #[test]
    fn test_base_offset() {
        let mut data = vec![9u8; 10];
        data.extend_from_slice(b"payload");
        let mut cursor = Cursor::new(data);
        DataSource::seek(&mut cursor, 10).unwrap();
        let mut c = BytePageCache::new(Box::new(cursor), 4).unwrap();
        assert_eq!(c.read_bytes(0, 7).unwrap(), b"payload");
    }
}
