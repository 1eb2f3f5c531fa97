//! Offset table codec
//!
//! An offset table turns a list of lists into one flat payload plus
//! `count + 1` cumulative offsets, so the slice of list `id` is
//! `offsets[id]..offsets[id + 1]`.
//!
//! Wire form: `[count: u32][width: u8][offsets: (count + 1) x width]`.

use super::width::{width_for, write_uint};
use crate::error::{BexError, Result};
use byteorder::{BigEndian, ByteOrder};
use std::ops::Range;

/// Cumulative sizes of a flattened list-of-lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: Vec<u32>,
}

impl Default for OffsetTable {
    fn default() -> Self {
        OffsetTable { offsets: vec![0] }
    }
}

impl OffsetTable {
    /// Build from per-list sizes
    pub fn from_sizes<I>(sizes: I) -> Result<Self>
    where
        I: IntoIterator<Item = usize>,
    {
        let sizes = sizes.into_iter();
        let mut offsets = Vec::with_capacity(sizes.size_hint().0 + 1);
        offsets.push(0u32);
        let mut total = 0u64;
        for size in sizes {
            total += size as u64;
            if total > u32::MAX as u64 {
                return Err(BexError::structural("section payload exceeds 4 GiB"));
            }
            offsets.push(total as u32);
        }
        Ok(OffsetTable { offsets })
    }

    /// Number of lists
    #[inline]
    pub fn count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Flattened payload length, in payload units
    #[inline]
    pub fn total(&self) -> u32 {
        self.offsets[self.offsets.len() - 1]
    }

    /// Width used for every offset value
    #[inline]
    pub fn width(&self) -> u8 {
        width_for(self.total())
    }

    #[inline]
    pub fn start(&self, id: usize) -> u32 {
        self.offsets[id]
    }

    /// Length of list `id`
    #[inline]
    pub fn size(&self, id: usize) -> u32 {
        self.offsets[id + 1] - self.offsets[id]
    }

    #[inline]
    pub fn range(&self, id: usize) -> Range<u32> {
        self.offsets[id]..self.offsets[id + 1]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.offsets
    }

    /// Encoded byte length of the table header plus offsets
    pub fn encoded_len(&self) -> usize {
        5 + self.offsets.len() * self.width() as usize
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let width = self.width();
        let mut header = [0u8; 5];
        BigEndian::write_u32(&mut header, self.count() as u32);
        header[4] = width;
        out.extend_from_slice(&header);
        for &offset in &self.offsets {
            write_uint(out, offset, width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_and_ranges() {
        let table = OffsetTable::from_sizes([3, 0, 5]).unwrap();
        assert_eq!(table.as_slice(), &[0, 3, 3, 8]);
        assert_eq!(table.count(), 3);
        assert_eq!(table.size(0), 3);
        assert_eq!(table.size(1), 0);
        assert_eq!(table.size(2), 5);
        assert_eq!(table.range(2), 3..8);
        assert_eq!(table.width(), 1);
    }

    #[test]
    fn test_empty_table_is_single_zero() {
        let table = OffsetTable::from_sizes(std::iter::empty()).unwrap();
        assert_eq!(table.as_slice(), &[0]);
        assert_eq!(table.width(), 0);
        let mut out = Vec::new();
        table.encode(&mut out);
        assert_eq!(out, vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_layout() {
        let table = OffsetTable::from_sizes([300, 1]).unwrap();
        let mut out = Vec::new();
        table.encode(&mut out);
        assert_eq!(out.len(), table.encoded_len());
        // count=2, width=2, offsets 0, 300, 301
        assert_eq!(out, vec![0, 0, 0, 2, 2, 0, 0, 1, 44, 1, 45]);
    }
}
