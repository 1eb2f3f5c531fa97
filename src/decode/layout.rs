//! Section header parsing
//!
//! Only the fixed header fields and the last offset of each section are
//! read up front; offsets and payloads stay on disk until a view needs them.

use crate::cache::BytePageCache;
use crate::codec::layout::{ColumnWidths, Section, MAGIC};
use crate::codec::width::{alignment, padding, MAX_WIDTH};
use crate::error::{BexError, Result};
use std::ops::Range;

/// Where one section lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionLayout {
    /// Number of items (values or entries)
    pub count: u32,
    pub offset_width: u8,
    pub offsets_pos: u64,
    pub payload_pos: u64,
    /// Payload length in units of `stride`
    pub total: u32,
    /// 1 for values, record size for entries
    pub stride: usize,
}

impl SectionLayout {
    pub fn end(&self) -> u64 {
        self.payload_pos + self.total as u64 * self.stride as u64
    }

    /// Payload units covered by item `id`
    pub fn range(&self, pages: &mut BytePageCache, id: u32) -> Result<Range<u32>> {
        if id >= self.count {
            return Err(BexError::corrupt(format!("item {} out of range 0..{}", id, self.count)));
        }
        let width = self.offset_width;
        let at = self.offsets_pos + id as u64 * width as u64;
        let start = pages.read_uint(at, width)?;
        let end = pages.read_uint(at + width as u64, width)?;
        if start > end || end > self.total {
            return Err(BexError::corrupt(format!(
                "bad offsets {}..{} for item {} (total {})",
                start, end, id, self.total
            )));
        }
        Ok(start..end)
    }

    /// Absolute position of payload unit `unit`
    #[inline]
    pub fn position(&self, unit: u32) -> u64 {
        self.payload_pos + unit as u64 * self.stride as u64
    }
}

/// Parsed header of a whole document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLayout {
    pub sections: [SectionLayout; 8],
    pub widths: ColumnWidths,
    /// Content key of the document's child list
    pub root: u32,
    /// Total encoded length including the root reference
    pub length: u64,
}

impl DocumentLayout {
    pub fn read(pages: &mut BytePageCache) -> Result<Self> {
        let mut magic = [0u8; 4];
        pages.read_at(0, &mut magic)?;
        if magic != MAGIC {
            return Err(BexError::corrupt(format!("bad magic {:02x?}", magic)));
        }

        let mut pos = MAGIC.len() as u64;
        let mut counts = [0u32; 8];
        let mut sections = [SectionLayout::default(); 8];

        for section in Section::ALL {
            let count = pages.read_uint(pos, 4)?;
            let offset_width = pages.read_uint(pos + 4, 1)? as u8;
            if offset_width > MAX_WIDTH {
                return Err(BexError::corrupt(format!(
                    "{}: invalid offset width {}",
                    section.label(),
                    offset_width
                )));
            }
            counts[section.index()] = count;

            let offsets_pos = pos + 5;
            let first = pages.read_uint(offsets_pos, offset_width)?;
            let total = pages.read_uint(offsets_pos + count as u64 * offset_width as u64, offset_width)?;
            if first != 0 {
                return Err(BexError::corrupt(format!("{}: offsets do not start at 0", section.label())));
            }
            // items are distinct, so at most one of them is empty
            if count as u64 > total as u64 + 1 {
                return Err(BexError::corrupt(format!(
                    "{}: {} items in {} payload units",
                    section.label(),
                    count,
                    total
                )));
            }

            let stride = ColumnWidths::from_counts(&counts).stride(section);
            // zero-width records are all equal and a list never repeats one
            if stride == 0 && total > count {
                return Err(BexError::corrupt(format!(
                    "{}: {} zero-width records in {} entries",
                    section.label(),
                    total,
                    count
                )));
            }
            let after = offsets_pos + (count as u64 + 1) * offset_width as u64;
            let payload_pos = after + padding(after, alignment(stride)) as u64;
            let layout = SectionLayout {
                count,
                offset_width,
                offsets_pos,
                payload_pos,
                total,
                stride,
            };
            pos = layout.end();
            sections[section.index()] = layout;
        }

        let widths = ColumnWidths::from_counts(&counts);
        let root = pages.read_uint(pos, widths.content)?;
        let values = counts[Section::ContentValues.index()];
        let entries = counts[Section::ChildEntries.index()];
        if root <= values || root - values - 1 >= entries {
            return Err(BexError::corrupt(format!("root reference {} is not a child list", root)));
        }

        Ok(DocumentLayout {
            sections,
            widths,
            root,
            length: pos + widths.content as u64,
        })
    }

    #[inline]
    pub fn section(&self, section: Section) -> &SectionLayout {
        &self.sections[section.index()]
    }

    #[inline]
    pub fn count(&self, section: Section) -> u32 {
        self.sections[section.index()].count
    }
}
