//! Binary layout constants shared by the encoder and decoder
//!
//! A document is the magic number, eight sections in [`Section::ALL`] order,
//! and the root reference. Column widths are a pure function of the section
//! counts, so both sides derive them the same way from [`ColumnWidths::from_counts`].

use super::width::{width_for, width_for_count};

/// File magic: "BEX" plus format revision
pub const MAGIC: [u8; 4] = *b"BEX\x01";

/// Sections in serialization order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    AttrUris,
    AttrNames,
    AttrValues,
    ElemUris,
    ElemNames,
    ContentValues,
    AttrEntries,
    ChildEntries,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::AttrUris,
        Section::AttrNames,
        Section::AttrValues,
        Section::ElemUris,
        Section::ElemNames,
        Section::ContentValues,
        Section::AttrEntries,
        Section::ChildEntries,
    ];

    /// Position in [`Section::ALL`]
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Value sections hold UTF-8 text; the rest hold fixed-stride records
    #[inline]
    pub fn is_value(self) -> bool {
        !matches!(self, Section::AttrEntries | Section::ChildEntries)
    }

    /// Smallest key of a value section or of the attribute entries
    ///
    /// Pools whose key 0 means "absent" start at 1. Child entries share the
    /// content key space and start after the content values instead.
    pub fn key_base(self) -> u32 {
        match self {
            Section::AttrNames | Section::AttrValues => 0,
            _ => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Section::AttrUris => "attribute uris",
            Section::AttrNames => "attribute names",
            Section::AttrValues => "attribute values",
            Section::ElemUris => "element uris",
            Section::ElemNames => "element names",
            Section::ContentValues => "content values",
            Section::AttrEntries => "attribute entries",
            Section::ChildEntries => "child entries",
        }
    }
}

/// Byte width of every record column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnWidths {
    pub attr_uri: u8,
    pub attr_name: u8,
    pub attr_value: u8,
    pub elem_uri: u8,
    pub elem_name: u8,
    pub content: u8,
    pub attributes: u8,
}

impl ColumnWidths {
    /// Derive widths from the item count of each section
    pub fn from_counts(counts: &[u32; 8]) -> Self {
        let count = |s: Section| counts[s.index()];
        let content_max = count(Section::ContentValues) as u64 + count(Section::ChildEntries) as u64;
        ColumnWidths {
            attr_uri: width_for(count(Section::AttrUris)),
            attr_name: width_for_count(count(Section::AttrNames) as usize),
            attr_value: width_for_count(count(Section::AttrValues) as usize),
            elem_uri: width_for(count(Section::ElemUris)),
            elem_name: width_for(count(Section::ElemNames)),
            content: width_for(content_max.min(u32::MAX as u64) as u32),
            attributes: width_for(count(Section::AttrEntries)),
        }
    }

    /// Attribute record: `[uri][name][value]`
    #[inline]
    pub fn attr_stride(&self) -> usize {
        (self.attr_uri + self.attr_name + self.attr_value) as usize
    }

    /// Child record: `[uri][name][content][attributes]`
    #[inline]
    pub fn child_stride(&self) -> usize {
        (self.elem_uri + self.elem_name + self.content + self.attributes) as usize
    }

    /// Payload unit of a section: one byte for values, one record for entries
    pub fn stride(&self, section: Section) -> usize {
        match section {
            Section::AttrEntries => self.attr_stride(),
            Section::ChildEntries => self.child_stride(),
            _ => 1,
        }
    }
}
