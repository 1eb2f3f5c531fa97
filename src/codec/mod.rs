//! Encoding pipeline
//!
//! - Pool: deduplicating value and entry pools with deferred key assignment
//! - Width: minimal byte widths and big-endian column packing
//! - Offsets: cumulative offset tables for flattened lists
//! - Layout: section order and column widths shared with the decoder
//! - Encoder: tree walk, freeze and emission

pub mod encoder;
pub mod layout;
pub mod offsets;
pub mod pool;
pub mod source;
pub mod width;

pub use encoder::{encode_to_vec, EncodeStats, Encoder};
pub use layout::{ColumnWidths, Section, MAGIC};
pub use offsets::OffsetTable;
pub use pool::{EntryPool, ItemRef, Pool, ValuePool};
pub use source::{SourceAttribute, SourceKind, TreeSource};
