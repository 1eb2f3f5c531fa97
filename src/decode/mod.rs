//! Lazy decoder
//!
//! - Layout: section header parsing
//! - Document: caches and key resolution
//! - View: read-only element, text and attribute handles
//! - Serialize: markup output from views

pub mod document;
pub mod layout;
pub mod serialize;
pub mod view;

pub use document::{DocumentStats, EncodedDocument};
pub use layout::{DocumentLayout, SectionLayout};
pub use view::{AttributeView, ChildView, ElementView, TextView};
