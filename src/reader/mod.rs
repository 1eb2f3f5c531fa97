//! Markup pull reader
//!
//! - Events: event types borrowing from the input
//! - Slice: lenient reader over an in-memory slice

pub mod events;
pub mod slice;

pub use events::{StartElement, XmlEvent};
pub use slice::{parse_events, SliceReader};
