//! Source tree
//!
//! Arena-based tree the encoder walks:
//! - Nodes addressed by `u32` ids
//! - Names and values interned in a string pool
//! - Namespace prefixes resolved while building

pub mod document;
pub mod namespace;
pub mod node;
pub mod strings;

pub use document::{ChildIter, DescendantIter, XmlTree};
pub use node::{NodeId, XmlAttribute, XmlNode};
pub use strings::StringPool;
