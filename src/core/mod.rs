//! Markup scanning primitives
//!
//! - Scanner: memchr-backed delimiter search
//! - Entities: entity decoding and output escaping, borrowing when possible
//! - Attributes: start tag attribute lists
//! - Encoding: UTF-16 and Latin-1 input converted to UTF-8

pub mod attributes;
pub mod encoding;
pub mod entities;
pub mod scanner;
