//! Attribute parsing
//!
//! Parses the attribute list of a start tag. Malformed pieces are skipped
//! rather than reported; the reader is lenient throughout.

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use memchr::{memchr, memchr3};
use std::borrow::Cow;

/// One parsed attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    /// Qualified name as written
    pub name: &'a [u8],
    /// Value with entities decoded and literal whitespace normalized
    pub value: Cow<'a, [u8]>,
}

impl<'a> Attribute<'a> {
    pub fn new(name: &'a [u8], value: Cow<'a, [u8]>) -> Self {
        Attribute { name, value }
    }

    pub fn prefix(&self) -> Option<&'a [u8]> {
        split_name(self.name).0
    }

    pub fn local_name(&self) -> &'a [u8] {
        split_name(self.name).1
    }

    /// Namespace declaration: `xmlns` or `xmlns:prefix`
    pub fn is_namespace_declaration(&self) -> bool {
        self.name == b"xmlns" || self.prefix() == Some(b"xmlns")
    }
}

/// Split a qualified name at its first colon
#[inline]
pub fn split_name(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    match memchr(b':', name) {
        Some(colon) => (Some(&name[..colon]), &name[colon + 1..]),
        None => (None, name),
    }
}

/// Parse everything between the element name and `>` / `/>`
pub fn parse_attributes(input: &[u8]) -> Vec<Attribute<'_>> {
    let mut attrs = Vec::new();
    let mut pos = 0;

    loop {
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() || input[pos] == b'/' {
            break;
        }
        if !is_name_start_char(input[pos]) {
            pos += 1;
            continue;
        }

        let name_start = pos;
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() || input[pos] != b'=' {
            // bare name, no value
            continue;
        }
        pos += 1;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if pos >= input.len() {
            break;
        }

        let raw = match input[pos] {
            quote @ (b'"' | b'\'') => {
                let start = pos + 1;
                let end = memchr(quote, &input[start..]).map_or(input.len(), |i| start + i);
                pos = (end + 1).min(input.len());
                &input[start..end]
            }
            _ => {
                let start = pos;
                while pos < input.len() && !is_whitespace(input[pos]) && input[pos] != b'/' {
                    pos += 1;
                }
                &input[start..pos]
            }
        };
        attrs.push(Attribute::new(name, normalize_value(raw)));
    }
    attrs
}

/// Literal tabs and line breaks become spaces, then entities are decoded
fn normalize_value(raw: &[u8]) -> Cow<'_, [u8]> {
    if memchr3(b'\t', b'\n', b'\r', raw).is_none() {
        return decode_text(raw);
    }
    let spaced: Vec<u8> = raw
        .iter()
        .map(|&b| if matches!(b, b'\t' | b'\n' | b'\r') { b' ' } else { b })
        .collect();
    Cow::Owned(decode_text(&spaced).into_owned())
}
