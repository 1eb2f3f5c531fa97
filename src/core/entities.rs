//! Entity references
//!
//! Decoding handles the five predefined entities and numeric character
//! references; anything else is kept verbatim. Both directions borrow the
//! input when nothing needs rewriting.

use memchr::{memchr, memchr3};
use std::borrow::Cow;

/// Decode entity references in text or attribute values
#[inline]
pub fn decode_text(input: &[u8]) -> Cow<'_, [u8]> {
    if memchr(b'&', input).is_none() {
        return Cow::Borrowed(input);
    }
    Cow::Owned(decode_entities(input))
}

fn decode_entities(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;

    while let Some(amp) = memchr(b'&', &input[pos..]) {
        out.extend_from_slice(&input[pos..pos + amp]);
        pos += amp;

        let decoded = memchr(b';', &input[pos..])
            .and_then(|semi| decode_entity(&input[pos + 1..pos + semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                let mut utf8 = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                pos += semi + 1;
            }
            None => {
                out.push(b'&');
                pos += 1;
            }
        }
    }
    out.extend_from_slice(&input[pos..]);
    out
}

/// Character for one entity body (between `&` and `;`)
fn decode_entity(entity: &[u8]) -> Option<char> {
    match entity {
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"amp" => Some('&'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        [b'#', b'x' | b'X', hex @ ..] => parse_codepoint(hex, 16),
        [b'#', dec @ ..] => parse_codepoint(dec, 10),
        _ => None,
    }
}

fn parse_codepoint(digits: &[u8], radix: u32) -> Option<char> {
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    let cp = u32::from_str_radix(text, radix).ok()?;
    char::from_u32(cp).filter(|&c| c != '\0')
}

/// Escape character data for element content
pub fn encode_text(input: &str) -> Cow<'_, str> {
    if memchr3(b'<', b'>', b'&', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Escape an attribute value for a double-quoted attribute
///
/// Tabs and line breaks become character references so that attribute
/// value normalization does not fold them on the next parse.
pub fn encode_attribute(input: &str) -> Cow<'_, str> {
    let needs_escape = input
        .bytes()
        .any(|b| matches!(b, b'<' | b'>' | b'&' | b'"' | b'\t' | b'\n' | b'\r'));
    if !needs_escape {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
