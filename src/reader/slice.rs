//! Pull reader over an in-memory slice
//!
//! The reader is lenient: it never fails. Unterminated constructs run to
//! the end of input and a stray `<` that does not open a tag is read as
//! text. Well-formedness checks beyond that belong to the tree builder.

use super::events::{StartElement, XmlEvent};
use crate::core::attributes::parse_attributes;
use crate::core::entities::decode_text;
use crate::core::scanner::Scanner;
use std::borrow::Cow;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Event reader borrowing its input
pub struct SliceReader<'a> {
    scanner: Scanner<'a>,
}

impl<'a> SliceReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        let mut scanner = Scanner::new(input);
        if scanner.starts_with(BOM) {
            scanner.advance(BOM.len());
        }
        SliceReader { scanner }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    pub fn next_event(&mut self) -> Option<XmlEvent<'a>> {
        if self.scanner.is_eof() {
            return None;
        }
        if self.scanner.peek() != Some(b'<') {
            return Some(self.read_text());
        }

        let event = if self.scanner.starts_with(b"<!--") {
            XmlEvent::Comment(self.read_delimited(4, b"-->"))
        } else if self.scanner.starts_with(b"<![CDATA[") {
            XmlEvent::CData(self.read_delimited(9, b"]]>"))
        } else if self.scanner.starts_with(b"<!") {
            XmlEvent::DocType(self.read_doctype())
        } else if self.scanner.starts_with(b"<?") {
            self.read_processing_instruction()
        } else if self.scanner.starts_with(b"</") {
            self.read_end_tag()
        } else {
            match self.read_start_tag() {
                Some(event) => event,
                None => {
                    // not a tag; the '<' is text
                    self.scanner.advance(1);
                    let mut text = self.read_text();
                    if let XmlEvent::Text(rest) = &mut text {
                        let mut owned = vec![b'<'];
                        owned.extend_from_slice(rest);
                        *rest = Cow::Owned(owned);
                    }
                    text
                }
            }
        };
        Some(event)
    }

    fn read_text(&mut self) -> XmlEvent<'a> {
        let start = self.scanner.position();
        let end = self.scanner.find_byte(b'<').unwrap_or(start + self.scanner.remaining().len());
        self.scanner.advance(end - start);
        XmlEvent::Text(decode_text(self.scanner.slice(start, end)))
    }

    /// Body between an opening marker of `open` bytes and `close`
    fn read_delimited(&mut self, open: usize, close: &[u8]) -> &'a [u8] {
        self.scanner.advance(open);
        let start = self.scanner.position();
        match self.scanner.find(close) {
            Some(end) => {
                self.scanner.advance(end - start + close.len());
                self.scanner.slice(start, end)
            }
            None => {
                let body = self.scanner.remaining();
                self.scanner.finish();
                body
            }
        }
    }

    /// `<!DOCTYPE ...>` including an internal subset in brackets
    fn read_doctype(&mut self) -> &'a [u8] {
        self.scanner.advance(2);
        let start = self.scanner.position();
        let bytes = self.scanner.remaining();
        let mut depth = 0usize;
        let mut quote = None;
        for (i, &b) in bytes.iter().enumerate() {
            match (quote, b) {
                (Some(q), _) if q == b => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[') => depth += 1,
                (None, b']') => depth = depth.saturating_sub(1),
                (None, b'>') if depth == 0 => {
                    self.scanner.advance(i + 1);
                    return self.scanner.slice(start, start + i);
                }
                _ => {}
            }
        }
        self.scanner.finish();
        bytes
    }

    fn read_processing_instruction(&mut self) -> XmlEvent<'a> {
        let body = self.read_delimited(2, b"?>");
        let mut inner = Scanner::new(body);
        let target = inner.read_name().unwrap_or_default();
        inner.skip_whitespace();
        let data = inner.remaining();

        if target == b"xml" {
            let attrs = parse_attributes(data);
            let value = |name: &[u8]| attrs.iter().find(|a| a.name == name).map(|a| a.value.clone());
            return XmlEvent::XmlDeclaration {
                version: value(b"version"),
                encoding: value(b"encoding"),
                standalone: value(b"standalone").map(|v| v.as_ref() == b"yes"),
            };
        }
        XmlEvent::ProcessingInstruction { target, data }
    }

    fn read_end_tag(&mut self) -> XmlEvent<'a> {
        self.scanner.advance(2);
        let start = self.scanner.position();
        let end = self.scanner.find_byte(b'>');
        let name_end = end.unwrap_or(start + self.scanner.remaining().len());
        let name = self.scanner.slice(start, name_end);
        match end {
            Some(end) => self.scanner.advance(end - start + 1),
            None => self.scanner.finish(),
        }
        XmlEvent::EndElement(name.trim_ascii())
    }

    /// `None` leaves the scanner untouched when no name follows the `<`
    fn read_start_tag(&mut self) -> Option<XmlEvent<'a>> {
        let open = self.scanner.position();
        self.scanner.advance(1);
        let Some(name) = self.scanner.read_name() else {
            self.scanner.set_position(open);
            return None;
        };

        let body_start = self.scanner.position();
        let (body_end, next) = match self.scanner.find_tag_end() {
            Some(end) => (end, end + 1),
            None => {
                let len = body_start + self.scanner.remaining().len();
                (len, len)
            }
        };
        let mut body = self.scanner.slice(body_start, body_end);
        let empty = body.last() == Some(&b'/');
        if empty {
            body = &body[..body.len() - 1];
        }
        self.scanner.advance(next - body_start);

        let element = StartElement::new(name, parse_attributes(body));
        Some(if empty {
            XmlEvent::EmptyElement(element)
        } else {
            XmlEvent::StartElement(element)
        })
    }
}

impl<'a> Iterator for SliceReader<'a> {
    type Item = XmlEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event()
    }
}

/// Collect every event of `input`
pub fn parse_events(input: &[u8]) -> Vec<XmlEvent<'_>> {
    SliceReader::new(input).collect()
}
