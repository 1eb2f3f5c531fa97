//! Input encoding detection
//!
//! The reader works on UTF-8 only. UTF-16 input is recognized by its BOM
//! (or a `<` paired with a zero byte) and Latin-1 by the XML declaration;
//! both are converted before tokenizing. Conversion is lossy like the
//! reader: unpaired surrogates become U+FFFD and a trailing odd byte is
//! dropped.

use super::attributes::parse_attributes;
use memchr::memmem;
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl XmlEncoding {
    /// Encoding from the byte order mark, the first two bytes or the declaration
    pub fn detect(input: &[u8]) -> Self {
        match input {
            [0xFF, 0xFE, ..] | [b'<', 0x00, ..] => XmlEncoding::Utf16Le,
            [0xFE, 0xFF, ..] | [0x00, b'<', ..] => XmlEncoding::Utf16Be,
            [0xEF, 0xBB, 0xBF, ..] => XmlEncoding::Utf8,
            _ => XmlEncoding::declared(input).unwrap_or(XmlEncoding::Utf8),
        }
    }

    /// Encoding named by a leading `<?xml ... encoding="..."?>`
    ///
    /// Names other than the Latin-1 aliases map to UTF-8.
    pub fn declared(input: &[u8]) -> Option<Self> {
        let body = input.strip_prefix(b"<?xml")?;
        let end = memmem::find(body, b"?>")?;
        let attrs = parse_attributes(&body[..end]);
        let name = attrs.iter().find(|a| a.name == b"encoding")?.value.to_ascii_lowercase();
        match name.as_slice() {
            b"iso-8859-1" | b"iso_8859-1" | b"latin1" | b"latin-1" | b"l1" => Some(XmlEncoding::Latin1),
            _ => Some(XmlEncoding::Utf8),
        }
    }
}

/// Input as UTF-8, borrowed when no conversion is needed
pub fn convert_to_utf8(input: &[u8]) -> Cow<'_, [u8]> {
    match XmlEncoding::detect(input) {
        XmlEncoding::Utf8 => Cow::Borrowed(input),
        XmlEncoding::Utf16Le => {
            let body = input.strip_prefix(b"\xFF\xFE").unwrap_or(input);
            Cow::Owned(decode_utf16(body, u16::from_le_bytes))
        }
        XmlEncoding::Utf16Be => {
            let body = input.strip_prefix(b"\xFE\xFF").unwrap_or(input);
            Cow::Owned(decode_utf16(body, u16::from_be_bytes))
        }
        XmlEncoding::Latin1 if input.is_ascii() => Cow::Borrowed(input),
        XmlEncoding::Latin1 => {
            let text: String = input.iter().map(|&b| char::from(b)).collect();
            Cow::Owned(text.into_bytes())
        }
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Vec<u8> {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect::<String>()
        .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str) -> Vec<u8> {
        let mut out = vec![0xFF, 0xFE];
        out.extend(s.encode_utf16().flat_map(|u| u.to_le_bytes()));
        out
    }

    #[test]
    fn test_detect() {
        assert_eq!(XmlEncoding::detect(b"<root/>"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(&[0xEF, 0xBB, 0xBF, b'<']), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(&[0xFF, 0xFE, b'<', 0x00]), XmlEncoding::Utf16Le);
        assert_eq!(XmlEncoding::detect(&[0xFE, 0xFF, 0x00, b'<']), XmlEncoding::Utf16Be);
        assert_eq!(XmlEncoding::detect(&[b'<', 0x00]), XmlEncoding::Utf16Le);
        assert_eq!(
            XmlEncoding::detect(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r/>"),
            XmlEncoding::Latin1
        );
        assert_eq!(
            XmlEncoding::detect(b"<?xml version='1.0' encoding='utf-8'?><r/>"),
            XmlEncoding::Utf8
        );
    }

    #[test]
    fn test_convert_utf16() {
        assert_eq!(&*convert_to_utf8(&utf16le("<r>h\u{e9}</r>")), "<r>h\u{e9}</r>".as_bytes());

        let mut be = vec![0xFE, 0xFF];
        be.extend("<r/>".encode_utf16().flat_map(|u| u.to_be_bytes()));
        assert_eq!(&*convert_to_utf8(&be), b"<r/>");
    }

    #[test]
    fn test_convert_latin1() {
        let input = b"<?xml version=\"1.0\" encoding=\"latin1\"?><r>caf\xe9</r>";
        let out = convert_to_utf8(input);
        assert!(out.ends_with("<r>caf\u{e9}</r>".as_bytes()));
    }

    #[test]
    fn test_utf8_is_borrowed() {
        let input = b"<root>hello</root>";
        assert!(matches!(convert_to_utf8(input), Cow::Borrowed(_)));
    }

    #[test]
    fn test_lossy_utf16() {
        // lone high surrogate, then an odd trailing byte
        let input = [0xFF, 0xFE, b'<', 0, b'r', 0, b'>', 0, 0x00, 0xD8, b'<', 0, b'/', 0, b'r', 0, b'>', 0, 0x41];
        assert_eq!(&*convert_to_utf8(&input), "<r>\u{fffd}</r>".as_bytes());
    }
}
