//! Pull reader events

use crate::core::attributes::{split_name, Attribute};
use std::borrow::Cow;

/// One markup event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent<'a> {
    /// `<name attrs...>`
    StartElement(StartElement<'a>),
    /// `<name attrs.../>`
    EmptyElement(StartElement<'a>),
    /// `</name>`
    EndElement(&'a [u8]),
    /// Character data with entities decoded
    Text(Cow<'a, [u8]>),
    CData(&'a [u8]),
    Comment(&'a [u8]),
    /// `<?target data?>`
    ProcessingInstruction { target: &'a [u8], data: &'a [u8] },
    /// `<?xml version=... ?>`
    XmlDeclaration {
        version: Option<Cow<'a, [u8]>>,
        encoding: Option<Cow<'a, [u8]>>,
        standalone: Option<bool>,
    },
    /// Raw body of `<!DOCTYPE ...>`
    DocType(&'a [u8]),
}

/// Start or empty element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement<'a> {
    /// Qualified name as written
    pub name: &'a [u8],
    pub attributes: Vec<Attribute<'a>>,
}

impl<'a> StartElement<'a> {
    pub fn new(name: &'a [u8], attributes: Vec<Attribute<'a>>) -> Self {
        StartElement { name, attributes }
    }

    pub fn prefix(&self) -> Option<&'a [u8]> {
        split_name(self.name).0
    }

    pub fn local_name(&self) -> &'a [u8] {
        split_name(self.name).1
    }

    pub fn attribute(&self, name: &[u8]) -> Option<&Attribute<'a>> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

impl XmlEvent<'_> {
    /// Whitespace-only text
    pub fn is_blank_text(&self) -> bool {
        match self {
            XmlEvent::Text(text) => text.iter().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')),
            _ => false,
        }
    }
}
