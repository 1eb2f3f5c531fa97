//! Markup output for decoded views

use super::document::EncodedDocument;
use super::view::{ChildView, ElementView};
use crate::core::entities::{encode_attribute, encode_text};
use crate::error::Result;
use std::sync::Arc;

enum Step<'a> {
    Open(ElementView<'a>),
    Text(Arc<str>),
    Close(Arc<str>),
}

impl ElementView<'_> {
    /// Serialize this element and its subtree
    ///
    /// Empty elements are written self-closed; attributes come out in
    /// their stored (sorted) order.
    pub fn to_xml(&self) -> Result<String> {
        let mut out = String::new();
        let mut stack = vec![Step::Open(self.clone())];

        while let Some(step) = stack.pop() {
            match step {
                Step::Text(text) => out.push_str(&encode_text(&text)),
                Step::Close(name) => {
                    out.push_str("</");
                    out.push_str(&name);
                    out.push('>');
                }
                Step::Open(element) => {
                    let name = element.name()?;
                    out.push('<');
                    out.push_str(&name);
                    for attr in element.attributes()? {
                        out.push(' ');
                        out.push_str(&attr.name()?);
                        out.push_str("=\"");
                        out.push_str(&encode_attribute(&attr.value()?));
                        out.push('"');
                    }

                    let children = element.children()?;
                    if children.is_empty() {
                        out.push_str("/>");
                        continue;
                    }
                    out.push('>');
                    stack.push(Step::Close(name));
                    for child in children.into_iter().rev() {
                        stack.push(match child {
                            ChildView::Element(e) => Step::Open(e),
                            ChildView::Text(t) => Step::Text(t.value()?),
                        });
                    }
                }
            }
        }
        Ok(out)
    }
}

impl EncodedDocument {
    /// Serialize the whole document (without an XML declaration)
    pub fn to_xml(&self) -> Result<String> {
        self.root_element()?.to_xml()
    }
}
