//! Read-only views over an [`EncodedDocument`]
//!
//! Views are small handles: a document reference plus the decoded record
//! of the node and a shared link to its parent element. Parent links are
//! created top-down while navigating, so any view can walk back up to the
//! root without the encoding storing parent pointers.
//!
//! Every accessor goes back to the document caches; views never copy
//! names or text until asked.

use super::document::{ContentRef, EncodedDocument, RawAttribute, RawChild};
use crate::codec::layout::Section;
use crate::error::{BexError, Result};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Decoded element plus the chain of its ancestors
pub(crate) struct ElementNode {
    parent: Option<Rc<ElementNode>>,
    /// Child entry holding this element
    entry: u32,
    /// Position inside that entry
    position: u32,
    record: RawChild,
}

impl fmt::Debug for ElementNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementNode")
            .field("entry", &self.entry)
            .field("position", &self.position)
            .field("record", &self.record)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Drop for ElementNode {
    // Unlink ancestors one at a time; a recursive drop of a deep chain
    // would run out of stack.
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(node) = parent {
            parent = match Rc::try_unwrap(node) {
                Ok(mut node) => node.parent.take(),
                Err(_) => None,
            };
        }
    }
}

/// Split a qualified name into (prefix, local name)
fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Element node
#[derive(Debug, Clone)]
pub struct ElementView<'a> {
    doc: &'a EncodedDocument,
    node: Rc<ElementNode>,
}

/// Text node
#[derive(Debug, Clone)]
pub struct TextView<'a> {
    doc: &'a EncodedDocument,
    parent: Rc<ElementNode>,
    position: u32,
    value: u32,
}

/// Attribute of an element
#[derive(Debug, Clone)]
pub struct AttributeView<'a> {
    doc: &'a EncodedDocument,
    owner: Rc<ElementNode>,
    position: u32,
    record: RawAttribute,
}

/// Either kind of child
#[derive(Debug, Clone)]
pub enum ChildView<'a> {
    Element(ElementView<'a>),
    Text(TextView<'a>),
}

impl<'a> ElementView<'a> {
    pub(crate) fn root(doc: &'a EncodedDocument, entry: u32, record: RawChild) -> Self {
        ElementView {
            doc,
            node: Rc::new(ElementNode {
                parent: None,
                entry,
                position: 0,
                record,
            }),
        }
    }

    fn wrap(doc: &'a EncodedDocument, node: Rc<ElementNode>) -> Self {
        ElementView { doc, node }
    }

    pub fn document(&self) -> &'a EncodedDocument {
        self.doc
    }

    /// Qualified name
    pub fn name(&self) -> Result<Arc<str>> {
        self.doc.value(Section::ElemNames, self.node.record.name)
    }

    pub fn local_name(&self) -> Result<String> {
        let name = self.name()?;
        Ok(split_qname(&name).1.to_string())
    }

    pub fn prefix(&self) -> Result<Option<String>> {
        let name = self.name()?;
        Ok(split_qname(&name).0.map(str::to_string))
    }

    pub fn namespace_uri(&self) -> Result<Option<Arc<str>>> {
        self.doc.optional_value(Section::ElemUris, self.node.record.uri)
    }

    /// Position among the parent's children
    pub fn index(&self) -> usize {
        self.node.position as usize
    }

    pub fn is_root(&self) -> bool {
        self.node.parent.is_none()
    }

    /// Parent element; `None` for the root
    pub fn parent(&self) -> Option<ElementView<'a>> {
        self.node
            .parent
            .as_ref()
            .map(|p| ElementView::wrap(self.doc, Rc::clone(p)))
    }

    fn make_child(&self, entry: u32, position: u32, record: RawChild) -> ChildView<'a> {
        if record.is_text() {
            return ChildView::Text(TextView {
                doc: self.doc,
                parent: Rc::clone(&self.node),
                position,
                value: record.content,
            });
        }
        ChildView::Element(ElementView::wrap(
            self.doc,
            Rc::new(ElementNode {
                parent: Some(Rc::clone(&self.node)),
                entry,
                position,
                record,
            }),
        ))
    }

    pub fn child_count(&self) -> Result<usize> {
        Ok(match self.doc.content(self.node.record.content)? {
            ContentRef::Empty => 0,
            ContentRef::Text(_) => 1,
            ContentRef::Children(entry) => self.doc.entry_range(Section::ChildEntries, entry)?.len(),
        })
    }

    /// Child at `index`, or `None` past the end
    pub fn child(&self, index: usize) -> Result<Option<ChildView<'a>>> {
        match self.doc.content(self.node.record.content)? {
            ContentRef::Empty => Ok(None),
            ContentRef::Text(value) => Ok((index == 0).then(|| {
                ChildView::Text(TextView {
                    doc: self.doc,
                    parent: Rc::clone(&self.node),
                    position: 0,
                    value,
                })
            })),
            ContentRef::Children(entry) => {
                let range = self.doc.entry_range(Section::ChildEntries, entry)?;
                if index >= range.len() {
                    return Ok(None);
                }
                let position = index as u32;
                let record = self.doc.child(range.start + position)?;
                Ok(Some(self.make_child(entry, position, record)))
            }
        }
    }

    pub fn children(&self) -> Result<Vec<ChildView<'a>>> {
        match self.doc.content(self.node.record.content)? {
            ContentRef::Empty => Ok(Vec::new()),
            ContentRef::Text(_) => Ok(self.child(0)?.into_iter().collect()),
            ContentRef::Children(entry) => {
                let range = self.doc.entry_range(Section::ChildEntries, entry)?;
                let mut children = Vec::with_capacity(range.len());
                for (position, index) in range.enumerate() {
                    let record = self.doc.child(index)?;
                    children.push(self.make_child(entry, position as u32, record));
                }
                Ok(children)
            }
        }
    }

    /// Element children only
    pub fn child_elements(&self) -> Result<Vec<ElementView<'a>>> {
        Ok(self
            .children()?
            .into_iter()
            .filter_map(ChildView::into_element)
            .collect())
    }

    pub fn first_child(&self) -> Result<Option<ChildView<'a>>> {
        self.child(0)
    }

    pub fn last_child(&self) -> Result<Option<ChildView<'a>>> {
        match self.child_count()? {
            0 => Ok(None),
            n => self.child(n - 1),
        }
    }

    pub fn next_sibling(&self) -> Result<Option<ChildView<'a>>> {
        match self.parent() {
            Some(parent) => parent.child(self.index() + 1),
            None => Ok(None),
        }
    }

    pub fn previous_sibling(&self) -> Result<Option<ChildView<'a>>> {
        match (self.parent(), self.index()) {
            (Some(parent), i) if i > 0 => parent.child(i - 1),
            _ => Ok(None),
        }
    }

    /// Attribute entry index, or `None` for an element without one
    fn attribute_entry(&self) -> Option<u32> {
        self.node.record.attributes.checked_sub(1)
    }

    pub fn attribute_count(&self) -> Result<usize> {
        match self.attribute_entry() {
            Some(entry) => Ok(self.doc.entry_range(Section::AttrEntries, entry)?.len()),
            None => Ok(0),
        }
    }

    /// Attributes sorted by name
    pub fn attributes(&self) -> Result<Vec<AttributeView<'a>>> {
        let Some(entry) = self.attribute_entry() else {
            return Ok(Vec::new());
        };
        let range = self.doc.entry_range(Section::AttrEntries, entry)?;
        let mut attrs = Vec::with_capacity(range.len());
        for (position, index) in range.enumerate() {
            attrs.push(AttributeView {
                doc: self.doc,
                owner: Rc::clone(&self.node),
                position: position as u32,
                record: self.doc.attribute(index)?,
            });
        }
        Ok(attrs)
    }

    /// Attribute by qualified name
    pub fn attribute(&self, name: &str) -> Result<Option<AttributeView<'a>>> {
        let Some(entry) = self.attribute_entry() else {
            return Ok(None);
        };
        let Some(key) = self.doc.lookup(Section::AttrNames, name)? else {
            return Ok(None);
        };
        Ok(self
            .doc
            .find_attribute(entry, key)?
            .map(|(position, record)| AttributeView {
                doc: self.doc,
                owner: Rc::clone(&self.node),
                position,
                record,
            }))
    }

    pub fn attribute_value(&self, name: &str) -> Result<Option<Arc<str>>> {
        match self.attribute(name)? {
            Some(attr) => attr.value().map(Some),
            None => Ok(None),
        }
    }

    pub fn has_attribute(&self, name: &str) -> Result<bool> {
        Ok(self.attribute(name)?.is_some())
    }

    /// Attribute by namespace URI and local name; `None` matches no namespace
    ///
    /// An empty `uri` means no namespace.
    pub fn attribute_ns(&self, uri: Option<&str>, local_name: &str) -> Result<Option<AttributeView<'a>>> {
        let uri = uri.filter(|u| !u.is_empty());
        for attr in self.attributes()? {
            if attr.namespace_uri()?.as_deref() == uri && attr.local_name()? == local_name {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self) -> Result<String> {
        let mut out = String::new();
        let mut stack: Vec<ChildView<'a>> = self.children()?.into_iter().rev().collect();
        while let Some(child) = stack.pop() {
            match child {
                ChildView::Text(text) => out.push_str(&text.value()?),
                ChildView::Element(element) => stack.extend(element.children()?.into_iter().rev()),
            }
        }
        Ok(out)
    }

    /// Descendant elements in document order, filtered by `keep`
    fn collect_descendants<F>(&self, mut keep: F) -> Result<Vec<ElementView<'a>>>
    where
        F: FnMut(&ElementView<'a>) -> Result<bool>,
    {
        let mut found = Vec::new();
        let mut stack: Vec<ElementView<'a>> = self.child_elements()?.into_iter().rev().collect();
        while let Some(element) = stack.pop() {
            stack.extend(element.child_elements()?.into_iter().rev());
            if keep(&element)? {
                found.push(element);
            }
        }
        Ok(found)
    }

    /// All descendant elements in document order
    pub fn descendants(&self) -> Result<Vec<ElementView<'a>>> {
        self.collect_descendants(|_| Ok(true))
    }

    /// Descendant elements with the given qualified name; `"*"` matches all
    pub fn elements_by_tag_name(&self, name: &str) -> Result<Vec<ElementView<'a>>> {
        if name == "*" {
            return self.descendants();
        }
        match self.doc.lookup(Section::ElemNames, name)? {
            Some(key) => self.collect_descendants(|e| Ok(e.node.record.name == key)),
            None => Ok(Vec::new()),
        }
    }

    /// Descendant elements by namespace URI and local name
    ///
    /// `"*"` matches any URI or name; an empty URI matches elements
    /// without a namespace.
    pub fn elements_by_tag_name_ns(&self, uri: &str, local_name: &str) -> Result<Vec<ElementView<'a>>> {
        let uri_key = match uri {
            "*" => None,
            "" => Some(0),
            _ => match self.doc.lookup(Section::ElemUris, uri)? {
                Some(key) => Some(key),
                None => return Ok(Vec::new()),
            },
        };
        self.collect_descendants(|e| {
            if uri_key.is_some_and(|k| e.node.record.uri != k) {
                return Ok(false);
            }
            Ok(local_name == "*" || e.local_name()? == local_name)
        })
    }

    pub fn set_attribute(&self, _name: &str, _value: &str) -> Result<()> {
        Err(BexError::Unsupported("set_attribute"))
    }

    pub fn remove_attribute(&self, _name: &str) -> Result<()> {
        Err(BexError::Unsupported("remove_attribute"))
    }

    pub fn append_child(&self, _child: &ChildView<'_>) -> Result<()> {
        Err(BexError::Unsupported("append_child"))
    }

    pub fn remove_child(&self, _index: usize) -> Result<()> {
        Err(BexError::Unsupported("remove_child"))
    }

    pub fn set_text_content(&self, _text: &str) -> Result<()> {
        Err(BexError::Unsupported("set_text_content"))
    }
}

impl<'a> TextView<'a> {
    pub fn value(&self) -> Result<Arc<str>> {
        self.doc.value(Section::ContentValues, self.value)
    }

    pub fn parent(&self) -> ElementView<'a> {
        ElementView::wrap(self.doc, Rc::clone(&self.parent))
    }

    pub fn index(&self) -> usize {
        self.position as usize
    }

    pub fn next_sibling(&self) -> Result<Option<ChildView<'a>>> {
        self.parent().child(self.index() + 1)
    }

    pub fn previous_sibling(&self) -> Result<Option<ChildView<'a>>> {
        match self.index() {
            0 => Ok(None),
            i => self.parent().child(i - 1),
        }
    }

    pub fn set_value(&self, _text: &str) -> Result<()> {
        Err(BexError::Unsupported("set_value"))
    }
}

impl<'a> AttributeView<'a> {
    /// Qualified name
    pub fn name(&self) -> Result<Arc<str>> {
        self.doc.value(Section::AttrNames, self.record.name)
    }

    pub fn local_name(&self) -> Result<String> {
        let name = self.name()?;
        Ok(split_qname(&name).1.to_string())
    }

    pub fn prefix(&self) -> Result<Option<String>> {
        let name = self.name()?;
        Ok(split_qname(&name).0.map(str::to_string))
    }

    pub fn namespace_uri(&self) -> Result<Option<Arc<str>>> {
        self.doc.optional_value(Section::AttrUris, self.record.uri)
    }

    pub fn value(&self) -> Result<Arc<str>> {
        self.doc.value(Section::AttrValues, self.record.value)
    }

    /// Position inside the owner's sorted attribute list
    pub fn index(&self) -> usize {
        self.position as usize
    }

    pub fn owner(&self) -> ElementView<'a> {
        ElementView::wrap(self.doc, Rc::clone(&self.owner))
    }

    pub fn set_value(&self, _value: &str) -> Result<()> {
        Err(BexError::Unsupported("set_value"))
    }
}

impl<'a> ChildView<'a> {
    pub fn is_text(&self) -> bool {
        matches!(self, ChildView::Text(_))
    }

    pub fn as_element(&self) -> Option<&ElementView<'a>> {
        match self {
            ChildView::Element(e) => Some(e),
            ChildView::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextView<'a>> {
        match self {
            ChildView::Text(t) => Some(t),
            ChildView::Element(_) => None,
        }
    }

    pub fn into_element(self) -> Option<ElementView<'a>> {
        match self {
            ChildView::Element(e) => Some(e),
            ChildView::Text(_) => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ChildView::Element(e) => e.index(),
            ChildView::Text(t) => t.index(),
        }
    }

    pub fn parent(&self) -> Option<ElementView<'a>> {
        match self {
            ChildView::Element(e) => e.parent(),
            ChildView::Text(t) => Some(t.parent()),
        }
    }

    pub fn next_sibling(&self) -> Result<Option<ChildView<'a>>> {
        match self {
            ChildView::Element(e) => e.next_sibling(),
            ChildView::Text(t) => t.next_sibling(),
        }
    }

    pub fn previous_sibling(&self) -> Result<Option<ChildView<'a>>> {
        match self {
            ChildView::Element(e) => e.previous_sibling(),
            ChildView::Text(t) => t.previous_sibling(),
        }
    }

    pub fn text_content(&self) -> Result<String> {
        match self {
            ChildView::Element(e) => e.text_content(),
            ChildView::Text(t) => Ok(t.value()?.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_to_vec;
    use crate::config::{DecodeOptions, EncodeOptions};
    use crate::dom::XmlTree;

    fn open(xml: &str) -> EncodedDocument {
        let tree = XmlTree::parse(xml.as_bytes());
        let bytes = encode_to_vec(&tree, EncodeOptions::default()).unwrap();
        EncodedDocument::from_bytes(bytes, DecodeOptions::default()).unwrap()
    }

    fn name_of(child: &ChildView<'_>) -> String {
        match child {
            ChildView::Element(e) => e.name().unwrap().to_string(),
            ChildView::Text(t) => format!("#{}", t.value().unwrap()),
        }
    }

    #[test]
    fn test_end_to_end_example() {
        let doc = open(r#"<r a="1"><x/>hello<x/></r>"#);
        let root = doc.root_element().unwrap();
        assert_eq!(&*root.name().unwrap(), "r");
        assert!(root.is_root());

        let attrs = root.attributes().unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(&*attrs[0].name().unwrap(), "a");
        assert_eq!(&*attrs[0].value().unwrap(), "1");

        let children = root.children().unwrap();
        let names: Vec<String> = children.iter().map(name_of).collect();
        assert_eq!(names, vec!["x", "#hello", "x"]);
    }

    #[test]
    fn test_navigation() {
        let doc = open("<r><a><b/>t</a><c/></r>");
        let root = doc.root_element().unwrap();
        let a = root.first_child().unwrap().unwrap().into_element().unwrap();
        assert_eq!(&*a.name().unwrap(), "a");
        assert_eq!(a.child_count().unwrap(), 2);

        let b = a.first_child().unwrap().unwrap();
        let t = b.next_sibling().unwrap().unwrap();
        assert_eq!(name_of(&t), "#t");
        assert!(t.next_sibling().unwrap().is_none());
        assert_eq!(name_of(&t.previous_sibling().unwrap().unwrap()), "b");

        let c = a.next_sibling().unwrap().unwrap();
        assert_eq!(name_of(&c), "c");
        assert!(a.previous_sibling().unwrap().is_none());
        assert_eq!(name_of(&root.last_child().unwrap().unwrap()), "c");

        let up = t.parent().unwrap().parent().unwrap();
        assert!(up.is_root());
        assert!(root.parent().is_none());
        assert!(root.next_sibling().unwrap().is_none());
    }

    #[test]
    fn test_inline_text_child() {
        let doc = open("<r><a>only</a></r>");
        let a = doc.root_element().unwrap().child_elements().unwrap().remove(0);
        assert_eq!(a.child_count().unwrap(), 1);
        let text = a.first_child().unwrap().unwrap();
        assert!(text.is_text());
        assert_eq!(text.text_content().unwrap(), "only");
        assert!(text.next_sibling().unwrap().is_none());
        assert!(a.child(1).unwrap().is_none());
    }

    #[test]
    fn test_attribute_lookup() {
        let doc = open(r#"<r z="26" a="1" m="13"><x m="x"/></r>"#);
        let root = doc.root_element().unwrap();
        assert_eq!(root.attribute_count().unwrap(), 3);
        assert_eq!(root.attribute_value("m").unwrap().as_deref(), Some("13"));
        assert_eq!(root.attribute_value("z").unwrap().as_deref(), Some("26"));
        assert_eq!(root.attribute_value("a").unwrap().as_deref(), Some("1"));
        assert_eq!(root.attribute_value("q").unwrap(), None);

        let names: Vec<String> = root
            .attributes()
            .unwrap()
            .iter()
            .map(|a| a.name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "m", "z"]);

        let x = root.child_elements().unwrap().remove(0);
        assert_eq!(x.attribute_value("m").unwrap().as_deref(), Some("x"));
        assert_eq!(x.attribute_value("a").unwrap(), None);
        let m = x.attribute("m").unwrap().unwrap();
        assert_eq!(&*m.owner().name().unwrap(), "x");
    }

    #[test]
    fn test_namespaces() {
        let doc = open(r#"<p:r xmlns:p="urn:p" xmlns="urn:d" p:id="7"><c/></p:r>"#);
        let root = doc.root_element().unwrap();
        assert_eq!(root.local_name().unwrap(), "r");
        assert_eq!(root.prefix().unwrap().as_deref(), Some("p"));
        assert_eq!(root.namespace_uri().unwrap().as_deref(), Some("urn:p"));

        let id = root.attribute_ns(Some("urn:p"), "id").unwrap().unwrap();
        assert_eq!(&*id.value().unwrap(), "7");
        assert_eq!(id.prefix().unwrap().as_deref(), Some("p"));
        assert!(root.attribute_ns(None, "id").unwrap().is_none());

        let c = root.elements_by_tag_name_ns("urn:d", "c").unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].namespace_uri().unwrap().as_deref(), Some("urn:d"));
        assert!(root.elements_by_tag_name_ns("urn:none", "*").unwrap().is_empty());
        assert_eq!(root.elements_by_tag_name_ns("*", "*").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_namespace_matches_unqualified() {
        let doc = open(r#"<r><a/><n:a xmlns:n="urn:n"/><b><a x="1"/></b></r>"#);
        let root = doc.root_element().unwrap();
        let plain = root.elements_by_tag_name_ns("", "a").unwrap();
        assert_eq!(plain.len(), 2);
        assert!(plain.iter().all(|e| e.namespace_uri().unwrap().is_none()));
        assert_eq!(root.elements_by_tag_name_ns("", "*").unwrap().len(), 3);

        let inner = &plain[1];
        assert!(inner.attribute_ns(Some(""), "x").unwrap().is_some());
    }

    #[test]
    fn test_deep_chain_drops_without_recursion() {
        let depth = 100_000;
        let xml = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
        let doc = open(&xml);
        let mut element = doc.root_element().unwrap();
        let mut levels = 1;
        while let Some(child) = element.first_child().unwrap() {
            element = child.into_element().unwrap();
            levels += 1;
        }
        assert_eq!(levels, depth);
        assert!(!element.is_root());
        drop(element);
        assert_eq!(doc.root_element().unwrap().child_count().unwrap(), 1);
    }

    #[test]
    fn test_elements_by_tag_name() {
        let doc = open("<r><i>1</i><g><i>2</i><j/><i>3</i></g><i>4</i></r>");
        let root = doc.root_element().unwrap();
        let items: Vec<String> = root
            .elements_by_tag_name("i")
            .unwrap()
            .iter()
            .map(|e| e.text_content().unwrap())
            .collect();
        assert_eq!(items, vec!["1", "2", "3", "4"]);
        assert!(root.elements_by_tag_name("missing").unwrap().is_empty());
        assert_eq!(root.elements_by_tag_name("*").unwrap().len(), 6);
        assert_eq!(root.descendants().unwrap().len(), 6);
    }

    #[test]
    fn test_text_content() {
        let doc = open("<r>a<b>b<c>c</c></b>d</r>");
        assert_eq!(doc.root_element().unwrap().text_content().unwrap(), "abcd");
    }

    #[test]
    fn test_mutation_is_unsupported() {
        let doc = open(r#"<r a="1">t</r>"#);
        let root = doc.root_element().unwrap();
        assert!(matches!(root.set_attribute("a", "2"), Err(BexError::Unsupported(_))));
        assert!(matches!(root.remove_attribute("a"), Err(BexError::Unsupported(_))));
        assert!(matches!(root.remove_child(0), Err(BexError::Unsupported(_))));
        assert!(matches!(root.set_text_content("x"), Err(BexError::Unsupported(_))));
        let text = root.first_child().unwrap().unwrap();
        assert!(matches!(root.append_child(&text), Err(BexError::Unsupported(_))));
        assert!(matches!(text.as_text().unwrap().set_value("x"), Err(BexError::Unsupported(_))));
        let attr = root.attribute("a").unwrap().unwrap();
        assert!(matches!(attr.set_value("x"), Err(BexError::Unsupported(_))));
        // still readable afterwards
        assert_eq!(root.attribute_value("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_views_outlive_their_ancestors() {
        let doc = open("<r><a><b><c/></b></a></r>");
        let c = {
            let root = doc.root_element().unwrap();
            root.elements_by_tag_name("c").unwrap().remove(0)
        };
        let b = c.parent().unwrap();
        assert_eq!(&*b.name().unwrap(), "b");
        assert_eq!(&*b.parent().unwrap().name().unwrap(), "a");
    }
}
