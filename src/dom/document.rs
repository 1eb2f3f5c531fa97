//! Arena-built source tree
//!
//! [`XmlTree`] is built from [`SliceReader`] events and owns all of its
//! strings, so it can outlive the input and move across threads.
//! Building is lenient: unmatched end tags are ignored and unclosed
//! elements are closed at the end of input.

use super::namespace::NamespaceResolver;
use super::node::{NodeId, XmlAttribute, XmlNode};
use super::strings::StringPool;
use crate::codec::{SourceAttribute, SourceKind, TreeSource};
use crate::core::attributes::split_name;
use crate::core::encoding::convert_to_utf8;
use crate::reader::events::{StartElement, XmlEvent};
use crate::reader::slice::SliceReader;

/// Owned, read-only document tree
#[derive(Debug)]
pub struct XmlTree {
    nodes: Vec<XmlNode>,
    attributes: Vec<XmlAttribute>,
    strings: StringPool,
    root: Option<NodeId>,
}

/// Mutable state while building
struct Builder {
    stack: Vec<NodeId>,
    resolver: NamespaceResolver,
}

impl XmlTree {
    /// Parse `input`; never fails
    ///
    /// UTF-16 and declared Latin-1 input is converted to UTF-8 first.
    pub fn parse(input: &[u8]) -> Self {
        let input = convert_to_utf8(input);
        let mut strings = StringPool::new();
        let resolver = NamespaceResolver::new(&mut strings);
        let mut tree = XmlTree {
            nodes: vec![XmlNode::document()],
            attributes: Vec::new(),
            strings,
            root: None,
        };
        let mut builder = Builder {
            stack: vec![0],
            resolver,
        };

        for event in SliceReader::new(&input) {
            tree.apply(&mut builder, event);
        }
        tree
    }

    fn apply(&mut self, builder: &mut Builder, event: XmlEvent<'_>) {
        let parent = builder.stack.last().copied().unwrap_or(0);
        match event {
            XmlEvent::StartElement(element) => {
                let id = self.open_element(builder, parent, &element);
                builder.stack.push(id);
            }
            XmlEvent::EmptyElement(element) => {
                self.open_element(builder, parent, &element);
                builder.resolver.pop_scope();
            }
            XmlEvent::EndElement(name) => {
                // close up to the nearest open element of that name
                let open = builder.stack[1..]
                    .iter()
                    .rposition(|&id| self.strings.get(self.nodes[id as usize].value) == name);
                if let Some(index) = open {
                    while builder.stack.len() > index + 1 {
                        builder.stack.pop();
                        builder.resolver.pop_scope();
                    }
                }
            }
            XmlEvent::Text(text) => {
                let value = self.strings.push(&text);
                self.append(parent, XmlNode::leaf(SourceKind::Text, value, parent));
            }
            XmlEvent::CData(text) => {
                let value = self.strings.push(text);
                self.append(parent, XmlNode::leaf(SourceKind::CData, value, parent));
            }
            XmlEvent::Comment(text) => {
                let value = self.strings.push(text);
                self.append(parent, XmlNode::leaf(SourceKind::Comment, value, parent));
            }
            XmlEvent::ProcessingInstruction { target, .. } => {
                let value = self.strings.intern(target);
                self.append(parent, XmlNode::leaf(SourceKind::ProcessingInstruction, value, parent));
            }
            XmlEvent::XmlDeclaration { .. } | XmlEvent::DocType(_) => {}
        }
    }

    fn open_element(&mut self, builder: &mut Builder, parent: NodeId, element: &StartElement<'_>) -> NodeId {
        let resolver = &mut builder.resolver;
        resolver.push_scope();
        for attr in element.attributes.iter().filter(|a| a.is_namespace_declaration()) {
            let prefix = match attr.prefix() {
                Some(_) => self.strings.intern(attr.local_name()),
                None => 0,
            };
            let uri = self.strings.intern(&attr.value);
            resolver.declare(prefix, uri);
        }

        let prefix = self.strings.intern(element.prefix().unwrap_or_default());
        let namespace = resolver.resolve(prefix).unwrap_or(0);
        let name = self.strings.intern(element.name);

        let attr_start = self.attributes.len();
        for attr in &element.attributes {
            let name = self.strings.intern(attr.name);
            if self.attributes[attr_start..].iter().any(|a| a.name == name) {
                continue;
            }
            let namespace = if attr.is_namespace_declaration() {
                resolver.xmlns_uri()
            } else {
                match attr.prefix() {
                    Some(p) => {
                        let p = self.strings.intern(p);
                        resolver.resolve(p).unwrap_or(0)
                    }
                    None => 0,
                }
            };
            let value = self.strings.intern(&attr.value);
            self.attributes.push(XmlAttribute { name, namespace, value });
        }

        let mut node = XmlNode::element(name, namespace, parent);
        node.attr_start = attr_start as u32;
        node.attr_count = (self.attributes.len() - attr_start) as u32;
        let id = self.append(parent, node);
        if parent == 0 && self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    fn append(&mut self, parent: NodeId, mut node: XmlNode) -> NodeId {
        let id = self.nodes.len() as NodeId;
        let last = self.nodes[parent as usize].last_child;
        node.prev_sibling = last;
        self.nodes.push(node);
        match last {
            Some(last) => self.nodes[last as usize].next_sibling = Some(id),
            None => self.nodes[parent as usize].first_child = Some(id),
        }
        self.nodes[parent as usize].last_child = Some(id);
        id
    }

    /// First element child of the document
    pub fn root_element(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id as usize)
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    /// Qualified name of an element
    pub fn name_str(&self, id: NodeId) -> Option<&str> {
        let node = self.node(id).filter(|n| n.is_element())?;
        self.strings.get_str(node.value)
    }

    pub fn node_attributes(&self, id: NodeId) -> &[XmlAttribute] {
        match self.node(id) {
            Some(n) if n.is_element() => {
                let start = n.attr_start as usize;
                &self.attributes[start..start + n.attr_count as usize]
            }
            _ => &[],
        }
    }

    pub fn attribute_str(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node_attributes(id)
            .iter()
            .find(|a| self.strings.get(a.name) == name.as_bytes())
            .and_then(|a| self.strings.get_str(a.value))
    }

    pub fn child_nodes(&self, id: NodeId) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            next: self.node(id).and_then(|n| n.first_child),
        }
    }

    /// Descendants of `id` in document order, excluding `id`
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let mut stack: Vec<NodeId> = self.child_nodes(id).collect();
        stack.reverse();
        DescendantIter { tree: self, stack }
    }

    fn optional(&self, id: u32) -> Option<&[u8]> {
        (id != 0).then(|| self.strings.get(id))
    }
}

/// Iterator over the children of one node
pub struct ChildIter<'t> {
    tree: &'t XmlTree,
    next: Option<NodeId>,
}

impl Iterator for ChildIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Depth-first iterator over a subtree
pub struct DescendantIter<'t> {
    tree: &'t XmlTree,
    stack: Vec<NodeId>,
}

impl Iterator for DescendantIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        let mut child = self.tree.node(current).and_then(|n| n.last_child);
        while let Some(id) = child {
            self.stack.push(id);
            child = self.tree.node(id).and_then(|n| n.prev_sibling);
        }
        Some(current)
    }
}

impl TreeSource for XmlTree {
    type Node = NodeId;

    fn document(&self) -> NodeId {
        0
    }

    fn kind(&self, node: NodeId) -> SourceKind {
        self.nodes[node as usize].kind
    }

    fn children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.child_nodes(node)
    }

    fn attributes(&self, node: NodeId) -> impl Iterator<Item = SourceAttribute<'_>> + '_ {
        self.node_attributes(node).iter().map(move |a| SourceAttribute {
            namespace: self.optional(a.namespace),
            name: self.strings.get(a.name),
            value: self.strings.get(a.value),
        })
    }

    fn name(&self, node: NodeId) -> &[u8] {
        self.strings.get(self.nodes[node as usize].value)
    }

    fn namespace(&self, node: NodeId) -> Option<&[u8]> {
        self.optional(self.nodes[node as usize].namespace)
    }

    fn text(&self, node: NodeId) -> &[u8] {
        self.strings.get(self.nodes[node as usize].value)
    }
}
