//! Arena node representation
//!
//! Nodes refer to each other and to their strings by `u32` ids.

use crate::codec::SourceKind;

/// Index into the node arena
pub type NodeId = u32;

/// One node of the source tree
#[derive(Debug, Clone)]
pub struct XmlNode {
    pub kind: SourceKind,
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub prev_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    /// String id: qualified name of an element, target of a processing
    /// instruction, character data of everything else
    pub value: u32,
    /// String id of the resolved namespace URI, 0 for none
    pub namespace: u32,
    /// First attribute in the attribute arena
    pub attr_start: u32,
    pub attr_count: u32,
}

impl XmlNode {
    pub fn document() -> Self {
        Self::new(SourceKind::Document, 0, None)
    }

    pub fn element(name: u32, namespace: u32, parent: NodeId) -> Self {
        XmlNode {
            namespace,
            ..Self::new(SourceKind::Element, name, Some(parent))
        }
    }

    /// Text, CDATA, comment or processing instruction
    pub fn leaf(kind: SourceKind, value: u32, parent: NodeId) -> Self {
        Self::new(kind, value, Some(parent))
    }

    fn new(kind: SourceKind, value: u32, parent: Option<NodeId>) -> Self {
        XmlNode {
            kind,
            parent,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            value,
            namespace: 0,
            attr_start: 0,
            attr_count: 0,
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == SourceKind::Element
    }
}

/// Attribute stored in the attribute arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Qualified name
    pub name: u32,
    /// Resolved namespace URI, 0 for none
    pub namespace: u32,
    pub value: u32,
}
