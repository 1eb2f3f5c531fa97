//! Encoder input abstraction
//!
//! The encoder walks any tree that can answer a handful of questions about
//! its nodes. [`crate::dom::XmlTree`] is the in-crate implementation.

/// Node kinds the encoder distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Document,
    Element,
    Text,
    CData,
    Comment,
    ProcessingInstruction,
}

impl SourceKind {
    /// Text and CDATA runs are merged into one value
    #[inline]
    pub fn is_text(self) -> bool {
        matches!(self, SourceKind::Text | SourceKind::CData)
    }
}

/// One attribute as seen by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceAttribute<'a> {
    pub namespace: Option<&'a [u8]>,
    /// Qualified name as written (`prefix:local` or `local`)
    pub name: &'a [u8],
    pub value: &'a [u8],
}

/// Read access to a tree about to be encoded
pub trait TreeSource {
    /// Cheap node handle
    type Node: Copy;

    /// The document node; its children hold the single root element
    fn document(&self) -> Self::Node;

    fn kind(&self, node: Self::Node) -> SourceKind;

    /// Children in document order
    fn children(&self, node: Self::Node) -> impl Iterator<Item = Self::Node> + '_;

    /// Attributes of an element, in source order
    fn attributes(&self, node: Self::Node) -> impl Iterator<Item = SourceAttribute<'_>> + '_;

    /// Qualified element name
    fn name(&self, node: Self::Node) -> &[u8];

    /// Resolved namespace URI of an element, if any
    fn namespace(&self, node: Self::Node) -> Option<&[u8]>;

    /// Character data of a text or CDATA node
    fn text(&self, node: Self::Node) -> &[u8];
}
