//! Tree -> binary encoder
//!
//! One depth-first walk interns every name, URI and text run into value
//! pools and every attribute list and child list into entry pools. The
//! pools are then frozen, column widths derived from their sizes, and the
//! sections emitted in fixed order.

use super::layout::{ColumnWidths, Section, MAGIC};
use super::offsets::OffsetTable;
use super::pool::{EntryPool, ItemRef, Pool, ValuePool};
use super::source::{SourceKind, TreeSource};
use super::width::{alignment, padding, write_uint};
use crate::config::EncodeOptions;
use crate::error::{BexError, Result};
use crate::io::DataTarget;
use std::cmp::Ordering;
use tracing::debug;

/// Content slot of a child record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Content {
    Empty,
    /// Text value (a text child, or the only child of an element)
    Text(ItemRef),
    /// Child list entry
    Children(ItemRef),
}

/// One attribute inside an attribute list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AttrRecord {
    uri: ItemRef,
    name: ItemRef,
    value: ItemRef,
}

/// One child inside a child list entry; text children have a VOID name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChildRecord {
    uri: ItemRef,
    name: ItemRef,
    content: Content,
    attributes: ItemRef,
}

impl ChildRecord {
    fn text(value: ItemRef) -> Self {
        ChildRecord {
            uri: ItemRef::VOID,
            name: ItemRef::VOID,
            content: Content::Text(value),
            attributes: ItemRef::VOID,
        }
    }

    #[inline]
    fn is_text(&self) -> bool {
        self.name.is_void()
    }
}

/// Summary of one encode call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Distinct items per section, in [`Section::ALL`] order
    pub counts: [u32; 8],
    /// Dedup hits per section
    pub reuses: [u64; 8],
    pub widths: ColumnWidths,
    pub bytes_written: u64,
}

impl EncodeStats {
    pub fn count(&self, section: Section) -> u32 {
        self.counts[section.index()]
    }

    pub fn reuse(&self, section: Section) -> u64 {
        self.reuses[section.index()]
    }
}

/// Walk state for one open parent (document or element)
struct Frame<N> {
    node: N,
    children: Vec<N>,
    next: usize,
    records: Vec<ChildRecord>,
}

impl<N> Frame<N> {
    fn new(node: N, children: Vec<N>) -> Self {
        Frame {
            node,
            children,
            next: 0,
            records: Vec::new(),
        }
    }
}

/// Reusable encoder; every call to [`Encoder::encode`] starts from empty pools
pub struct Encoder {
    options: EncodeOptions,
    attr_uris: ValuePool,
    attr_names: ValuePool,
    attr_values: ValuePool,
    elem_uris: ValuePool,
    elem_names: ValuePool,
    content_values: ValuePool,
    attr_entries: EntryPool<AttrRecord>,
    child_entries: EntryPool<ChildRecord>,
    /// Pending text of the innermost frame, merged across adjacent nodes
    text: Vec<u8>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(EncodeOptions::default())
    }
}

impl Encoder {
    pub fn new(options: EncodeOptions) -> Self {
        Encoder {
            options,
            attr_uris: ValuePool::new(),
            attr_names: ValuePool::new(),
            attr_values: ValuePool::new(),
            elem_uris: ValuePool::new(),
            elem_names: ValuePool::new(),
            content_values: ValuePool::new(),
            attr_entries: Pool::new(),
            child_entries: Pool::new(),
            text: Vec::new(),
        }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    fn reset(&mut self) {
        *self = Encoder::new(self.options.clone());
    }

    /// Encode `source` into `target`
    pub fn encode<S, T>(&mut self, source: &S, target: &mut T) -> Result<EncodeStats>
    where
        S: TreeSource,
        T: DataTarget + ?Sized,
    {
        self.reset();
        let document = self.walk(source)?;
        self.freeze();

        let counts = self.counts();
        let widths = ColumnWidths::from_counts(&counts);
        let mut stats = EncodeStats {
            counts,
            reuses: self.reuses(),
            widths,
            bytes_written: 0,
        };

        let mut writer = SectionWriter { target, position: 0 };
        writer.put(&MAGIC)?;
        writer.values(&self.attr_uris)?;
        writer.values(&self.attr_names)?;
        writer.values(&self.attr_values)?;
        writer.values(&self.elem_uris)?;
        writer.values(&self.elem_names)?;
        writer.values(&self.content_values)?;
        self.write_attr_entries(&mut writer, &widths)?;
        self.write_child_entries(&mut writer, &widths)?;

        let mut root = Vec::with_capacity(4);
        write_uint(&mut root, self.child_entries.key(document), widths.content);
        writer.put(&root)?;

        stats.bytes_written = writer.position;
        debug!(
            bytes = stats.bytes_written,
            elements = stats.count(Section::ElemNames),
            values = stats.count(Section::ContentValues),
            child_entries = stats.count(Section::ChildEntries),
            attr_entries = stats.count(Section::AttrEntries),
            child_reuses = stats.reuse(Section::ChildEntries),
            "encoded document"
        );
        Ok(stats)
    }

    fn walk<S: TreeSource>(&mut self, source: &S) -> Result<ItemRef> {
        let document = source.document();
        let mut stack = vec![Frame::new(document, source.children(document).collect())];
        self.text.clear();

        loop {
            let Some(frame) = stack.last_mut() else {
                return Err(BexError::structural("empty walk stack"));
            };

            if frame.next < frame.children.len() {
                let child = frame.children[frame.next];
                frame.next += 1;
                match source.kind(child) {
                    SourceKind::Text | SourceKind::CData => {
                        self.text.extend_from_slice(source.text(child));
                    }
                    SourceKind::Element => {
                        self.flush_text(&mut stack)?;
                        stack.push(Frame::new(child, source.children(child).collect()));
                    }
                    SourceKind::Comment | SourceKind::ProcessingInstruction => {
                        if !self.options.skip_unsupported {
                            return Err(BexError::structural(format!(
                                "unsupported node kind {:?}",
                                source.kind(child)
                            )));
                        }
                    }
                    SourceKind::Document => {
                        return Err(BexError::structural("nested document node"));
                    }
                }
                continue;
            }

            self.flush_text(&mut stack)?;
            let Some(frame) = stack.pop() else {
                return Err(BexError::structural("empty walk stack"));
            };

            match stack.last_mut() {
                Some(parent) => {
                    let record = self.element_record(source, frame.node, frame.records)?;
                    parent.records.push(record);
                }
                None => return self.document_entry(frame.records),
            }
        }
    }

    /// Turn pending text into a text record of the top frame
    ///
    /// Document-level text is allowed only when it is whitespace.
    fn flush_text<N>(&mut self, stack: &mut [Frame<N>]) -> Result<()> {
        if self.text.is_empty() {
            return Ok(());
        }
        if stack.len() == 1 {
            if !self.text.iter().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
                return Err(BexError::structural("text outside the root element"));
            }
            self.text.clear();
            return Ok(());
        }
        let value = self.content_values.unique(utf8(&self.text, "text")?);
        self.text.clear();
        if let Some(frame) = stack.last_mut() {
            frame.records.push(ChildRecord::text(value));
        }
        Ok(())
    }

    fn element_record<S: TreeSource>(
        &mut self,
        source: &S,
        node: S::Node,
        records: Vec<ChildRecord>,
    ) -> Result<ChildRecord> {
        let uri = match source.namespace(node) {
            Some(uri) if self.options.namespaces && !uri.is_empty() => {
                self.elem_uris.unique(utf8(uri, "element namespace")?)
            }
            _ => ItemRef::VOID,
        };
        let name = self.elem_names.unique(utf8(source.name(node), "element name")?);
        let attributes = self.attribute_entry(source, node)?;

        let content = match records.as_slice() {
            [] => Content::Empty,
            [only] if only.is_text() => only.content,
            _ => Content::Children(self.child_entries.unique(records.as_slice())),
        };

        Ok(ChildRecord {
            uri,
            name,
            content,
            attributes,
        })
    }

    /// Intern the attribute list of `node`, sorted by (name, uri)
    fn attribute_entry<S: TreeSource>(&mut self, source: &S, node: S::Node) -> Result<ItemRef> {
        let mut attrs = Vec::new();
        for attr in source.attributes(node) {
            let uri = match attr.namespace {
                Some(uri) if self.options.namespaces && !uri.is_empty() => {
                    self.attr_uris.unique(utf8(uri, "attribute namespace")?)
                }
                _ => ItemRef::VOID,
            };
            attrs.push(AttrRecord {
                uri,
                name: self.attr_names.unique(utf8(attr.name, "attribute name")?),
                value: self.attr_values.unique(utf8(attr.value, "attribute value")?),
            });
        }

        // Value keys follow payload order, so sorting by payload here
        // yields records sorted by key once the pools are frozen.
        let names = &self.attr_names;
        let uris = &self.attr_uris;
        attrs.sort_by(|a, b| {
            payload_cmp(names, a.name, b.name).then_with(|| payload_cmp(uris, a.uri, b.uri))
        });
        if attrs.windows(2).any(|w| w[0].name == w[1].name && w[0].uri == w[1].uri) {
            return Err(BexError::structural("duplicate attribute"));
        }
        Ok(self.attr_entries.unique(attrs.as_slice()))
    }

    fn document_entry(&mut self, records: Vec<ChildRecord>) -> Result<ItemRef> {
        let elements = records.iter().filter(|r| !r.is_text()).count();
        if elements != 1 || records.len() != 1 {
            return Err(BexError::structural(format!(
                "document must have exactly one root element, found {}",
                elements
            )));
        }
        Ok(self.child_entries.unique(records.as_slice()))
    }

    fn freeze(&mut self) {
        let threshold = self.options.parallel_sort_threshold;
        self.attr_uris.freeze_by_payload(Section::AttrUris.key_base(), threshold);
        self.attr_names.freeze_by_payload(Section::AttrNames.key_base(), threshold);
        self.attr_values.freeze_by_payload(Section::AttrValues.key_base(), threshold);
        self.elem_uris.freeze_by_payload(Section::ElemUris.key_base(), threshold);
        self.elem_names.freeze_by_payload(Section::ElemNames.key_base(), threshold);
        self.content_values.freeze_by_payload(Section::ContentValues.key_base(), threshold);
        self.attr_entries.freeze_by_reuse(Section::AttrEntries.key_base(), threshold);
        let child_base = 1 + self.content_values.len() as u32;
        self.child_entries.freeze_by_reuse(child_base, threshold);
    }

    fn counts(&self) -> [u32; 8] {
        [
            self.attr_uris.len() as u32,
            self.attr_names.len() as u32,
            self.attr_values.len() as u32,
            self.elem_uris.len() as u32,
            self.elem_names.len() as u32,
            self.content_values.len() as u32,
            self.attr_entries.len() as u32,
            self.child_entries.len() as u32,
        ]
    }

    fn reuses(&self) -> [u64; 8] {
        [
            self.attr_uris.total_reuses(),
            self.attr_names.total_reuses(),
            self.attr_values.total_reuses(),
            self.elem_uris.total_reuses(),
            self.elem_names.total_reuses(),
            self.content_values.total_reuses(),
            self.attr_entries.total_reuses(),
            self.child_entries.total_reuses(),
        ]
    }

    fn content_key(&self, content: Content) -> u32 {
        match content {
            Content::Empty => 0,
            Content::Text(value) => self.content_values.key(value),
            Content::Children(entry) => self.child_entries.key(entry),
        }
    }

    fn write_attr_entries<T>(&self, writer: &mut SectionWriter<'_, T>, widths: &ColumnWidths) -> Result<()>
    where
        T: DataTarget + ?Sized,
    {
        let entries: Vec<&[AttrRecord]> = self.attr_entries.ordered().map(|i| &*i.payload).collect();
        let offsets = OffsetTable::from_sizes(entries.iter().map(|e| e.len()))?;
        let stride = widths.attr_stride();
        let mut payload = Vec::with_capacity(offsets.total() as usize * stride);
        for record in entries.iter().flat_map(|e| e.iter()) {
            write_uint(&mut payload, self.attr_uris.key(record.uri), widths.attr_uri);
            write_uint(&mut payload, self.attr_names.key(record.name), widths.attr_name);
            write_uint(&mut payload, self.attr_values.key(record.value), widths.attr_value);
        }
        writer.section(&offsets, alignment(stride), &payload)
    }

    fn write_child_entries<T>(&self, writer: &mut SectionWriter<'_, T>, widths: &ColumnWidths) -> Result<()>
    where
        T: DataTarget + ?Sized,
    {
        let entries: Vec<&[ChildRecord]> = self.child_entries.ordered().map(|i| &*i.payload).collect();
        let offsets = OffsetTable::from_sizes(entries.iter().map(|e| e.len()))?;
        let stride = widths.child_stride();
        let mut payload = Vec::with_capacity(offsets.total() as usize * stride);
        for record in entries.iter().flat_map(|e| e.iter()) {
            write_uint(&mut payload, self.elem_uris.key(record.uri), widths.elem_uri);
            write_uint(&mut payload, self.elem_names.key(record.name), widths.elem_name);
            write_uint(&mut payload, self.content_key(record.content), widths.content);
            write_uint(&mut payload, self.attr_entries.key(record.attributes), widths.attributes);
        }
        writer.section(&offsets, alignment(stride), &payload)
    }
}

/// Values are stored as UTF-8; anything else would not decode
fn utf8<'b>(bytes: &'b [u8], what: &str) -> Result<&'b [u8]> {
    std::str::from_utf8(bytes)
        .map(|_| bytes)
        .map_err(|e| BexError::structural(format!("{} is not UTF-8: {}", what, e)))
}

/// Order two value handles by payload; VOID sorts first
fn payload_cmp(pool: &ValuePool, a: ItemRef, b: ItemRef) -> Ordering {
    match (a.is_void(), b.is_void()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => pool.item(a).payload.cmp(&pool.item(b).payload),
    }
}

/// Tracks the absolute output position for payload alignment
struct SectionWriter<'t, T: DataTarget + ?Sized> {
    target: &'t mut T,
    position: u64,
}

impl<T: DataTarget + ?Sized> SectionWriter<'_, T> {
    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.target.write(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn values(&mut self, pool: &ValuePool) -> Result<()> {
        let offsets = OffsetTable::from_sizes(pool.ordered().map(|i| i.payload.len()))?;
        let mut payload = Vec::with_capacity(offsets.total() as usize);
        for item in pool.ordered() {
            payload.extend_from_slice(&item.payload);
        }
        self.section(&offsets, 1, &payload)
    }

    fn section(&mut self, offsets: &OffsetTable, align: usize, payload: &[u8]) -> Result<()> {
        let mut head = Vec::with_capacity(offsets.encoded_len() + align);
        offsets.encode(&mut head);
        let pad = padding(self.position + head.len() as u64, align);
        head.resize(head.len() + pad, 0);
        self.put(&head)?;
        self.put(payload)
    }
}

/// Encode `source` into a fresh buffer
pub fn encode_to_vec<S: TreeSource>(source: &S, options: EncodeOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    Encoder::new(options).encode(source, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::source::SourceAttribute;
    use crate::dom::XmlTree;

    fn encode(xml: &str) -> (Vec<u8>, EncodeStats) {
        let tree = XmlTree::parse(xml.as_bytes());
        let mut out = Vec::new();
        let stats = Encoder::default().encode(&tree, &mut out).unwrap();
        (out, stats)
    }

    #[test]
    fn test_header_and_length() {
        let (out, stats) = encode("<r/>");
        assert_eq!(&out[..4], b"BEX\x01");
        assert_eq!(stats.bytes_written, out.len() as u64);
    }

    #[test]
    fn test_empty_attribute_lists_share_one_entry() {
        let (_, stats) = encode("<r><a/><a/></r>");
        assert_eq!(stats.count(Section::AttrEntries), 1);
        assert_eq!(stats.count(Section::ElemNames), 2);
        assert_eq!(stats.count(Section::AttrNames), 0);
    }

    #[test]
    fn test_identical_subtrees_dedup() {
        let (_, stats) = encode("<r><p><b>x</b><i/></p><p><b>x</b><i/></p></r>");
        // child lists: [b, i] shared by both p, [p, p] under r, [r] for the document
        assert_eq!(stats.count(Section::ChildEntries), 3);
        assert_eq!(stats.count(Section::ContentValues), 1);
        assert_eq!(stats.reuse(Section::ChildEntries), 1);
    }

    #[test]
    fn test_single_text_child_is_inlined() {
        let (_, stats) = encode("<r>hello</r>");
        // only the document list exists; the text sits in r's content slot
        assert_eq!(stats.count(Section::ChildEntries), 1);
        assert_eq!(stats.count(Section::ContentValues), 1);
    }

    #[test]
    fn test_adjacent_text_is_coalesced() {
        let (_, stats) = encode("<r>a<![CDATA[b]]>c<x/></r>");
        assert_eq!(stats.count(Section::ContentValues), 1);
        let tree = XmlTree::parse(b"<r>abc<x/></r>");
        let mut other = Vec::new();
        Encoder::default().encode(&tree, &mut other).unwrap();
        let (same, _) = encode("<r>a<![CDATA[b]]>c<x/></r>");
        assert_eq!(same, other);
    }

    #[test]
    fn test_attribute_order_is_normalized() {
        let (a, _) = encode(r#"<r b="2" a="1"/>"#);
        let (b, _) = encode(r#"<r a="1" b="2"/>"#);
        assert_eq!(a, b);
    }

    #[test]
    fn test_document_whitespace_is_ignored() {
        let (a, _) = encode("\n  <r/>\n");
        let (b, _) = encode("<r/>");
        assert_eq!(a, b);
    }

    #[test]
    fn test_document_text_is_rejected() {
        let tree = XmlTree::parse(b"oops<r/>");
        let err = Encoder::default().encode(&tree, &mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, BexError::Structural(_)));
    }

    #[test]
    fn test_root_count_is_checked() {
        for xml in ["", "<a/><b/>"] {
            let tree = XmlTree::parse(xml.as_bytes());
            let err = Encoder::default().encode(&tree, &mut Vec::<u8>::new()).unwrap_err();
            assert!(matches!(err, BexError::Structural(_)), "{}", xml);
        }
    }

    #[test]
    fn test_comments_need_opt_in() {
        let tree = XmlTree::parse(b"<r><!-- c --><x/></r>");
        let err = Encoder::default().encode(&tree, &mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, BexError::Structural(_)));

        let mut out = Vec::new();
        let opts = EncodeOptions::default().with_skip_unsupported(true);
        Encoder::new(opts).encode(&tree, &mut out).unwrap();
        let (plain, _) = encode("<r><x/></r>");
        assert_eq!(out, plain);
    }

    #[test]
    fn test_namespaces_can_be_disabled() {
        let xml = r#"<r xmlns="urn:a"><x/></r>"#;
        let (_, with_ns) = encode(xml);
        assert_eq!(with_ns.count(Section::ElemUris), 1);

        let tree = XmlTree::parse(xml.as_bytes());
        let opts = EncodeOptions::default().with_namespaces(false);
        let stats = Encoder::new(opts).encode(&tree, &mut Vec::<u8>::new()).unwrap();
        assert_eq!(stats.count(Section::ElemUris), 0);
    }

    #[test]
    fn test_payload_alignment() {
        // one column each for uri, name and value: stride 3, aligned to 4
        let xml = r#"<r xmlns:p="urn:p" p:a="1" b="2"/>"#;
        let (out, stats) = encode(xml);
        assert_eq!(stats.widths.attr_stride(), 3);
        assert_eq!(out.len() as u64, stats.bytes_written);
    }

    #[test]
    fn test_non_utf8_values_are_rejected() {
        // no declaration, so the bytes are taken as UTF-8
        let tree = XmlTree::parse(b"<r>caf\xe9</r>");
        let err = Encoder::default().encode(&tree, &mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, BexError::Structural(_)));

        let tree = XmlTree::parse(b"<r a=\"\xff\"/>");
        let err = Encoder::default().encode(&tree, &mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, BexError::Structural(_)));
    }

    #[test]
    fn test_declared_latin1_round_trips() {
        let tree = XmlTree::parse(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>caf\xe9</r>");
        let bytes = encode_to_vec(&tree, EncodeOptions::default()).unwrap();
        let doc = crate::decode::EncodedDocument::from_bytes(bytes, Default::default()).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(root.text_content().unwrap(), "caf\u{e9}");
    }

    /// `<r>` carrying the same attribute twice
    struct RepeatedAttribute;

    impl TreeSource for RepeatedAttribute {
        type Node = u32;

        fn document(&self) -> u32 {
            0
        }

        fn kind(&self, node: u32) -> SourceKind {
            if node == 0 {
                SourceKind::Document
            } else {
                SourceKind::Element
            }
        }

        fn children(&self, node: u32) -> impl Iterator<Item = u32> + '_ {
            (node == 0).then_some(1).into_iter()
        }

        fn attributes(&self, node: u32) -> impl Iterator<Item = SourceAttribute<'_>> + '_ {
            let n = if node == 1 { 2 } else { 0 };
            (0..n).map(|_| SourceAttribute {
                namespace: None,
                name: b"a",
                value: b"",
            })
        }

        fn name(&self, _node: u32) -> &[u8] {
            b"r"
        }

        fn namespace(&self, _node: u32) -> Option<&[u8]> {
            None
        }

        fn text(&self, _node: u32) -> &[u8] {
            b""
        }
    }

    #[test]
    fn test_duplicate_attributes_are_rejected() {
        let err = Encoder::default()
            .encode(&RepeatedAttribute, &mut Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, BexError::Structural(_)));
    }

    #[test]
    fn test_encoder_is_reusable() {
        let tree = XmlTree::parse(b"<r><x/>t</r>");
        let mut encoder = Encoder::default();
        let mut first = Vec::new();
        let mut second = Vec::new();
        encoder.encode(&tree, &mut first).unwrap();
        encoder.encode(&tree, &mut second).unwrap();
        assert_eq!(first, second);
    }
}
