//! Property tests across the encoder and decoder

use crate::cache::{BytePageCache, NodeCache, PAGE_SIZE};
use crate::codec::width::{read_uint, width_for, width_for_count};
use crate::codec::{encode_to_vec, Encoder, OffsetTable, Section};
use crate::config::{DecodeOptions, EncodeOptions};
use crate::core::entities::{encode_attribute, encode_text};
use crate::decode::EncodedDocument;
use crate::dom::XmlTree;
use crate::error::Result;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Element {
        name: String,
        attrs: BTreeMap<String, String>,
        children: Vec<Node>,
    },
}

fn name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "item", "x", "p:q"]).prop_map(String::from)
}

fn text() -> impl Strategy<Value = String> {
    "[a-c<&>\" ]{1,6}"
}

fn element() -> impl Strategy<Value = Node> {
    let attrs = || prop::collection::btree_map("[a-d]{1,2}", text(), 0..3);
    let leaf = (name(), attrs()).prop_map(|(name, attrs)| Node::Element {
        name,
        attrs,
        children: Vec::new(),
    });
    leaf.prop_recursive(4, 48, 5, move |inner| {
        let child = prop_oneof![text().prop_map(Node::Text), inner];
        (name(), attrs(), prop::collection::vec(child, 0..5)).prop_map(|(name, attrs, children)| {
            Node::Element {
                name,
                attrs,
                children,
            }
        })
    })
}

/// Source markup: attributes in reverse order, empty elements with end tags
fn render_source(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&encode_text(t)),
        Node::Element { name, attrs, children } => {
            out.push('<');
            out.push_str(name);
            if name.starts_with("p:") {
                out.push_str(" xmlns:p=\"urn:p\"");
            }
            for (k, v) in attrs.iter().rev() {
                out.push_str(&format!(" {}=\"{}\"", k, encode_attribute(v)));
            }
            out.push('>');
            for child in children {
                render_source(child, out);
            }
            out.push_str(&format!("</{}>", name));
        }
    }
}

/// What the decoder should print back: sorted attributes, merged text, self-closed empties
fn render_canonical(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => out.push_str(&encode_text(t)),
        Node::Element { name, attrs, children } => {
            let mut attrs: Vec<(String, String)> = attrs.clone().into_iter().collect();
            if name.starts_with("p:") {
                attrs.push(("xmlns:p".into(), "urn:p".into()));
                attrs.sort();
            }
            out.push('<');
            out.push_str(name);
            for (k, v) in &attrs {
                out.push_str(&format!(" {}=\"{}\"", k, encode_attribute(v)));
            }
            if children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in children {
                render_canonical(child, out);
            }
            out.push_str(&format!("</{}>", name));
        }
    }
}

/// Distinct merged text runs and element names
fn collect_pools(node: &Node, texts: &mut BTreeSet<String>, names: &mut BTreeSet<String>) {
    if let Node::Element { name, children, .. } = node {
        names.insert(name.clone());
        let mut run = String::new();
        for child in children {
            match child {
                Node::Text(t) => run.push_str(t),
                element => {
                    if !run.is_empty() {
                        texts.insert(std::mem::take(&mut run));
                    }
                    collect_pools(element, texts, names);
                }
            }
        }
        if !run.is_empty() {
            texts.insert(run);
        }
    }
}

fn encode(node: &Node) -> Result<Vec<u8>> {
    let mut xml = String::new();
    render_source(node, &mut xml);
    encode_to_vec(&XmlTree::parse(xml.as_bytes()), EncodeOptions::default())
}

proptest! {
    #[test]
    fn prop_round_trip(node in element()) {
        let bytes = encode(&node).unwrap();
        let doc = EncodedDocument::from_bytes(bytes, DecodeOptions::default()).unwrap();
        let mut expected = String::new();
        render_canonical(&node, &mut expected);
        prop_assert_eq!(doc.to_xml().unwrap(), expected);
    }

    #[test]
    fn prop_round_trip_with_tiny_caches(node in element()) {
        let bytes = encode(&node).unwrap();
        let opts = DecodeOptions::default()
            .with_cache_bytes(0)
            .with_node_cache(1, 2)
            .with_lookup_memo(0);
        let doc = EncodedDocument::from_bytes(bytes, opts).unwrap();
        let mut expected = String::new();
        render_canonical(&node, &mut expected);
        prop_assert_eq!(doc.to_xml().unwrap(), expected);
    }

    #[test]
    fn prop_pools_hold_distinct_values(node in element()) {
        let mut texts = BTreeSet::new();
        let mut names = BTreeSet::new();
        collect_pools(&node, &mut texts, &mut names);

        let mut xml = String::new();
        render_source(&node, &mut xml);
        let tree = XmlTree::parse(xml.as_bytes());
        let stats = Encoder::new(EncodeOptions::default())
            .encode(&tree, &mut Vec::<u8>::new())
            .unwrap();
        prop_assert_eq!(stats.count(Section::ContentValues) as usize, texts.len());
        prop_assert_eq!(stats.count(Section::ElemNames) as usize, names.len());
    }

    #[test]
    fn prop_width_is_minimal(value in any::<u32>()) {
        let w = width_for(value) as u32;
        prop_assert!(w == 4 || (value as u64) < 1u64 << (8 * w));
        prop_assert!(w == 0 || (value as u64) >= 1u64 << (8 * (w - 1)));
    }

    #[test]
    fn prop_count_width_covers_keys(size in 0usize..1 << 26) {
        let w = width_for_count(size) as u32;
        prop_assert!(size <= 1 || ((size - 1) as u64) < 1u64 << (8 * w));
    }

    #[test]
    fn prop_offset_table(sizes in prop::collection::vec(0usize..300, 0..40)) {
        let table = OffsetTable::from_sizes(sizes.iter().copied()).unwrap();
        prop_assert_eq!(table.count(), sizes.len());
        prop_assert_eq!(table.total() as usize, sizes.iter().sum::<usize>());
        for (id, &size) in sizes.iter().enumerate() {
            prop_assert_eq!(table.range(id).len(), size);
        }

        let mut out = Vec::new();
        table.encode(&mut out);
        prop_assert_eq!(out.len(), table.encoded_len());
        prop_assert_eq!(read_uint(&out, 4) as usize, sizes.len());
        let width = out[4];
        prop_assert_eq!(width, table.width());
        for (i, &offset) in table.as_slice().iter().enumerate() {
            prop_assert_eq!(read_uint(&out[5 + i * width as usize..], width), offset);
        }
    }

    #[test]
    fn prop_page_cache_reads_are_exact(
        limit in 1usize..6,
        reads in prop::collection::vec((0usize..8 * PAGE_SIZE, 1usize..100), 1..60),
    ) {
        let data: Vec<u8> = (0..8 * PAGE_SIZE + 99).map(|i| (i * 31 % 251) as u8).collect();
        let mut cache = BytePageCache::new(Box::new(Cursor::new(data.clone())), limit).unwrap();
        for (pos, len) in reads {
            let bytes = cache.read_bytes(pos as u64, len).unwrap();
            prop_assert_eq!(&bytes[..], &data[pos..pos + len]);
            prop_assert!(cache.resident() <= limit);
        }
    }

    #[test]
    fn prop_node_cache_stays_bounded(
        (min, max) in (0usize..50).prop_flat_map(|min| (Just(min), min + 1..min + 100)),
        indices in prop::collection::vec(0usize..1000, 1..300),
    ) {
        let mut cache = NodeCache::new(min, max, 1000);
        for index in indices {
            let value = cache.get(index, |i| Ok(Some(i * 2))).unwrap();
            prop_assert_eq!(value, index * 2);
            prop_assert!(cache.len() <= max);
            prop_assert_eq!(cache.iter().count(), cache.len());
        }
    }
}
