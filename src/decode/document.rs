//! Lazily decoded document
//!
//! An [`EncodedDocument`] owns the backing source, a byte page cache and
//! one node cache per pool. Every accessor resolves keys through the node
//! cache first, then the page cache, then the source. Nothing is decoded
//! until a view asks for it.
//!
//! The caches use `RefCell`: a document is driven by one thread at a time
//! and needs an external lock to be shared.

use super::layout::DocumentLayout;
use super::view::ElementView;
use crate::cache::{BytePageCache, CacheStats, NodeCache};
use crate::codec::layout::Section;
use crate::codec::width::read_uint;
use crate::config::DecodeOptions;
use crate::error::{BexError, Result};
use crate::io::DataSource;
use lru::LruCache;
use std::cell::RefCell;
use std::fmt;
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Child record as stored: `[uri][name][content][attributes]` keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawChild {
    pub uri: u32,
    pub name: u32,
    pub content: u32,
    pub attributes: u32,
}

impl RawChild {
    /// Text children carry no element name
    #[inline]
    pub fn is_text(&self) -> bool {
        self.name == 0
    }
}

/// Attribute record as stored: `[uri][name][value]` keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawAttribute {
    pub uri: u32,
    pub name: u32,
    pub value: u32,
}

/// What an element's content slot points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentRef {
    Empty,
    /// Content value key of an inline text child
    Text(u32),
    /// Index into the child entries
    Children(u32),
}

/// Cache counters of one document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStats {
    pub pages: CacheStats,
    /// All six value caches combined
    pub values: CacheStats,
    /// Child and attribute record caches combined
    pub records: CacheStats,
}

const VALUE_SECTIONS: [Section; 6] = [
    Section::AttrUris,
    Section::AttrNames,
    Section::AttrValues,
    Section::ElemUris,
    Section::ElemNames,
    Section::ContentValues,
];

/// Read-only, lazily decoded document
pub struct EncodedDocument {
    layout: DocumentLayout,
    pages: RefCell<BytePageCache>,
    values: [RefCell<NodeCache<Arc<str>>>; 6],
    children: RefCell<NodeCache<RawChild>>,
    attributes: RefCell<NodeCache<RawAttribute>>,
    lookups: RefCell<Option<LruCache<(Section, Box<str>), Option<u32>>>>,
}

impl fmt::Debug for EncodedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedDocument")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl EncodedDocument {
    /// Open an encoded document starting at the current position of `source`
    pub fn open<S>(source: S, options: DecodeOptions) -> Result<Self>
    where
        S: DataSource + Send + 'static,
    {
        let mut pages = BytePageCache::new(Box::new(source), options.page_limit())?;
        let layout = DocumentLayout::read(&mut pages)?;

        let cache = |section: Section, capacity: u32| {
            let limits = options.node_cache(section);
            NodeCache::new(limits.min, limits.max, capacity as usize)
        };
        let values = VALUE_SECTIONS.map(|s| RefCell::new(cache(s, layout.count(s))));
        let children = cache(Section::ChildEntries, layout.section(Section::ChildEntries).total);
        let attributes = cache(Section::AttrEntries, layout.section(Section::AttrEntries).total);
        let lookups = NonZeroUsize::new(options.lookup_memo).map(LruCache::new);

        debug!(
            length = layout.length,
            elements = layout.count(Section::ElemNames),
            child_entries = layout.count(Section::ChildEntries),
            page_limit = pages.page_limit(),
            "opened encoded document"
        );

        Ok(EncodedDocument {
            layout,
            pages: RefCell::new(pages),
            values,
            children: RefCell::new(children),
            attributes: RefCell::new(attributes),
            lookups: RefCell::new(lookups),
        })
    }

    /// Open an in-memory encoding
    pub fn from_bytes(bytes: Vec<u8>, options: DecodeOptions) -> Result<Self> {
        Self::open(Cursor::new(bytes), options)
    }

    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    /// The single root element
    pub fn root_element(&self) -> Result<ElementView<'_>> {
        let entry = self.layout.root - self.content_values() - 1;
        let range = self.entry_range(Section::ChildEntries, entry)?;
        if range.len() != 1 {
            return Err(BexError::corrupt(format!(
                "document list holds {} children",
                range.len()
            )));
        }
        let record = self.child(range.start)?;
        if record.is_text() {
            return Err(BexError::corrupt("document list holds a text node"));
        }
        Ok(ElementView::root(self, entry, record))
    }

    /// Elements with the given qualified name in document order, the root
    /// included; `"*"` matches all
    pub fn elements_by_tag_name(&self, name: &str) -> Result<Vec<ElementView<'_>>> {
        let root = self.root_element()?;
        let mut found = Vec::new();
        if name == "*" || &*root.name()? == name {
            found.push(root.clone());
        }
        found.extend(root.elements_by_tag_name(name)?);
        Ok(found)
    }

    pub fn stats(&self) -> DocumentStats {
        let values = self
            .values
            .iter()
            .map(|c| c.borrow().stats())
            .fold(CacheStats::default(), CacheStats::merge);
        DocumentStats {
            pages: self.pages.borrow().stats(),
            values,
            records: self.children.borrow().stats().merge(self.attributes.borrow().stats()),
        }
    }

    /// Shrink every node cache to its minimum size
    pub fn compact_caches(&self) -> Result<()> {
        for cache in &self.values {
            cache.borrow_mut().compact()?;
        }
        self.children.borrow_mut().compact()?;
        self.attributes.borrow_mut().compact()
    }

    /// Drop every cached page, value and record
    pub fn clear_caches(&self) {
        self.pages.borrow_mut().clear();
        for cache in &self.values {
            cache.borrow_mut().clear_all();
        }
        self.children.borrow_mut().clear_all();
        self.attributes.borrow_mut().clear_all();
        if let Some(memo) = self.lookups.borrow_mut().as_mut() {
            memo.clear();
        }
    }

    #[inline]
    fn content_values(&self) -> u32 {
        self.layout.count(Section::ContentValues)
    }

    fn value_cache(section: Section) -> Result<usize> {
        VALUE_SECTIONS
            .iter()
            .position(|&s| s == section)
            .ok_or_else(|| BexError::corrupt(format!("{} is not a value pool", section.label())))
    }

    /// Text of `key` in a value pool
    pub(crate) fn value(&self, section: Section, key: u32) -> Result<Arc<str>> {
        let base = section.key_base();
        let count = self.layout.count(section);
        if key < base || key - base >= count {
            return Err(BexError::corrupt(format!(
                "{} key {} out of range",
                section.label(),
                key
            )));
        }
        let cache = &self.values[Self::value_cache(section)?];
        let index = (key - base) as usize;
        cache.borrow_mut().get(index, |i| self.load_value(section, i).map(Some))
    }

    /// Like [`Self::value`], with key 0 meaning "absent" in pools based at 1
    pub(crate) fn optional_value(&self, section: Section, key: u32) -> Result<Option<Arc<str>>> {
        if key == 0 && section.key_base() == 1 {
            Ok(None)
        } else {
            self.value(section, key).map(Some)
        }
    }

    fn load_value(&self, section: Section, index: usize) -> Result<Arc<str>> {
        let layout = self.layout.section(section);
        let mut pages = self.pages.borrow_mut();
        let range = layout.range(&mut pages, index as u32)?;
        let bytes = pages.read_bytes(layout.position(range.start), range.len())?;
        let text = String::from_utf8(bytes)
            .map_err(|e| BexError::corrupt(format!("{} value {} is not UTF-8: {}", section.label(), index, e)))?;
        Ok(Arc::from(text))
    }

    /// Record range of one child or attribute entry
    pub(crate) fn entry_range(&self, section: Section, entry: u32) -> Result<Range<u32>> {
        let layout = self.layout.section(section);
        layout.range(&mut self.pages.borrow_mut(), entry)
    }

    /// Classify an element content slot
    pub(crate) fn content(&self, key: u32) -> Result<ContentRef> {
        let values = self.content_values();
        if key == 0 {
            return Ok(ContentRef::Empty);
        }
        if key <= values {
            return Ok(ContentRef::Text(key));
        }
        let entry = key - values - 1;
        if entry >= self.layout.count(Section::ChildEntries) {
            return Err(BexError::corrupt(format!("content key {} out of range", key)));
        }
        Ok(ContentRef::Children(entry))
    }

    /// Child record at absolute record index `index`
    pub(crate) fn child(&self, index: u32) -> Result<RawChild> {
        self.children
            .borrow_mut()
            .get(index as usize, |i| self.load_child(i).map(Some))
    }

    fn load_child(&self, index: usize) -> Result<RawChild> {
        let layout = self.layout.section(Section::ChildEntries);
        let w = self.layout.widths;
        let mut buf = [0u8; 16];
        let record = &mut buf[..layout.stride];
        self.pages.borrow_mut().read_at(layout.position(index as u32), record)?;

        let mut at = 0;
        let mut column = |width: u8| {
            let v = read_uint(&record[at..], width);
            at += width as usize;
            v
        };
        Ok(RawChild {
            uri: column(w.elem_uri),
            name: column(w.elem_name),
            content: column(w.content),
            attributes: column(w.attributes),
        })
    }

    /// Attribute record at absolute record index `index`
    pub(crate) fn attribute(&self, index: u32) -> Result<RawAttribute> {
        self.attributes
            .borrow_mut()
            .get(index as usize, |i| self.load_attribute(i).map(Some))
    }

    fn load_attribute(&self, index: usize) -> Result<RawAttribute> {
        let layout = self.layout.section(Section::AttrEntries);
        let w = self.layout.widths;
        let mut buf = [0u8; 12];
        let record = &mut buf[..layout.stride];
        self.pages.borrow_mut().read_at(layout.position(index as u32), record)?;

        let mut at = 0;
        let mut column = |width: u8| {
            let v = read_uint(&record[at..], width);
            at += width as usize;
            v
        };
        Ok(RawAttribute {
            uri: column(w.attr_uri),
            name: column(w.attr_name),
            value: column(w.attr_value),
        })
    }

    /// Binary search a value pool for `text`, returning its key
    ///
    /// Results, including misses, are memoized.
    pub(crate) fn lookup(&self, section: Section, text: &str) -> Result<Option<u32>> {
        let memo_key = (section, Box::<str>::from(text));
        if let Some(memo) = self.lookups.borrow_mut().as_mut() {
            if let Some(&hit) = memo.get(&memo_key) {
                return Ok(hit);
            }
        }

        let cache = &self.values[Self::value_cache(section)?];
        let found = cache.borrow_mut().find(
            |i| self.load_value(section, i).map(Some),
            |v| v.as_bytes().cmp(text.as_bytes()),
        )?;
        let key = found.map(|(index, _)| index as u32 + section.key_base());

        if let Some(memo) = self.lookups.borrow_mut().as_mut() {
            memo.put(memo_key, key);
        }
        Ok(key)
    }

    /// Binary search one attribute entry for a name key
    pub(crate) fn find_attribute(&self, entry: u32, name: u32) -> Result<Option<(u32, RawAttribute)>> {
        let range = self.entry_range(Section::AttrEntries, entry)?;
        let found = self.attributes.borrow_mut().find_range(
            range.start as usize..range.end as usize,
            |i| self.load_attribute(i).map(Some),
            |a| a.name.cmp(&name),
        )?;
        Ok(found.map(|(index, record)| (index as u32 - range.start, record)))
    }
}
