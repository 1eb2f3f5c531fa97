//! Encoder and decoder options

use crate::cache::page::PAGE_SIZE;
use crate::codec::layout::Section;

/// Options for [`crate::codec::Encoder`]
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Intern namespace URIs; when false every URI slot is left empty
    pub namespaces: bool,
    /// Skip comments and processing instructions instead of failing
    pub skip_unsupported: bool,
    /// Pools larger than this are sorted with rayon during key assignment
    pub parallel_sort_threshold: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            namespaces: true,
            skip_unsupported: false,
            parallel_sort_threshold: 1 << 14,
        }
    }
}

impl EncodeOptions {
    pub fn with_namespaces(mut self, enabled: bool) -> Self {
        self.namespaces = enabled;
        self
    }

    pub fn with_skip_unsupported(mut self, skip: bool) -> Self {
        self.skip_unsupported = skip;
        self
    }

    pub fn with_parallel_sort_threshold(mut self, threshold: usize) -> Self {
        self.parallel_sort_threshold = threshold;
        self
    }
}

/// Bounds of one node cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCacheLimits {
    /// Compaction leaves this many entries
    pub min: usize,
    /// The cache compacts once it holds this many entries
    pub max: usize,
}

impl Default for NodeCacheLimits {
    fn default() -> Self {
        NodeCacheLimits { min: 1024, max: 4096 }
    }
}

/// Options for [`crate::decode::EncodedDocument`]
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Byte budget for the page cache; the page limit is `cache_bytes / PAGE_SIZE`
    pub cache_bytes: usize,
    /// Node cache bounds per section, in [`Section::ALL`] order
    pub node_caches: [NodeCacheLimits; 8],
    /// Capacity of the name -> key lookup memo
    pub lookup_memo: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            cache_bytes: 128 * 1024,
            node_caches: [NodeCacheLimits::default(); 8],
            lookup_memo: 64,
        }
    }
}

impl DecodeOptions {
    pub fn with_cache_bytes(mut self, bytes: usize) -> Self {
        self.cache_bytes = bytes;
        self
    }

    /// Same bounds for every section
    pub fn with_node_cache(mut self, min: usize, max: usize) -> Self {
        self.node_caches = [NodeCacheLimits { min, max }; 8];
        self
    }

    pub fn with_section_cache(mut self, section: Section, min: usize, max: usize) -> Self {
        self.node_caches[section.index()] = NodeCacheLimits { min, max };
        self
    }

    pub fn node_cache(&self, section: Section) -> NodeCacheLimits {
        self.node_caches[section.index()]
    }

    pub fn with_lookup_memo(mut self, entries: usize) -> Self {
        self.lookup_memo = entries;
        self
    }

    /// Number of resident byte pages allowed
    pub fn page_limit(&self) -> usize {
        (self.cache_bytes / PAGE_SIZE).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_limit() {
        assert_eq!(DecodeOptions::default().page_limit(), 128);
        assert_eq!(DecodeOptions::default().with_cache_bytes(0).page_limit(), 1);
        assert_eq!(DecodeOptions::default().with_cache_bytes(4096 + 10).page_limit(), 4);
    }

    #[test]
    fn test_builders() {
        let opts = EncodeOptions::default()
            .with_namespaces(false)
            .with_skip_unsupported(true);
        assert!(!opts.namespaces);
        assert!(opts.skip_unsupported);
    }

    #[test]
    fn test_section_cache_limits() {
        let opts = DecodeOptions::default()
            .with_node_cache(8, 16)
            .with_section_cache(Section::ElemNames, 100, 200);
        assert_eq!(opts.node_cache(Section::ElemNames), NodeCacheLimits { min: 100, max: 200 });
        assert_eq!(opts.node_cache(Section::AttrValues), NodeCacheLimits { min: 8, max: 16 });
    }
}
