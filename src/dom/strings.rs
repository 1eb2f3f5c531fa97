//! String storage for the source tree
//!
//! Names, namespace URIs and attribute values are interned: equal byte
//! strings share one id. Text content is appended without deduplication
//! since it rarely repeats and can be large. Id 0 is always the empty
//! string.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Append-only byte string arena
#[derive(Debug)]
pub struct StringPool {
    data: Vec<u8>,
    /// (start, len) into `data`, indexed by id
    spans: Vec<(u32, u32)>,
    /// Content hash -> ids with that hash
    hash_index: HashMap<u64, Vec<u32>>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    pub fn new() -> Self {
        StringPool {
            data: Vec::with_capacity(4096),
            spans: vec![(0, 0)],
            hash_index: HashMap::new(),
        }
    }

    #[inline]
    fn hash(s: &[u8]) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Id of `s`, adding it if unseen
    pub fn intern(&mut self, s: &[u8]) -> u32 {
        if s.is_empty() {
            return 0;
        }
        let hash = Self::hash(s);
        if let Some(ids) = self.hash_index.get(&hash) {
            if let Some(&id) = ids.iter().find(|&&id| self.get(id) == s) {
                return id;
            }
        }
        let id = self.push(s);
        self.hash_index.entry(hash).or_default().push(id);
        id
    }

    /// Store `s` under a fresh id without deduplication
    pub fn push(&mut self, s: &[u8]) -> u32 {
        if s.is_empty() {
            return 0;
        }
        let start = self.data.len() as u32;
        self.data.extend_from_slice(s);
        let id = self.spans.len() as u32;
        self.spans.push((start, s.len() as u32));
        id
    }

    /// Bytes of `id`; unknown ids read as empty
    #[inline]
    pub fn get(&self, id: u32) -> &[u8] {
        match self.spans.get(id as usize) {
            Some(&(start, len)) => &self.data[start as usize..(start + len) as usize],
            None => &[],
        }
    }

    pub fn get_str(&self, id: u32) -> Option<&str> {
        std::str::from_utf8(self.get(id)).ok()
    }

    /// Number of ids, including the empty string
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.len() == 1
    }

    /// Bytes held
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedups() {
        let mut pool = StringPool::new();
        let a = pool.intern(b"name");
        let b = pool.intern(b"other");
        assert_eq!(pool.intern(b"name"), a);
        assert_ne!(a, b);
        assert_eq!(pool.get(a), b"name");
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_push_does_not_dedup() {
        let mut pool = StringPool::new();
        let a = pool.push(b"text");
        let b = pool.push(b"text");
        assert_ne!(a, b);
        assert_eq!(pool.data_len(), 8);
    }

    #[test]
    fn test_empty_is_zero() {
        let mut pool = StringPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.intern(b""), 0);
        assert_eq!(pool.push(b""), 0);
        assert_eq!(pool.get(0), b"");
        assert_eq!(pool.get(99), b"");
    }
}
