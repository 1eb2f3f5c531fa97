//! Deduplicating item pools
//!
//! A [`Pool`] interns payloads and hands out [`ItemRef`] handles. Text
//! payloads (`Box<[u8]>`) become value pools; tuples of records holding
//! handles (`Box<[R]>`) become entry pools. Because entry tuples hold handles
//! rather than content, list-level dedup sees through the value pools: two
//! attribute lists are equal exactly when they reference the same interned
//! names and values.
//!
//! Keys are assigned only after the walk, when the pool is frozen.

use rayon::prelude::*;
use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Handle to an interned item (its insertion index), or the VOID sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemRef(u32);

impl ItemRef {
    /// Reserved "absent" item; always serialized as key 0
    pub const VOID: ItemRef = ItemRef(u32::MAX);

    #[inline]
    pub fn is_void(self) -> bool {
        self == ItemRef::VOID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One pool entry
#[derive(Debug)]
pub struct Item<T> {
    pub payload: T,
    /// How often `unique` returned this item instead of creating a new one
    pub reuses: u32,
    /// Serialized key, valid once the pool is frozen
    pub key: u32,
}

/// Pool of text payloads
pub type ValuePool = Pool<Box<[u8]>>;

/// Pool of fixed-stride record tuples
pub type EntryPool<R> = Pool<Box<[R]>>;

/// Deduplicating registry mapping payload -> item
#[derive(Debug)]
pub struct Pool<T> {
    items: Vec<Item<T>>,
    /// Hash of payload -> ids with that hash (handles rare collisions)
    hash_index: HashMap<u64, Vec<u32>>,
    /// Insertion indices in key order, filled by freezing
    order: Vec<u32>,
    base: u32,
    frozen: bool,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Pool {
            items: Vec::new(),
            hash_index: HashMap::new(),
            order: Vec::new(),
            base: 0,
            frozen: false,
        }
    }
}

impl<T: Hash + Eq> Pool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn compute_hash<Q: Hash + ?Sized>(payload: &Q) -> u64 {
        let mut hasher = DefaultHasher::new();
        payload.hash(&mut hasher);
        hasher.finish()
    }

    /// Intern `payload`, returning the existing item when one matches
    pub fn unique<Q>(&mut self, payload: &Q) -> ItemRef
    where
        Q: Hash + Eq + ?Sized,
        T: Borrow<Q> + for<'q> From<&'q Q>,
    {
        debug_assert!(!self.frozen, "pool is frozen");
        let hash = Self::compute_hash(payload);

        if let Some(ids) = self.hash_index.get(&hash) {
            for &id in ids {
                let item = &mut self.items[id as usize];
                if <T as Borrow<Q>>::borrow(&item.payload) == payload {
                    item.reuses += 1;
                    return ItemRef(id);
                }
            }
        }

        let id = self.items.len() as u32;
        self.items.push(Item {
            payload: T::from(payload),
            reuses: 0,
            key: 0,
        });
        self.hash_index.entry(hash).or_default().push(id);
        ItemRef(id)
    }
}

impl<T> Pool<T> {
    /// Number of distinct items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, item: ItemRef) -> &Item<T> {
        &self.items[item.index()]
    }

    /// Total number of reuse hits across all items
    pub fn total_reuses(&self) -> u64 {
        self.items.iter().map(|i| i.reuses as u64).sum()
    }

    /// Serialized key of `item`; VOID is always 0
    #[inline]
    pub fn key(&self, item: ItemRef) -> u32 {
        if item.is_void() {
            0
        } else {
            debug_assert!(self.frozen, "keys are assigned when the pool is frozen");
            self.items[item.index()].key
        }
    }

    /// Largest key in use, or 0 for an empty pool
    pub fn max_key(&self) -> u32 {
        if self.items.is_empty() {
            0
        } else {
            self.base + self.items.len() as u32 - 1
        }
    }

    /// Items in key order
    pub fn ordered(&self) -> impl Iterator<Item = &Item<T>> + '_ {
        self.order.iter().map(move |&id| &self.items[id as usize])
    }

    fn assign_keys(&mut self, order: Vec<u32>, base: u32) {
        for (pos, &id) in order.iter().enumerate() {
            self.items[id as usize].key = base + pos as u32;
        }
        self.order = order;
        self.base = base;
        self.frozen = true;
    }
}

impl<T: Sync> Pool<T> {
    /// Freeze with keys by descending reuse count, ties in first-seen order
    pub fn freeze_by_reuse(&mut self, base: u32, parallel_threshold: usize) {
        let mut order: Vec<u32> = (0..self.items.len() as u32).collect();
        let items = &self.items;
        let cmp = |a: &u32, b: &u32| {
            items[*b as usize]
                .reuses
                .cmp(&items[*a as usize].reuses)
                .then(a.cmp(b))
        };
        if order.len() >= parallel_threshold {
            order.par_sort_unstable_by(cmp);
        } else {
            order.sort_unstable_by(cmp);
        }
        self.assign_keys(order, base);
    }
}

impl<T: Ord + Sync> Pool<T> {
    /// Freeze with keys in payload order, so decoded pools can be binary searched
    pub fn freeze_by_payload(&mut self, base: u32, parallel_threshold: usize) {
        let mut order: Vec<u32> = (0..self.items.len() as u32).collect();
        let items = &self.items;
        let cmp = |a: &u32, b: &u32| items[*a as usize].payload.cmp(&items[*b as usize].payload);
        if order.len() >= parallel_threshold {
            order.par_sort_unstable_by(cmp);
        } else {
            order.sort_unstable_by(cmp);
        }
        self.assign_keys(order, base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_dedups_text() {
        let mut pool = ValuePool::new();
        let a = pool.unique(b"hello".as_slice());
        let b = pool.unique(b"world".as_slice());
        let c = pool.unique(b"hello".as_slice());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.item(a).reuses, 1);
        assert_eq!(pool.item(b).reuses, 0);
    }

    #[test]
    fn test_entry_dedup_is_by_identity() {
        let mut values = ValuePool::new();
        let x = values.unique(b"x".as_slice());
        let y = values.unique(b"y".as_slice());

        let mut entries = EntryPool::<ItemRef>::new();
        let e1 = entries.unique([x, y, ItemRef::VOID].as_slice());
        let e2 = entries.unique([x, y, ItemRef::VOID].as_slice());
        let e3 = entries.unique([y, x, ItemRef::VOID].as_slice());
        assert_eq!(e1, e2);
        assert_ne!(e1, e3);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.item(e1).reuses, 1);
    }

    #[test]
    fn test_freeze_by_payload_orders_keys() {
        let mut pool = ValuePool::new();
        let c = pool.unique(b"c".as_slice());
        let a = pool.unique(b"a".as_slice());
        let b = pool.unique(b"b".as_slice());
        pool.freeze_by_payload(1, usize::MAX);
        assert_eq!(pool.key(a), 1);
        assert_eq!(pool.key(b), 2);
        assert_eq!(pool.key(c), 3);
        assert_eq!(pool.key(ItemRef::VOID), 0);
        assert_eq!(pool.max_key(), 3);
        let ordered: Vec<&[u8]> = pool.ordered().map(|i| &*i.payload).collect();
        assert_eq!(ordered, vec![b"a" as &[u8], b"b", b"c"]);
    }

    #[test]
    fn test_freeze_by_reuse_orders_hot_first() {
        let mut pool = EntryPool::<ItemRef>::new();
        let cold = pool.unique([ItemRef::VOID].as_slice());
        let hot = pool.unique([ItemRef(0)].as_slice());
        pool.unique([ItemRef(0)].as_slice());
        pool.unique([ItemRef(0)].as_slice());
        pool.freeze_by_reuse(0, usize::MAX);
        assert_eq!(pool.key(hot), 0);
        assert_eq!(pool.key(cold), 1);
    }

    #[test]
    fn test_parallel_sort_matches_serial() {
        let mut serial = ValuePool::new();
        let mut parallel = ValuePool::new();
        for i in (0..500u32).rev() {
            let s = format!("v{}", i * 7919 % 1000);
            serial.unique(s.as_bytes());
            parallel.unique(s.as_bytes());
        }
        serial.freeze_by_payload(0, usize::MAX);
        parallel.freeze_by_payload(0, 1);
        let a: Vec<&[u8]> = serial.ordered().map(|i| &*i.payload).collect();
        let b: Vec<&[u8]> = parallel.ordered().map(|i| &*i.payload).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_pool() {
        let mut pool = ValuePool::new();
        pool.freeze_by_payload(1, usize::MAX);
        assert!(pool.is_empty());
        assert_eq!(pool.max_key(), 0);
        assert_eq!(pool.ordered().count(), 0);
    }
}
