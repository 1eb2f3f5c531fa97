//! rustybex - compact binary XML
//!
//! Markup is parsed into an arena tree, encoded into the BEX binary form
//! (deduplicated value and entry pools, minimal-width key columns, offset
//! tables) and decoded lazily through a byte page cache and per-pool node
//! caches.
//!
//! - `codec`: pools, widths, offset tables and the encoder
//! - `cache`: byte page cache and slab node cache
//! - `decode`: lazy document, views and serializer
//! - `core`, `reader`, `dom`: markup reader and source tree
//!
//! The crate also builds as a NIF library for `RustyBex.Native`.

use rayon::prelude::*;
use rustler::{Binary, Encoder, Env, NifResult, ResourceArc, Term};

pub mod cache;
pub mod codec;
pub mod config;
pub mod core;
pub mod decode;
pub mod dom;
pub mod error;
pub mod io;
pub mod reader;
mod resource;
mod term;

#[cfg(test)]
mod proptests;

pub use codec::{encode_to_vec, EncodeStats, Encoder as BexEncoder, TreeSource};
pub use config::{DecodeOptions, EncodeOptions, NodeCacheLimits};
pub use decode::{AttributeView, ChildView, DocumentStats, ElementView, EncodedDocument, TextView};
pub use dom::XmlTree;
pub use error::{BexError, Result};

use resource::{DocumentRef, DocumentResource};
use term::{
    bytes_to_binary, document_stats_to_term, element_to_term, error_to_term, list_to_term, nil,
    result_to_term, str_to_binary,
};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "memory_tracking")]
mod tracking {
    use std::alloc::{GlobalAlloc, Layout};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
    pub static PEAK_ALLOCATED: AtomicUsize = AtomicUsize::new(0);

    pub struct TrackingAllocator;

    #[cfg(feature = "mimalloc")]
    static UNDERLYING: mimalloc::MiMalloc = mimalloc::MiMalloc;

    #[cfg(not(feature = "mimalloc"))]
    static UNDERLYING: std::alloc::System = std::alloc::System;

    unsafe impl GlobalAlloc for TrackingAllocator {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            let ptr = UNDERLYING.alloc(layout);
            if !ptr.is_null() {
                let current = ALLOCATED.fetch_add(layout.size(), Ordering::Relaxed) + layout.size();
                let mut peak = PEAK_ALLOCATED.load(Ordering::Relaxed);
                while current > peak {
                    match PEAK_ALLOCATED.compare_exchange_weak(
                        peak,
                        current,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => break,
                        Err(p) => peak = p,
                    }
                }
            }
            ptr
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            ALLOCATED.fetch_sub(layout.size(), Ordering::Relaxed);
            UNDERLYING.dealloc(ptr, layout)
        }
    }
}

#[cfg(feature = "memory_tracking")]
#[global_allocator]
static GLOBAL: tracking::TrackingAllocator = tracking::TrackingAllocator;

#[cfg(all(feature = "mimalloc", not(feature = "memory_tracking")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Memory Tracking NIFs
// ============================================================================

#[cfg(feature = "memory_tracking")]
use std::sync::atomic::Ordering;

#[cfg(feature = "memory_tracking")]
#[rustler::nif]
fn get_rust_memory() -> usize {
    tracking::ALLOCATED.load(Ordering::SeqCst)
}

#[cfg(feature = "memory_tracking")]
#[rustler::nif]
fn get_rust_memory_peak() -> usize {
    tracking::PEAK_ALLOCATED.load(Ordering::SeqCst)
}

#[cfg(feature = "memory_tracking")]
#[rustler::nif]
fn reset_rust_memory_stats() -> (usize, usize) {
    let current = tracking::ALLOCATED.load(Ordering::SeqCst);
    let peak = tracking::PEAK_ALLOCATED.swap(current, Ordering::SeqCst);
    (current, peak)
}

#[cfg(not(feature = "memory_tracking"))]
#[rustler::nif]
fn get_rust_memory() -> usize {
    0
}

#[cfg(not(feature = "memory_tracking"))]
#[rustler::nif]
fn get_rust_memory_peak() -> usize {
    0
}

#[cfg(not(feature = "memory_tracking"))]
#[rustler::nif]
fn reset_rust_memory_stats() -> (usize, usize) {
    (0, 0)
}

// ============================================================================
// Encoding
// ============================================================================

/// Parse markup and encode it with default options
pub fn encode_xml(input: &[u8]) -> Result<Vec<u8>> {
    let tree = XmlTree::parse(input);
    encode_to_vec(&tree, EncodeOptions::default())
}

/// Encode one document: `{:ok, binary}` or `{:error, {kind, message}}`
#[rustler::nif(schedule = "DirtyCpu")]
fn encode<'a>(env: Env<'a>, input: Binary<'a>) -> Term<'a> {
    let result = encode_xml(input.as_slice()).map(|bytes| bytes_to_binary(env, &bytes));
    result_to_term(env, result)
}

/// Encode independent documents in parallel, one result per input
#[rustler::nif(schedule = "DirtyCpu")]
fn encode_many<'a>(env: Env<'a>, inputs: Vec<Binary<'a>>) -> Term<'a> {
    let slices: Vec<&[u8]> = inputs.iter().map(|b| b.as_slice()).collect();
    let encoded: Vec<Result<Vec<u8>>> = slices.par_iter().map(|s| encode_xml(s)).collect();
    let terms = encoded
        .into_iter()
        .map(|r| result_to_term(env, r.map(|bytes| bytes_to_binary(env, &bytes))))
        .collect();
    list_to_term(env, terms)
}

// ============================================================================
// Decoding
// ============================================================================

/// Open an encoded binary: `{:ok, ref}` or `{:error, {kind, message}}`
#[rustler::nif]
fn open<'a>(env: Env<'a>, input: Binary<'a>) -> Term<'a> {
    match DocumentResource::open(input.as_slice().to_vec()) {
        Ok(resource) => term::ok_tuple(env, ResourceArc::new(resource).encode(env)),
        Err(e) => error_to_term(env, &e),
    }
}

/// Lock the document and convert the outcome of `f`
fn query<'a, F>(env: Env<'a>, doc_ref: &DocumentRef, f: F) -> NifResult<Term<'a>>
where
    F: FnOnce(&EncodedDocument) -> Result<Term<'a>>,
{
    match doc_ref.with_document(f) {
        Ok(result) => Ok(result_to_term(env, result)),
        Err(reason) => Ok((term::error(), reason).encode(env)),
    }
}

#[rustler::nif]
fn root_name<'a>(env: Env<'a>, doc_ref: DocumentRef) -> NifResult<Term<'a>> {
    query(env, &doc_ref, |doc| {
        let root = doc.root_element()?;
        Ok(str_to_binary(env, &root.name()?))
    })
}

/// The whole tree as nested `{:element, name, attrs, children}` tuples
#[rustler::nif(schedule = "DirtyCpu")]
fn root<'a>(env: Env<'a>, doc_ref: DocumentRef) -> NifResult<Term<'a>> {
    query(env, &doc_ref, |doc| element_to_term(env, &doc.root_element()?))
}

#[rustler::nif(schedule = "DirtyCpu")]
fn elements_by_tag_name<'a>(env: Env<'a>, doc_ref: DocumentRef, name: &str) -> NifResult<Term<'a>> {
    query(env, &doc_ref, |doc| {
        let mut terms = Vec::new();
        for element in doc.elements_by_tag_name(name)? {
            terms.push(element_to_term(env, &element)?);
        }
        Ok(list_to_term(env, terms))
    })
}

/// Value of attribute `attr` on every element named `tag`, `nil` where absent
#[rustler::nif]
fn attribute<'a>(env: Env<'a>, doc_ref: DocumentRef, tag: &str, attr: &str) -> NifResult<Term<'a>> {
    query(env, &doc_ref, |doc| {
        let mut terms = Vec::new();
        for element in doc.elements_by_tag_name(tag)? {
            terms.push(match element.attribute_value(attr)? {
                Some(value) => str_to_binary(env, &value),
                None => nil().encode(env),
            });
        }
        Ok(list_to_term(env, terms))
    })
}

#[rustler::nif(schedule = "DirtyCpu")]
fn to_xml<'a>(env: Env<'a>, doc_ref: DocumentRef) -> NifResult<Term<'a>> {
    query(env, &doc_ref, |doc| Ok(str_to_binary(env, &doc.to_xml()?)))
}

#[rustler::nif]
fn cache_stats<'a>(env: Env<'a>, doc_ref: DocumentRef) -> NifResult<Term<'a>> {
    query(env, &doc_ref, |doc| Ok(document_stats_to_term(env, &doc.stats())))
}

// ============================================================================
// NIF Initialization
// ============================================================================

rustler::init!("Elixir.RustyBex.Native");
