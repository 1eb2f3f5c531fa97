//! Elixir term conversion
//!
//! Decoded elements become `{:element, name, [{attr, value}], children}`
//! tuples where text children are plain binaries. Errors become
//! `{:error, {kind, message}}`.

use crate::cache::CacheStats;
use crate::decode::{ChildView, DocumentStats, ElementView};
use crate::error::{BexError, Result};
use rustler::{Atom, Encoder, Env, NewBinary, Term};

rustler::atoms! {
    ok,
    error,
    nil,
    element,
    structural,
    corrupt_data,
    unsupported,
    io,
    mutex_poisoned,
    pages,
    values,
    records,
    hits,
    misses,
    evictions,
    resident,
    hit_ratio,
}

pub fn bytes_to_binary<'a>(env: Env<'a>, bytes: &[u8]) -> Term<'a> {
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}

pub fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    bytes_to_binary(env, s.as_bytes())
}

pub fn ok_tuple<'a>(env: Env<'a>, value: Term<'a>) -> Term<'a> {
    (ok(), value).encode(env)
}

fn kind_atom(err: &BexError) -> Atom {
    match err {
        BexError::Structural(_) => structural(),
        BexError::CorruptData(_) => corrupt_data(),
        BexError::Unsupported(_) => unsupported(),
        BexError::Io(_) => io(),
    }
}

/// `{:error, {kind, message}}`
pub fn error_to_term<'a>(env: Env<'a>, err: &BexError) -> Term<'a> {
    let reason = (kind_atom(err), str_to_binary(env, &err.to_string()));
    (error(), reason).encode(env)
}

/// `{:ok, value}` or the error tuple
pub fn result_to_term<'a>(env: Env<'a>, result: Result<Term<'a>>) -> Term<'a> {
    match result {
        Ok(value) => ok_tuple(env, value),
        Err(e) => error_to_term(env, &e),
    }
}

pub fn list_to_term<'a>(env: Env<'a>, items: Vec<Term<'a>>) -> Term<'a> {
    items
        .into_iter()
        .rev()
        .fold(Term::list_new_empty(env), |list, item| list.list_prepend(item))
}

/// Element whose children are still being converted
struct Pending<'a, 'v> {
    name: Term<'a>,
    attrs: Term<'a>,
    rest: std::vec::IntoIter<ChildView<'v>>,
    built: Vec<Term<'a>>,
}

fn open_element<'a, 'v>(env: Env<'a>, view: &ElementView<'v>) -> Result<Pending<'a, 'v>> {
    let mut attrs = Vec::new();
    for attr in view.attributes()? {
        let pair = (str_to_binary(env, &attr.name()?), str_to_binary(env, &attr.value()?));
        attrs.push(pair.encode(env));
    }
    Ok(Pending {
        name: str_to_binary(env, &view.name()?),
        attrs: list_to_term(env, attrs),
        rest: view.children()?.into_iter(),
        built: Vec::new(),
    })
}

/// Full subtree of `view`, built with an explicit stack
pub fn element_to_term<'a>(env: Env<'a>, view: &ElementView<'_>) -> Result<Term<'a>> {
    let mut stack = vec![open_element(env, view)?];
    while let Some(top) = stack.last_mut() {
        match top.rest.next() {
            Some(ChildView::Text(text)) => top.built.push(str_to_binary(env, &text.value()?)),
            Some(ChildView::Element(child)) => {
                let pending = open_element(env, &child)?;
                stack.push(pending);
            }
            None => {
                let Some(done) = stack.pop() else { break };
                let term = (element(), done.name, done.attrs, list_to_term(env, done.built)).encode(env);
                match stack.last_mut() {
                    Some(parent) => parent.built.push(term),
                    None => return Ok(term),
                }
            }
        }
    }
    Ok(nil().encode(env))
}

fn cache_stats_to_term<'a>(env: Env<'a>, stats: &CacheStats) -> Term<'a> {
    let pairs = [
        (hits(), stats.hits),
        (misses(), stats.misses),
        (evictions(), stats.evictions),
        (resident(), stats.resident as u64),
    ];
    pairs
        .iter()
        .try_fold(Term::map_new(env), |map, (key, value)| map.map_put(*key, *value))
        .and_then(|map| map.map_put(hit_ratio(), stats.hit_ratio()))
        .unwrap_or_else(|_| nil().encode(env))
}

/// `%{pages: %{...}, values: %{...}, records: %{...}}`
pub fn document_stats_to_term<'a>(env: Env<'a>, stats: &DocumentStats) -> Term<'a> {
    let sections = [
        (pages(), &stats.pages),
        (values(), &stats.values),
        (records(), &stats.records),
    ];
    sections
        .iter()
        .try_fold(Term::map_new(env), |map, (key, s)| {
            map.map_put(*key, cache_stats_to_term(env, s))
        })
        .unwrap_or_else(|_| nil().encode(env))
}
