//! ResourceArc wrapper for decoded documents
//!
//! An [`EncodedDocument`] keeps its caches in `RefCell`s, so the BEAM
//! side gets it behind a `Mutex`.

use crate::config::DecodeOptions;
use crate::decode::EncodedDocument;
use crate::error::Result;
use rustler::ResourceArc;
use std::sync::Mutex;

pub struct DocumentResource {
    pub doc: Mutex<EncodedDocument>,
}

impl DocumentResource {
    /// Decode an encoded binary held in memory
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let doc = EncodedDocument::from_bytes(bytes, DecodeOptions::default())?;
        Ok(DocumentResource {
            doc: Mutex::new(doc),
        })
    }

    /// Run `f` with the document locked
    ///
    /// # Errors
    ///
    /// Returns `"mutex_poisoned"` if a previous holder panicked.
    pub fn with_document<F, R>(&self, f: F) -> std::result::Result<R, &'static str>
    where
        F: FnOnce(&EncodedDocument) -> R,
    {
        let guard = self.doc.lock().map_err(|_| "mutex_poisoned")?;
        Ok(f(&guard))
    }
}

#[rustler::resource_impl]
impl rustler::Resource for DocumentResource {}

pub type DocumentRef = ResourceArc<DocumentResource>;
