//! Error types
//!
//! Every fallible operation in the crate returns [`Result`]. Errors are
//! grouped by where they originate:
//!
//! - `Structural`: the source tree cannot be encoded (encode time)
//! - `CorruptData`: the binary layout is inconsistent or truncated (decode time)
//! - `Unsupported`: a mutation was attempted on a read-only view
//! - `Io`: the backing medium failed; propagated unchanged

use std::io;
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum BexError {
    /// The source tree violates an encoder precondition
    #[error("structural error: {0}")]
    Structural(String),

    /// The encoded bytes do not describe a consistent document
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// The operation is not available on decoded documents
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Backing source or target failure
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl BexError {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        BexError::Structural(msg.into())
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        BexError::CorruptData(msg.into())
    }

    /// Short machine-readable tag, used for `{:error, reason}` tuples
    pub fn kind(&self) -> &'static str {
        match self {
            BexError::Structural(_) => "structural",
            BexError::CorruptData(_) => "corrupt_data",
            BexError::Unsupported(_) => "unsupported",
            BexError::Io(_) => "io",
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_conversion() {
        fn fails() -> Result<()> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("short"));
    }

    #[test]
    fn test_display() {
        let err = BexError::structural("document has 2 root elements");
        assert_eq!(err.to_string(), "structural error: document has 2 root elements");
        assert_eq!(BexError::Unsupported("set_attribute").kind(), "unsupported");
    }
}
