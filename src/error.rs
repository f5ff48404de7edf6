//! Error Types
//!
//! Hoard keeps its error surface deliberately small: hot-path cache
//! operations report outcomes as booleans or `Option`s (admitted, rejected,
//! dropped, hit, miss) and never fail, so `HoardError` only covers the
//! operations that can genuinely go wrong — index mutation, the JSON
//! import/export envelope, and use after close.
//!
//! # Example
//!
//! ```rust,ignore
//! use hoard::{VectorStore, VectorStoreConfig, Result};
//!
//! fn restore(bytes: &[u8]) -> Result<VectorStore> {
//!     let store = VectorStore::new(VectorStoreConfig::default());
//!     store.import_from_bytes(bytes)?; // propagates Serialization errors
//!     Ok(store)
//! }
//! ```

use thiserror::Error;

/// Error types for hoard operations
#[derive(Error, Debug)]
pub enum HoardError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Store is closed")]
    Closed,
}

/// Result type alias for hoard operations
pub type Result<T> = std::result::Result<T, HoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HoardError::Index("entry point missing".to_string());
        assert_eq!(err.to_string(), "Index error: entry point missing");
        assert_eq!(HoardError::Closed.to_string(), "Store is closed");
    }

    #[test]
    fn test_serde_error_conversion() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: HoardError = bad.unwrap_err().into();
        assert!(matches!(err, HoardError::Serialization(_)));
    }
}
