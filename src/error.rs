/// Error types for cache restoration
use thiserror::Error;

use crate::tab_data::WindowId;

/// Failures that cannot be handled by falling back to a full rebuild silently.
///
/// A stale or mismatching cache is not an error: restoration returns an empty
/// element list in that case and the caller rebuilds the tree without the cache.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    /// Restored elements and tab records disagree after the DOM was already mutated.
    #[error("structural corruption: {elements} restored elements for {records} tab records")]
    StructuralCorruption { elements: usize, records: usize },

    #[error("a restoration for window {0} is already running")]
    RestoreInProgress(WindowId),

    #[error("DOM operation failed: {0}")]
    Dom(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
