//! Error handling and result types for BPlusTreeMap operations.
//!
//! User-facing conditions (missing keys, rejected duplicates, bad restore
//! images) are returned as values. Structural invariant violations are not
//! represented here: they panic, because they can only come from a bug in the
//! tree itself.

use std::io;

/// Error type for B+ tree operations.
#[derive(Debug, Clone, PartialEq)]
pub enum BPlusTreeError {
    /// Key not found in the tree.
    KeyNotFound,
    /// Insert of an existing key into a tree that rejects duplicates.
    DuplicateKey,
    /// Invalid capacity specified.
    InvalidCapacity(String),
    /// Bulk load input was not sorted.
    UnsortedInput(String),
    /// Operation is not allowed in the current tree state.
    InvalidState(String),
    /// Dump header does not match the tree configuration.
    HeaderMismatch(String),
    /// Dump image ended before a complete record was read.
    TruncatedImage(String),
    /// Dump image decoded but describes an invalid tree.
    CorruptedImage(String),
    /// Underlying reader or writer failed.
    Io(String),
}

impl BPlusTreeError {
    /// Create an InvalidCapacity error with context
    pub fn invalid_capacity(capacity: usize, min_required: usize) -> Self {
        Self::InvalidCapacity(format!(
            "Capacity {} is invalid (minimum required: {})",
            capacity, min_required
        ))
    }

    /// Create an InvalidCapacity error for a capacity that cannot be dumped
    pub fn capacity_too_large(capacity: usize, max_allowed: usize) -> Self {
        Self::InvalidCapacity(format!(
            "Capacity {} is invalid (maximum allowed: {})",
            capacity, max_allowed
        ))
    }

    /// Create an UnsortedInput error pointing at the offending position
    pub fn unsorted_input(index: usize) -> Self {
        Self::UnsortedInput(format!("entry {} is out of order", index))
    }

    /// Create an InvalidState error with context
    pub fn invalid_state(operation: &str, state: &str) -> Self {
        Self::InvalidState(format!("Cannot {} in state: {}", operation, state))
    }

    /// Create a HeaderMismatch error naming the field that differs
    pub fn header_mismatch(field: &str, expected: u64, found: u64) -> Self {
        Self::HeaderMismatch(format!(
            "{} mismatch (expected {}, found {})",
            field, expected, found
        ))
    }

    /// Create a TruncatedImage error for the record being read
    pub fn truncated(record: &str) -> Self {
        Self::TruncatedImage(format!("unexpected end of image while reading {}", record))
    }

    /// Create a CorruptedImage error with context
    pub fn corrupted_image(component: &str, details: &str) -> Self {
        Self::CorruptedImage(format!("{}: {}", component, details))
    }

    /// Check if this error was produced while reading a dump image
    pub fn is_restore_error(&self) -> bool {
        matches!(
            self,
            Self::HeaderMismatch(_) | Self::TruncatedImage(_) | Self::CorruptedImage(_) | Self::Io(_)
        )
    }

    /// Check if this error is a capacity error
    pub fn is_capacity_error(&self) -> bool {
        matches!(self, Self::InvalidCapacity(_))
    }
}

impl std::fmt::Display for BPlusTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BPlusTreeError::KeyNotFound => write!(f, "Key not found in tree"),
            BPlusTreeError::DuplicateKey => write!(f, "Key already present in tree"),
            BPlusTreeError::InvalidCapacity(msg) => write!(f, "Invalid capacity: {}", msg),
            BPlusTreeError::UnsortedInput(msg) => write!(f, "Unsorted input: {}", msg),
            BPlusTreeError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            BPlusTreeError::HeaderMismatch(msg) => write!(f, "Header mismatch: {}", msg),
            BPlusTreeError::TruncatedImage(msg) => write!(f, "Truncated image: {}", msg),
            BPlusTreeError::CorruptedImage(msg) => write!(f, "Corrupted image: {}", msg),
            BPlusTreeError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BPlusTreeError {}

impl From<io::Error> for BPlusTreeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::TruncatedImage(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Public result type for tree operations that may fail
pub type BTreeResult<T> = Result<T, BPlusTreeError>;

/// Result type for key lookup operations
pub type KeyResult<T> = Result<T, BPlusTreeError>;

/// Result type for tree modification operations
pub type ModifyResult<T> = Result<T, BPlusTreeError>;

/// Result type for tree construction and validation
pub type InitResult<T> = Result<T, BPlusTreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_eof_maps_to_truncated() {
        let err: BPlusTreeError = io::Error::new(io::ErrorKind::UnexpectedEof, "short").into();
        assert!(matches!(err, BPlusTreeError::TruncatedImage(_)));
        assert!(err.is_restore_error());

        let err: BPlusTreeError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, BPlusTreeError::Io(_)));
    }
}
