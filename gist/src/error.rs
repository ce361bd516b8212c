//! Error types for the tree engine.

use storage::{PageId, StorageError};
use thiserror::Error;

/// Result type for tree operations.
pub type GistResult<T> = Result<T, GistError>;

/// Errors that can occur in tree operations.
#[derive(Debug, Error)]
pub enum GistError {
    /// The backend failed; the structural operation stopped at that point.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A buffer cannot hold the declared structure.
    #[error("buffer too short: need {needed} bytes, have {available}")]
    TooShort {
        /// Bytes the structure requires.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// A page that should be well formed is not.
    #[error("corrupt page {page}: {reason}")]
    Corrupt {
        /// The offending page.
        page: PageId,
        /// Description of the problem.
        reason: String,
    },

    /// The policy broke its contract (e.g. an empty split head).
    #[error("policy contract violated: {0}")]
    Policy(String),

    /// The cancel token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The cancel token's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The search consumer dropped its receiver.
    #[error("search consumer disconnected")]
    SinkClosed,
}

impl GistError {
    /// Creates a new corruption error.
    pub fn corrupt(page: PageId, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            page,
            reason: reason.into(),
        }
    }

    /// True for [`GistError::Cancelled`] and [`GistError::DeadlineExceeded`].
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GistError::TooShort {
            needed: 40,
            available: 16,
        };
        assert!(err.to_string().contains("40"));
        assert!(err.to_string().contains("16"));

        let err = GistError::corrupt(42, "mixed leaf and internal entries");
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("mixed"));
    }

    #[test]
    fn test_error_from_storage() {
        let err: GistError = StorageError::ReadOnly.into();
        assert!(matches!(err, GistError::Storage(StorageError::ReadOnly)));
        assert!(!err.is_cancellation());
    }

    #[test]
    fn test_cancellation_kinds() {
        assert!(GistError::Cancelled.is_cancellation());
        assert!(GistError::DeadlineExceeded.is_cancellation());
        assert!(!GistError::SinkClosed.is_cancellation());
    }
}
