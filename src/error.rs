//! Error types for tilr

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using tilr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tilr operations
///
/// Every variant is a synchronous contract violation reported at the point
/// of detection. Nothing is retried internally.
#[derive(Error, Debug)]
pub enum Error {
    /// Non-positive extent, multiple reshape wildcards, or a wildcard that
    /// does not divide the volume exactly
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// Why the shape was rejected
        reason: String,
    },

    /// Tile alignment or layout/dtype compatibility violated
    #[error("Layout constraint violated: {reason}")]
    LayoutConstraint {
        /// Which constraint failed
        reason: String,
    },

    /// Supplied data length does not match the required length
    #[error("Buffer size mismatch: expected {expected}, got {got}")]
    BufferSizeMismatch {
        /// Required length (elements or bytes, depending on the call)
        expected: usize,
        /// Supplied length
        got: usize,
    },

    /// Cross-device move, or a transfer that is not possible for the
    /// tensor's current residency
    #[error("Unsupported transfer: {reason}")]
    UnsupportedTransfer {
        /// Description of the rejected transfer
        reason: String,
    },

    /// Device allocation failed
    #[error("Out of memory: failed to allocate {size} bytes ({available} bytes available)")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
        /// Bytes still free in the memory that was asked
        available: usize,
    },

    /// Host data element type does not match the tensor dtype
    #[error("DType mismatch: expected host data for {expected}, got {got}")]
    DTypeMismatch {
        /// Host representation the tensor dtype requires
        expected: DType,
        /// Host representation that was supplied
        got: DType,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Device handle is not present in the device's buffer table
    #[error("Unknown device buffer handle {handle}")]
    UnknownBuffer {
        /// The handle that was looked up
        handle: u64,
    },

    /// Device buffer was used after it was released
    #[error("Device buffer {handle} has been released")]
    BufferReleased {
        /// Handle of the released buffer
        handle: u64,
    },
}

impl Error {
    /// Create an invalid shape error
    pub fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            reason: reason.into(),
        }
    }

    /// Create a layout constraint error
    pub fn layout_constraint(reason: impl Into<String>) -> Self {
        Self::LayoutConstraint {
            reason: reason.into(),
        }
    }

    /// Create an unsupported transfer error
    pub fn unsupported_transfer(reason: impl Into<String>) -> Self {
        Self::UnsupportedTransfer {
            reason: reason.into(),
        }
    }

    /// Create a buffer size mismatch error
    pub fn size_mismatch(expected: usize, got: usize) -> Self {
        Self::BufferSizeMismatch { expected, got }
    }
}
