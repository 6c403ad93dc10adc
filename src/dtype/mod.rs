//! Data type system for tilr tensors
//!
//! This module provides the `DType` enum and the packed-size table that every
//! buffer size computation in the crate goes through.

pub mod bfp8;
mod element;

pub use element::Element;

use crate::error::{Error, Result};
use crate::tensor::TILE_ELEMENTS;
use std::fmt;

// ============================================================================
// DType Enum
// ============================================================================

/// Element encodings supported by tilr tensors
///
/// # Discriminant Values (Serialization Stability)
///
/// - Floats: 0-9 (F32=1, BF16=3)
/// - Block floats: 10-19 (BFP8=10)
/// - Unsigned ints: 20-29 (U32=21)
///
/// Existing values are never changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    /// 32-bit floating point
    F32 = 1,
    /// 16-bit brain floating point
    BF16 = 3,
    /// Block floating point: 16 elements share one 8-bit exponent, each
    /// element keeps a sign bit and a 7-bit mantissa. Only exists in tiled
    /// layout.
    BFP8 = 10,
    /// 32-bit unsigned integer
    U32 = 21,
}

/// Packing unit of a dtype: `bytes_per_block` bytes hold
/// `elements_per_block` elements
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockFormat {
    /// Elements covered by one block
    pub elements_per_block: usize,
    /// Encoded size of one block
    pub bytes_per_block: usize,
}

impl BlockFormat {
    const fn dense(bytes: usize) -> Self {
        Self {
            elements_per_block: 1,
            bytes_per_block: bytes,
        }
    }

    /// Whether each element has its own byte range
    #[inline]
    pub const fn is_dense(&self) -> bool {
        self.elements_per_block == 1
    }
}

impl DType {
    /// All dtypes, in discriminant order
    pub const ALL: [DType; 4] = [DType::F32, DType::BF16, DType::BFP8, DType::U32];

    /// Packing table
    ///
    /// | dtype | elements/block | bytes/block |
    /// |-------|----------------|-------------|
    /// | F32   | 1              | 4           |
    /// | BF16  | 1              | 2           |
    /// | BFP8  | 1024           | 1088        |
    /// | U32   | 1              | 4           |
    ///
    /// A BFP8 block is one tile: 64 shared exponents followed by 1024
    /// sign/mantissa bytes.
    #[inline]
    pub const fn block_format(self) -> BlockFormat {
        match self {
            Self::F32 | Self::U32 => BlockFormat::dense(4),
            Self::BF16 => BlockFormat::dense(2),
            Self::BFP8 => BlockFormat {
                elements_per_block: TILE_ELEMENTS,
                bytes_per_block: bfp8::TILE_BYTES,
            },
        }
    }

    /// Encoded size of `element_count` elements
    ///
    /// This is the only place buffer sizes are derived from. Block formats
    /// require a whole number of blocks (`BufferSizeMismatch`); a size that
    /// overflows `usize` is an `InvalidArgument`.
    pub fn packed_size_bytes(self, element_count: usize) -> Result<usize> {
        let format = self.block_format();
        if element_count % format.elements_per_block != 0 {
            let expected = element_count.next_multiple_of(format.elements_per_block);
            return Err(Error::size_mismatch(expected, element_count));
        }
        (element_count / format.elements_per_block)
            .checked_mul(format.bytes_per_block)
            .ok_or_else(|| Error::InvalidArgument {
                arg: "element_count",
                reason: format!("{element_count} {self} elements do not fit in addressable memory"),
            })
    }

    /// DType of the values held on the host for this dtype
    ///
    /// BFP8 has no per-element host encoding; its host values are F32.
    #[inline]
    pub const fn host_dtype(self) -> Self {
        match self {
            Self::BFP8 => Self::F32,
            other => other,
        }
    }

    /// Size of one host element in bytes
    #[inline]
    pub const fn host_size_in_bytes(self) -> usize {
        match self.host_dtype() {
            Self::BF16 => 2,
            _ => 4,
        }
    }

    /// Size of `element_count` host elements in bytes
    #[inline]
    pub const fn host_size_bytes(self, element_count: usize) -> usize {
        element_count * self.host_size_in_bytes()
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::BF16 | Self::BFP8)
    }

    /// Returns true if elements share encoded bits
    #[inline]
    pub const fn is_block_format(self) -> bool {
        !self.block_format().is_dense()
    }

    /// Returns true if this dtype can only be stored in tiled layout
    #[inline]
    pub const fn requires_tiled(self) -> bool {
        matches!(self, Self::BFP8)
    }

    /// Short name of this dtype
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::BF16 => "bf16",
            Self::BFP8 => "bfp8",
            Self::U32 => "u32",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
