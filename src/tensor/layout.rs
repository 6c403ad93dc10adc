//! Layout: element order of tensor data in memory

use super::shape::Shape;
use crate::dtype::DType;
use crate::error::{Error, Result};
use std::fmt;

/// Tile edge along H
pub const TILE_HEIGHT: usize = 32;

/// Tile edge along W
pub const TILE_WIDTH: usize = 32;

/// Elements in one tile
pub const TILE_ELEMENTS: usize = TILE_HEIGHT * TILE_WIDTH;

/// Element order of a tensor
///
/// `Linear` is plain row-major order over (N, C, H, W). `Tiled` splits every
/// (H, W) plane into 32×32 tiles stored tile-major, each tile row-major; it
/// requires H and W to be multiples of 32.
///
/// Host data is always linear; the layout decides the order used on the
/// device.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Row-major order
    #[default]
    Linear,
    /// 32×32 tile order
    Tiled,
}

impl Layout {
    /// Check that `shape` can be stored in this layout
    pub fn validate(self, shape: &Shape) -> Result<()> {
        if self == Self::Tiled && !shape.is_tile_aligned() {
            return Err(Error::layout_constraint(format!(
                "tiled layout requires H and W to be multiples of {TILE_HEIGHT}x{TILE_WIDTH}, got shape {shape}"
            )));
        }
        Ok(())
    }

    /// Check that `dtype` can be stored in this layout
    pub fn check_dtype(self, dtype: DType) -> Result<()> {
        if dtype.requires_tiled() && self != Self::Tiled {
            return Err(Error::layout_constraint(format!(
                "{dtype} can only be stored in tiled layout"
            )));
        }
        Ok(())
    }

    /// Device page size in bytes: one tile for `Tiled`, one row for `Linear`
    pub fn page_size_bytes(self, dtype: DType, shape: &Shape) -> Result<usize> {
        match self {
            Self::Tiled => dtype.packed_size_bytes(TILE_ELEMENTS),
            Self::Linear => dtype.packed_size_bytes(shape.w()),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::Tiled => f.write_str("tiled"),
        }
    }
}
