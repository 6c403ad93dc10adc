//! Tile codec: conversion between linear and 32×32 tiled element order
//!
//! Within every (N, C) slice the (H, W) plane is cut into 32×32 tiles. Tiles
//! are emitted in row-major order over the tile grid and the 1024 elements of
//! each tile are row-major inside the tile:
//!
//! ```text
//! linear (H=32, W=64)          tiled
//! ┌────────┬────────┐          ┌────────┐┌────────┐
//! │ tile 0 │ tile 1 │   ───►   │ tile 0 ││ tile 1 │
//! └────────┴────────┘          └────────┘└────────┘
//! ```
//!
//! Both directions are pure permutations: they never pad or truncate, and
//! reject shapes whose H or W is not a multiple of 32.
//!
//! Performance characteristics:
//! - Parallelized over (N, C) slices with Rayon above 64K elements
//! - Memory bandwidth bound (32-element row copies)

use crate::error::{Error, Result};
use crate::tensor::{Shape, TILE_ELEMENTS, TILE_HEIGHT, TILE_WIDTH};
use tracing::trace;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Parallelization threshold: skip Rayon for small tensors (overhead > benefit)
#[cfg(feature = "rayon")]
const PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Position of linear element `(n, c, h, w)` in tiled order
///
/// # Example
/// ```
/// use tilr::tensor::Shape;
/// use tilr::tile::tiled_offset;
/// let shape = Shape::new([1, 1, 32, 64]).unwrap();
/// // first element of the second tile
/// assert_eq!(tiled_offset(&shape, 0, 0, 0, 32), 1024);
/// ```
#[inline]
pub fn tiled_offset(shape: &Shape, n: usize, c: usize, h: usize, w: usize) -> usize {
    let tiles_per_row = shape.w() / TILE_WIDTH;
    let slice = (n * shape.c() + c) * shape.plane();
    let tile = (h / TILE_HEIGHT) * tiles_per_row + w / TILE_WIDTH;
    slice + tile * TILE_ELEMENTS + (h % TILE_HEIGHT) * TILE_WIDTH + w % TILE_WIDTH
}

/// Reorder linear data into tiled order
pub fn tilize<T: Copy + Send + Sync>(src: &[T], shape: &Shape) -> Result<Vec<T>> {
    check(src.len(), shape)?;
    trace!(volume = src.len(), shape = %shape, "tilize");
    Ok(permute(src, shape, tilize_plane))
}

/// Reorder tiled data into linear order
pub fn untilize<T: Copy + Send + Sync>(src: &[T], shape: &Shape) -> Result<Vec<T>> {
    check(src.len(), shape)?;
    trace!(volume = src.len(), shape = %shape, "untilize");
    Ok(permute(src, shape, untilize_plane))
}

fn check(len: usize, shape: &Shape) -> Result<()> {
    if len != shape.volume() {
        return Err(Error::size_mismatch(shape.volume(), len));
    }
    if !shape.is_tile_aligned() {
        return Err(Error::layout_constraint(format!(
            "tile codec requires H and W to be multiples of {TILE_HEIGHT}x{TILE_WIDTH}, got shape {shape}"
        )));
    }
    Ok(())
}

/// Apply `plane_fn` to every (N, C) slice
fn permute<T, F>(src: &[T], shape: &Shape, plane_fn: F) -> Vec<T>
where
    T: Copy + Send + Sync,
    F: Fn(&[T], &mut [T], usize, usize) + Send + Sync,
{
    let (h, w) = (shape.h(), shape.w());
    let plane = shape.plane();
    let mut dst = src.to_vec();

    #[cfg(feature = "rayon")]
    if src.len() >= PARALLEL_THRESHOLD {
        dst.par_chunks_mut(plane)
            .zip(src.par_chunks(plane))
            .for_each(|(out, input)| plane_fn(input, out, h, w));
        return dst;
    }

    for (out, input) in dst.chunks_mut(plane).zip(src.chunks(plane)) {
        plane_fn(input, out, h, w);
    }
    dst
}

fn tilize_plane<T: Copy>(src: &[T], dst: &mut [T], h: usize, w: usize) {
    let tiles_per_row = w / TILE_WIDTH;
    for tile_row in 0..h / TILE_HEIGHT {
        for tile_col in 0..tiles_per_row {
            let tile_base = (tile_row * tiles_per_row + tile_col) * TILE_ELEMENTS;
            for r in 0..TILE_HEIGHT {
                let from = (tile_row * TILE_HEIGHT + r) * w + tile_col * TILE_WIDTH;
                let to = tile_base + r * TILE_WIDTH;
                dst[to..to + TILE_WIDTH].copy_from_slice(&src[from..from + TILE_WIDTH]);
            }
        }
    }
}

fn untilize_plane<T: Copy>(src: &[T], dst: &mut [T], h: usize, w: usize) {
    let tiles_per_row = w / TILE_WIDTH;
    for tile_row in 0..h / TILE_HEIGHT {
        for tile_col in 0..tiles_per_row {
            let tile_base = (tile_row * tiles_per_row + tile_col) * TILE_ELEMENTS;
            for r in 0..TILE_HEIGHT {
                let from = tile_base + r * TILE_WIDTH;
                let to = (tile_row * TILE_HEIGHT + r) * w + tile_col * TILE_WIDTH;
                dst[to..to + TILE_WIDTH].copy_from_slice(&src[from..from + TILE_WIDTH]);
            }
        }
    }
}
