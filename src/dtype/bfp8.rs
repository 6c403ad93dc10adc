//! BFP8 block floating point packing
//!
//! A BFP8 tile holds 1024 values as:
//!
//! ```text
//! [ 64 shared exponents ][ 1024 sign/mantissa bytes ]
//! ```
//!
//! Each run of 16 consecutive values (in the order handed to [`pack`], which
//! for tensors is tiled order) shares the largest f32 exponent of the run.
//! Every value keeps its sign bit and a 7-bit mantissa (hidden bit included)
//! shifted right to that shared exponent. Mantissa bits are truncated, so the
//! absolute error of an element is below `max_abs_in_block / 32`.
//!
//! Zeros and subnormals encode as zero. Infinities and NaNs are not
//! preserved.

use crate::error::{Error, Result};
use crate::tensor::TILE_ELEMENTS;

/// Values sharing one exponent
pub const BLOCK_ELEMENTS: usize = 16;

/// Shared exponents per tile
pub const EXPONENTS_PER_TILE: usize = TILE_ELEMENTS / BLOCK_ELEMENTS;

/// Encoded bytes per tile
pub const TILE_BYTES: usize = EXPONENTS_PER_TILE + TILE_ELEMENTS;

const MANTISSA_BITS: u32 = 7;

/// Pack f32 values into BFP8 tiles
///
/// `values.len()` must be a multiple of 1024.
pub fn pack(values: &[f32]) -> Result<Vec<u8>> {
    if values.len() % TILE_ELEMENTS != 0 {
        return Err(Error::size_mismatch(
            values.len().next_multiple_of(TILE_ELEMENTS),
            values.len(),
        ));
    }

    let mut out = vec![0u8; values.len() / TILE_ELEMENTS * TILE_BYTES];
    for (tile, encoded) in values
        .chunks_exact(TILE_ELEMENTS)
        .zip(out.chunks_exact_mut(TILE_BYTES))
    {
        let (exponents, mantissas) = encoded.split_at_mut(EXPONENTS_PER_TILE);
        for ((block, shared), block_out) in tile
            .chunks_exact(BLOCK_ELEMENTS)
            .zip(exponents.iter_mut())
            .zip(mantissas.chunks_exact_mut(BLOCK_ELEMENTS))
        {
            *shared = pack_block(block, block_out);
        }
    }
    Ok(out)
}

/// Unpack BFP8 tiles back into f32 values
///
/// `bytes.len()` must be a multiple of 1088.
pub fn unpack(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % TILE_BYTES != 0 {
        return Err(Error::size_mismatch(
            bytes.len().next_multiple_of(TILE_BYTES),
            bytes.len(),
        ));
    }

    let mut out = vec![0f32; bytes.len() / TILE_BYTES * TILE_ELEMENTS];
    for (encoded, tile) in bytes
        .chunks_exact(TILE_BYTES)
        .zip(out.chunks_exact_mut(TILE_ELEMENTS))
    {
        let (exponents, mantissas) = encoded.split_at(EXPONENTS_PER_TILE);
        for ((&shared, block_in), block) in exponents
            .iter()
            .zip(mantissas.chunks_exact(BLOCK_ELEMENTS))
            .zip(tile.chunks_exact_mut(BLOCK_ELEMENTS))
        {
            for (&byte, value) in block_in.iter().zip(block.iter_mut()) {
                *value = decode(byte, shared);
            }
        }
    }
    Ok(out)
}

/// Encode one block, returning the shared exponent
fn pack_block(block: &[f32], out: &mut [u8]) -> u8 {
    let shared = block
        .iter()
        .map(|v| biased_exponent(*v))
        .max()
        .unwrap_or(0);
    for (&v, byte) in block.iter().zip(out.iter_mut()) {
        *byte = encode(v, shared);
    }
    shared
}

#[inline]
fn biased_exponent(v: f32) -> u8 {
    ((v.to_bits() >> 23) & 0xFF) as u8
}

#[inline]
fn encode(v: f32, shared: u8) -> u8 {
    let bits = v.to_bits();
    let sign = ((bits >> 31) as u8) << MANTISSA_BITS;
    let exp = biased_exponent(v);
    if exp == 0 {
        return sign;
    }
    let mantissa = (1u32 << (MANTISSA_BITS - 1)) | ((bits >> 17) & 0x3F);
    let shift = u32::from(shared - exp);
    let mantissa = if shift >= MANTISSA_BITS {
        0
    } else {
        mantissa >> shift
    };
    sign | mantissa as u8
}

#[inline]
fn decode(byte: u8, shared: u8) -> f32 {
    let mantissa = byte & 0x7F;
    let magnitude = if mantissa == 0 {
        0.0
    } else {
        // mantissa carries the hidden bit at position 6
        f32::from(mantissa) * 2f32.powi(i32::from(shared) - 127 - (MANTISSA_BITS as i32 - 1))
    };
    if byte & 0x80 != 0 { -magnitude } else { magnitude }
}
