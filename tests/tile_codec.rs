//! Property-based tests for the tile codec and BFP8 packing
//!
//! These tests use proptest to check that tilize/untilize are inverse
//! permutations agreeing with `tiled_offset`, and that BFP8 stays within its
//! per-block error bound.

mod common;

use common::{assert_bfp8_bound, create_sim_device, shape};
use proptest::prelude::*;
use tilr::dtype::{DType, bfp8};
use tilr::error::Error;
use tilr::runtime::sim::SimRuntime;
use tilr::tensor::{Layout, Shape, Tensor, compute_strides};
use tilr::tile::{tiled_offset, tilize, untilize};

// ============================================================================
// Test Utilities
// ============================================================================

/// Strategy for tile-aligned shapes with a few tiles per plane
fn aligned_shape_strategy() -> impl Strategy<Value = Shape> {
    (1usize..3, 1usize..3, 1usize..4, 1usize..4)
        .prop_map(|(n, c, th, tw)| shape([n, c, th * 32, tw * 32]))
}

/// Strategy for BFP8 tiles with a wide value range
fn bfp8_tile_strategy() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.0e4f32..1.0e4, 1024)
}

// ============================================================================
// Tile Codec Properties
// ============================================================================

proptest! {
    /// Property: untilize inverts tilize
    #[test]
    fn prop_tilize_round_trip(s in aligned_shape_strategy()) {
        let data: Vec<u32> = (0..s.volume() as u32).collect();
        let tiled = tilize(&data, &s).unwrap();
        prop_assert_eq!(untilize(&tiled, &s).unwrap(), data);
    }

    /// Property: every linear element lands at `tiled_offset`
    #[test]
    fn prop_tilize_matches_offset(s in aligned_shape_strategy()) {
        let data: Vec<u32> = (0..s.volume() as u32).collect();
        let tiled = tilize(&data, &s).unwrap();
        for n in 0..s.n() {
            for c in 0..s.c() {
                for h in 0..s.h() {
                    for w in 0..s.w() {
                        let linear = s.offset(n, c, h, w);
                        prop_assert_eq!(tiled[tiled_offset(&s, n, c, h, w)], data[linear]);
                    }
                }
            }
        }
    }

    /// Property: row-major offsets enumerate 0..volume in index order
    #[test]
    fn prop_stride_addressing_is_dense(
        n in 1usize..4, c in 1usize..4, h in 1usize..6, w in 1usize..6,
    ) {
        let s = shape([n, c, h, w]);
        let strides = compute_strides(&s);
        prop_assert_eq!(strides[3], 1);
        let mut expected = 0;
        for i in 0..n {
            for j in 0..c {
                for k in 0..h {
                    for l in 0..w {
                        prop_assert_eq!(s.offset(i, j, k, l), expected);
                        expected += 1;
                    }
                }
            }
        }
        prop_assert_eq!(expected, s.volume());
    }

    /// Property: tilize is a permutation (no element lost or duplicated)
    #[test]
    fn prop_tilize_is_permutation(s in aligned_shape_strategy()) {
        let data: Vec<u32> = (0..s.volume() as u32).collect();
        let mut tiled = tilize(&data, &s).unwrap();
        tiled.sort_unstable();
        prop_assert_eq!(tiled, data);
    }

    /// Property: BFP8 error stays below max_abs / 32 per 16-element block
    #[test]
    fn prop_bfp8_error_bound(values in bfp8_tile_strategy()) {
        let decoded = bfp8::unpack(&bfp8::pack(&values).unwrap()).unwrap();
        prop_assert_eq!(decoded.len(), values.len());
        for (a, b) in values.chunks(16).zip(decoded.chunks(16)) {
            let max_abs = a.iter().fold(0f32, |m, v| m.max(v.abs()));
            for (x, y) in a.iter().zip(b) {
                prop_assert!((x - y).abs() <= max_abs / 32.0, "{} decoded as {}", x, y);
            }
        }
    }

    /// Property: BFP8 never increases magnitude and keeps the sign
    #[test]
    fn prop_bfp8_truncates_toward_zero(values in bfp8_tile_strategy()) {
        let decoded = bfp8::unpack(&bfp8::pack(&values).unwrap()).unwrap();
        for (x, y) in values.iter().zip(&decoded) {
            prop_assert!(y.abs() <= x.abs());
            prop_assert!(*y == 0.0 || y.signum() == x.signum());
        }
    }
}

// ============================================================================
// Fixed Cases
// ============================================================================

#[test]
fn test_tiled_offset_corners() {
    let s = shape([2, 3, 64, 96]);
    let plane = 64 * 96;
    assert_eq!(tiled_offset(&s, 0, 0, 0, 0), 0);
    assert_eq!(tiled_offset(&s, 0, 0, 0, 31), 31);
    assert_eq!(tiled_offset(&s, 0, 0, 1, 0), 32);
    assert_eq!(tiled_offset(&s, 0, 0, 0, 64), 2 * 1024);
    assert_eq!(tiled_offset(&s, 0, 0, 32, 0), 3 * 1024);
    assert_eq!(tiled_offset(&s, 0, 1, 0, 0), plane);
    assert_eq!(tiled_offset(&s, 1, 0, 0, 0), 3 * plane);
    assert_eq!(tiled_offset(&s, 1, 2, 63, 95), s.volume() - 1);
}

#[test]
fn test_codec_rejections() {
    let unaligned = shape([1, 1, 16, 32]);
    assert!(matches!(
        tilize(&[0u8; 512], &unaligned),
        Err(Error::LayoutConstraint { .. })
    ));
    let aligned = shape([1, 1, 32, 32]);
    assert!(matches!(
        untilize(&[0u8; 1000], &aligned),
        Err(Error::BufferSizeMismatch {
            expected: 1024,
            got: 1000
        })
    ));
}

#[test]
fn test_bfp8_zero_block_and_sizes() {
    let packed = bfp8::pack(&[0.0f32; 2048]).unwrap();
    assert_eq!(packed.len(), 2 * bfp8::TILE_BYTES);
    assert!(packed.iter().all(|&b| b == 0));
    assert!(bfp8::pack(&[0.0f32; 1000]).is_err());
    assert!(bfp8::unpack(&[0u8; 1000]).is_err());
}

#[test]
fn test_bfp8_powers_of_two_are_exact() {
    let values: Vec<f32> = (0..1024).map(|i| if i % 2 == 0 { 4.0 } else { -0.5 }).collect();
    let decoded = bfp8::unpack(&bfp8::pack(&values).unwrap()).unwrap();
    assert_eq!(decoded, values);
}

#[test]
fn test_bfp8_bound_through_device_multi_tile() {
    let device = create_sim_device(0);
    let s = shape([2, 1, 64, 32]);
    let values: Vec<f32> = (0..s.volume())
        .map(|i| ((i as f32) * 0.37).sin() * 100.0)
        .collect();
    let t = Tensor::<SimRuntime>::from_vec(values.clone(), s, DType::BFP8, Layout::Tiled, &device)
        .unwrap();
    assert_eq!(device.stats().h2d_bytes, 4 * bfp8::TILE_BYTES as u64);
    assert_bfp8_bound(&values, &t.to_vec::<f32>().unwrap(), &s);
}
