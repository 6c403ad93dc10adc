//! Common test utilities
#![allow(dead_code)]

use tilr::runtime::sim::{DeviceConfig, SimDevice};
use tilr::tensor::Shape;
use tilr::tile::tilize;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a simulated device with default geometry for testing
pub fn create_sim_device(id: usize) -> SimDevice {
    init_tracing();
    SimDevice::new(id)
}

/// Create a simulated device with a few small banks, for exercising
/// interleaving and out-of-memory paths
pub fn create_small_device(id: usize) -> SimDevice {
    init_tracing();
    SimDevice::with_config(
        DeviceConfig::default()
            .with_device_id(id)
            .with_dram(4, 16 * 1024)
            .with_l1(2, 8 * 1024),
    )
    .expect("valid small device config")
}

/// Shorthand for a valid shape
pub fn shape(dims: [usize; 4]) -> Shape {
    Shape::new(dims).expect("valid shape")
}

/// Assert two f32 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert BFP8 decoded values stay within `max_abs / 32` of the originals,
/// where `max_abs` is taken over each 16-element block in tiled order
pub fn assert_bfp8_bound(original: &[f32], decoded: &[f32], shape: &Shape) {
    let original = tilize(original, shape).expect("tile aligned");
    let decoded = tilize(decoded, shape).expect("tile aligned");
    for (block, (a, b)) in original.chunks(16).zip(decoded.chunks(16)).enumerate() {
        let max_abs = a.iter().fold(0f32, |m, v| m.max(v.abs()));
        for (x, y) in a.iter().zip(b) {
            assert!(
                (x - y).abs() <= max_abs / 32.0,
                "block {}: {} decoded as {} (max_abs={})",
                block,
                x,
                y,
                max_abs
            );
        }
    }
}
