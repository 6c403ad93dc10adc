//! Integration tests for host/device movement
//!
//! These tests verify that every dtype and layout survives a trip through
//! device memory, and the sharing, release and error rules of device
//! tensors.

mod common;

use common::{assert_bfp8_bound, create_sim_device, create_small_device, shape};
use half::bf16;
use tilr::dtype::DType;
use tilr::error::Error;
use tilr::runtime::sim::SimRuntime;
use tilr::runtime::{MemoryConfig, MemoryKind};
use tilr::tensor::{Initialize, Layout, Tensor};

type SimTensor = Tensor<SimRuntime>;

#[test]
fn test_round_trip_is_exact_for_dense_dtypes() {
    let device = create_sim_device(0);
    let s = shape([2, 2, 64, 32]);
    for dtype in [DType::F32, DType::U32, DType::BF16] {
        for layout in [Layout::Linear, Layout::Tiled] {
            let host = SimTensor::new(s, Initialize::RandomSeeded(11), dtype, layout).unwrap();
            let back = host.to_device(&device).unwrap().to_host().unwrap();
            assert!(back.data_eq(&host).unwrap(), "{dtype} {layout}");
        }
    }
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn test_bfp8_round_trip_within_block_bound() {
    let device = create_sim_device(0);
    let s = shape([1, 2, 64, 64]);
    let values: Vec<f32> = (0..s.volume())
        .map(|i| ((i * 7919) % 2000) as f32 / 100.0 - 10.0)
        .collect();
    let host = SimTensor::from_host_vec(values.clone(), s, DType::BFP8, Layout::Tiled).unwrap();
    let dev = host.to_device(&device).unwrap();
    assert_eq!(dev.storage().as_device().unwrap().allocation().size_bytes, 8 * 1088);

    let decoded = dev.to_vec::<f32>().unwrap();
    assert_bfp8_bound(&values, &decoded, &s);
}

#[test]
fn test_bfp8_exact_for_representable_values() {
    let device = create_sim_device(0);
    let s = shape([1, 1, 32, 32]);
    let host = SimTensor::new(s, Initialize::Ones, DType::BFP8, Layout::Tiled).unwrap();
    let back = host.to_device(&device).unwrap().to_host().unwrap();
    assert!(back.data_eq(&host).unwrap());
}

#[test]
fn test_device_bytes_are_tiled() {
    let device = create_sim_device(0);
    let s = shape([1, 1, 32, 64]);
    let dev = SimTensor::new_on_device(s, Initialize::Increment, DType::U32, Layout::Tiled, &device)
        .unwrap();

    let buffer = dev.storage().as_device().unwrap();
    let mut raw = vec![0u8; 2048 * 4];
    buffer.read(&mut raw).unwrap();
    let words: Vec<u32> = bytemuck::pod_collect_to_vec(&raw);
    assert_eq!(&words[..32], &(0..32).collect::<Vec<u32>>()[..]);
    assert_eq!(words[32], 64);
    assert_eq!(words[1024], 32);
}

#[test]
fn test_to_host_of_host_tensor_is_a_copy() {
    let s = shape([1, 1, 1, 4]);
    let a = SimTensor::new(s, Initialize::Increment, DType::F32, Layout::Linear).unwrap();
    let b = a.to_host().unwrap();
    assert!(a.data_eq(&b).unwrap());
    assert!(b.on_host());
}

#[test]
fn test_same_device_is_identity() {
    let device = create_sim_device(0);
    let s = shape([1, 1, 32, 32]);
    let a = SimTensor::new_on_device(s, Initialize::Ones, DType::F32, Layout::Tiled, &device)
        .unwrap();
    let b = a.to_device(&device).unwrap();
    let c = a.to_device(&device.clone()).unwrap();
    let handle = a.storage().as_device().unwrap().handle();
    assert_eq!(b.storage().as_device().unwrap().handle(), handle);
    assert_eq!(c.storage().as_device().unwrap().ref_count(), 3);
    assert_eq!(device.stats().allocations, 1);
}

#[test]
fn test_cross_device_transfer_is_rejected() {
    let a = create_sim_device(0);
    let b = create_sim_device(1);
    let s = shape([1, 1, 32, 32]);
    let t = SimTensor::new_on_device(s, Initialize::Zeros, DType::U32, Layout::Tiled, &a).unwrap();
    assert!(matches!(
        t.to_device(&b),
        Err(Error::UnsupportedTransfer { .. })
    ));
    assert_eq!(b.live_buffers(), 0);
}

#[test]
fn test_buffer_freed_with_last_tensor() {
    let device = create_sim_device(0);
    let s = shape([1, 1, 32, 32]);
    let a = SimTensor::new_on_device(s, Initialize::Ones, DType::BF16, Layout::Tiled, &device)
        .unwrap();
    let b = a.clone();
    drop(a);
    assert_eq!(device.live_buffers(), 1);
    assert_eq!(b.to_vec::<bf16>().unwrap()[0], bf16::ONE);
    drop(b);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.stats().allocated_bytes, 0);
}

#[test]
fn test_explicit_deallocate_is_idempotent_and_shared() {
    let device = create_sim_device(0);
    let s = shape([1, 1, 1, 32]);
    let mut a = SimTensor::new_on_device(s, Initialize::Ones, DType::U32, Layout::Linear, &device)
        .unwrap();
    let b = a.clone();
    assert!(a.deallocate());
    assert!(!a.deallocate());
    assert!(matches!(b.to_host(), Err(Error::BufferReleased { .. })));
    drop(a);
    drop(b);
    assert_eq!(device.stats().deallocations, 1);
}

#[test]
fn test_out_of_memory_is_reported() {
    // 4 DRAM banks of 16 KiB
    let device = create_small_device(0);
    let s = shape([1, 1, 128, 256]);
    let host = SimTensor::new(s, Initialize::Zeros, DType::F32, Layout::Tiled).unwrap();
    match host.to_device(&device) {
        Err(Error::OutOfMemory { size, available }) => {
            assert_eq!(size, 128 * 256 * 4);
            assert_eq!(available, 4 * 16 * 1024);
        }
        other => panic!("expected OutOfMemory, got {other:?}"),
    }
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn test_l1_and_dram_are_separate() {
    let device = create_small_device(0);
    let s = shape([1, 1, 32, 32]);
    let host = SimTensor::new(s, Initialize::Increment, DType::F32, Layout::Tiled).unwrap();

    let in_l1 = host.to_device_with(&device, MemoryConfig::L1).unwrap();
    let in_dram = host.to_device(&device).unwrap();
    assert_eq!(in_l1.storage().as_device().unwrap().allocation().kind, MemoryKind::L1);
    assert_eq!(in_dram.storage().as_device().unwrap().allocation().kind, MemoryKind::Dram);
    assert!(in_l1.data_eq(&in_dram).unwrap());
}

#[test]
fn test_transfer_statistics() {
    let device = create_sim_device(0);
    let s = shape([1, 1, 32, 32]);
    let host = SimTensor::new(s, Initialize::Ones, DType::BFP8, Layout::Tiled).unwrap();
    let dev = host.to_device(&device).unwrap();
    let _ = dev.to_host().unwrap();
    let _ = dev.to_host().unwrap();

    let stats = device.stats();
    assert_eq!(stats.h2d_transfers, 1);
    assert_eq!(stats.h2d_bytes, 1088);
    assert_eq!(stats.d2h_transfers, 2);
    assert_eq!(stats.d2h_bytes, 2 * 1088);
}

#[test]
fn test_tensor_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SimTensor>();
}
