//! Tensor types and operations
//!
//! This module provides the `Tensor` type, a 4-dimensional array with an
//! element type, a layout and a residency, together with the shape, stride
//! and storage types it is built from.

mod core;
mod init;
mod layout;
mod print;
mod shape;
mod storage;
mod strides;
mod transfer;

pub use self::core::Tensor;
pub use init::Initialize;
pub use layout::{Layout, TILE_ELEMENTS, TILE_HEIGHT, TILE_WIDTH};
pub use shape::{RANK, Shape};
pub use storage::{Buffer, DeviceBuffer, HostBuffer, HostData, Residency, Storage};
pub use strides::{Strides, compute_strides};
