//! # tilr
//!
//! **Tensor data model with tiled layouts and host/device residency for
//! accelerator runtimes.**
//!
//! tilr represents 4-dimensional tensors (N, C, H, W) together with the
//! metadata an accelerator needs to consume them: element type, memory layout
//! and residency. It converts between linear row-major order and the 32×32
//! tiled order used by accelerator compute units, packs block floating point
//! data, and moves tensors between host memory and device memory.
//!
//! ## Features
//!
//! - **Layouts**: linear and 32×32 tiled, with an exact tile codec
//! - **DTypes**: f32, u32, bf16 and BFP8 (8-bit block floating point with one
//!   exponent per 16 elements)
//! - **Residency**: host tensors own their data; device tensors share an
//!   interleaved device buffer that is freed with its last handle
//! - **Simulated device**: DRAM and L1 banks with interleaved page placement,
//!   used as the reference backend
//!
//! ## Quick Start
//!
//! ```rust
//! use tilr::prelude::*;
//!
//! let device = SimDevice::new(0);
//! let shape = Shape::new([1, 1, 32, 32])?;
//! let t = Tensor::<SimRuntime>::new_on_device(
//!     shape,
//!     Initialize::Increment,
//!     DType::BF16,
//!     Layout::Tiled,
//!     &device,
//! )?;
//! let host = t.to_host()?;
//! assert_eq!(host.to_vec::<half::bf16>()?[5].to_f32(), 5.0);
//! # Ok::<(), tilr::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): parallel tile codec over (N, C) slices

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod dtype;
pub mod error;
pub mod runtime;
pub mod tensor;
pub mod tile;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::runtime::sim::{SimDevice, SimRuntime};
    pub use crate::runtime::{Device, MemoryConfig, MemoryKind, Runtime};
    pub use crate::tensor::{Initialize, Layout, Residency, Shape, Tensor};
}
