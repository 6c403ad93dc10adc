//! Element trait for mapping Rust types to DType

use super::DType;
use crate::tensor::HostData;
use bytemuck::{Pod, Zeroable};
use half::bf16;
use rand::Rng;
use std::fmt::{Debug, Display};

/// Trait for types that can be host elements of a tensor
///
/// This trait connects Rust's type system to tilr's runtime dtype system.
/// Only host representations implement it: `f32`, `u32` and `bf16`. BFP8
/// tensors are built from and read back as `f32`.
///
/// # Bounds
/// - `Pod + Zeroable` - Safe memory transmutation (bytemuck)
/// - `Display + Debug` - Element rendering for printing
pub trait Element:
    Copy + Send + Sync + Pod + Zeroable + PartialEq + Display + Debug + 'static
{
    /// The host dtype for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for generic numeric code
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    /// Draw one value for random initialization
    ///
    /// Floats are uniform in [0, 1); integers are uniform in [0, 1024).
    fn sample<G: Rng>(rng: &mut G) -> Self;

    /// Wrap a vector in the matching tagged host data variant
    fn into_host_data(data: Vec<Self>) -> HostData;

    /// Borrow the elements of `data` if it holds this type
    fn host_slice(data: &HostData) -> Option<&[Self]>;

    /// Zero value
    #[inline]
    fn zero() -> Self {
        Self::zeroed()
    }

    /// One value
    #[inline]
    fn one() -> Self {
        Self::from_f64(1.0)
    }

    /// Whether host data of this type can back a tensor of `dtype`
    #[inline]
    fn accepts(dtype: DType) -> bool {
        dtype.host_dtype() == Self::DTYPE
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    fn sample<G: Rng>(rng: &mut G) -> Self {
        rng.random::<f32>()
    }

    fn into_host_data(data: Vec<Self>) -> HostData {
        HostData::F32(data)
    }

    fn host_slice(data: &HostData) -> Option<&[Self]> {
        match data {
            HostData::F32(v) => Some(v),
            _ => None,
        }
    }
}

impl Element for u32 {
    const DTYPE: DType = DType::U32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as u32
    }

    fn sample<G: Rng>(rng: &mut G) -> Self {
        rng.random_range(0..1024)
    }

    fn into_host_data(data: Vec<Self>) -> HostData {
        HostData::U32(data)
    }

    fn host_slice(data: &HostData) -> Option<&[Self]> {
        match data {
            HostData::U32(v) => Some(v),
            _ => None,
        }
    }
}

impl Element for bf16 {
    const DTYPE: DType = DType::BF16;

    #[inline]
    fn to_f64(self) -> f64 {
        bf16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        bf16::from_f64(v)
    }

    fn sample<G: Rng>(rng: &mut G) -> Self {
        bf16::from_f32(rng.random::<f32>())
    }

    fn into_host_data(data: Vec<Self>) -> HostData {
        HostData::BF16(data)
    }

    fn host_slice(data: &HostData) -> Option<&[Self]> {
        match data {
            HostData::BF16(v) => Some(v),
            _ => None,
        }
    }
}
