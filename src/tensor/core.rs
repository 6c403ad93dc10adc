//! Core Tensor type

use super::init::Initialize;
use super::layout::Layout;
use super::shape::Shape;
use super::storage::{DeviceBuffer, HostBuffer, HostData, Residency, Storage};
use super::strides::{Strides, compute_strides};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::{AllocationRequest, MemoryConfig, Runtime};
use std::borrow::Cow;
use std::fmt;
use tracing::trace;

/// 4-dimensional array resident on the host or on one accelerator device
///
/// `Tensor` consists of:
/// - **Shape/Strides**: (N, C, H, W) extents and row-major element strides
/// - **DType**: element encoding (determined at runtime)
/// - **Layout**: element order on the device, `Linear` or `Tiled`
/// - **Storage**: an owned host buffer or a shared device buffer
///
/// Host data is always kept in linear order. The layout takes effect when
/// data crosses to the device: tiled tensors are tilized (and BFP8 tensors
/// packed) on the way in, and decoded on the way out.
///
/// A constructed tensor always satisfies its invariants: every extent is
/// positive, tiled tensors have H and W divisible by 32, BFP8 tensors are
/// tiled, and the storage holds exactly `volume` elements.
///
/// # Example
///
/// ```
/// use tilr::prelude::*;
///
/// let device = SimDevice::new(0);
/// let shape = Shape::new([1, 1, 32, 64])?;
/// let host = Tensor::<SimRuntime>::new(shape, Initialize::Increment, DType::F32, Layout::Tiled)?;
/// let dev = host.to_device(&device)?;
/// assert_eq!(dev.to_host()?.to_vec::<f32>()?, host.to_vec::<f32>()?);
/// # Ok::<(), tilr::error::Error>(())
/// ```
pub struct Tensor<R: Runtime> {
    shape: Shape,
    strides: Strides,
    dtype: DType,
    layout: Layout,
    storage: Storage<R>,
}

impl<R: Runtime> Tensor<R> {
    /// Check that `(shape, dtype, layout)` describe a storable tensor
    fn validate(shape: &Shape, dtype: DType, layout: Layout) -> Result<()> {
        layout.validate(shape)?;
        layout.check_dtype(dtype)?;
        dtype.packed_size_bytes(shape.volume())?;
        Ok(())
    }

    /// Assemble a tensor from validated parts
    pub(crate) fn from_parts(shape: Shape, dtype: DType, layout: Layout, storage: Storage<R>) -> Self {
        Self {
            shape,
            strides: compute_strides(&shape),
            dtype,
            layout,
            storage,
        }
    }

    // ===== Constructors =====

    /// Create a host tensor filled according to `init`
    ///
    /// # Errors
    ///
    /// - `LayoutConstraint` if the layout is tiled and H or W is not a
    ///   multiple of 32, or if `dtype` cannot be stored in `layout`
    pub fn new(shape: Shape, init: Initialize, dtype: DType, layout: Layout) -> Result<Self> {
        Self::validate(&shape, dtype, layout)?;
        let data = init.generate(dtype, &shape);
        Ok(Self::from_parts(
            shape,
            dtype,
            layout,
            Storage::Host(HostBuffer::from_data(data)),
        ))
    }

    /// Create a tensor filled according to `init` and move it to `device`
    pub fn new_on_device(
        shape: Shape,
        init: Initialize,
        dtype: DType,
        layout: Layout,
        device: &R::Device,
    ) -> Result<Self> {
        Self::new(shape, init, dtype, layout)?.to_device(device)
    }

    /// Create a host tensor from linear-order data
    ///
    /// `T` must be the host representation of `dtype` (`f32` for F32 and
    /// BFP8, `u32` for U32, `bf16` for BF16).
    ///
    /// # Errors
    ///
    /// - `DTypeMismatch` if `T` is not the host representation of `dtype`
    /// - `BufferSizeMismatch` if `data.len()` differs from the shape volume
    /// - `LayoutConstraint` as for [`Tensor::new`]
    pub fn from_host_vec<T: Element>(
        data: Vec<T>,
        shape: Shape,
        dtype: DType,
        layout: Layout,
    ) -> Result<Self> {
        Self::validate(&shape, dtype, layout)?;
        if !T::accepts(dtype) {
            return Err(Error::DTypeMismatch {
                expected: dtype.host_dtype(),
                got: T::DTYPE,
            });
        }
        if data.len() != shape.volume() {
            return Err(Error::size_mismatch(shape.volume(), data.len()));
        }
        Ok(Self::from_parts(
            shape,
            dtype,
            layout,
            Storage::Host(HostBuffer::from_data(T::into_host_data(data))),
        ))
    }

    /// Create a device tensor from linear-order data
    ///
    /// Same requirements as [`Tensor::from_host_vec`]; the data is then
    /// encoded and copied to `device`.
    pub fn from_vec<T: Element>(
        data: Vec<T>,
        shape: Shape,
        dtype: DType,
        layout: Layout,
        device: &R::Device,
    ) -> Result<Self> {
        Self::from_host_vec(data, shape, dtype, layout)?.to_device(device)
    }

    /// Allocate a device tensor without writing its contents
    ///
    /// Reading it back before writing yields whatever the device memory
    /// holds.
    pub fn empty_on_device(
        shape: Shape,
        dtype: DType,
        layout: Layout,
        device: &R::Device,
    ) -> Result<Self> {
        Self::empty_on_device_with(shape, dtype, layout, device, MemoryConfig::default())
    }

    /// [`Tensor::empty_on_device`] with explicit memory placement
    pub fn empty_on_device_with(
        shape: Shape,
        dtype: DType,
        layout: Layout,
        device: &R::Device,
        config: MemoryConfig,
    ) -> Result<Self> {
        Self::validate(&shape, dtype, layout)?;
        let request = Self::allocation_request(&shape, dtype, layout, config)?;
        let buffer = DeviceBuffer::allocate(&request, device)?;
        Ok(Self::from_parts(shape, dtype, layout, Storage::Device(buffer)))
    }

    /// Device buffer request for a tensor description
    pub(crate) fn allocation_request(
        shape: &Shape,
        dtype: DType,
        layout: Layout,
        config: MemoryConfig,
    ) -> Result<AllocationRequest> {
        Ok(AllocationRequest {
            size_bytes: dtype.packed_size_bytes(shape.volume())?,
            page_size: layout.page_size_bytes(dtype, shape)?,
            kind: config.kind,
        })
    }

    // ===== Accessors =====

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &Strides {
        &self.strides
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Get the layout
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Total number of elements
    #[inline]
    pub fn volume(&self) -> usize {
        self.shape.volume()
    }

    /// Where the data lives
    #[inline]
    pub fn residency(&self) -> Residency {
        self.storage.residency()
    }

    /// Whether the data lives on the host
    #[inline]
    pub fn on_host(&self) -> bool {
        self.residency() == Residency::Host
    }

    /// Device holding the data, if device-resident
    #[inline]
    pub fn device(&self) -> Option<&R::Device> {
        self.storage.as_device().map(DeviceBuffer::device)
    }

    /// Get the storage
    #[inline]
    pub fn storage(&self) -> &Storage<R> {
        &self.storage
    }

    /// Host data in linear order, if host-resident
    #[inline]
    pub fn host_data(&self) -> Option<&HostData> {
        self.storage.as_host().map(HostBuffer::data)
    }

    // ===== Metadata changes =====

    /// Reinterpret the tensor with new extents
    ///
    /// At most one extent may be `-1` and is inferred from the volume. Only
    /// shape and strides change; the data and its residency are untouched.
    /// Returns the resolved shape.
    ///
    /// For a tiled device tensor the caller must ensure the new shape is a
    /// meaningful reinterpretation of the tiled bytes; this is not checked.
    ///
    /// # Errors
    ///
    /// - `InvalidShape` if the request is malformed or changes the volume
    /// - `LayoutConstraint` if the layout is tiled and the new H or W is not
    ///   a multiple of 32
    pub fn reshape(&mut self, n: isize, c: isize, h: isize, w: isize) -> Result<Shape> {
        let shape = Shape::resolve_reshape(self.volume(), [n, c, h, w])?;
        self.layout.validate(&shape)?;
        trace!(from = %self.shape, to = %shape, "reshape");
        self.shape = shape;
        self.strides = compute_strides(&shape);
        Ok(shape)
    }

    /// Change the layout tag of a host tensor
    ///
    /// Host data is linear regardless of layout, so only the tag changes.
    ///
    /// # Errors
    ///
    /// - `UnsupportedTransfer` if the tensor is device-resident
    /// - `LayoutConstraint` if the shape or dtype does not fit `layout`
    pub fn set_layout(&mut self, layout: Layout) -> Result<()> {
        if !self.on_host() {
            return Err(Error::unsupported_transfer(
                "layout of a device tensor cannot change; move it to the host first",
            ));
        }
        layout.validate(&self.shape)?;
        layout.check_dtype(self.dtype)?;
        self.layout = layout;
        Ok(())
    }

    /// Release the device buffer now instead of at last drop
    ///
    /// Every tensor sharing the buffer sees it as released afterwards.
    /// Returns `false` for host tensors and already released buffers.
    pub fn deallocate(&mut self) -> bool {
        match &self.storage {
            Storage::Host(_) => false,
            Storage::Device(buffer) => buffer.release(),
        }
    }

    // ===== Data access =====

    /// Linear-order host data, copied back from the device if needed
    pub(crate) fn host_view(&self) -> Result<Cow<'_, HostData>> {
        match &self.storage {
            Storage::Host(buffer) => Ok(Cow::Borrowed(buffer.data())),
            Storage::Device(_) => {
                let host = self.to_host()?;
                match host.storage {
                    Storage::Host(buffer) => Ok(Cow::Owned(buffer.into_data())),
                    Storage::Device(_) => Err(Error::unsupported_transfer(
                        "device to host copy produced a device tensor",
                    )),
                }
            }
        }
    }

    /// Copy the elements out in linear order
    ///
    /// # Errors
    ///
    /// - `DTypeMismatch` if `T` is not the host representation of the dtype
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.host_view()?.as_slice::<T>()?.to_vec())
    }

    /// Whether both tensors have the same metadata and bit-identical
    /// elements
    ///
    /// Device tensors are compared after copying them back.
    pub fn data_eq(&self, other: &Self) -> Result<bool> {
        if self.shape != other.shape || self.dtype != other.dtype || self.layout != other.layout {
            return Ok(false);
        }
        let (mine, theirs) = (self.host_view()?, other.host_view()?);
        Ok(mine.bit_eq(&theirs))
    }
}

impl<R: Runtime> Clone for Tensor<R> {
    /// Host data is copied; device buffers are shared
    fn clone(&self) -> Self {
        Self {
            shape: self.shape,
            strides: self.strides,
            dtype: self.dtype,
            layout: self.layout,
            storage: self.storage.clone(),
        }
    }
}

impl<R: Runtime> fmt::Debug for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("dtype", &self.dtype)
            .field("layout", &self.layout)
            .field("storage", &self.storage)
            .finish()
    }
}

impl<R: Runtime> fmt::Display for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, layout={}, residency={})",
            self.shape,
            self.dtype,
            self.layout,
            self.residency()
        )
    }
}
