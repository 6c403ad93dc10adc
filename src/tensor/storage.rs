//! Storage: host data and shared device buffers
//!
//! A tensor owns exactly one of:
//! - a `HostBuffer`, exclusively owned, holding typed host elements in
//!   linear order
//! - a `DeviceBuffer`, an Arc-shared handle to an interleaved allocation on
//!   one device, released when the last handle is dropped

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::{Allocation, AllocationRequest, Device, Runtime};
use half::bf16;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Where a tensor's bytes live
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Residency {
    /// Host memory
    Host,
    /// Accelerator memory
    Device,
}

impl fmt::Display for Residency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Device => f.write_str("device"),
        }
    }
}

// ============================================================================
// Host data
// ============================================================================

/// Typed host elements, tagged by host representation
#[derive(Clone, Debug, PartialEq)]
pub enum HostData {
    /// `f32` values (F32 and BFP8 tensors)
    F32(Vec<f32>),
    /// `u32` values
    U32(Vec<u32>),
    /// `bf16` values
    BF16(Vec<bf16>),
}

/// Run `$body` with `$v` bound to the inner vector of any variant
macro_rules! dispatch_host {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            $crate::tensor::HostData::F32($v) => $body,
            $crate::tensor::HostData::U32($v) => $body,
            $crate::tensor::HostData::BF16($v) => $body,
        }
    };
}

/// Rebuild a `HostData` of the same variant from a mapped vector
macro_rules! map_host {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            $crate::tensor::HostData::F32($v) => $crate::tensor::HostData::F32($body),
            $crate::tensor::HostData::U32($v) => $crate::tensor::HostData::U32($body),
            $crate::tensor::HostData::BF16($v) => $crate::tensor::HostData::BF16($body),
        }
    };
}

pub(crate) use {dispatch_host, map_host};

impl HostData {
    /// `count` zero elements in the host representation of `dtype`
    pub fn zeroed(dtype: DType, count: usize) -> Self {
        match dtype.host_dtype() {
            DType::U32 => Self::U32(vec![0; count]),
            DType::BF16 => Self::BF16(vec![bf16::ZERO; count]),
            _ => Self::F32(vec![0.0; count]),
        }
    }

    /// Host dtype of the held elements
    pub fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::F32,
            Self::U32(_) => DType::U32,
            Self::BF16(_) => DType::BF16,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        dispatch_host!(self, v => v.len())
    }

    /// Whether there are no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of the elements
    pub fn as_bytes(&self) -> &[u8] {
        dispatch_host!(self, v => bytemuck::cast_slice(v))
    }

    /// Mutable raw bytes of the elements
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        dispatch_host!(self, v => bytemuck::cast_slice_mut(v))
    }

    /// Decode raw bytes into the host representation of `dtype`
    ///
    /// `bytes.len()` must be a whole number of host elements.
    pub fn from_bytes(dtype: DType, bytes: &[u8]) -> Result<Self> {
        let elem = dtype.host_size_in_bytes();
        if bytes.len() % elem != 0 {
            return Err(Error::size_mismatch(bytes.len().next_multiple_of(elem), bytes.len()));
        }
        Ok(match dtype.host_dtype() {
            DType::U32 => Self::U32(bytemuck::pod_collect_to_vec(bytes)),
            DType::BF16 => Self::BF16(bytemuck::pod_collect_to_vec(bytes)),
            _ => Self::F32(bytemuck::pod_collect_to_vec(bytes)),
        })
    }

    /// Borrow the elements as `T`
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::host_slice(self).ok_or(Error::DTypeMismatch {
            expected: self.dtype(),
            got: T::DTYPE,
        })
    }

    /// Bitwise equality: same variant and identical bytes
    pub fn bit_eq(&self, other: &Self) -> bool {
        self.dtype() == other.dtype() && self.as_bytes() == other.as_bytes()
    }
}

// ============================================================================
// Buffer capability
// ============================================================================

/// Capability shared by host and device buffers
pub trait Buffer {
    /// Where the bytes live
    fn residency(&self) -> Residency;

    /// Size of the buffer contents in bytes
    fn byte_size(&self) -> usize;

    /// Overwrite the buffer with `src`
    fn copy_in(&mut self, src: &[u8]) -> Result<()>;

    /// Copy the buffer into `dst`
    fn copy_out(&self, dst: &mut [u8]) -> Result<()>;

    /// Give the memory back; calling it again is a no-op
    fn release(&mut self);
}

/// Exclusively owned host elements
#[derive(Clone, Debug, PartialEq)]
pub struct HostBuffer {
    data: HostData,
}

impl HostBuffer {
    /// Zero-filled buffer of `count` host elements for `dtype`
    pub fn allocate(dtype: DType, count: usize) -> Self {
        Self {
            data: HostData::zeroed(dtype, count),
        }
    }

    /// Take ownership of existing host data
    pub fn from_data(data: HostData) -> Self {
        Self { data }
    }

    /// Borrow the host data
    #[inline]
    pub fn data(&self) -> &HostData {
        &self.data
    }

    /// Consume the buffer, returning its data
    #[inline]
    pub fn into_data(self) -> HostData {
        self.data
    }
}

impl Buffer for HostBuffer {
    fn residency(&self) -> Residency {
        Residency::Host
    }

    fn byte_size(&self) -> usize {
        self.data.as_bytes().len()
    }

    fn copy_in(&mut self, src: &[u8]) -> Result<()> {
        let dst = self.data.as_bytes_mut();
        if dst.len() != src.len() {
            return Err(Error::size_mismatch(dst.len(), src.len()));
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    fn copy_out(&self, dst: &mut [u8]) -> Result<()> {
        let src = self.data.as_bytes();
        if dst.len() != src.len() {
            return Err(Error::size_mismatch(src.len(), dst.len()));
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    fn release(&mut self) {
        self.data = HostData::zeroed(self.data.dtype(), 0);
    }
}

// ============================================================================
// Device buffer
// ============================================================================

/// Shared handle to a device allocation
///
/// Clones share the allocation. Memory is deallocated when the last handle is
/// dropped, or earlier through [`DeviceBuffer::release`]; after an explicit
/// release every handle reports `BufferReleased` on access.
pub struct DeviceBuffer<R: Runtime> {
    inner: Arc<DeviceBufferInner<R>>,
}

struct DeviceBufferInner<R: Runtime> {
    allocation: Allocation,
    device: R::Device,
    released: AtomicBool,
}

impl<R: Runtime> DeviceBuffer<R> {
    /// Allocate a buffer on `device`
    pub fn allocate(request: &AllocationRequest, device: &R::Device) -> Result<Self> {
        let allocation = R::allocate(request, device)?;
        Ok(Self {
            inner: Arc::new(DeviceBufferInner {
                allocation,
                device: device.clone(),
                released: AtomicBool::new(false),
            }),
        })
    }

    /// Allocation descriptor
    #[inline]
    pub fn allocation(&self) -> &Allocation {
        &self.inner.allocation
    }

    /// Device handle
    #[inline]
    pub fn handle(&self) -> u64 {
        self.inner.allocation.handle
    }

    /// Device owning the allocation
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.inner.device
    }

    /// Whether the buffer was released explicitly
    #[inline]
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Get the reference count
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Check if this is the only reference
    #[inline]
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }

    /// Release the allocation for every handle
    ///
    /// Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        R::deallocate(&self.inner.allocation, &self.inner.device)
    }

    /// Write `src` to the start of the buffer
    pub fn write(&self, src: &[u8]) -> Result<()> {
        self.ensure_live()?;
        R::copy_to_device(src, &self.inner.allocation, &self.inner.device)
    }

    /// Read the start of the buffer into `dst`
    pub fn read(&self, dst: &mut [u8]) -> Result<()> {
        self.ensure_live()?;
        R::copy_from_device(&self.inner.allocation, dst, &self.inner.device)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            let handle = self.handle();
            warn!(handle, "access to released device buffer");
            return Err(Error::BufferReleased { handle });
        }
        Ok(())
    }
}

impl<R: Runtime> Clone for DeviceBuffer<R> {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Runtime> Drop for DeviceBufferInner<R> {
    fn drop(&mut self) {
        if !*self.released.get_mut() {
            R::deallocate(&self.allocation, &self.device);
        }
    }
}

impl<R: Runtime> Buffer for DeviceBuffer<R> {
    fn residency(&self) -> Residency {
        Residency::Device
    }

    fn byte_size(&self) -> usize {
        self.inner.allocation.size_bytes
    }

    fn copy_in(&mut self, src: &[u8]) -> Result<()> {
        if src.len() != self.byte_size() {
            return Err(Error::size_mismatch(self.byte_size(), src.len()));
        }
        self.write(src)
    }

    fn copy_out(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() != self.byte_size() {
            return Err(Error::size_mismatch(self.byte_size(), dst.len()));
        }
        self.read(dst)
    }

    fn release(&mut self) {
        DeviceBuffer::release(self);
    }
}

impl<R: Runtime> fmt::Debug for DeviceBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alloc = &self.inner.allocation;
        f.debug_struct("DeviceBuffer")
            .field("device", &self.inner.device.name())
            .field("handle", &alloc.handle)
            .field("address", &format!("0x{:x}", alloc.address))
            .field("size", &alloc.size_bytes)
            .field("kind", &alloc.kind)
            .field("released", &self.is_released())
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Backing storage of a tensor: host data or a device buffer, never both
pub enum Storage<R: Runtime> {
    /// Host-resident elements
    Host(HostBuffer),
    /// Device-resident bytes
    Device(DeviceBuffer<R>),
}

impl<R: Runtime> Storage<R> {
    /// Where the bytes live
    #[inline]
    pub fn residency(&self) -> Residency {
        match self {
            Self::Host(_) => Residency::Host,
            Self::Device(_) => Residency::Device,
        }
    }

    /// Size of the contents in bytes
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Host(buf) => buf.byte_size(),
            Self::Device(buf) => buf.byte_size(),
        }
    }

    /// Host buffer, if host-resident
    #[inline]
    pub fn as_host(&self) -> Option<&HostBuffer> {
        match self {
            Self::Host(buf) => Some(buf),
            Self::Device(_) => None,
        }
    }

    /// Device buffer, if device-resident
    #[inline]
    pub fn as_device(&self) -> Option<&DeviceBuffer<R>> {
        match self {
            Self::Host(_) => None,
            Self::Device(buf) => Some(buf),
        }
    }
}

impl<R: Runtime> Clone for Storage<R> {
    /// Host data is copied; device buffers are shared
    fn clone(&self) -> Self {
        match self {
            Self::Host(buf) => Self::Host(buf.clone()),
            Self::Device(buf) => Self::Device(buf.clone()),
        }
    }
}

impl<R: Runtime> fmt::Debug for Storage<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(buf) => f
                .debug_struct("Host")
                .field("dtype", &buf.data().dtype())
                .field("len", &buf.data().len())
                .finish(),
            Self::Device(buf) => fmt::Debug::fmt(buf, f),
        }
    }
}
