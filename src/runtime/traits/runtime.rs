//! Core trait for accelerator backends

use crate::error::Result;
use crate::runtime::{Allocation, AllocationRequest};

/// Core trait for accelerator backends
///
/// `Runtime` is the allocator and transfer channel a tensor talks to. It uses
/// static dispatch via generics; all state lives in the `Device`.
///
/// # Example
///
/// ```
/// use tilr::runtime::{AllocationRequest, MemoryKind, Runtime};
/// use tilr::runtime::sim::{SimDevice, SimRuntime};
///
/// let device = SimDevice::new(0);
/// let request = AllocationRequest { size_bytes: 4096, page_size: 1024, kind: MemoryKind::Dram };
/// let alloc = SimRuntime::allocate(&request, &device).unwrap();
/// SimRuntime::copy_to_device(&[7u8; 4096], &alloc, &device).unwrap();
/// assert!(SimRuntime::deallocate(&alloc, &device));
/// ```
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: super::Device;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Allocate an interleaved device buffer
    ///
    /// Returns `Err(OutOfMemory)` if the requested memory cannot hold it.
    fn allocate(request: &AllocationRequest, device: &Self::Device) -> Result<Allocation>;

    /// Free a device buffer
    ///
    /// Returns `false` if the handle was unknown or already freed; that case
    /// is not an error.
    fn deallocate(allocation: &Allocation, device: &Self::Device) -> bool;

    /// Copy `src` into the buffer, starting at its first byte
    fn copy_to_device(src: &[u8], dst: &Allocation, device: &Self::Device) -> Result<()>;

    /// Copy the first `dst.len()` bytes of the buffer into `dst`
    fn copy_from_device(src: &Allocation, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;
}
