//! Host/device movement of tensor data
//!
//! Encoding for the device is the layout permutation followed by the dtype
//! packing; decoding runs the same steps in reverse:
//!
//! ```text
//! host (linear) ─ tilize (Tiled) ─ pack (BFP8) ─► device bytes
//! host (linear) ◄ untilize (Tiled) ◄ unpack (BFP8) ─ device bytes
//! ```

use super::core::Tensor;
use super::layout::Layout;
use super::shape::Shape;
use super::storage::{DeviceBuffer, HostBuffer, HostData, Storage, map_host};
use crate::dtype::{DType, bfp8};
use crate::error::{Error, Result};
use crate::runtime::{Device, MemoryConfig, Runtime};
use crate::tile::{tilize, untilize};
use tracing::debug;

/// Reorder linear host data into tiled order
pub(crate) fn tilize_host(data: &HostData, shape: &Shape) -> Result<HostData> {
    Ok(map_host!(data, v => tilize(v, shape)?))
}

/// Reorder tiled host data into linear order
pub(crate) fn untilize_host(data: &HostData, shape: &Shape) -> Result<HostData> {
    Ok(map_host!(data, v => untilize(v, shape)?))
}

/// Device byte image of linear host data
pub(crate) fn encode(data: &HostData, dtype: DType, layout: Layout, shape: &Shape) -> Result<Vec<u8>> {
    let tiled;
    let ordered = match layout {
        Layout::Tiled => {
            tiled = tilize_host(data, shape)?;
            &tiled
        }
        Layout::Linear => data,
    };

    match (dtype, ordered) {
        (DType::BFP8, HostData::F32(values)) => bfp8::pack(values),
        (DType::BFP8, other) => Err(Error::DTypeMismatch {
            expected: DType::F32,
            got: other.dtype(),
        }),
        (_, ordered) => Ok(ordered.as_bytes().to_vec()),
    }
}

/// Linear host data decoded from a device byte image
pub(crate) fn decode(bytes: &[u8], dtype: DType, layout: Layout, shape: &Shape) -> Result<HostData> {
    let data = match dtype {
        DType::BFP8 => HostData::F32(bfp8::unpack(bytes)?),
        _ => HostData::from_bytes(dtype, bytes)?,
    };
    match layout {
        Layout::Tiled => untilize_host(&data, shape),
        Layout::Linear => Ok(data),
    }
}

impl<R: Runtime> Tensor<R> {
    /// Move to `device` in DRAM
    ///
    /// See [`Tensor::to_device_with`].
    pub fn to_device(&self, device: &R::Device) -> Result<Self> {
        self.to_device_with(device, MemoryConfig::default())
    }

    /// Move to `device` with explicit memory placement
    ///
    /// A host tensor is encoded for its layout and dtype, copied into a new
    /// device buffer of `packed_size_bytes(volume)` bytes and returned as a
    /// new tensor; `self` is left as it was. A tensor already on `device` is
    /// returned as a tensor sharing the same buffer, whatever `config` says.
    ///
    /// # Errors
    ///
    /// - `UnsupportedTransfer` if the tensor lives on a different device
    /// - `OutOfMemory` if the device cannot hold the buffer
    pub fn to_device_with(&self, device: &R::Device, config: MemoryConfig) -> Result<Self> {
        match self.storage() {
            Storage::Device(buffer) if buffer.device().is_same(device) => Ok(self.clone()),
            Storage::Device(buffer) => Err(Error::unsupported_transfer(format!(
                "tensor is on {}, moving it to {} is not supported",
                buffer.device().name(),
                device.name()
            ))),
            Storage::Host(host) => {
                let shape = *self.shape();
                let bytes = encode(host.data(), self.dtype(), self.layout(), &shape)?;
                let request = Self::allocation_request(&shape, self.dtype(), self.layout(), config)?;
                if bytes.len() != request.size_bytes {
                    return Err(Error::size_mismatch(request.size_bytes, bytes.len()));
                }

                let buffer = DeviceBuffer::allocate(&request, device)?;
                buffer.write(&bytes)?;
                debug!(
                    handle = buffer.handle(),
                    size = request.size_bytes,
                    kind = %config.kind,
                    device = %device.name(),
                    shape = %shape,
                    dtype = %self.dtype(),
                    layout = %self.layout(),
                    "moved tensor to device"
                );
                Ok(Self::from_parts(
                    shape,
                    self.dtype(),
                    self.layout(),
                    Storage::Device(buffer),
                ))
            }
        }
    }

    /// Move to the host
    ///
    /// A device tensor is copied back, decoded and returned as a new host
    /// tensor in linear order; the device buffer is untouched. A host tensor
    /// is returned as a copy.
    ///
    /// # Errors
    ///
    /// - `BufferReleased` if the device buffer was released
    pub fn to_host(&self) -> Result<Self> {
        let buffer = match self.storage() {
            Storage::Host(_) => return Ok(self.clone()),
            Storage::Device(buffer) => buffer,
        };

        let shape = *self.shape();
        let mut bytes = vec![0u8; self.dtype().packed_size_bytes(shape.volume())?];
        buffer.read(&mut bytes)?;
        let data = decode(&bytes, self.dtype(), self.layout(), &shape)?;
        debug!(
            handle = buffer.handle(),
            size = bytes.len(),
            device = %buffer.device().name(),
            shape = %shape,
            "moved tensor to host"
        );
        Ok(Self::from_parts(
            shape,
            self.dtype(),
            self.layout(),
            Storage::Host(HostBuffer::from_data(data)),
        ))
    }
}
