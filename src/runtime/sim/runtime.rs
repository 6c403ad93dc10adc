//! Simulated runtime implementation

use super::config::DeviceConfig;
use super::device::SimDevice;
use crate::error::Result;
use crate::runtime::{Allocation, AllocationRequest, Runtime};
use std::sync::OnceLock;
use tracing::warn;

/// Simulated accelerator runtime
///
/// All state lives in `SimDevice`; this type only routes calls to it.
#[derive(Clone, Debug, Default)]
pub struct SimRuntime;

impl Runtime for SimRuntime {
    type Device = SimDevice;

    fn name() -> &'static str {
        "sim"
    }

    fn allocate(request: &AllocationRequest, device: &Self::Device) -> Result<Allocation> {
        device.allocate(request)
    }

    fn deallocate(allocation: &Allocation, device: &Self::Device) -> bool {
        device.deallocate(allocation)
    }

    fn copy_to_device(src: &[u8], dst: &Allocation, device: &Self::Device) -> Result<()> {
        device.write(dst, src)
    }

    fn copy_from_device(src: &Allocation, dst: &mut [u8], device: &Self::Device) -> Result<()> {
        device.read(src, dst)
    }

    /// Process-wide device configured from `TILR_*` environment variables
    ///
    /// Falls back to the default configuration if the environment is invalid.
    fn default_device() -> Self::Device {
        static DEFAULT: OnceLock<SimDevice> = OnceLock::new();
        DEFAULT
            .get_or_init(|| match DeviceConfig::from_env().and_then(SimDevice::with_config) {
                Ok(device) => device,
                Err(e) => {
                    warn!(error = %e, "invalid device configuration in environment, using defaults");
                    SimDevice::new(0)
                }
            })
            .clone()
    }
}
