//! Simulated accelerator backend
//!
//! Device memory lives in host memory, split into DRAM and L1 banks with
//! interleaved page placement. Used as the reference backend and in tests.

mod config;
mod device;
mod runtime;

pub use config::{
    BankConfig, DeviceConfig, ENV_DEVICE_ID, ENV_DRAM_BANK_SIZE, ENV_DRAM_BANKS, ENV_L1_BANK_SIZE,
    ENV_L1_BANKS,
};
pub use device::{DeviceStatsSnapshot, SimDevice};
pub use runtime::SimRuntime;
