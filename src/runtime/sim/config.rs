//! Simulated device configuration

use crate::error::{Error, Result};
use crate::runtime::MemoryKind;

/// Environment variable overriding the device id
pub const ENV_DEVICE_ID: &str = "TILR_DEVICE_ID";
/// Environment variable overriding the DRAM bank count
pub const ENV_DRAM_BANKS: &str = "TILR_DRAM_BANKS";
/// Environment variable overriding the DRAM bank size in bytes
pub const ENV_DRAM_BANK_SIZE: &str = "TILR_DRAM_BANK_SIZE";
/// Environment variable overriding the L1 bank count
pub const ENV_L1_BANKS: &str = "TILR_L1_BANKS";
/// Environment variable overriding the L1 bank size in bytes
pub const ENV_L1_BANK_SIZE: &str = "TILR_L1_BANK_SIZE";

/// Geometry of one memory kind
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BankConfig {
    /// Number of banks pages are interleaved over
    pub num_banks: usize,
    /// Addressable bytes per bank
    pub bank_size: usize,
}

impl BankConfig {
    /// Total bytes across all banks
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.num_banks * self.bank_size
    }
}

/// Configuration of a simulated device
///
/// # Example
/// ```
/// use tilr::runtime::sim::DeviceConfig;
/// let config = DeviceConfig::default().with_device_id(1).with_l1(4, 64 * 1024);
/// assert_eq!(config.l1.capacity(), 256 * 1024);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Device identifier
    pub device_id: usize,
    /// DRAM geometry
    pub dram: BankConfig,
    /// L1 geometry
    pub l1: BankConfig,
    /// Bank-local allocation granularity in bytes
    pub alignment: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            dram: BankConfig {
                num_banks: 8,
                bank_size: 128 * 1024 * 1024,
            },
            l1: BankConfig {
                num_banks: 64,
                bank_size: 1024 * 1024,
            },
            alignment: 32,
        }
    }
}

impl DeviceConfig {
    /// Set the device id
    pub fn with_device_id(mut self, device_id: usize) -> Self {
        self.device_id = device_id;
        self
    }

    /// Set the DRAM geometry
    pub fn with_dram(mut self, num_banks: usize, bank_size: usize) -> Self {
        self.dram = BankConfig {
            num_banks,
            bank_size,
        };
        self
    }

    /// Set the L1 geometry
    pub fn with_l1(mut self, num_banks: usize, bank_size: usize) -> Self {
        self.l1 = BankConfig {
            num_banks,
            bank_size,
        };
        self
    }

    /// Set the allocation granularity
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Geometry of `kind`
    #[inline]
    pub fn banks(&self, kind: MemoryKind) -> &BankConfig {
        match kind {
            MemoryKind::Dram => &self.dram,
            MemoryKind::L1 => &self.l1,
        }
    }

    /// Defaults overridden by `TILR_*` environment variables
    ///
    /// Unset variables keep their default. A variable that does not parse as
    /// an unsigned integer is an `InvalidArgument` error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let parse = |key: &'static str| -> Result<Option<usize>> {
            lookup(key)
                .map(|raw| {
                    raw.trim().parse::<usize>().map_err(|e| Error::InvalidArgument {
                        arg: key,
                        reason: format!("expected an unsigned integer, got '{raw}': {e}"),
                    })
                })
                .transpose()
        };

        let mut config = Self::default();
        if let Some(id) = parse(ENV_DEVICE_ID)? {
            config.device_id = id;
        }
        if let Some(n) = parse(ENV_DRAM_BANKS)? {
            config.dram.num_banks = n;
        }
        if let Some(size) = parse(ENV_DRAM_BANK_SIZE)? {
            config.dram.bank_size = size;
        }
        if let Some(n) = parse(ENV_L1_BANKS)? {
            config.l1.num_banks = n;
        }
        if let Some(size) = parse(ENV_L1_BANK_SIZE)? {
            config.l1.bank_size = size;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that every memory kind has at least one non-empty bank
    pub fn validate(&self) -> Result<()> {
        for (arg, banks) in [("dram", &self.dram), ("l1", &self.l1)] {
            if banks.num_banks == 0 || banks.bank_size == 0 {
                return Err(Error::InvalidArgument {
                    arg,
                    reason: format!(
                        "bank count and bank size must be positive, got {} x {}",
                        banks.num_banks, banks.bank_size
                    ),
                });
            }
        }
        if self.alignment == 0 {
            return Err(Error::InvalidArgument {
                arg: "alignment",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
