//! Simulated accelerator device
//!
//! A `SimDevice` models device memory as banks of bytes held in host memory.
//! Each memory kind (DRAM, L1) has its own banks and its own
//! `FreeListAllocator` over the bank-local address space. A buffer reserves
//! the same address range in every bank of its kind and its pages are placed
//! round-robin across those banks.

use super::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::runtime::{Allocation, AllocationRequest, Allocator, Device, FreeListAllocator, MemoryKind};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Simulated accelerator
///
/// Clones are handles to the same device state.
#[derive(Clone)]
pub struct SimDevice {
    inner: Arc<SimDeviceInner>,
}

struct SimDeviceInner {
    config: DeviceConfig,
    dram: MemoryRegion,
    l1: MemoryRegion,
    /// Live buffers keyed by handle
    buffers: Mutex<HashMap<u64, Allocation>>,
    next_handle: AtomicU64,
    stats: DeviceStats,
}

/// Banks and allocator of one memory kind
struct MemoryRegion {
    num_banks: usize,
    allocator: FreeListAllocator,
    /// Bank contents, grown on first write
    banks: Mutex<Vec<Vec<u8>>>,
}

impl MemoryRegion {
    fn new(num_banks: usize, bank_size: usize, alignment: usize) -> Self {
        Self {
            num_banks,
            allocator: FreeListAllocator::new(bank_size, alignment),
            banks: Mutex::new(vec![Vec::new(); num_banks]),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Device statistics
struct DeviceStats {
    allocations: AtomicU64,
    deallocations: AtomicU64,
    allocated_bytes: AtomicU64,
    peak_bytes: AtomicU64,
    h2d_transfers: AtomicU64,
    d2h_transfers: AtomicU64,
    h2d_bytes: AtomicU64,
    d2h_bytes: AtomicU64,
}

impl DeviceStats {
    fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            deallocations: AtomicU64::new(0),
            allocated_bytes: AtomicU64::new(0),
            peak_bytes: AtomicU64::new(0),
            h2d_transfers: AtomicU64::new(0),
            d2h_transfers: AtomicU64::new(0),
            h2d_bytes: AtomicU64::new(0),
            d2h_bytes: AtomicU64::new(0),
        }
    }

    fn record_allocation(&self, bytes: u64) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        let new_allocated = self.allocated_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak_bytes.fetch_max(new_allocated, Ordering::Relaxed);
    }

    fn record_deallocation(&self, bytes: u64) {
        self.deallocations.fetch_add(1, Ordering::Relaxed);
        self.allocated_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }

    fn record_h2d(&self, bytes: u64) {
        self.h2d_transfers.fetch_add(1, Ordering::Relaxed);
        self.h2d_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_d2h(&self, bytes: u64) {
        self.d2h_transfers.fetch_add(1, Ordering::Relaxed);
        self.d2h_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn snapshot(&self, live_buffers: usize) -> DeviceStatsSnapshot {
        DeviceStatsSnapshot {
            allocations: self.allocations.load(Ordering::Relaxed),
            deallocations: self.deallocations.load(Ordering::Relaxed),
            live_buffers,
            allocated_bytes: self.allocated_bytes.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
            h2d_transfers: self.h2d_transfers.load(Ordering::Relaxed),
            d2h_transfers: self.d2h_transfers.load(Ordering::Relaxed),
            h2d_bytes: self.h2d_bytes.load(Ordering::Relaxed),
            d2h_bytes: self.d2h_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Device statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatsSnapshot {
    /// Total allocations
    pub allocations: u64,
    /// Total deallocations
    pub deallocations: u64,
    /// Buffers currently in the handle table
    pub live_buffers: usize,
    /// Current allocated bytes (requested sizes, before page rounding)
    pub allocated_bytes: u64,
    /// Peak allocated bytes
    pub peak_bytes: u64,
    /// Host to device copies
    pub h2d_transfers: u64,
    /// Device to host copies
    pub d2h_transfers: u64,
    /// Bytes copied host to device
    pub h2d_bytes: u64,
    /// Bytes copied device to host
    pub d2h_bytes: u64,
}

// ============================================================================
// Device
// ============================================================================

impl SimDevice {
    /// Create a device with default geometry and the given id
    pub fn new(id: usize) -> Self {
        Self::build(DeviceConfig::default().with_device_id(id))
    }

    /// Create a device from an explicit configuration
    pub fn with_config(config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: DeviceConfig) -> Self {
        let region = |kind| {
            let banks = config.banks(kind);
            MemoryRegion::new(banks.num_banks, banks.bank_size, config.alignment)
        };
        Self {
            inner: Arc::new(SimDeviceInner {
                dram: region(MemoryKind::Dram),
                l1: region(MemoryKind::L1),
                config,
                buffers: Mutex::new(HashMap::new()),
                next_handle: AtomicU64::new(1),
                stats: DeviceStats::new(),
            }),
        }
    }

    /// Configuration this device was built with
    #[inline]
    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    fn region(&self, kind: MemoryKind) -> &MemoryRegion {
        match kind {
            MemoryKind::Dram => &self.inner.dram,
            MemoryKind::L1 => &self.inner.l1,
        }
    }

    /// Allocate an interleaved buffer
    ///
    /// Every bank of the requested kind reserves
    /// `ceil(pages / num_banks) * page_size` bytes at one common address.
    pub fn allocate(&self, request: &AllocationRequest) -> Result<Allocation> {
        if request.size_bytes == 0 || request.page_size == 0 {
            return Err(Error::InvalidArgument {
                arg: "request",
                reason: format!(
                    "size and page size must be positive, got {} / {}",
                    request.size_bytes, request.page_size
                ),
            });
        }

        let region = self.region(request.kind);
        let pages_per_bank = request.num_pages().div_ceil(region.num_banks);
        let bank_footprint = pages_per_bank * request.page_size;

        let address = region
            .allocator
            .allocate(bank_footprint)
            .map_err(|e| match e {
                Error::OutOfMemory { available, .. } => Error::OutOfMemory {
                    size: request.size_bytes,
                    available: available * region.num_banks,
                },
                other => other,
            })?;

        let handle = self.inner.next_handle.fetch_add(1, Ordering::Relaxed);
        let allocation = Allocation {
            handle,
            address,
            size_bytes: request.size_bytes,
            page_size: request.page_size,
            kind: request.kind,
            num_banks: region.num_banks,
        };
        self.inner.buffers.lock().insert(handle, allocation);
        self.inner
            .stats
            .record_allocation(request.size_bytes as u64);

        debug!(
            handle,
            address,
            size = request.size_bytes,
            page_size = request.page_size,
            kind = %request.kind,
            device = self.inner.config.device_id,
            "allocated device buffer"
        );
        Ok(allocation)
    }

    /// Free a buffer
    ///
    /// Returns `false` for unknown or already freed handles.
    pub fn deallocate(&self, allocation: &Allocation) -> bool {
        let Some(live) = self.inner.buffers.lock().remove(&allocation.handle) else {
            debug!(
                handle = allocation.handle,
                device = self.inner.config.device_id,
                "ignoring free of unknown device buffer"
            );
            return false;
        };

        self.region(live.kind).allocator.deallocate(live.address);
        self.inner.stats.record_deallocation(live.size_bytes as u64);
        debug!(
            handle = live.handle,
            size = live.size_bytes,
            kind = %live.kind,
            device = self.inner.config.device_id,
            "freed device buffer"
        );
        true
    }

    /// Look up a live buffer
    pub fn buffer(&self, handle: u64) -> Result<Allocation> {
        self.inner
            .buffers
            .lock()
            .get(&handle)
            .copied()
            .ok_or(Error::UnknownBuffer { handle })
    }

    /// Copy `src` into the buffer page by page
    pub fn write(&self, dst: &Allocation, src: &[u8]) -> Result<()> {
        let live = self.buffer(dst.handle)?;
        if src.len() > live.size_bytes {
            return Err(Error::size_mismatch(live.size_bytes, src.len()));
        }

        let mut banks = self.region(live.kind).banks.lock();
        for (page, chunk) in src.chunks(live.page_size).enumerate() {
            let (bank, address) = live.page_location(page);
            let start = address as usize;
            let end = start + chunk.len();
            let bank = &mut banks[bank];
            if bank.len() < end {
                bank.resize(end, 0);
            }
            bank[start..end].copy_from_slice(chunk);
        }
        drop(banks);

        self.inner.stats.record_h2d(src.len() as u64);
        trace!(handle = live.handle, bytes = src.len(), "host to device copy");
        Ok(())
    }

    /// Copy the first `dst.len()` bytes of the buffer into `dst`
    ///
    /// Bytes never written read as zero.
    pub fn read(&self, src: &Allocation, dst: &mut [u8]) -> Result<()> {
        let live = self.buffer(src.handle)?;
        if dst.len() > live.size_bytes {
            return Err(Error::size_mismatch(live.size_bytes, dst.len()));
        }

        let banks = self.region(live.kind).banks.lock();
        for (page, chunk) in dst.chunks_mut(live.page_size).enumerate() {
            let (bank, address) = live.page_location(page);
            copy_out(&banks[bank], address as usize, chunk);
        }
        drop(banks);

        self.inner.stats.record_d2h(dst.len() as u64);
        trace!(handle = live.handle, bytes = dst.len(), "device to host copy");
        Ok(())
    }

    /// Raw bytes of one bank, for inspecting page placement
    pub fn read_bank(&self, kind: MemoryKind, bank: usize, address: u64, len: usize) -> Vec<u8> {
        let banks = self.region(kind).banks.lock();
        let mut out = vec![0u8; len];
        if let Some(bank) = banks.get(bank) {
            copy_out(bank, address as usize, &mut out);
        }
        out
    }

    /// Bytes reserved per bank in `kind`, including interleaving padding
    pub fn reserved_bank_bytes(&self, kind: MemoryKind) -> usize {
        self.region(kind).allocator.allocated_bytes()
    }

    /// Number of buffers in the handle table
    pub fn live_buffers(&self) -> usize {
        self.inner.buffers.lock().len()
    }

    /// Snapshot of device statistics
    pub fn stats(&self) -> DeviceStatsSnapshot {
        self.inner.stats.snapshot(self.live_buffers())
    }
}

/// Copy `dst.len()` bytes from `bank` at `start`, zero-filling past its end
fn copy_out(bank: &[u8], start: usize, dst: &mut [u8]) {
    let available = bank.len().saturating_sub(start).min(dst.len());
    if available > 0 {
        dst[..available].copy_from_slice(&bank[start..start + available]);
    }
    dst[available..].fill(0);
}

impl Device for SimDevice {
    fn id(&self) -> usize {
        self.inner.config.device_id
    }

    /// Two handles are the same device when they share memory state
    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn name(&self) -> String {
        format!("sim:{}", self.inner.config.device_id)
    }
}

impl std::fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDevice")
            .field("id", &self.inner.config.device_id)
            .field("dram", &self.inner.config.dram)
            .field("l1", &self.inner.config.l1)
            .field("live_buffers", &self.live_buffers())
            .finish()
    }
}
