//! Runtime backends for tensor storage
//!
//! This module defines the `Runtime` and `Device` traits a tensor uses to
//! reach device memory, the allocation descriptors exchanged through them,
//! and a simulated accelerator (`sim`) that implements them in host memory.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity, static dispatch)
//! ├── Device (identifies one accelerator, owns its memory state)
//! ├── Allocator (bank address-space management)
//! └── Allocation (descriptor of one interleaved device buffer)
//! ```

mod allocator;
pub mod sim;
mod traits;

pub use allocator::{Allocator, FreeListAllocator};
pub use traits::{Device, Runtime};

use std::fmt;

// ============================================================================
// Memory descriptors
// ============================================================================

/// Kind of device memory a buffer lives in
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// Off-chip DRAM banks
    #[default]
    Dram,
    /// On-chip L1 banks
    L1,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dram => f.write_str("dram"),
            Self::L1 => f.write_str("l1"),
        }
    }
}

/// Placement options for device tensors
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Memory the buffer is allocated in
    pub kind: MemoryKind,
}

impl MemoryConfig {
    /// DRAM placement
    pub const DRAM: Self = Self {
        kind: MemoryKind::Dram,
    };

    /// L1 placement
    pub const L1: Self = Self {
        kind: MemoryKind::L1,
    };
}

/// Request for an interleaved device buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AllocationRequest {
    /// Total buffer size in bytes
    pub size_bytes: usize,
    /// Interleaving unit in bytes
    pub page_size: usize,
    /// Memory to allocate in
    pub kind: MemoryKind,
}

impl AllocationRequest {
    /// Number of pages covering the buffer
    #[inline]
    pub fn num_pages(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.size_bytes.div_ceil(self.page_size)
        }
    }
}

/// Descriptor of a live device buffer
///
/// Page `i` of the buffer lives in bank `i % num_banks` at bank-local address
/// `address + (i / num_banks) * page_size`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// Device-unique buffer handle
    pub handle: u64,
    /// Bank-local base address, identical in every bank
    pub address: u64,
    /// Buffer size in bytes
    pub size_bytes: usize,
    /// Interleaving unit in bytes
    pub page_size: usize,
    /// Memory the buffer lives in
    pub kind: MemoryKind,
    /// Banks the pages are spread over
    pub num_banks: usize,
}

impl Allocation {
    /// Number of pages in the buffer
    #[inline]
    pub fn num_pages(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.size_bytes.div_ceil(self.page_size)
        }
    }

    /// `(bank, bank-local address)` of page `page`
    #[inline]
    pub fn page_location(&self, page: usize) -> (usize, u64) {
        let bank = page % self.num_banks;
        let row = (page / self.num_banks) as u64;
        (bank, self.address + row * self.page_size as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_location_round_robin() {
        let alloc = Allocation {
            handle: 1,
            address: 256,
            size_bytes: 5 * 64,
            page_size: 64,
            kind: MemoryKind::Dram,
            num_banks: 2,
        };
        assert_eq!(alloc.num_pages(), 5);
        assert_eq!(alloc.page_location(0), (0, 256));
        assert_eq!(alloc.page_location(1), (1, 256));
        assert_eq!(alloc.page_location(2), (0, 320));
        assert_eq!(alloc.page_location(4), (0, 384));
    }

    #[test]
    fn test_request_pages_round_up() {
        let req = AllocationRequest {
            size_bytes: 100,
            page_size: 32,
            kind: MemoryKind::L1,
        };
        assert_eq!(req.num_pages(), 4);
        assert_eq!(MemoryConfig::default().kind, MemoryKind::Dram);
    }
}
