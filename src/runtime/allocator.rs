//! Memory allocator trait and free-list implementation
//!
//! An `Allocator` manages one bank address space. It hands out bank-local
//! addresses only; the bytes themselves live with the device.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

/// Memory allocator trait for device address spaces
pub trait Allocator: Send + Sync {
    /// Reserve `size_bytes` and return the base address
    ///
    /// Returns `Err(OutOfMemory)` if no free range is large enough.
    fn allocate(&self, size_bytes: usize) -> Result<u64>;

    /// Release the range starting at `address`
    ///
    /// Returns `false` if nothing was allocated there.
    fn deallocate(&self, address: u64) -> bool;

    /// Get the total allocated bytes
    fn allocated_bytes(&self) -> usize;

    /// Size of the managed address space
    fn capacity(&self) -> usize;

    /// Bytes not currently allocated
    fn available_bytes(&self) -> usize {
        self.capacity().saturating_sub(self.allocated_bytes())
    }
}

/// First-fit free-list allocator with coalescing
///
/// Sizes are rounded up to `alignment`. Freed ranges merge with adjacent
/// free neighbours so the list never holds two touching blocks.
#[derive(Debug)]
pub struct FreeListAllocator {
    capacity: usize,
    alignment: usize,
    state: Mutex<FreeListState>,
}

#[derive(Debug)]
struct FreeListState {
    /// Free ranges keyed by base address
    free: BTreeMap<u64, usize>,
    /// Live ranges keyed by base address
    live: HashMap<u64, usize>,
    allocated: usize,
}

impl FreeListAllocator {
    /// Create an allocator over `[0, capacity)`
    ///
    /// An `alignment` of 0 is treated as 1.
    pub fn new(capacity: usize, alignment: usize) -> Self {
        let mut free = BTreeMap::new();
        if capacity > 0 {
            free.insert(0, capacity);
        }
        Self {
            capacity,
            alignment: alignment.max(1),
            state: Mutex::new(FreeListState {
                free,
                live: HashMap::new(),
                allocated: 0,
            }),
        }
    }

    /// Allocation granularity in bytes
    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Number of disjoint free ranges
    pub fn free_block_count(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Size of the largest free range
    pub fn largest_free_block(&self) -> usize {
        self.state.lock().free.values().copied().max().unwrap_or(0)
    }
}

impl Allocator for FreeListAllocator {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        if size_bytes == 0 {
            return Err(Error::InvalidArgument {
                arg: "size_bytes",
                reason: "allocation size must be positive".to_string(),
            });
        }
        let size = size_bytes.next_multiple_of(self.alignment);

        let mut state = self.state.lock();
        let Some((&address, &block)) = state.free.iter().find(|&(_, &block)| block >= size) else {
            return Err(Error::OutOfMemory {
                size: size_bytes,
                available: self.capacity - state.allocated,
            });
        };

        state.free.remove(&address);
        if block > size {
            state.free.insert(address + size as u64, block - size);
        }
        state.live.insert(address, size);
        state.allocated += size;
        Ok(address)
    }

    fn deallocate(&self, address: u64) -> bool {
        let mut state = self.state.lock();
        let Some(mut size) = state.live.remove(&address) else {
            return false;
        };
        state.allocated -= size;

        let mut start = address;
        // merge with the preceding free block
        let prev = state
            .free
            .range(..address)
            .next_back()
            .map(|(&prev, &prev_size)| (prev, prev_size));
        if let Some((prev, prev_size)) = prev {
            if prev + prev_size as u64 == address {
                state.free.remove(&prev);
                start = prev;
                size += prev_size;
            }
        }
        // merge with the following free block
        let end = start + size as u64;
        if let Some(next_size) = state.free.remove(&end) {
            size += next_size;
        }
        state.free.insert(start, size);
        true
    }

    fn allocated_bytes(&self) -> usize {
        self.state.lock().allocated
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fit_and_alignment() {
        let alloc = FreeListAllocator::new(1024, 32);
        let a = alloc.allocate(10).unwrap();
        let b = alloc.allocate(64).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 32);
        assert_eq!(alloc.allocated_bytes(), 96);
        assert_eq!(alloc.available_bytes(), 1024 - 96);
    }

    #[test]
    fn test_reuses_freed_hole() {
        let alloc = FreeListAllocator::new(1024, 32);
        let a = alloc.allocate(64).unwrap();
        let _b = alloc.allocate(64).unwrap();
        assert!(alloc.deallocate(a));
        assert_eq!(alloc.allocate(32).unwrap(), a);
    }

    #[test]
    fn test_coalescing() {
        let alloc = FreeListAllocator::new(256, 1);
        let a = alloc.allocate(64).unwrap();
        let b = alloc.allocate(64).unwrap();
        let c = alloc.allocate(64).unwrap();
        assert!(alloc.deallocate(a));
        assert!(alloc.deallocate(c));
        // [a free][b live][c + tail free]
        assert_eq!(alloc.free_block_count(), 2);
        assert!(alloc.deallocate(b));
        assert_eq!(alloc.free_block_count(), 1);
        assert_eq!(alloc.largest_free_block(), 256);
        assert_eq!(alloc.allocated_bytes(), 0);
    }

    #[test]
    fn test_out_of_memory() {
        let alloc = FreeListAllocator::new(128, 1);
        alloc.allocate(100).unwrap();
        match alloc.allocate(64) {
            Err(Error::OutOfMemory { size, available }) => {
                assert_eq!(size, 64);
                assert_eq!(available, 28);
            }
            other => panic!("expected OutOfMemory, got {other:?}"),
        }
    }

    #[test]
    fn test_double_free_is_noop() {
        let alloc = FreeListAllocator::new(128, 1);
        let a = alloc.allocate(16).unwrap();
        assert!(alloc.deallocate(a));
        assert!(!alloc.deallocate(a));
        assert!(!alloc.deallocate(99));
    }

    #[test]
    fn test_zero_size_rejected() {
        let alloc = FreeListAllocator::new(128, 1);
        assert!(matches!(
            alloc.allocate(0),
            Err(Error::InvalidArgument { .. })
        ));
    }
}
