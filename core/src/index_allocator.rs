//! Persistent integer-handle allocation with reuse.
//!
//! This module provides [`PersistentIndexAllocator`], a handle allocator used
//! wherever objects need stable slots in GPU-resident arrays: material type
//! slots, material instance slots within a type, and similar registries.
//!
//! Handles are plain `i32` values in `[0, watermark)`. Released handles go to
//! a free list and are always reused before the watermark advances, so the
//! occupied range stays dense even under churn. A live handle is never handed
//! out a second time until it is explicitly released.
//!
//! # Example
//!
//! ```
//! use vermilion_core::index_allocator::PersistentIndexAllocator;
//!
//! let mut alloc = PersistentIndexAllocator::new();
//! let a = alloc.allocate();
//! let b = alloc.allocate();
//! assert_eq!((a, b), (0, 1));
//!
//! alloc.release(a);
//! // Released handles are reused before the watermark grows.
//! assert_eq!(alloc.allocate(), 0);
//! assert_eq!(alloc.allocate(), 2);
//! ```

use std::collections::HashSet;

/// Integer-handle allocator with free-list reuse.
///
/// `allocate` and `release` are O(1). Handles are opaque identifiers: once
/// releases occur, there is no guarantee about which free handle a later
/// `allocate` returns, only that every released handle is reused before the
/// watermark advances.
#[derive(Debug, Default)]
pub struct PersistentIndexAllocator {
    free_list: Vec<i32>,
    free_set: HashSet<i32>,
    watermark: i32,
}

impl PersistentIndexAllocator {
    /// Create an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle.
    ///
    /// Returns a previously released handle if any exist, otherwise the next
    /// handle at the watermark.
    pub fn allocate(&mut self) -> i32 {
        if let Some(handle) = self.free_list.pop() {
            self.free_set.remove(&handle);
            return handle;
        }
        let handle = self.watermark;
        self.watermark += 1;
        handle
    }

    /// Release a handle back to the allocator.
    ///
    /// Releasing a handle that was never allocated, or releasing the same
    /// handle twice, is a caller error; it is ignored after a diagnostic.
    pub fn release(&mut self, handle: i32) {
        if handle < 0 || handle >= self.watermark || self.free_set.contains(&handle) {
            log::error!("PersistentIndexAllocator: invalid release of handle {handle}");
            debug_assert!(false, "invalid release of handle {handle}");
            return;
        }
        self.free_set.insert(handle);
        self.free_list.push(handle);
    }

    /// Whether `handle` is currently allocated.
    pub fn is_valid(&self, handle: i32) -> bool {
        handle >= 0 && handle < self.watermark && !self.free_set.contains(&handle)
    }

    /// Number of live (allocated, not released) handles.
    pub fn live_count(&self) -> usize {
        self.watermark as usize - self.free_list.len()
    }

    /// Upper bound of the handle range handed out so far.
    pub fn watermark(&self) -> i32 {
        self.watermark
    }

    /// Forget all allocations and start over from handle 0.
    pub fn reset(&mut self) {
        self.free_list.clear();
        self.free_set.clear();
        self.watermark = 0;
    }
}
