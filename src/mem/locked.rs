//! A [`BuddyAllocator`] behind a spin lock, so it can be shared
//! and stored inside a `static`.

use super::{AllocStats, BuddyAllocator, Result};
use crate::addr::{PhysAddr, PhysMapper};
use core::ptr::NonNull;
use spin::Mutex;

/// The allocator that is responsible for the physical memory of the
/// whole kernel.
///
/// Every operation takes the lock for its entire duration, so at most
/// one operation is in flight at any time.
pub struct LockedAllocator<M>(Mutex<BuddyAllocator<M>>);

impl<M: PhysMapper> LockedAllocator<M> {
    /// Create a new, empty allocator.
    pub const fn new(mapper: M) -> Self {
        Self(Mutex::new(BuddyAllocator::new(mapper)))
    }

    /// Initialize the allocator with the physical memory `min..max`.
    ///
    /// # Safety
    ///
    /// See [`BuddyAllocator::init`].
    pub unsafe fn init(&self, min: PhysAddr, max: PhysAddr) -> Result<usize> {
        self.0.lock().init(min, max)
    }

    /// Release additional physical memory into the allocator.
    ///
    /// # Safety
    ///
    /// See [`BuddyAllocator::release_range`].
    pub unsafe fn release_range(&self, min: PhysAddr, max: PhysAddr) -> usize {
        self.0.lock().release_range(min, max)
    }

    /// Allocate a single page.
    pub fn alloc(&self) -> Result<NonNull<[u8]>> {
        // order 0 is exactly the page size
        self.0.lock().allocate(0)
    }

    /// Allocate `2^order` contiguous pages.
    pub fn allocate(&self, order: usize) -> Result<NonNull<[u8]>> {
        self.0.lock().allocate(order)
    }

    /// Allocate at least `count` contiguous pages.
    pub fn alloc_pages(&self, count: usize) -> Result<NonNull<[u8]>> {
        self.0.lock().alloc_pages(count)
    }

    /// Allocate `2^order` contiguous pages and initialize all bytes with zero.
    pub fn zalloc(&self, order: usize) -> Result<NonNull<[u8]>> {
        self.0.lock().allocate_zeroed(order)
    }

    /// Free `2^order` pages at `ptr`.
    ///
    /// # Safety
    ///
    /// See [`BuddyAllocator::free`].
    pub unsafe fn free(&self, ptr: NonNull<u8>, order: usize) {
        self.0.lock().free(ptr, order)
    }

    /// Return the statistics for this allocator.
    pub fn stats(&self) -> AllocStats {
        self.0.lock().stats()
    }

    /// Run `f` with exclusive access to the inner allocator.
    pub fn with<R>(&self, f: impl FnOnce(&mut BuddyAllocator<M>) -> R) -> R {
        f(&mut self.0.lock())
    }
}
