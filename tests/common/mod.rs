//! Host memory that stands in for the physical memory of the machine.

#![allow(dead_code)]

use std::{
    alloc::{self, Layout},
    collections::BTreeSet,
    ptr::NonNull,
};
use windy_pmem::{
    mem::{BuddyAllocator, ORDER_COUNT, PAGE_SIZE},
    DirectMap, PhysAddr, PhysMapper, VirtAddr,
};

/// A page aligned chunk of host memory, which is visible as the
/// physical memory `0..size` through its [`DirectMap`].
pub struct Arena {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Arena {
    pub fn new(size: usize) -> Self {
        let layout = Layout::from_size_align(size, PAGE_SIZE).unwrap();
        let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).unwrap();
        Self { ptr, layout }
    }

    pub fn mapper(&self) -> DirectMap {
        DirectMap::new(self.ptr.as_ptr() as usize)
    }

    /// Create an allocator that manages the physical memory `min..max` of this arena.
    pub fn allocator(&self, min: usize, max: usize) -> BuddyAllocator<DirectMap> {
        assert!(max <= self.layout.size());
        let mut alloc = BuddyAllocator::new(self.mapper());
        unsafe { alloc.init(PhysAddr::new(min), PhysAddr::new(max)) }.unwrap();
        alloc
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Return the physical address of an allocated block.
pub fn phys(alloc: &BuddyAllocator<DirectMap>, block: NonNull<[u8]>) -> PhysAddr {
    alloc
        .mapper()
        .virt_to_phys(VirtAddr::from(block.as_ptr().cast::<u8>()))
}

/// Return every free block of the allocator as `(address, order)` pairs.
pub fn free_set(alloc: &BuddyAllocator<DirectMap>) -> BTreeSet<(usize, usize)> {
    (0..ORDER_COUNT)
        .flat_map(|order| {
            alloc
                .free_blocks(order)
                .map(move |addr| (addr.as_usize(), order))
        })
        .collect()
}

/// Check that every tracked page is either inside exactly one free block,
/// or marked as allocated.
pub fn assert_consistent(alloc: &BuddyAllocator<DirectMap>) {
    let mut free = vec![false; alloc.max_pfn()];

    for (addr, order) in free_set(alloc) {
        assert_eq!(addr % (PAGE_SIZE << order), 0, "misaligned free block");

        let first = addr / PAGE_SIZE;
        for pfn in first..first + (1 << order) {
            assert!(!free[pfn], "page {:#x} is free twice", pfn);
            free[pfn] = true;
        }
    }

    for (pfn, free) in free.into_iter().enumerate() {
        let allocated = alloc.is_allocated(PhysAddr::from_pfn(pfn));
        assert_ne!(free, allocated, "page {:#x} is tracked inconsistently", pfn);
    }
}
