//! Physical memory management.

mod bitmap;
pub mod buddy;
mod linked_list;
pub mod locked;

pub use buddy::BuddyAllocator;
pub use locked::LockedAllocator;

use crate::unit;
use core::fmt;
use displaydoc_lite::displaydoc;

/// The number of bits in a page offset.
pub const PAGE_SHIFT: usize = 12;

/// The size of a single page in memory.
///
/// This is also the order-0 size inside
/// the buddy allocator.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// The number of free-lists inside the buddy allocator.
///
/// Large enough that a single block could span the whole address space.
pub const ORDER_COUNT: usize = usize::BITS as usize - PAGE_SHIFT;

/// Result for every memory allocation operation.
pub type Result<T, E = Error> = core::result::Result<T, E>;

displaydoc! {
    /// Any error that can happen while allocating or deallocating memory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Error {
        /// tried to allocate, but there was no free memory left.
        OutOfMemory,
        /// tried to allocate an order that exceeded the maximum order.
        OrderTooLarge,
        /// the end of a memory region was not after its start.
        InvalidRegion,
        /// tried to add a region that can't even hold its own allocation bitmap.
        RegionTooSmall,
        /// tried to allocate zero pages using `alloc_pages`.
        AllocateZeroPages,
    }
}

/// Calculates the size in bytes for the given order.
pub const fn size_for_order(order: usize) -> usize {
    PAGE_SIZE << order
}

/// Calculates the first order where the given `size` would fit in.
///
/// This function may return an order that is larger than the largest order
/// the allocator can hand out.
pub fn order_for_size(size: usize) -> usize {
    order_for_pages(size.div_ceil(PAGE_SIZE))
}

/// Calculates the first order that holds `count` pages.
///
/// Counts that don't fit into any power of two result in `usize::BITS`,
/// which is never a valid order.
pub fn order_for_pages(count: usize) -> usize {
    match count.max(1).checked_next_power_of_two() {
        Some(pages) => pages.trailing_zeros() as usize,
        None => usize::BITS as usize,
    }
}

/// Statistics for a memory allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocStats {
    /// The name of the allocator that collected these stats.
    pub name: &'static str,
    /// The number of bytes that are currently handed out.
    pub allocated: usize,
    /// The number of bytes that are left for allocation.
    pub free: usize,
    /// The total number of bytes that this allocator has available for allocation.
    pub total: usize,
}

impl AllocStats {
    /// Create a new [`AllocStats`] instance for the given allocator name.
    pub const fn with_name(name: &'static str) -> Self {
        Self {
            name,
            allocated: 0,
            free: 0,
            total: 0,
        }
    }
}

impl fmt::Display for AllocStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        self.name.chars().try_for_each(|_| write!(f, "~"))?;
        writeln!(f, "\nAllocated: {}", unit::bytes(self.allocated))?;
        writeln!(f, "Free:      {}", unit::bytes(self.free))?;
        writeln!(f, "Total:     {}", unit::bytes(self.total))?;
        self.name.chars().try_for_each(|_| write!(f, "~"))?;
        writeln!(f)?;
        Ok(())
    }
}
