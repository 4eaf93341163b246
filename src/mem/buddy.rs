//! Implementation of a binary Buddy Allocator that is responsible for
//! handing out the physical page frames of the machine.
//!
//! Free blocks carry their metadata inside their own memory: a head at the
//! first bytes of the block, which links the block into the free-list for its
//! order, and a tail at the last bytes, which repeats the order. When a block
//! is freed, the tail of the block right before it and the head of the block
//! right after it can be inspected directly, without searching any list.
//!
//! ```text
//! +-----------+---------------------------------------+------------+
//! | ChunkHead |                 ...                   | ChunkTail  |
//! +-----------+---------------------------------------+------------+
//! ^ block start                                       block end ^
//! ```
//!
//! Whether a page is free is only decided by the allocation bitmap, the
//! metadata of a neighbour is never read before its page is known to be free.

use super::{
    bitmap::Bitmap,
    linked_list::{LinkedList, ListNode},
    order_for_pages, size_for_order, AllocStats, Error, Result, ORDER_COUNT, PAGE_SHIFT,
    PAGE_SIZE,
};
use crate::addr::{PhysAddr, PhysMapper, VirtAddr};
use core::{
    cmp, mem,
    ptr::{self, NonNull},
};

/// Metadata at the start of every free block.
#[repr(C)]
struct ChunkHead {
    // only accessed through the free-list
    #[allow(dead_code)]
    link: ListNode,
    order: usize,
}

/// Metadata at the end of every free block.
#[repr(C)]
struct ChunkTail {
    order: usize,
}

/// The central structure that is responsible for allocating
/// physical memory using the buddy allocation algorithm.
///
/// All operations require exclusive access, callers that share
/// an allocator between cores have to serialize the calls, for example
/// by using a [`LockedAllocator`](super::LockedAllocator).
pub struct BuddyAllocator<M> {
    orders: [LinkedList; ORDER_COUNT],
    bitmap: Bitmap,
    /// The number of page frames covered by the allocator, starting at frame `0`.
    max_pfn: usize,
    mapper: M,
    stats: AllocStats,
}

// SAFETY
// The raw pointers inside the free-lists and the bitmap only point into
// memory that is owned by the allocator.
unsafe impl<M: Send> Send for BuddyAllocator<M> {}

impl<M: PhysMapper> BuddyAllocator<M> {
    /// Create an empty allocator that accesses physical memory through `mapper`.
    ///
    /// Every allocation fails until the allocator is [initialized](Self::init).
    pub const fn new(mapper: M) -> Self {
        Self {
            orders: [LinkedList::EMPTY; ORDER_COUNT],
            bitmap: Bitmap::empty(),
            max_pfn: 0,
            mapper,
            stats: AllocStats::with_name("Buddy Allocator"),
        }
    }

    /// Initialize the allocator and place the physical memory `min..max`
    /// into the free pool.
    ///
    /// `min` is rounded up and `max` is rounded down to whole pages. The
    /// allocation bitmap is carved out of the start of the range, everything
    /// after it is split into the largest blocks that are aligned to their
    /// position and fit into the rest of the range.
    ///
    /// Returns the number of bytes that are available for allocation. If the
    /// range is empty or can't even hold the bitmap, an error is returned and
    /// the allocator stays empty.
    ///
    /// # Safety
    ///
    /// `min..max` must be valid to read and write through the mapper, must not
    /// be used by anything else for the entire lifetime of this allocator, and
    /// must not be mapped at the null address.
    pub unsafe fn init(&mut self, min: PhysAddr, max: PhysAddr) -> Result<usize> {
        self.orders = [LinkedList::EMPTY; ORDER_COUNT];
        self.bitmap = Bitmap::empty();
        self.max_pfn = 0;
        self.stats = AllocStats::with_name(self.stats.name);

        let min = min.page_up();
        let max = max.page_down();
        if max <= min {
            log::warn!("Ignoring empty memory region {:#x}..{:#x}", min, max);
            return Err(Error::InvalidRegion);
        }

        // the bitmap tracks every frame from zero up to `max`
        let max_pfn = max.pfn();
        let bitmap_size = Bitmap::size_for(max_pfn);
        if bitmap_size > max.as_usize() - min.as_usize() {
            log::warn!(
                "Memory region {:#x}..{:#x} can't hold its allocation bitmap of {} bytes",
                min,
                max,
                bitmap_size
            );
            return Err(Error::RegionTooSmall);
        }

        let words = self.mapper.phys_to_virt(min).as_ptr::<usize>();
        let words = NonNull::new(words).ok_or(Error::InvalidRegion)?;
        self.bitmap = Bitmap::from_raw(words, bitmap_size / mem::size_of::<usize>());
        self.max_pfn = max_pfn;

        log::debug!(
            "Placed allocation bitmap for {} pages at {:#x}..{:#x}",
            max_pfn,
            min,
            min.offset(bitmap_size)
        );

        // everything is allocated, until we free the memory we were given
        let min = min.offset(bitmap_size);
        let mut range = max.as_usize() - min.as_usize();
        self.bitmap.fill();
        self.bitmap.mark_range_free(min.pfn(), range >> PAGE_SHIFT);

        let total = range;
        let mut addr = min;
        while range != 0 {
            // the next block is limited by the alignment of `addr`,
            // but it also must not be bigger than the remaining range.
            let mut order = 0;
            while order + 1 < ORDER_COUNT
                && size_for_order(order + 1) <= range
                && addr.is_aligned(size_for_order(order + 1))
            {
                order += 1;
            }

            log::trace!("Adding block at {:#x} with order {}", addr, order);

            let size = size_for_order(order);
            self.push_block(self.mapper.phys_to_virt(addr), order);
            addr = addr.offset(size);
            range -= size;
        }

        self.stats.total = total;
        self.stats.free = total;

        log::info!(
            "Made {} at {:#x}..{:#x} available for allocation",
            crate::unit::bytes(total),
            min,
            max
        );

        Ok(total)
    }

    /// Release the physical memory `min..max` into this allocator.
    ///
    /// The range is rounded inwards to whole pages, and every page is freed
    /// on its own, so it will be merged with its free neighbours. Pages outside
    /// of the range that the allocator was [initialized](Self::init) with are
    /// ignored, because the bitmap can't track them.
    ///
    /// Returns the number of bytes that were added.
    ///
    /// # Safety
    ///
    /// The pages must be valid to read and write through the mapper, must
    /// currently be marked as allocated, and must not be used by anything else
    /// afterwards. This excludes the memory holding the allocation bitmap.
    pub unsafe fn release_range(&mut self, min: PhysAddr, max: PhysAddr) -> usize {
        let min = min.page_up();
        let tracked = PhysAddr::from_pfn(self.max_pfn);
        let max = max.page_down();

        if max > tracked {
            log::warn!(
                "Ignoring untracked memory at {:#x}..{:#x}",
                cmp::max(min, tracked),
                max
            );
        }
        let max = cmp::min(max, tracked);

        let mut released = 0;
        let mut addr = min;
        while addr < max {
            self.free_block(self.mapper.phys_to_virt(addr), 0);
            addr = addr.offset(PAGE_SIZE);
            released += PAGE_SIZE;
        }

        if released != 0 {
            log::debug!(
                "Released {} at {:#x}..{:#x}",
                crate::unit::bytes(released),
                min,
                max
            );
        }

        self.stats.total += released;
        self.stats.free += released;
        released
    }

    /// Allocates a block of `2^order` contiguous pages.
    ///
    /// The returned block is aligned to its own size in physical memory, and
    /// the pointer is in the working address space of the mapper.
    pub fn allocate(&mut self, order: usize) -> Result<NonNull<[u8]>> {
        if order >= ORDER_COUNT {
            return Err(Error::OrderTooLarge);
        }

        // find the smallest order which can satisfy the request
        let mut current = match (order..ORDER_COUNT).find(|&idx| !self.orders[idx].is_empty()) {
            Some(current) => current,
            None => {
                log::warn!("Cannot handle page request of order {}", order);
                return Err(Error::OutOfMemory);
            }
        };

        let block = self.orders[current].pop().ok_or(Error::OutOfMemory)?;
        let block = VirtAddr::from(block.as_ptr());

        // we may have to split the block a number of times.
        //
        // +-- this is were `block` starts, it keeps its address
        // v
        // +---------------------------------+
        // |     block      |     spare      |
        // +---------------------------------+
        //                  ^
        //                  +--- the upper half becomes a free block of the lower order
        while current > order {
            current -= 1;
            let spare = block.offset(size_for_order(current));

            // SAFETY
            // The spare half belonged to a free block, so it's owned by us.
            unsafe { self.push_block(spare, current) };
        }

        let size = size_for_order(order);
        let pfn = self.mapper.virt_to_phys(block).pfn();
        self.bitmap.mark_range_allocated(pfn, 1 << order);

        self.stats.allocated += size;
        self.stats.free = self.stats.free.saturating_sub(size);

        let ptr = ptr::slice_from_raw_parts_mut(block.as_ptr::<u8>(), size);
        // SAFETY
        // Blocks inside the free-lists are never null, as required by `init`.
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    /// Allocates a block of `2^order` pages and fills it with zeroes.
    pub fn allocate_zeroed(&mut self, order: usize) -> Result<NonNull<[u8]>> {
        let block = self.allocate(order)?;

        // SAFETY
        // The block was just handed out and is exclusively ours.
        unsafe { ptr::write_bytes(block.as_ptr().cast::<u8>(), 0, block.len()) };
        Ok(block)
    }

    /// Allocates the smallest block that can hold `count` contiguous pages.
    pub fn alloc_pages(&mut self, count: usize) -> Result<NonNull<[u8]>> {
        if count == 0 {
            return Err(Error::AllocateZeroPages);
        }

        self.allocate(order_for_pages(count))
    }

    /// Frees the block of `2^order` pages at `ptr`, merging it with its
    /// free buddies as far as possible.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Self::allocate) of `self`
    /// with the same `order`, and must not be used afterwards.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>, order: usize) {
        self.free_block(VirtAddr::from(ptr.as_ptr()), order);

        let size = size_for_order(order);
        self.stats.allocated = self.stats.allocated.saturating_sub(size);
        self.stats.free += size;
    }

    unsafe fn free_block(&mut self, mut block: VirtAddr, mut order: usize) {
        let mut pfn = self.mapper.virt_to_phys(block).pfn();
        self.bitmap.mark_range_free(pfn, 1 << order);

        // merge blocks as far as possible
        while order + 1 < ORDER_COUNT {
            let pages = 1usize << order;
            let size = size_for_order(order);

            let buddy = if pfn & pages != 0 {
                // merge with the predecessor, its tail is right before us
                if self.bitmap.is_allocated(pfn - 1) {
                    break;
                }

                let tail = block.as_ptr::<ChunkTail>().sub(1);
                if (*tail).order != order {
                    break;
                }

                block = VirtAddr::new(block.as_usize() - size);
                pfn -= pages;
                block
            } else {
                // merge with the successor, its head is right after us
                let next = pfn + pages;
                if next >= self.bitmap.capacity() || self.bitmap.is_allocated(next) {
                    break;
                }

                let buddy = block.offset(size);
                if (*buddy.as_ptr::<ChunkHead>()).order != order {
                    break;
                }

                buddy
            };

            self.orders[order].remove(NonNull::new_unchecked(buddy.as_ptr::<ListNode>()));
            order += 1;
        }

        self.push_block(block, order);
    }

    /// Tag the block at `block` with `order` and push it to the front of the
    /// matching free-list.
    unsafe fn push_block(&mut self, block: VirtAddr, order: usize) {
        let head = block.as_ptr::<ChunkHead>();
        let tail = block
            .offset(size_for_order(order))
            .as_ptr::<ChunkTail>()
            .sub(1);

        ptr::addr_of_mut!((*head).order).write(order);
        tail.write(ChunkTail { order });

        // `link` is the first field of the `repr(C)` head
        self.orders[order].push(NonNull::new_unchecked(head.cast::<ListNode>()));
    }

    /// Returns an iterator over the physical addresses of every free
    /// block with the given order, in the order they will be handed out.
    pub fn free_blocks(&self, order: usize) -> impl Iterator<Item = PhysAddr> + '_ {
        self.orders
            .get(order)
            .into_iter()
            .flat_map(LinkedList::iter)
            .map(move |node| self.mapper.virt_to_phys(VirtAddr::from(node.as_ptr())))
    }

    /// Return the number of pages inside all free-lists.
    pub fn free_pages(&self) -> usize {
        self.orders
            .iter()
            .enumerate()
            .map(|(order, list)| list.iter().count() << order)
            .sum()
    }

    /// Check if the page that contains `addr` is marked as allocated.
    ///
    /// Pages that aren't tracked by the allocator are always reported as allocated.
    pub fn is_allocated(&self, addr: PhysAddr) -> bool {
        let pfn = addr.pfn();
        pfn >= self.bitmap.capacity() || self.bitmap.is_allocated(pfn)
    }

    /// Return the number of page frames that are tracked by this allocator.
    pub fn max_pfn(&self) -> usize {
        self.max_pfn
    }

    /// Return the mapper that is used to access physical memory.
    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Return a copy of the statistics for this allocator.
    pub fn stats(&self) -> AllocStats {
        self.stats.clone()
    }
}
