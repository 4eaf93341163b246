//! The allocation bitmap, one bit per page of memory.
//!
//! A set bit means the page is allocated, or reserved
//! for the allocator's own bookkeeping.

use super::PAGE_SIZE;
use core::{ptr::NonNull, slice};

/// The number of pages tracked by a single word of the bitmap.
pub const PAGES_PER_WORD: usize = usize::BITS as usize;

/// Mask with every bit `>= n` set. `n` must be less than [`PAGES_PER_WORD`].
#[inline]
const fn mask_from(n: usize) -> usize {
    !mask_below(n)
}

/// Mask with every bit `< n` set. `n` must be less than [`PAGES_PER_WORD`].
#[inline]
const fn mask_below(n: usize) -> usize {
    (1 << n) - 1
}

/// Bitmap that records the allocation state of every page
/// frame in `[0, pages)`.
///
/// The storage lives inside the memory that is managed by the allocator,
/// so this type only holds a raw pointer to it.
pub struct Bitmap {
    words: NonNull<usize>,
    len: usize,
}

impl Bitmap {
    /// A bitmap that doesn't track any page.
    pub const fn empty() -> Self {
        Self {
            words: NonNull::dangling(),
            len: 0,
        }
    }

    /// Return the number of bytes required to track `pages` pages,
    /// rounded up to whole pages.
    pub const fn size_for(pages: usize) -> usize {
        let words = pages.div_ceil(PAGES_PER_WORD);
        let bytes = words * core::mem::size_of::<usize>();
        bytes.div_ceil(PAGE_SIZE) * PAGE_SIZE
    }

    /// Create a bitmap that is stored in `len` words at `words`.
    ///
    /// The contents are left as they are.
    ///
    /// # Safety
    ///
    /// `words` must be valid to read and write `len` words for as long as
    /// the bitmap is used, and nothing else may access that memory.
    pub unsafe fn from_raw(words: NonNull<usize>, len: usize) -> Self {
        Self { words, len }
    }

    /// Return the number of pages this bitmap is able to track.
    pub fn capacity(&self) -> usize {
        self.len * PAGES_PER_WORD
    }

    fn as_slice(&self) -> &[usize] {
        // SAFETY
        // Guaranteed by the caller of `from_raw`, or an empty dangling slice.
        unsafe { slice::from_raw_parts(self.words.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [usize] {
        // SAFETY
        // Guaranteed by the caller of `from_raw`, or an empty dangling slice.
        unsafe { slice::from_raw_parts_mut(self.words.as_ptr(), self.len) }
    }

    /// Mark every page that is tracked by this bitmap as allocated.
    pub fn fill(&mut self) {
        self.as_mut_slice().fill(!0);
    }

    /// Check if the given page is marked as allocated.
    #[inline]
    pub fn is_allocated(&self, page: usize) -> bool {
        let word = self.as_slice()[page / PAGES_PER_WORD];
        word & (1 << (page % PAGES_PER_WORD)) != 0
    }

    /// Mark the pages `first_page..first_page + count` as allocated.
    pub fn mark_range_allocated(&mut self, first_page: usize, count: usize) {
        if count == 0 {
            return;
        }

        let (curr_idx, start_off) = split(first_page);
        let (end_idx, end_off) = split(first_page + count);
        let words = self.as_mut_slice();

        if curr_idx == end_idx {
            words[curr_idx] |= mask_below(end_off) & mask_from(start_off);
            return;
        }

        words[curr_idx] |= mask_from(start_off);
        words[curr_idx + 1..end_idx].fill(!0);
        if end_off != 0 {
            words[end_idx] |= mask_below(end_off);
        }
    }

    /// Mark the pages `first_page..first_page + count` as free.
    pub fn mark_range_free(&mut self, first_page: usize, count: usize) {
        if count == 0 {
            return;
        }

        let (curr_idx, start_off) = split(first_page);
        let (end_idx, end_off) = split(first_page + count);
        let words = self.as_mut_slice();

        if curr_idx == end_idx {
            words[curr_idx] &= mask_from(end_off) | mask_below(start_off);
            return;
        }

        words[curr_idx] &= mask_below(start_off);
        words[curr_idx + 1..end_idx].fill(0);
        if end_off != 0 {
            words[end_idx] &= mask_from(end_off);
        }
    }
}

/// Split a page number into the index of its word and the bit offset inside it.
#[inline]
const fn split(page: usize) -> (usize, usize) {
    (page / PAGES_PER_WORD, page % PAGES_PER_WORD)
}
