//! Physical memory allocator for the Windy kernel.
//!
//! The kernel runs as a guest and has no one to ask for memory, so it
//! manages the page frames it was given on its own. The [`BuddyAllocator`]
//! hands out blocks of `2^order` contiguous pages and merges them again
//! when they are freed.
//!
//! The boot code is responsible for finding the free physical memory and
//! for deciding how physical memory is accessed (see [`PhysMapper`]):
//!
//! ```no_run
//! use windy_pmem::{addr::{DirectMap, PhysAddr}, mem::LockedAllocator};
//!
//! static PHYS_MEM: LockedAllocator<DirectMap> =
//!     LockedAllocator::new(DirectMap::new(0xffff_ffc0_0000_0000));
//!
//! unsafe { PHYS_MEM.init(PhysAddr::new(0x8020_0000), PHYS_MEM_END) }?;
//! let page = PHYS_MEM.alloc()?;
//! # const PHYS_MEM_END: PhysAddr = PhysAddr::new(0x8800_0000);
//! # Ok::<(), windy_pmem::mem::Error>(())
//! ```

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![allow(clippy::missing_safety_doc)]
#![cfg_attr(not(test), no_std)]

pub mod addr;
pub mod logging;
pub mod mem;
pub mod unit;

pub use addr::{DirectMap, PhysAddr, PhysMapper, VirtAddr};
pub use mem::{AllocStats, BuddyAllocator, Error, LockedAllocator};
