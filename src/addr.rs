//! Physical and virtual address types, and the translation between them.

use crate::mem::{PAGE_SHIFT, PAGE_SIZE};
use core::fmt;

macro_rules! addr_type {
    ($(#[$attr:meta])* $pub:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $pub struct $name(usize);

        impl $name {
            /// Create a new address from the raw value.
            pub const fn new(addr: usize) -> Self {
                Self(addr)
            }

            /// Return the raw value of this address.
            pub const fn as_usize(self) -> usize {
                self.0
            }

            /// Calculates the wrapping offset from this address.
            pub const fn offset(self, off: usize) -> Self {
                Self(self.0.wrapping_add(off))
            }

            /// Round this address up to the next page boundary.
            pub const fn page_up(self) -> Self {
                Self(self.0.wrapping_add(PAGE_SIZE - 1) & !(PAGE_SIZE - 1))
            }

            /// Round this address down to the previous page boundary.
            pub const fn page_down(self) -> Self {
                Self(self.0 & !(PAGE_SIZE - 1))
            }

            /// Check if this address is aligned to `align`, which must be a power of two.
            pub const fn is_aligned(self, align: usize) -> bool {
                self.0 & (align - 1) == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0)
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::LowerHex::fmt(&self.0, f)
            }
        }

        impl From<usize> for $name {
            fn from(addr: usize) -> Self {
                Self(addr)
            }
        }

        impl From<$name> for usize {
            fn from(x: $name) -> usize {
                x.0
            }
        }
    };
}

addr_type! {
    /// A physical address.
    pub struct PhysAddr;
}

addr_type! {
    /// An address inside the kernel's working address space,
    /// through which physical memory is accessed.
    pub struct VirtAddr;
}

impl PhysAddr {
    /// Create the physical address of the page with the given frame number.
    pub const fn from_pfn(pfn: usize) -> Self {
        Self(pfn << PAGE_SHIFT)
    }

    /// Return the number of the page frame that contains this address.
    pub const fn pfn(self) -> usize {
        self.0 >> PAGE_SHIFT
    }
}

impl VirtAddr {
    /// Interpret this address as a pointer to a `T`.
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl<T> From<*const T> for VirtAddr {
    fn from(x: *const T) -> Self {
        Self::from(x as usize)
    }
}

impl<T> From<*mut T> for VirtAddr {
    fn from(x: *mut T) -> Self {
        Self::from(x as usize)
    }
}

/// Translation between physical addresses and the addresses
/// the allocator uses to touch that memory.
///
/// Both directions must be pure and inverse to each other
/// for every address that is handed to the allocator.
pub trait PhysMapper {
    /// Translate a physical address into the working address space.
    fn phys_to_virt(&self, pa: PhysAddr) -> VirtAddr;

    /// Translate an address of the working address space back into a physical address.
    fn virt_to_phys(&self, va: VirtAddr) -> PhysAddr;
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    fn phys_to_virt(&self, pa: PhysAddr) -> VirtAddr {
        (**self).phys_to_virt(pa)
    }

    fn virt_to_phys(&self, va: VirtAddr) -> PhysAddr {
        (**self).virt_to_phys(va)
    }
}

/// A [`PhysMapper`] for a direct map, where every physical
/// address `pa` is visible at `offset + pa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectMap {
    offset: usize,
}

impl DirectMap {
    /// Create a direct map that starts at `offset`.
    pub const fn new(offset: usize) -> Self {
        Self { offset }
    }

    /// The identity mapping.
    pub const fn identity() -> Self {
        Self::new(0)
    }

    /// Return the start of the direct map.
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

impl PhysMapper for DirectMap {
    #[inline]
    fn phys_to_virt(&self, pa: PhysAddr) -> VirtAddr {
        VirtAddr::new(pa.as_usize().wrapping_add(self.offset))
    }

    #[inline]
    fn virt_to_phys(&self, va: VirtAddr) -> PhysAddr {
        PhysAddr::new(va.as_usize().wrapping_sub(self.offset))
    }
}
