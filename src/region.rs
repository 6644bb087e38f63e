use std::{cmp, ptr::NonNull};

use log::{debug, warn};

use crate::{
    block::{Block, size_from_capacity},
    kernel::{Placement, PlatformMemory},
    list::Link,
    utils::round_pages,
};

/// Smallest region we ever ask the kernel for, in bytes. Tiny requests still
/// map this much so we don't call into the kernel for every few bytes.
pub const REGION_MIN_SIZE: usize = 2 * 4096;

/// One mapping obtained from the kernel. Regions are never returned, as soon as
/// one is acquired a single free block spanning all of it is written at its
/// start and from then on the heap only sees blocks.
///
/// ```text
/// +--------------------------------------------------+
/// | +-------+-------------------------------------+  |
/// | | Block |          Free content               |  |   <- Region of `size` bytes
/// | +-------+-------------------------------------+  |
/// +--------------------------------------------------+
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Region {
    /// Start of the mapping, `None` if the kernel refused to map it.
    pub addr: Option<NonNull<u8>>,
    /// Size of the region, always a whole number of pages.
    pub size: usize,
    /// Whether the kernel placed the region exactly where we asked, which
    /// means it continues whatever was right before that address.
    pub extends: bool,
}

impl Region {
    pub const INVALID: Self = Self {
        addr: None,
        size: 0,
        extends: false,
    };

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.addr.is_none()
    }

    /// The block written at the start of the region.
    #[inline]
    pub fn first_block(&self) -> Link<Block> {
        self.addr.map(NonNull::cast)
    }
}

/// Calculates the length in bytes that we should map if we want to store
/// `query` bytes, header included: whole pages, and never less than `min_size`.
/// `None` if that length doesn't fit in the address space.
pub(crate) fn region_actual_size(query: usize, page_size: usize, min_size: usize) -> Option<usize> {
    Some(cmp::max(round_pages(query, page_size)?, round_pages(min_size, page_size)?))
}

/// Maps a new region able to hold a block of `query` usable bytes, trying to
/// place it at `addr` first and anywhere else after that.
///
/// The returned region either holds one free block covering all of it, or is
/// [`Region::INVALID`] if the kernel refused both requests or the region
/// would be bigger than the address space.
///
/// # Safety
///
/// `addr` must be page aligned.
pub(crate) unsafe fn acquire_region<P: PlatformMemory>(
    platform: &mut P,
    addr: *mut u8,
    query: usize,
    min_size: usize,
) -> Region {
    let page_size = platform.page_size();

    let Some(size) = region_actual_size(size_from_capacity(query), page_size, min_size) else {
        warn!("region for {query} bytes with a minimum of {min_size} bytes is too big");
        return Region::INVALID;
    };

    let mapped = unsafe { platform.map_pages(addr, size, Placement::Exact) }.or_else(|| {
        debug!("could not map {size} bytes at {addr:?}, letting the kernel choose");
        unsafe { platform.map_pages(addr, size, Placement::Anywhere) }
    });

    let Some(mapped) = mapped else {
        warn!("kernel refused to map a region of {size} bytes");
        return Region::INVALID;
    };

    unsafe { Block::init(mapped, size, None) };

    let region = Region {
        addr: Some(mapped),
        size,
        extends: mapped.as_ptr() == addr,
    };

    debug!("mapped {region:?}");

    region
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::BLOCK_HEADER_SIZE,
        toy::{TOY_PAGE_SIZE, ToyMemory},
    };
    use test_log::test;

    #[test]
    fn region_size_is_whole_pages_above_minimum() {
        let size = |query| region_actual_size(query, 4096, REGION_MIN_SIZE);

        assert_eq!(size(1), Some(REGION_MIN_SIZE));
        assert_eq!(size(REGION_MIN_SIZE), Some(REGION_MIN_SIZE));
        assert_eq!(size(REGION_MIN_SIZE + 1), Some(REGION_MIN_SIZE + 4096));
        assert_eq!(size(10 * 4096 - 1), Some(10 * 4096));
        // A minimum that is not a whole number of pages is rounded as well.
        assert_eq!(region_actual_size(1, 4096, 100), Some(4096));
    }

    #[test]
    fn region_size_past_the_address_space() {
        assert_eq!(region_actual_size(1, 4096, usize::MAX), None);
        assert_eq!(region_actual_size(usize::MAX, 4096, REGION_MIN_SIZE), None);
    }

    #[test]
    fn oversized_minimum_is_invalid() {
        let mut toy = ToyMemory::new(8);
        let addr = toy.base().as_ptr();

        unsafe {
            let region = acquire_region(&mut toy, addr, 100, usize::MAX);

            assert!(region.is_invalid());
            assert_eq!(toy.requests, 0);
        }
    }

    #[test]
    fn exact_placement_extends() {
        let mut toy = ToyMemory::new(8);
        let addr = toy.base().as_ptr();

        unsafe {
            let region = acquire_region(&mut toy, addr, 100, REGION_MIN_SIZE);

            assert!(!region.is_invalid());
            assert!(region.extends);
            assert_eq!(region.addr, Some(toy.base()));
            assert_eq!(region.size, REGION_MIN_SIZE);

            let block = region.first_block().unwrap().as_ref();
            assert!(block.is_free);
            assert!(block.next.is_none());
            assert_eq!(block.capacity, REGION_MIN_SIZE - BLOCK_HEADER_SIZE);
        }
    }

    #[test]
    fn large_query_spans_more_pages() {
        let mut toy = ToyMemory::new(8);
        let addr = toy.base().as_ptr();

        unsafe {
            let region = acquire_region(&mut toy, addr, 3 * TOY_PAGE_SIZE, REGION_MIN_SIZE);

            assert_eq!(region.size, 4 * TOY_PAGE_SIZE);
        }
    }

    #[test]
    fn falls_back_to_any_address() {
        let mut toy = ToyMemory::new(8);
        toy.refuse_exact = true;
        let addr = toy.base().as_ptr();

        unsafe {
            let region = acquire_region(&mut toy, addr, 100, REGION_MIN_SIZE);

            assert!(!region.is_invalid());
            assert!(!region.extends);
            assert_ne!(region.addr, Some(toy.base()));
            assert_eq!(toy.requests, 2);
        }
    }

    #[test]
    fn refused_mapping_is_invalid() {
        let mut toy = ToyMemory::new(8);
        toy.exhausted = true;
        let addr = toy.base().as_ptr();

        unsafe {
            let region = acquire_region(&mut toy, addr, 100, REGION_MIN_SIZE);

            assert!(region.is_invalid());
            assert_eq!(region, Region::INVALID);
            assert!(region.first_block().is_none());
        }
    }
}
