//! Test double for [`PlatformMemory`]. Pages come from one page-aligned
//! buffer obtained from the global allocator, so tests can build any layout
//! they want without touching the real address space.

use std::{
    alloc::{self, Layout},
    ptr::NonNull,
};

use crate::kernel::{Placement, PlatformMemory};

pub(crate) const TOY_PAGE_SIZE: usize = 4096;

pub(crate) struct ToyMemory {
    base: NonNull<u8>,
    layout: Layout,
    /// Mapped ranges as `(offset, len)` from `base`.
    mapped: Vec<(usize, usize)>,
    /// Fail every [`Placement::Exact`] request.
    pub refuse_exact: bool,
    /// Fail every request.
    pub exhausted: bool,
    /// Number of `map_pages` calls so far.
    pub requests: usize,
}

impl ToyMemory {
    pub fn new(pages: usize) -> Self {
        let layout = Layout::from_size_align(pages * TOY_PAGE_SIZE, TOY_PAGE_SIZE).unwrap();
        let base = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).expect("toy memory");

        Self {
            base,
            layout,
            mapped: Vec::new(),
            refuse_exact: false,
            exhausted: false,
            requests: 0,
        }
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub fn start(&self) -> usize {
        self.base.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    fn is_unmapped(&self, offset: usize, len: usize) -> bool {
        offset + len <= self.len()
            && self
                .mapped
                .iter()
                .all(|&(start, size)| offset + len <= start || start + size <= offset)
    }

    /// Highest free gap that fits `len`, like mmap placing new mappings top-down.
    fn highest_gap(&self, len: usize) -> Option<usize> {
        let last = self.len().checked_sub(len)?;

        (0..=last / TOY_PAGE_SIZE)
            .rev()
            .map(|page| page * TOY_PAGE_SIZE)
            .find(|&offset| self.is_unmapped(offset, len))
    }
}

unsafe impl PlatformMemory for ToyMemory {
    unsafe fn map_pages(
        &mut self,
        addr: *mut u8,
        len: usize,
        placement: Placement,
    ) -> Option<NonNull<u8>> {
        self.requests += 1;

        if self.exhausted {
            return None;
        }

        let wanted = (addr as usize)
            .checked_sub(self.start())
            .filter(|&offset| self.is_unmapped(offset, len));

        let offset = match placement {
            Placement::Exact if self.refuse_exact => None,
            Placement::Exact => wanted,
            Placement::Anywhere => self.highest_gap(len),
        }?;

        self.mapped.push((offset, len));

        Some(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) })
    }

    fn page_size(&self) -> usize {
        TOY_PAGE_SIZE
    }
}

impl Drop for ToyMemory {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
    }
}
