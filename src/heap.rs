use std::{cmp, fmt, mem, ptr::NonNull};

use log::{debug, warn};

use crate::{
    block::{BLOCK_MIN_CAPACITY, Block},
    error::OutOfMemory,
    kernel::{Kernel, PlatformMemory},
    list::{Iter, Link},
    merge,
    region::{REGION_MIN_SIZE, acquire_region},
    search::{SearchResult, try_allocate_existing},
    utils::{align, round_pages},
};

/// Address where the heap asks the kernel to place its first region.
pub const HEAP_START: usize = 0x0404_0000;

/// Requests above this are refused right away, rounding them up to pages
/// would overflow.
const MAX_REQUEST: usize = isize::MAX as usize / 2;

/// Where the heap lives and how big its regions are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Preferred address of the first region, rounded up to the next page.
    pub start: usize,
    /// Smallest region requested from the kernel, rounded up to whole pages.
    pub region_min_size: usize,
}

impl HeapConfig {
    pub const DEFAULT: Self = Self {
        start: HEAP_START,
        region_min_size: REGION_MIN_SIZE,
    };
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Snapshot of one block, as seen from outside the allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// First byte the caller can use.
    pub contents: NonNull<u8>,
    /// Usable bytes.
    pub capacity: usize,
    pub is_free: bool,
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_free { "free" } else { "taken" };
        write!(f, "{:p} {:>10} {status}", self.contents, self.capacity)
    }
}

/// Totals over every block of the heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub blocks: usize,
    pub free_blocks: usize,
    /// Usable bytes, taken or not.
    pub capacity: usize,
    /// Usable bytes in free blocks.
    pub free_capacity: usize,
    /// Bytes covered by blocks, headers included. Only grows.
    pub mapped: usize,
}

/// General purpose allocator working on a single list of blocks.
///
/// ```text
///   first
///     |
///     v
/// +--------+------+   +--------+------+   +--------+--------------+       +--------+------+
/// | Header | Used |-->| Header | Free |-->| Header |     Used     |-...-->| Header | Free |
/// +--------+------+   +--------+------+   +--------+--------------+       +--------+------+
/// |<-------------------------- Region -------------------------->|       |<-- Region -->|
/// ```
///
/// Allocations take the first free block that fits (merging free neighbours on
/// the way) and split off whatever is left. When nothing fits the heap maps a
/// new region right after the last block: if the kernel places it there and
/// the last block is free, that block just gets bigger, otherwise the new region
/// is linked at the end of the list. Memory is never given back to the kernel.
///
/// The heap is not thread safe, which is why it's neither [`Send`] nor [`Sync`].
pub struct Heap<P: PlatformMemory = Kernel> {
    /// Source of new regions.
    platform: P,
    config: HeapConfig,
    /// First block of the list, `None` until [`Heap::init`] succeeds.
    first: Link<Block>,
}

impl Heap<Kernel> {
    /// Heap backed by the operating system at [`HEAP_START`].
    pub const fn new() -> Self {
        Self::with_platform(Kernel, HeapConfig::DEFAULT)
    }
}

impl Default for Heap<Kernel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PlatformMemory> Heap<P> {
    /// Builds an uninitialized heap. Nothing is mapped until [`Heap::init`].
    pub const fn with_platform(platform: P, config: HeapConfig) -> Self {
        Self {
            platform,
            config,
            first: None,
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.first.is_some()
    }

    /// Maps the first region, big enough for a block of `initial` bytes, at
    /// [`HeapConfig::start`] (or the first page boundary after it) and returns
    /// its address.
    ///
    /// If the kernel can't place it there, the heap starts wherever the kernel
    /// put it. Calling this on an initialized heap returns the current start
    /// without mapping anything.
    pub fn init(&mut self, initial: usize) -> Result<NonNull<u8>, OutOfMemory> {
        if let Some(first) = self.first {
            warn!("heap already initialized at {first:?}");
            return Ok(first.cast());
        }

        if initial > MAX_REQUEST {
            return Err(OutOfMemory);
        }

        // The kernel only maps whole pages.
        let page_size = self.platform.page_size();
        let start = round_pages(self.config.start, page_size).ok_or(OutOfMemory)? as *mut u8;
        let min_size = self.config.region_min_size;
        let region = unsafe { acquire_region(&mut self.platform, start, initial, min_size) };

        let addr = region.addr.ok_or(OutOfMemory)?;

        if !region.extends {
            debug!("heap requested at {start:?} but placed at {addr:?}");
        }

        self.first = region.first_block();

        Ok(addr)
    }

    /// Returns a pointer to at least `size` usable bytes, aligned to the
    /// machine word.
    ///
    /// Fails if the heap is not initialized or the kernel won't give us more
    /// memory. The returned pointer stays valid until it's passed to
    /// [`Heap::release`] or the heap is dropped. Dropping the heap does not
    /// unmap anything.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, OutOfMemory> {
        if size > MAX_REQUEST {
            return Err(OutOfMemory);
        }

        let block = self.memalloc(size).ok_or(OutOfMemory)?;

        Ok(unsafe { Block::content_address_of(block) })
    }

    /// Gives `address` back to the heap. The block is merged with the free
    /// blocks right after it. Does nothing if `address` is null.
    ///
    /// # Safety
    ///
    /// `address` must be null or a pointer returned by [`Heap::allocate`] on
    /// this same heap that was not released already. Nothing is checked.
    pub unsafe fn release(&mut self, address: *mut u8) {
        let Some(contents) = NonNull::new(address) else {
            return;
        };

        unsafe {
            let mut block = Block::from_content_address(contents);
            block.as_mut().is_free = true;
            merge::coalesce(block);
        }
    }

    /// Walks every block in list order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        unsafe { Iter::new(self.first) }.map(|block| {
            let header = unsafe { block.as_ref() };
            BlockInfo {
                contents: unsafe { Block::content_address_of(block) },
                capacity: header.capacity,
                is_free: header.is_free,
            }
        })
    }

    pub fn stats(&self) -> HeapStats {
        unsafe { Iter::new(self.first) }.fold(HeapStats::default(), |mut stats, block| {
            let header = unsafe { block.as_ref() };

            stats.blocks += 1;
            stats.capacity += header.capacity;
            stats.mapped += header.size();

            if header.is_free {
                stats.free_blocks += 1;
                stats.free_capacity += header.capacity;
            }

            stats
        })
    }

    /// Logs every block of the heap at debug level.
    pub fn debug_heap(&self) {
        debug!("--- heap at {:?} ---", self.first);
        debug!("{:>18} {:>10} status", "contents", "capacity");

        for block in self.blocks() {
            debug!("{block}");
        }
    }

    /// Finds or makes room for `query` bytes and returns the block, already
    /// marked as used.
    fn memalloc(&mut self, query: usize) -> Link<Block> {
        let query = cmp::max(align(query, mem::align_of::<Block>()), BLOCK_MIN_CAPACITY);

        unsafe {
            match try_allocate_existing(query, self.first) {
                SearchResult::Found(block) => Some(block),
                SearchResult::ReachedEnd(last) => {
                    let grown = self.grow_heap(last, query);

                    match try_allocate_existing(query, grown) {
                        SearchResult::Found(block) => Some(block),
                        _ => None,
                    }
                }
                SearchResult::Corrupted => {
                    warn!("allocation of {query} bytes on an uninitialized heap");
                    None
                }
            }
        }
    }

    /// Maps a new region right after `last` and returns the block the next
    /// search should start from.
    ///
    /// ```text
    /// Kernel placed the region right after `last` and `last` is free:
    ///
    /// +--------+-------------+ - - - - - - - - - - - +
    /// | Header |    last     |       new region      |  -> `last` absorbs it
    /// +--------+-------------+ - - - - - - - - - - - +
    ///
    /// Otherwise:
    ///
    /// +--------+-------------+         +--------+--------------+
    /// | Header |    last     | ------> | Header |  new region  |
    /// +--------+-------------+         +--------+--------------+
    /// ```
    ///
    /// If the kernel refused to map anything, `last` ends up linked to nothing
    /// and `None` is returned.
    unsafe fn grow_heap(&mut self, mut last: NonNull<Block>, query: usize) -> Link<Block> {
        let end = unsafe { Block::block_after(last) };
        let min_size = self.config.region_min_size;
        let region = unsafe { acquire_region(&mut self.platform, end.as_ptr(), query, min_size) };
        let header = unsafe { last.as_mut() };

        if !region.is_invalid() && region.extends && header.is_free {
            debug!("growing {last:?} in place by {} bytes", region.size);
            header.capacity += region.size;
            return Some(last);
        }

        debug!("linking {:?} after {last:?}", region.addr);
        header.next = region.first_block();
        header.next
    }
}
