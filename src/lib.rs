//! # memheap
//!
//! General purpose allocator built directly on top of the pages the kernel
//! gives us (`mmap` on unix, `VirtualAlloc` on windows). No other allocator
//! is involved.
//!
//! Every allocation is a block: a small header followed by the bytes handed to
//! the caller. All blocks form one singly linked list in heap order:
//!
//! ```text
//! +--------+----------+--------+------------------+--------+------+
//! | Header | Contents | Header |     Contents     | Header | .... |
//! +--------+----------+--------+------------------+--------+------+
//!     |                   ^  |                        ^
//!     +-------------------+  +------------------------+
//! ```
//!
//! - **Allocation** walks the list and takes the first free block that fits.
//!   Free blocks are merged with their free neighbours on the way, and the block
//!   taken is split if what's left is big enough to be a block of its own.
//! - **Growth** happens when nothing fits: a new region is mapped right after
//!   the last block. If the kernel puts it there and the last block is free the
//!   block simply gets bigger, otherwise the region is linked at the end.
//! - **Release** marks the block as free and merges it with the free blocks
//!   right after it. Memory is never returned to the kernel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memheap::Heap;
//!
//! let mut heap = Heap::new();
//! heap.init(4096).expect("no memory for the heap");
//!
//! let ptr = heap.allocate(64).expect("out of memory");
//!
//! unsafe {
//!     ptr.as_ptr().write_bytes(0, 64);
//!     heap.release(ptr.as_ptr());
//! }
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: a [`Heap`] is neither `Send` nor `Sync`.
//! - **No validation**: releasing a pointer that didn't come from the heap is
//!   undefined behaviour.

mod block;
mod error;
mod heap;
mod kernel;
mod list;
mod merge;
mod region;
mod search;
mod split;
mod utils;

#[cfg(test)]
mod toy;

pub use block::{BLOCK_HEADER_SIZE, BLOCK_MIN_CAPACITY, capacity_from_size, size_from_capacity};
pub use error::OutOfMemory;
pub use heap::{BlockInfo, HEAP_START, Heap, HeapConfig, HeapStats};
pub use kernel::{Kernel, Placement, PlatformMemory};
pub use region::REGION_MIN_SIZE;
