use std::{mem, ptr::NonNull};

use crate::list::Link;

/// Header size of a block in bytes. Contents start right after it.
pub const BLOCK_HEADER_SIZE: usize = mem::size_of::<Block>();

/// Minimum amount of usable bytes of any block. Every request is raised to at
/// least this value and a split only happens if the remainder can hold this many
/// bytes, so every block can be allocated and merged on its own.
pub const BLOCK_MIN_CAPACITY: usize = 24;

/// This is the structure of a block header. The fields are the block metadata,
/// content is placed right after this header.
///
/// ```text
/// +---------------------+ <------+
/// |        next         |        |
/// +---------------------+        |
/// |      capacity       |        | -> Header
/// +---------------------+        |
/// |    is_free (1b)     |        |
/// +---------------------+ <------+
/// |       Content       |        |
/// |         ...         |        | -> `capacity` addressable bytes
/// |         ...         |        |
/// +---------------------+ <------+
/// ```
///
/// Blocks form a singly linked list in heap order. `next` is a logical link:
/// two linked blocks are only physically adjacent if [`Block::block_after`]
/// of the first one is the second one. We use `repr(C)` because the contents
/// offset has to be the same for every block.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct Block {
    /// Next block in the list, `None` for the last one.
    pub next: Link<Block>,
    /// Usable bytes, excluding the header.
    pub capacity: usize,
    /// Flag to tell whether the block is free or not.
    pub is_free: bool,
}

/// Total bytes taken by a block of `capacity` usable bytes.
#[inline]
pub const fn size_from_capacity(capacity: usize) -> usize {
    capacity + BLOCK_HEADER_SIZE
}

/// Usable bytes of a block that takes `size` bytes in total.
#[inline]
pub const fn capacity_from_size(size: usize) -> usize {
    size - BLOCK_HEADER_SIZE
}

impl Block {
    /// Writes a free block header at `addr` spanning `size` bytes (header
    /// included) and returns a pointer to it.
    ///
    /// # Safety
    ///
    /// `addr` must be aligned for [`Block`] and `size` bytes starting at `addr`
    /// must be writable and owned by the heap.
    pub unsafe fn init(addr: NonNull<u8>, size: usize, next: Link<Block>) -> NonNull<Block> {
        let block = addr.cast::<Block>();

        unsafe {
            block.as_ptr().write(Block {
                next,
                capacity: capacity_from_size(size),
                is_free: true,
            });
        }

        block
    }

    /// Returns the address of the first content byte of `block`.
    ///
    /// ```text
    /// +-------------+
    /// |   Header    | <- `block` points here.
    /// +-------------+
    /// |   Content   | <- Returned address points here.
    /// +-------------+
    /// ```
    ///
    /// # Safety
    ///
    /// `block` must be a valid block header.
    #[inline]
    pub unsafe fn content_address_of(block: NonNull<Block>) -> NonNull<u8> {
        unsafe { NonNull::new_unchecked(block.as_ptr().cast::<u8>().add(BLOCK_HEADER_SIZE)) }
    }

    /// Inverse of [`Block::content_address_of`]. This is how a pointer given
    /// back by the caller is mapped to its header.
    ///
    /// # Safety
    ///
    /// `contents` must have been returned by [`Block::content_address_of`],
    /// otherwise the result points to garbage.
    #[inline]
    pub unsafe fn from_content_address(contents: NonNull<u8>) -> NonNull<Block> {
        unsafe { NonNull::new_unchecked(contents.as_ptr().sub(BLOCK_HEADER_SIZE)).cast() }
    }

    /// Address right after the contents of `block`. If there's a block
    /// physically adjacent to this one, its header starts here.
    ///
    /// # Safety
    ///
    /// `block` must be a valid block header.
    #[inline]
    pub unsafe fn block_after(block: NonNull<Block>) -> NonNull<u8> {
        unsafe {
            let capacity = block.as_ref().capacity;
            NonNull::new_unchecked(Self::content_address_of(block).as_ptr().add(capacity))
        }
    }

    #[inline]
    pub fn is_big_enough(&self, query: usize) -> bool {
        self.capacity >= query
    }

    /// Total block size including [`BLOCK_HEADER_SIZE`].
    #[inline]
    pub fn size(&self) -> usize {
        size_from_capacity(self.capacity)
    }
}
