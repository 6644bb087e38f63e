use std::ptr::NonNull;

use log::trace;

use crate::block::{BLOCK_HEADER_SIZE, BLOCK_MIN_CAPACITY, Block};

/// A block can be split if, after giving `query` bytes to the caller, what's
/// left can hold a header plus [`BLOCK_MIN_CAPACITY`] bytes.
fn splittable(block: &Block, query: usize) -> bool {
    block.is_free && query + BLOCK_HEADER_SIZE + BLOCK_MIN_CAPACITY <= block.capacity
}

/// Shrinks `block` to exactly `query` bytes and turns the rest of it into a new
/// free block linked right after it.
///
/// ```text
/// Before:
///
/// +--------+-------------------------------------------+
/// | Header |               capacity                    | ---> next
/// +--------+-------------------------------------------+
///
/// After:
///
/// +--------+-------------+--------+--------------------+
/// | Header |    query    | Header |      remainder     | ---> next
/// +--------+-------------+--------+--------------------+
///     |                      ^
///     +----------------------+
/// ```
///
/// Returns `false` without touching anything if the block can't be split.
///
/// # Safety
///
/// `block` must be a valid header and `query` must be a multiple of the header
/// alignment.
pub(crate) unsafe fn try_split(mut block: NonNull<Block>, query: usize) -> bool {
    let header = unsafe { block.as_mut() };

    if !splittable(header, query) {
        return false;
    }

    let remainder = unsafe {
        let addr = NonNull::new_unchecked(Block::content_address_of(block).as_ptr().add(query));
        Block::init(addr, header.capacity - query, header.next)
    };

    trace!(
        "split {block:?}: {} -> {query} + {}",
        header.capacity,
        unsafe { remainder.as_ref().capacity }
    );

    header.capacity = query;
    header.next = Some(remainder);

    true
}
