use std::ptr::NonNull;

use crate::{block::Block, list::Link, merge, split};

/// Outcome of walking the block list looking for room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SearchResult {
    /// First block in list order that is free and big enough.
    Found(NonNull<Block>),
    /// Nothing fits. Holds the last block of the list, that's where the heap
    /// has to grow from.
    ReachedEnd(NonNull<Block>),
    /// There's no block to start from, the heap was never initialized.
    Corrupted,
}

/// First-fit search starting at `block`.
///
/// Every free block we go through is merged with its free successors first,
/// so a few small free blocks can become one that fits. Ties are resolved by
/// list order only, the first block that fits wins.
///
/// # Safety
///
/// Every block reachable from `block` must be a valid header.
pub(crate) unsafe fn find_good_or_last(block: Link<Block>, query: usize) -> SearchResult {
    let Some(mut block) = block else {
        return SearchResult::Corrupted;
    };

    loop {
        unsafe {
            if block.as_ref().is_free {
                merge::coalesce(block);

                if block.as_ref().is_big_enough(query) {
                    return SearchResult::Found(block);
                }
            }

            match block.as_ref().next {
                Some(next) => block = next,
                None => return SearchResult::ReachedEnd(block),
            }
        }
    }
}

/// Tries to allocate `query` bytes in the existing blocks starting at `block`
/// without growing the heap. The block found is split if it's too big and
/// marked as used, this is the only place where that happens.
///
/// # Safety
///
/// Same as [`find_good_or_last`]. `query` must be a multiple of the header
/// alignment.
pub(crate) unsafe fn try_allocate_existing(query: usize, block: Link<Block>) -> SearchResult {
    let result = unsafe { find_good_or_last(block, query) };

    if let SearchResult::Found(mut found) = result {
        unsafe {
            split::try_split(found, query);
            found.as_mut().is_free = false;
        }
    }

    result
}
