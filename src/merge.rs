use std::ptr::NonNull;

use log::trace;

use crate::block::{Block, size_from_capacity};

/// `snd` starts exactly where the contents of `fst` end.
unsafe fn blocks_continuous(fst: NonNull<Block>, snd: NonNull<Block>) -> bool {
    unsafe { Block::block_after(fst) == snd.cast() }
}

/// Two blocks can be merged if both are free and there's nothing between them.
/// Blocks linked across regions that were not mapped back to back are never
/// merged, even if both are free.
unsafe fn mergeable(fst: NonNull<Block>, snd: NonNull<Block>) -> bool {
    unsafe { fst.as_ref().is_free && snd.as_ref().is_free && blocks_continuous(fst, snd) }
}

/// Absorbs the successor of `block` if they are [`mergeable`]. The successor
/// header becomes part of the contents of `block`.
///
/// ```text
/// +--------+-----------+--------+------------+
/// | Header | Free      | Header | Free       | ---> next
/// +--------+-----------+--------+------------+
///
/// +--------+---------------------------------+
/// | Header | Free                            | ---> next
/// +--------+---------------------------------+
/// ```
///
/// # Safety
///
/// `block` must be a valid header and so must its successor, if any.
pub(crate) unsafe fn try_merge_with_next(mut block: NonNull<Block>) -> bool {
    unsafe {
        let Some(next) = block.as_ref().next else {
            return false;
        };

        if !mergeable(block, next) {
            return false;
        }

        let absorbed = next.as_ref();
        let header = block.as_mut();

        trace!("merge {block:?} ({}) with {next:?} ({})", header.capacity, absorbed.capacity);

        header.capacity += size_from_capacity(absorbed.capacity);
        header.next = absorbed.next;
    }

    true
}

/// Keeps merging `block` with its successors until it can't anymore. This only
/// looks forward, a free block before `block` will absorb it later when the
/// search goes through that block.
///
/// Returns how many blocks were absorbed.
///
/// # Safety
///
/// Same as [`try_merge_with_next`] for every block reachable from `block`.
pub(crate) unsafe fn coalesce(block: NonNull<Block>) -> usize {
    let mut merged = 0;

    while unsafe { try_merge_with_next(block) } {
        merged += 1;
    }

    merged
}
