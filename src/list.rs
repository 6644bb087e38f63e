use std::{marker::PhantomData, ptr::NonNull};

use crate::block::Block;

/// Non-null pointer to `T`.
pub(crate) type Link<T> = Option<NonNull<T>>;

/// Walks the block list in heap order starting from any block.
///
/// The lifetime ties the iterator to a shared borrow of whoever owns the
/// list, so nobody can split or merge blocks while we are walking.
pub(crate) struct Iter<'a> {
    current: Link<Block>,
    marker: PhantomData<&'a Block>,
}

impl<'a> Iter<'a> {
    /// # Safety
    ///
    /// Every block reachable from `head` must be a valid header for `'a`.
    pub unsafe fn new(head: Link<Block>) -> Self {
        Self {
            current: head,
            marker: PhantomData,
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = NonNull<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;

        unsafe {
            self.current = block.as_ref().next;
        }

        Some(block)
    }
}
