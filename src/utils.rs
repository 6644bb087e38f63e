//! This file contains all the helper functions for the allocator.
//! This are functions that don't particularly belong to any concrete module of the program.

/// It aligns `to_be_aligned` using `aligment`, which must be a power of two.
///
/// This method is used to round caller requests up to the computer's pointer size,
/// so every block header we write after a split lands on an aligned address.
pub fn align(to_be_aligned: usize, aligment: usize) -> usize {
    (to_be_aligned + aligment - 1) & !(aligment - 1)
}

/// Number of pages of `page_size` bytes needed to hold `mem` bytes.
#[inline]
pub(crate) fn pages_count(mem: usize, page_size: usize) -> usize {
    mem / page_size + usize::from(mem % page_size > 0)
}

/// Rounds `mem` up to a whole number of pages, `None` if that doesn't fit in
/// a `usize`.
#[inline]
pub(crate) fn round_pages(mem: usize, page_size: usize) -> Option<usize> {
    pages_count(mem, page_size).checked_mul(page_size)
}

/// Last resort for conditions we cannot recover from. Running out of memory is
/// **NOT** one of them, that is always reported back to the caller.
#[cold]
pub(crate) fn fatal(msg: &str) -> ! {
    log::error!("memheap: {msg}");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;
    use test_log::test;

    #[test]
    fn align_pointer_size() {
        let aligments = vec![(1..8, 8), (9..16, 16), (17..24, 24), (25..32, 32)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(expected, align(size, 8));
            }
        }

        assert_eq!(0, align(0, mem::size_of::<usize>()));
    }

    #[test]
    fn round_to_pages() {
        // For testing purposes we are assuming the page size is 4096
        let aligments = vec![(1..4096, 4096), (4097..8192, 8192)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(Some(expected), round_pages(size, 4096))
            }
        }

        assert_eq!(0, pages_count(0, 4096));
        assert_eq!(3, pages_count(8193, 4096));
    }

    #[test]
    fn round_to_non_power_of_two_pages() {
        assert_eq!(Some(3000), round_pages(2001, 1000));
        assert_eq!(Some(2000), round_pages(2000, 1000));
    }

    #[test]
    fn rounding_past_the_address_space() {
        assert_eq!(None, round_pages(usize::MAX, 4096));
        assert_eq!(None, round_pages(usize::MAX - 4094, 4096));
        assert_eq!(Some(usize::MAX - 4095), round_pages(usize::MAX - 4095, 4096));
    }
}
