use std::{error::Error, fmt};

/// Returned by [`crate::Heap::init`] and [`crate::Heap::allocate`] when no block
/// can satisfy the request.
///
/// This covers both the kernel refusing to map more pages and the heap not
/// being initialized yet. The allocator cannot tell a heap that was never set
/// up apart from one whose root was lost, so both are reported the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfMemory;

impl fmt::Display for OutOfMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("out of memory")
    }
}

impl Error for OutOfMemory {}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn displays_reason() {
        assert_eq!(OutOfMemory.to_string(), "out of memory");
    }
}
