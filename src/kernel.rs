use std::{
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::utils::fatal;

/// Virtual memory page size of the computer. This is usually 4096.
/// This value should be a constant, but we can't do that since we
/// don't know the value at compile time, so it is cached here the first
/// time someone asks for it.
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Where the kernel is allowed to place a mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The mapping must start exactly at the requested address. If that's not
    /// possible the request fails instead of replacing whatever lives there.
    Exact,
    /// The requested address is only a hint.
    Anywhere,
}

/// This trait provides an abstraction to handle low level memory operations
/// and syscalls. The heap has nothing to do with the concrete
/// implementations / APIs offered by each kernel, it only needs pages.
///
/// # Safety
///
/// Implementors must guarantee that a returned address points to at least
/// `len` bytes that are readable, writable, aligned to [`Self::page_size`]
/// and not used by anyone else for as long as the implementor lives.
pub unsafe trait PlatformMemory {
    /// Request a memory region of size `len`, preferably starting at `addr`.
    /// It returns a pointer to the mapped region or `None` if the underlying
    /// syscall fails.
    ///
    /// # Safety
    ///
    /// `len` must be a multiple of [`Self::page_size`] and `addr` must be page
    /// aligned.
    unsafe fn map_pages(
        &mut self,
        addr: *mut u8,
        len: usize,
        placement: Placement,
    ) -> Option<NonNull<u8>>;

    /// Returns the virtual memory page size in bytes.
    fn page_size(&self) -> usize;
}

/// Zero sized handle to the operating system memory APIs.
#[derive(Clone, Copy, Debug, Default)]
pub struct Kernel;

/// Raw syscalls, implemented once per platform.
trait Syscalls {
    unsafe fn request_memory(
        addr: *mut u8,
        len: usize,
        placement: Placement,
    ) -> Option<NonNull<u8>>;

    unsafe fn query_page_size() -> usize;
}

/// Wrapper to calculate the computer's page size.
#[inline]
pub(crate) fn page_size() -> usize {
    match PAGE_SIZE.load(Ordering::Relaxed) {
        0 => {
            let size = unsafe { Kernel::query_page_size() };
            if !size.is_power_of_two() {
                fatal("the kernel reported an invalid page size");
            }
            PAGE_SIZE.store(size, Ordering::Relaxed);
            size
        }
        size => size,
    }
}

unsafe impl PlatformMemory for Kernel {
    unsafe fn map_pages(
        &mut self,
        addr: *mut u8,
        len: usize,
        placement: Placement,
    ) -> Option<NonNull<u8>> {
        unsafe { Kernel::request_memory(addr, len, placement) }
    }

    fn page_size(&self) -> usize {
        page_size()
    }
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, Placement, Syscalls};

    use libc::{c_int, mmap, munmap, off_t, size_t};

    use std::{os::raw::c_void, ptr::NonNull};

    /// Asks the kernel to fail instead of moving or replacing the mapping.
    #[cfg(target_os = "linux")]
    const EXACT: c_int = libc::MAP_FIXED_NOREPLACE;

    /// Without `MAP_FIXED_NOREPLACE` the address can only be a hint, we
    /// check the result ourselves.
    #[cfg(not(target_os = "linux"))]
    const EXACT: c_int = 0;

    impl Syscalls for Kernel {
        unsafe fn request_memory(
            addr: *mut u8,
            len: usize,
            placement: Placement,
        ) -> Option<NonNull<u8>> {
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            let flags = match placement {
                Placement::Exact => FLAGS | EXACT,
                Placement::Anywhere => FLAGS,
            };

            unsafe {
                let mapped = mmap(addr.cast::<c_void>(), len as size_t, PROT, flags, FD, OFFSET);

                if mapped == libc::MAP_FAILED {
                    return None;
                }

                // Old kernels ignore MAP_FIXED_NOREPLACE and treat the address as a hint.
                if placement == Placement::Exact && mapped.cast::<u8>() != addr {
                    munmap(mapped, len as size_t);
                    return None;
                }

                NonNull::new(mapped.cast::<u8>())
            }
        }

        unsafe fn query_page_size() -> usize {
            match unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) } {
                size if size > 0 => size as usize,
                _ => 0,
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{mem::MaybeUninit, os::raw::c_void, ptr::NonNull};

    use crate::kernel::{Kernel, Placement, Syscalls};

    use windows::Win32::System::{Memory, SystemInformation};

    impl Syscalls for Kernel {
        unsafe fn request_memory(
            addr: *mut u8,
            len: usize,
            placement: Placement,
        ) -> Option<NonNull<u8>> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;

            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            let hint = match placement {
                Placement::Exact => Some(addr as *const c_void),
                Placement::Anywhere => None,
            };

            unsafe {
                let mapped = Memory::VirtualAlloc(hint, len, flags, protection);

                // VirtualAlloc rounds reservations down to the allocation granularity.
                let moved = mapped.cast::<u8>() != addr;
                if !mapped.is_null() && placement == Placement::Exact && moved {
                    let _ = Memory::VirtualFree(mapped, 0, Memory::MEM_RELEASE);
                    return None;
                }

                NonNull::new(mapped.cast())
            }
        }

        unsafe fn query_page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }
}
