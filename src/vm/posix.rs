//! POSIX backend over `mmap(2)`.
//!
//! Reserved pages are mapped `PROT_NONE`; committing flips them to
//! `PROT_READ | PROT_WRITE` and the kernel backs them on first touch.

use std::{io, ptr, ptr::NonNull};

use libc::{
  MADV_DONTNEED, MAP_ANONYMOUS, MAP_FAILED, MAP_FIXED, MAP_PRIVATE, PROT_NONE, PROT_READ,
  PROT_WRITE, _SC_PAGESIZE, c_void, madvise, mmap, mprotect, munmap, sysconf,
};
use tracing::warn;

use super::VirtualMemory;
use crate::error::VmError;

// Never MAP_NORESERVE: Linux must charge `commit` against the overcommit
// budget so that exhaustion surfaces as a failed `mprotect`.
const RESERVE_FLAGS: libc::c_int = MAP_PRIVATE | MAP_ANONYMOUS;

/// Virtual memory through `mmap`, `mprotect` and `munmap`.
#[derive(Debug, Clone, Copy)]
pub struct PosixVm {
  page_size: usize,
}

impl PosixVm {
  /// Queries the page size with `sysconf(_SC_PAGESIZE)`.
  pub fn new() -> Self {
    let page_size = unsafe { sysconf(_SC_PAGESIZE) };
    // POSIX guarantees a positive power of two; 4 KiB is the universal floor.
    let page_size = if page_size > 0 { page_size as usize } else { 4096 };
    Self { page_size }
  }
}

impl Default for PosixVm {
  fn default() -> Self {
    Self::new()
  }
}

impl VirtualMemory for PosixVm {
  fn page_size(&self) -> usize {
    self.page_size
  }

  fn reserve(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>, VmError> {
    let address = unsafe { mmap(ptr::null_mut(), size, PROT_NONE, RESERVE_FLAGS, -1, 0) };

    if address == MAP_FAILED {
      return Err(VmError::Reserve {
        size,
        source: io::Error::last_os_error(),
      });
    }

    NonNull::new(address as *mut u8).ok_or_else(|| VmError::Reserve {
      size,
      source: io::Error::other("mmap returned a null mapping"),
    })
  }

  unsafe fn commit(
    &self,
    base: NonNull<u8>,
    offset: usize,
    len: usize,
  ) -> Result<(), VmError> {
    let address = unsafe { base.as_ptr().add(offset) } as *mut c_void;

    if unsafe { mprotect(address, len, PROT_READ | PROT_WRITE) } != 0 {
      return Err(VmError::Commit {
        offset,
        len,
        source: io::Error::last_os_error(),
      });
    }

    Ok(())
  }

  unsafe fn decommit(
    &self,
    base: NonNull<u8>,
    len: usize,
  ) {
    if len == 0 {
      return;
    }

    let address = base.as_ptr() as *mut c_void;

    // Mapping fresh anonymous pages over the range both drops the old
    // backing and guarantees zeroes on the next commit.
    let remapped = unsafe { mmap(address, len, PROT_NONE, RESERVE_FLAGS | MAP_FIXED, -1, 0) };
    if remapped != MAP_FAILED {
      return;
    }

    let error = io::Error::last_os_error();
    warn!(len, %error, "remapping decommitted range failed, falling back to madvise");

    unsafe {
      if madvise(address, len, MADV_DONTNEED) != 0 {
        warn!(len, error = %io::Error::last_os_error(), "madvise(MADV_DONTNEED) failed");
      }
      if mprotect(address, len, PROT_NONE) != 0 {
        warn!(len, error = %io::Error::last_os_error(), "mprotect(PROT_NONE) failed");
      }
    }
  }

  unsafe fn release(
    &self,
    base: NonNull<u8>,
    size: usize,
  ) -> Result<(), VmError> {
    if unsafe { munmap(base.as_ptr() as *mut c_void, size) } != 0 {
      return Err(VmError::Release {
        size,
        source: io::Error::last_os_error(),
      });
    }

    Ok(())
  }
}
