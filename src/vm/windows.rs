//! Windows backend over `VirtualAlloc`/`VirtualFree`.

use std::{ffi::c_void, io, mem, ptr, ptr::NonNull};

use tracing::warn;
use windows_sys::Win32::System::{
  Memory::{MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE, VirtualAlloc, VirtualFree},
  SystemInformation::{GetSystemInfo, SYSTEM_INFO},
};

use super::VirtualMemory;
use crate::error::VmError;

/// Virtual memory through `VirtualAlloc` and `VirtualFree`.
#[derive(Debug, Clone, Copy)]
pub struct WindowsVm {
  page_size: usize,
}

impl WindowsVm {
  /// Queries the page size with `GetSystemInfo`.
  pub fn new() -> Self {
    let mut system_info: SYSTEM_INFO = unsafe { mem::zeroed() };
    unsafe {
      GetSystemInfo(&mut system_info);
    }

    let page_size = system_info.dwPageSize as usize;
    let page_size = if page_size.is_power_of_two() { page_size } else { 4096 };
    Self { page_size }
  }
}

impl Default for WindowsVm {
  fn default() -> Self {
    Self::new()
  }
}

impl VirtualMemory for WindowsVm {
  fn page_size(&self) -> usize {
    self.page_size
  }

  fn reserve(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>, VmError> {
    let address = unsafe { VirtualAlloc(ptr::null(), size, MEM_RESERVE, PAGE_READWRITE) };

    NonNull::new(address as *mut u8).ok_or_else(|| VmError::Reserve {
      size,
      source: io::Error::last_os_error(),
    })
  }

  unsafe fn commit(
    &self,
    base: NonNull<u8>,
    offset: usize,
    len: usize,
  ) -> Result<(), VmError> {
    let address = unsafe { base.as_ptr().add(offset) } as *const c_void;

    let committed = unsafe { VirtualAlloc(address, len, MEM_COMMIT, PAGE_READWRITE) };
    if committed.is_null() {
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

    if unsafe { VirtualFree(base.as_ptr() as *mut c_void, len, MEM_DECOMMIT) } == 0 {
      warn!(len, error = %io::Error::last_os_error(), "VirtualFree(MEM_DECOMMIT) failed");
    }
  }

  unsafe fn release(
    &self,
    base: NonNull<u8>,
    size: usize,
  ) -> Result<(), VmError> {
    // MEM_RELEASE requires a size of zero and frees the whole reservation.
    if unsafe { VirtualFree(base.as_ptr() as *mut c_void, 0, MEM_RELEASE) } == 0 {
      return Err(VmError::Release {
        size,
        source: io::Error::last_os_error(),
      });
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reserve_commit_release() {
    let vm = WindowsVm::new();
    let page = vm.page_size();

    let base = vm.reserve(page * 4).unwrap();

    unsafe {
      vm.commit(base, page, page).unwrap();
      base.as_ptr().add(page).write(0xAB);
      assert_eq!(base.as_ptr().add(page).read(), 0xAB);
      vm.release(base, page * 4).unwrap();
    }
  }
}
