//! Heap-backed stand-in for the operating system.
//!
//! `SimulatedVm` reserves zeroed, page-aligned memory from the global
//! allocator and only *accounts* for commits: every byte is accessible from
//! the moment it is reserved. It counts calls, can be told to fail once a
//! byte budget is exceeded, and zero-fills on decommit so that recommitted
//! pages look fresh, as they do on a real system.

use std::{
  alloc::{self, Layout},
  cell::Cell,
  io,
  ptr::{self, NonNull},
};

use super::VirtualMemory;
use crate::{align::ARENA_ALIGNMENT, error::VmError};

/// Simulated virtual memory with commit accounting and failure injection.
#[derive(Debug)]
pub struct SimulatedVm {
  page_size: usize,
  reserve_limit: Option<usize>,
  commit_limit: Option<usize>,
  fail_release: bool,

  reserved: Cell<usize>,
  committed: Cell<usize>,
  commit_calls: Cell<usize>,
  decommit_calls: Cell<usize>,
  release_calls: Cell<usize>,
}

impl SimulatedVm {
  /// Default simulated page size.
  pub const DEFAULT_PAGE_SIZE: usize = 4096;

  /// A backend with `page_size` pages and no limits.
  ///
  /// # Panics
  ///
  /// If `page_size` is not a power of two of at least [`ARENA_ALIGNMENT`].
  pub fn new(page_size: usize) -> Self {
    assert!(page_size.is_power_of_two(), "page size {page_size} is not a power of two");
    assert!(page_size >= ARENA_ALIGNMENT, "page size {page_size} is below the arena alignment");
    Self {
      page_size,
      reserve_limit: None,
      commit_limit: None,
      fail_release: false,
      reserved: Cell::new(0),
      committed: Cell::new(0),
      commit_calls: Cell::new(0),
      decommit_calls: Cell::new(0),
      release_calls: Cell::new(0),
    }
  }

  /// Fails any reservation larger than `bytes`.
  pub fn with_reserve_limit(
    mut self,
    bytes: usize,
  ) -> Self {
    self.reserve_limit = Some(bytes);
    self
  }

  /// Fails any commit that would take total committed bytes past `bytes`.
  pub fn with_commit_limit(
    mut self,
    bytes: usize,
  ) -> Self {
    self.commit_limit = Some(bytes);
    self
  }

  /// Fails every release. The reservation is leaked.
  pub fn with_release_failure(mut self) -> Self {
    self.fail_release = true;
    self
  }

  /// Bytes currently reserved and not yet released.
  pub fn reserved_bytes(&self) -> usize {
    self.reserved.get()
  }

  /// Bytes currently committed.
  pub fn committed_bytes(&self) -> usize {
    self.committed.get()
  }

  /// Number of successful commit calls.
  pub fn commit_calls(&self) -> usize {
    self.commit_calls.get()
  }

  /// Number of decommit calls.
  pub fn decommit_calls(&self) -> usize {
    self.decommit_calls.get()
  }

  /// Number of release calls, failed ones included.
  pub fn release_calls(&self) -> usize {
    self.release_calls.get()
  }

  fn layout(
    &self,
    size: usize,
  ) -> io::Result<Layout> {
    Layout::from_size_align(size.max(1), self.page_size)
      .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
  }
}

impl Default for SimulatedVm {
  fn default() -> Self {
    Self::new(Self::DEFAULT_PAGE_SIZE)
  }
}

impl VirtualMemory for SimulatedVm {
  fn page_size(&self) -> usize {
    self.page_size
  }

  fn reserve(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>, VmError> {
    if self.reserve_limit.is_some_and(|limit| size > limit) {
      return Err(VmError::Reserve {
        size,
        source: io::Error::new(io::ErrorKind::OutOfMemory, "simulated reserve limit exceeded"),
      });
    }

    let layout = self.layout(size).map_err(|source| VmError::Reserve { size, source })?;
    let address = unsafe { alloc::alloc_zeroed(layout) };

    let base = NonNull::new(address).ok_or_else(|| VmError::Reserve {
      size,
      source: io::Error::new(io::ErrorKind::OutOfMemory, "global allocator refused reservation"),
    })?;

    self.reserved.set(self.reserved.get() + size);
    Ok(base)
  }

  unsafe fn commit(
    &self,
    _base: NonNull<u8>,
    offset: usize,
    len: usize,
  ) -> Result<(), VmError> {
    let total = self.committed.get().saturating_add(len);

    if self.commit_limit.is_some_and(|limit| total > limit) {
      return Err(VmError::Commit {
        offset,
        len,
        source: io::Error::new(io::ErrorKind::OutOfMemory, "simulated commit limit exceeded"),
      });
    }

    self.committed.set(total);
    self.commit_calls.set(self.commit_calls.get() + 1);
    Ok(())
  }

  unsafe fn decommit(
    &self,
    base: NonNull<u8>,
    len: usize,
  ) {
    unsafe {
      ptr::write_bytes(base.as_ptr(), 0, len);
    }
    self.committed.set(self.committed.get().saturating_sub(len));
    self.decommit_calls.set(self.decommit_calls.get() + 1);
  }

  unsafe fn release(
    &self,
    base: NonNull<u8>,
    size: usize,
  ) -> Result<(), VmError> {
    self.release_calls.set(self.release_calls.get() + 1);

    if self.fail_release {
      return Err(VmError::Release {
        size,
        source: io::Error::other("simulated release failure"),
      });
    }

    let layout = self.layout(size).map_err(|source| VmError::Release { size, source })?;

    unsafe {
      alloc::dealloc(base.as_ptr(), layout);
    }

    self.reserved.set(self.reserved.get().saturating_sub(size));
    self.committed.set(0);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reservations_are_page_aligned_and_zeroed() {
    let vm = SimulatedVm::new(4096);
    let base = vm.reserve(8192).unwrap();

    assert_eq!(base.as_ptr() as usize % 4096, 0);
    assert_eq!(vm.reserved_bytes(), 8192);

    unsafe {
      let bytes = std::slice::from_raw_parts(base.as_ptr(), 8192);
      assert!(bytes.iter().all(|&b| b == 0));
      vm.release(base, 8192).unwrap();
    }

    assert_eq!(vm.reserved_bytes(), 0);
  }

  #[test]
  fn commit_limit_is_enforced() {
    let vm = SimulatedVm::new(4096).with_commit_limit(4096);
    let base = vm.reserve(16384).unwrap();

    unsafe {
      vm.commit(base, 0, 4096).unwrap();
      let err = vm.commit(base, 4096, 4096).unwrap_err();
      assert!(matches!(err, VmError::Commit { offset: 4096, len: 4096, .. }));
      vm.release(base, 16384).unwrap();
    }

    assert_eq!(vm.commit_calls(), 1);
  }

  #[test]
  fn reserve_limit_is_enforced() {
    let vm = SimulatedVm::new(4096).with_reserve_limit(4096);
    assert!(matches!(vm.reserve(8192), Err(VmError::Reserve { size: 8192, .. })));
    assert_eq!(vm.reserved_bytes(), 0);
  }

  #[test]
  fn decommit_zero_fills() {
    let vm = SimulatedVm::default();
    let base = vm.reserve(4096).unwrap();

    unsafe {
      vm.commit(base, 0, 4096).unwrap();
      ptr::write_bytes(base.as_ptr(), 0xFF, 4096);
      vm.decommit(base, 4096);

      assert_eq!(vm.committed_bytes(), 0);
      assert_eq!(base.as_ptr().add(4095).read(), 0);
      vm.release(base, 4096).unwrap();
    }
  }

  #[test]
  fn release_failure_is_reported() {
    let vm = SimulatedVm::default().with_release_failure();
    let base = vm.reserve(4096).unwrap();

    let err = unsafe { vm.release(base, 4096) }.unwrap_err();
    assert!(matches!(err, VmError::Release { size: 4096, .. }));
    assert_eq!(vm.release_calls(), 1);
    assert_eq!(vm.reserved_bytes(), 4096);
  }

  #[test]
  #[should_panic(expected = "not a power of two")]
  fn rejects_odd_page_size() {
    SimulatedVm::new(3000);
  }
}
