//! Virtual memory backends.
//!
//! The arena core talks to the operating system only through
//! [`VirtualMemory`]. Two system implementations exist, selected at build
//! time as [`SystemVm`], plus [`SimulatedVm`] which stands in for the OS in
//! tests and on targets without virtual memory.
//!
//! ```text
//!   reserve        commit             decommit          release
//!   ┌────────┐     ┌──┬─────┐         ┌────────┐
//!   │ ...... │ ──► │██│.....│  ──►    │ ...... │  ──►   (unmapped)
//!   └────────┘     └──┴─────┘         └────────┘
//!   address only   read/write prefix  backing dropped
//! ```

use std::ptr::NonNull;

use crate::error::VmError;

#[cfg(unix)]
pub mod posix;
pub mod simulated;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use posix::PosixVm;
pub use simulated::SimulatedVm;
#[cfg(windows)]
pub use windows::WindowsVm;

/// The backend for the platform being built.
#[cfg(unix)]
pub type SystemVm = PosixVm;

/// The backend for the platform being built.
#[cfg(windows)]
pub type SystemVm = WindowsVm;

/// Reserve/commit/decommit/release primitives over one address range.
///
/// Implementations never align or track offsets; they only round-trip what
/// the arena asks for. Every range the arena passes is page aligned.
pub trait VirtualMemory {
  /// Commit granularity in bytes. Must be a power of two no smaller than
  /// [`ARENA_ALIGNMENT`](crate::ARENA_ALIGNMENT); reservations are aligned
  /// to it.
  fn page_size(&self) -> usize;

  /// Claims `size` bytes of address space without physical backing.
  fn reserve(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>, VmError>;

  /// Makes `[base + offset, base + offset + len)` readable and writable.
  ///
  /// # Safety
  ///
  /// `base` must come from [`reserve`](Self::reserve) on this backend, and
  /// the range must lie within that reservation.
  unsafe fn commit(
    &self,
    base: NonNull<u8>,
    offset: usize,
    len: usize,
  ) -> Result<(), VmError>;

  /// Drops physical backing for `[base, base + len)`, keeping it reserved.
  ///
  /// Best effort. A later commit of the same pages yields zeroed memory.
  ///
  /// # Safety
  ///
  /// Same as [`commit`](Self::commit); nothing may reference the range.
  unsafe fn decommit(
    &self,
    base: NonNull<u8>,
    len: usize,
  );

  /// Unmaps the entire reservation.
  ///
  /// # Safety
  ///
  /// `base` and `size` must describe one live reservation from this
  /// backend, which must not be used afterwards.
  unsafe fn release(
    &self,
    base: NonNull<u8>,
    size: usize,
  ) -> Result<(), VmError>;
}

impl<V: VirtualMemory + ?Sized> VirtualMemory for &V {
  fn page_size(&self) -> usize {
    (**self).page_size()
  }

  fn reserve(
    &self,
    size: usize,
  ) -> Result<NonNull<u8>, VmError> {
    (**self).reserve(size)
  }

  unsafe fn commit(
    &self,
    base: NonNull<u8>,
    offset: usize,
    len: usize,
  ) -> Result<(), VmError> {
    unsafe { (**self).commit(base, offset, len) }
  }

  unsafe fn decommit(
    &self,
    base: NonNull<u8>,
    len: usize,
  ) {
    unsafe { (**self).decommit(base, len) }
  }

  unsafe fn release(
    &self,
    base: NonNull<u8>,
    size: usize,
  ) -> Result<(), VmError> {
    unsafe { (**self).release(base, size) }
  }
}
