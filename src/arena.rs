use std::{cell::Cell, fmt, ptr, ptr::NonNull, slice};

use tracing::{debug, error, trace, warn};

use crate::{
  align,
  align::{ARENA_ALIGNMENT, align_up, is_aligned},
  config::ArenaConfig,
  error::ArenaError,
  mark::Mark,
  vm::VirtualMemory,
};
#[cfg(any(unix, windows))]
use crate::vm::SystemVm;

/// Snapshot of an arena's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
  /// Bump position.
  pub used: usize,
  /// Bytes from the base backed by accessible memory.
  pub committed: usize,
  /// Bytes of address space reserved.
  pub reserved: usize,
  /// Backend commit granularity.
  pub page_size: usize,
  /// Largest bump position ever reached.
  pub high_water: usize,
}

/// A growable bump arena over one reserved address range.
///
/// Pages are committed lazily as the bump position advances. Allocation
/// takes `&self` and hands out slices borrowing the arena; every operation
/// that moves the bump position backwards takes `&mut self`, so no slice
/// can outlive the memory it points to.
///
/// Invariant: `used <= committed <= reserved`, with `committed` and
/// `reserved` multiples of the page size.
pub struct Arena<B: VirtualMemory> {
  backend: B,
  base: NonNull<u8>,
  reserved: usize,
  committed: Cell<usize>,
  used: Cell<usize>,
  high_water: Cell<usize>,
  page_size: usize,
  commit_step: usize,
  poisoned: Cell<bool>,
}

// The arena exclusively owns its reservation.
unsafe impl<B: VirtualMemory + Send> Send for Arena<B> {}

#[cfg(any(unix, windows))]
impl Arena<SystemVm> {
  /// Reserves `reserve_size` bytes (rounded up to the page size) from the
  /// operating system.
  pub fn new(reserve_size: usize) -> Result<Self, ArenaError> {
    Self::with_config(ArenaConfig::new(reserve_size))
  }

  /// Reserves address space from the operating system as `config` says.
  pub fn with_config(config: ArenaConfig) -> Result<Self, ArenaError> {
    Self::with_backend(SystemVm::new(), config)
  }
}

impl<B: VirtualMemory> Arena<B> {
  /// Creates an arena on top of `backend`.
  ///
  /// Reserves address space but commits nothing.
  pub fn with_backend(
    backend: B,
    config: ArenaConfig,
  ) -> Result<Self, ArenaError> {
    let page_size = backend.page_size();
    let reserved = align_up(config.reserve_size.max(1), page_size).ok_or(
      ArenaError::InvalidReservation {
        requested: config.reserve_size,
      },
    )?;
    let commit_step = align_up(config.commit_granularity.max(1), page_size)
      .unwrap_or(reserved)
      .min(reserved);

    let base = backend.reserve(reserved).map_err(|e| {
      error!(size_bytes = reserved, error = %e, "failed to reserve arena address space");
      e
    })?;

    debug!(
      address = ?base,
      size_bytes = reserved,
      page_size,
      commit_step,
      "reserved arena address space"
    );

    Ok(Self {
      backend,
      base,
      reserved,
      committed: Cell::new(0),
      used: Cell::new(0),
      high_water: Cell::new(0),
      page_size,
      commit_step,
      poisoned: Cell::new(false),
    })
  }

  /// Bump-allocates `size` bytes aligned to
  /// [`ARENA_ALIGNMENT`](crate::ARENA_ALIGNMENT).
  ///
  /// With `zero`, the alignment padding and the block are zeroed; otherwise
  /// the contents are whatever the range last held (see [`pop`](Self::pop)).
  ///
  /// Fails with [`ArenaError::OutOfCapacity`] without touching any state if
  /// the block would pass the end of the reservation. If the backend cannot
  /// commit the pages the arena is poisoned and every further allocation
  /// fails with [`ArenaError::Poisoned`].
  #[allow(clippy::mut_from_ref)]
  pub fn allocate(
    &self,
    size: usize,
    zero: bool,
  ) -> Result<&mut [u8], ArenaError> {
    if self.poisoned.get() {
      return Err(ArenaError::Poisoned);
    }

    let used = self.used.get();
    let exhausted = || ArenaError::OutOfCapacity {
      requested: size,
      remaining: self.reserved - used,
    };

    let start = align!(used).ok_or_else(exhausted)?;
    let end = start.checked_add(size).ok_or_else(exhausted)?;

    if end > self.reserved {
      debug!(
        requested = size,
        used,
        reserved = self.reserved,
        "arena capacity exhausted"
      );
      return Err(exhausted());
    }

    debug_assert!(is_aligned(start, ARENA_ALIGNMENT));

    if end > self.committed.get() {
      self.grow(end)?;
    }

    unsafe {
      if zero {
        ptr::write_bytes(self.base.as_ptr().add(used), 0, end - used);
      }

      self.used.set(end);
      self.high_water.set(self.high_water.get().max(end));

      // [start, end) is committed and lies past every live allocation.
      Ok(slice::from_raw_parts_mut(self.base.as_ptr().add(start), size))
    }
  }

  /// Commits enough pages to cover `end`.
  fn grow(
    &self,
    end: usize,
  ) -> Result<(), ArenaError> {
    let committed = self.committed.get();

    // `reserved` is a page multiple, so rounding `end` never passes it.
    let target = align_up(end, self.page_size)
      .unwrap_or(self.reserved)
      .max(committed.saturating_add(self.commit_step))
      .min(self.reserved);
    let len = target - committed;

    trace!(offset = committed, len, "committing arena pages");

    if let Err(e) = unsafe { self.backend.commit(self.base, committed, len) } {
      self.poisoned.set(true);
      error!(offset = committed, len, error = %e, "commit failed, arena poisoned");
      return Err(e.into());
    }

    self.committed.set(target);
    Ok(())
  }

  /// Moves the bump position back by `size` bytes, stopping at the origin.
  ///
  /// Nothing is zeroed or decommitted: a later allocation without `zero`
  /// observes the popped bytes as they were left.
  pub fn pop(
    &mut self,
    size: usize,
  ) {
    self.used.set(self.used.get().saturating_sub(size));
  }

  /// The current bump position, for a later [`pop_to`](Self::pop_to).
  pub fn mark(&self) -> Mark {
    Mark::new(self.used.get())
  }

  /// Rolls back to `mark` if it lies below the bump position; otherwise
  /// does nothing.
  pub fn pop_to(
    &mut self,
    mark: Mark,
  ) {
    if mark.offset() < self.used.get() {
      self.used.set(mark.offset());
    }
  }

  /// Runs `f` and then rolls back everything it allocated.
  ///
  /// ```rust
  /// use vmarena::Arena;
  ///
  /// let mut arena = Arena::new(1 << 16).unwrap();
  /// let sum: u32 = arena.scoped(|scratch| {
  ///   let values = scratch.alloc_slice_copy(&[1u32, 2, 3]).unwrap();
  ///   values.iter().sum()
  /// });
  /// assert_eq!(sum, 6);
  /// assert_eq!(arena.used(), 0);
  /// ```
  pub fn scoped<R>(
    &mut self,
    f: impl FnOnce(&Self) -> R,
  ) -> R {
    let mark = self.mark();
    let result = f(self);
    self.pop_to(mark);
    result
  }

  /// Frees everything and returns committed pages to the operating system.
  ///
  /// The reservation is kept; the next allocation starts over at the base
  /// and commits again on demand. Decommitted pages read as zero once
  /// committed again.
  pub fn clear(&mut self) {
    let committed = self.committed.get();

    if committed > 0 {
      trace!(len = committed, "decommitting arena pages");
      unsafe {
        self.backend.decommit(self.base, committed);
      }
    }

    self.committed.set(0);
    self.used.set(0);
  }

  /// Releases the reservation back to the operating system.
  ///
  /// Dropping an arena does the same but can only log a failure.
  pub fn destroy(mut self) -> Result<(), ArenaError> {
    self.release()
  }

  fn release(&mut self) -> Result<(), ArenaError> {
    if self.reserved == 0 {
      return Ok(());
    }

    let (base, size) = (self.base, self.reserved);

    self.base = NonNull::dangling();
    self.reserved = 0;
    self.committed.set(0);
    self.used.set(0);

    unsafe { self.backend.release(base, size)? };

    debug!(address = ?base, size_bytes = size, "released arena address space");
    Ok(())
  }

  /// Zeroes `[start, start + len)`, which must lie inside the reservation.
  ///
  /// Regions reaching past the end of the reservation, or starting before
  /// its base, are rejected with [`ArenaError::OutOfBounds`] and nothing is
  /// written.
  pub fn reset_region(
    &mut self,
    start: *const u8,
    len: usize,
  ) -> Result<(), ArenaError> {
    let address = start as usize;

    let offset = address
      .checked_sub(self.base.as_ptr() as usize)
      .ok_or(ArenaError::OutOfBounds {
        start: address,
        len,
      });

    match offset.and_then(|offset| self.reset_range(offset, len)) {
      Err(ArenaError::OutOfBounds { .. }) => Err(ArenaError::OutOfBounds {
        start: address,
        len,
      }),
      result => result,
    }
  }

  /// Offset form of [`reset_region`](Self::reset_region).
  pub fn reset_range(
    &mut self,
    offset: usize,
    len: usize,
  ) -> Result<(), ArenaError> {
    let end = match offset.checked_add(len) {
      Some(end) if end <= self.reserved => end,
      _ => {
        warn!(offset, len, reserved = self.reserved, "region is out of arena bounds");
        return Err(ArenaError::OutOfBounds { start: offset, len });
      }
    };

    // Uncommitted pages are inaccessible and come back zeroed anyway.
    let committed_end = end.min(self.committed.get());
    if offset < committed_end {
      unsafe {
        ptr::write_bytes(self.base.as_ptr().add(offset), 0, committed_end - offset);
      }
    }

    debug!(offset, len, "arena region reset");
    Ok(())
  }

  /// Bump position in bytes from the base.
  pub fn used(&self) -> usize {
    self.used.get()
  }

  /// Bytes from the base currently backed by memory.
  pub fn committed(&self) -> usize {
    self.committed.get()
  }

  /// Bytes of address space reserved.
  pub fn reserved(&self) -> usize {
    self.reserved
  }

  /// Bytes between the bump position and the end of the reservation.
  pub fn remaining(&self) -> usize {
    self.reserved - self.used.get()
  }

  /// Commit granularity reported by the backend.
  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// Start of the reservation. Allocation offsets are relative to it.
  pub fn base_ptr(&self) -> *const u8 {
    self.base.as_ptr()
  }

  /// Whether a failed commit has disabled allocation.
  pub fn is_poisoned(&self) -> bool {
    self.poisoned.get()
  }

  /// The virtual memory backend this arena draws from.
  pub fn backend(&self) -> &B {
    &self.backend
  }

  /// Snapshot of the bump position, commit and reservation sizes.
  pub fn stats(&self) -> ArenaStats {
    ArenaStats {
      used: self.used.get(),
      committed: self.committed.get(),
      reserved: self.reserved,
      page_size: self.page_size,
      high_water: self.high_water.get(),
    }
  }
}

impl<B: VirtualMemory> Drop for Arena<B> {
  fn drop(&mut self) {
    if let Err(e) = self.release() {
      error!(error = %e, "failed to release arena address space");
    }
  }
}

impl<B: VirtualMemory> fmt::Debug for Arena<B> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Arena")
      .field("base", &self.base)
      .field("stats", &self.stats())
      .field("poisoned", &self.poisoned.get())
      .finish()
  }
}
