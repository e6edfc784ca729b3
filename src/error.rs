//! Error types for the arena and its virtual memory backends.

use std::io;

use thiserror::Error;

use crate::align::ARENA_ALIGNMENT;

/// A virtual memory primitive the operating system refused to honor.
///
/// Any of these leaves the affected arena unusable.
#[derive(Error, Debug)]
pub enum VmError {
  /// Address space could not be reserved.
  #[error("failed to reserve {size} bytes of address space: {source}")]
  Reserve {
    /// Bytes requested.
    size: usize,
    /// Underlying OS error.
    #[source]
    source: io::Error,
  },

  /// Reserved pages could not be made accessible.
  #[error("failed to commit {len} bytes at offset {offset}: {source}")]
  Commit {
    /// Offset of the range from the reservation base.
    offset: usize,
    /// Length of the range.
    len: usize,
    /// Underlying OS error.
    #[source]
    source: io::Error,
  },

  /// The reservation could not be unmapped.
  #[error("failed to release {size} bytes of address space: {source}")]
  Release {
    /// Size of the reservation.
    size: usize,
    /// Underlying OS error.
    #[source]
    source: io::Error,
  },
}

/// Errors returned by [`Arena`](crate::Arena) operations.
#[derive(Error, Debug)]
pub enum ArenaError {
  /// The allocation does not fit in what is left of the reservation.
  #[error("arena capacity exhausted: requested {requested} bytes, {remaining} remaining")]
  OutOfCapacity {
    /// Bytes requested by the caller, excluding alignment padding.
    requested: usize,
    /// Bytes between the bump position and the end of the reservation.
    remaining: usize,
  },

  /// A region handed to `reset_region` is not inside the reservation.
  #[error("region {start:#x}+{len} lies outside the arena reservation")]
  OutOfBounds {
    /// Start address (or offset, for `reset_range`) of the region.
    start: usize,
    /// Length of the region.
    len: usize,
  },

  /// `count * size_of::<T>()` does not fit in a `usize`.
  #[error("array of {count} elements of {elem_size} bytes overflows usize")]
  SizeOverflow {
    /// Element count.
    count: usize,
    /// Size of one element.
    elem_size: usize,
  },

  /// The type needs stronger alignment than the arena guarantees.
  #[error("type alignment {align} exceeds arena alignment {}", ARENA_ALIGNMENT)]
  UnsupportedAlignment {
    /// Alignment of the type.
    align: usize,
  },

  /// The requested reservation cannot be rounded to the page size.
  #[error("cannot reserve {requested} bytes")]
  InvalidReservation {
    /// Bytes requested.
    requested: usize,
  },

  /// A previous commit failed; the arena no longer hands out memory.
  #[error("arena is poisoned by an earlier commit failure")]
  Poisoned,

  /// The backend failed.
  #[error(transparent)]
  Vm(#[from] VmError),
}
