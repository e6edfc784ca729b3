//! Typed allocation on top of the byte-level bump allocator.
//!
//! Values placed in the arena are never dropped; their storage is reclaimed
//! wholesale by `pop`, `clear` or `destroy`.

use std::{mem, ptr, slice};

use bytemuck::Zeroable;

use crate::{ARENA_ALIGNMENT, Arena, error::ArenaError, vm::VirtualMemory};

impl<B: VirtualMemory> Arena<B> {
  /// Reserves uninitialized room for `count` values of `T`.
  fn allocate_array<T>(
    &self,
    count: usize,
    zero: bool,
  ) -> Result<*mut T, ArenaError> {
    let align = mem::align_of::<T>();
    if align > ARENA_ALIGNMENT {
      return Err(ArenaError::UnsupportedAlignment { align });
    }

    let elem_size = mem::size_of::<T>();
    let bytes = elem_size
      .checked_mul(count)
      .ok_or(ArenaError::SizeOverflow { count, elem_size })?;

    Ok(self.allocate(bytes, zero)?.as_mut_ptr().cast::<T>())
  }

  /// Moves `value` into the arena.
  #[allow(clippy::mut_from_ref)]
  pub fn alloc<T>(
    &self,
    value: T,
  ) -> Result<&mut T, ArenaError> {
    let slot = self.allocate_array::<T>(1, false)?;

    unsafe {
      slot.write(value);
      Ok(&mut *slot)
    }
  }

  /// Copies `src` into the arena.
  #[allow(clippy::mut_from_ref)]
  pub fn alloc_slice_copy<T: Copy>(
    &self,
    src: &[T],
  ) -> Result<&mut [T], ArenaError> {
    let dst = self.allocate_array::<T>(src.len(), false)?;

    unsafe {
      ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len());
      Ok(slice::from_raw_parts_mut(dst, src.len()))
    }
  }

  /// Builds `len` values with `f(index)`.
  #[allow(clippy::mut_from_ref)]
  pub fn alloc_slice_fill_with<T, F>(
    &self,
    len: usize,
    mut f: F,
  ) -> Result<&mut [T], ArenaError>
  where
    F: FnMut(usize) -> T,
  {
    let dst = self.allocate_array::<T>(len, false)?;

    unsafe {
      for i in 0..len {
        dst.add(i).write(f(i));
      }
      Ok(slice::from_raw_parts_mut(dst, len))
    }
  }

  /// `len` zeroed values of `T`.
  #[allow(clippy::mut_from_ref)]
  pub fn alloc_zeroed_slice<T: Zeroable>(
    &self,
    len: usize,
  ) -> Result<&mut [T], ArenaError> {
    let dst = self.allocate_array::<T>(len, true)?;

    unsafe { Ok(slice::from_raw_parts_mut(dst, len)) }
  }
}
