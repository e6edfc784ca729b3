/// Alignment, in bytes, of every allocation start relative to the arena base.
pub const ARENA_ALIGNMENT: usize = 16;

/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. Returns `None` if the rounded value does
/// not fit in a `usize`.
#[inline]
pub fn align_up(
  value: usize,
  align: usize,
) -> Option<usize> {
  debug_assert!(align.is_power_of_two());
  let mask = align - 1;
  value.checked_add(mask).map(|v| v & !mask)
}

/// Whether `value` is a multiple of `align`.
#[inline]
pub fn is_aligned(
  value: usize,
  align: usize,
) -> bool {
  debug_assert!(align.is_power_of_two());
  value & (align - 1) == 0
}

/// Rounds an offset up to [`ARENA_ALIGNMENT`], yielding `Option<usize>`.
///
/// # Examples
///
/// ```rust
/// use vmarena::align;
///
/// assert_eq!(align!(0), Some(0));
/// assert_eq!(align!(13), Some(16));
/// assert_eq!(align!(100), Some(112));
/// assert_eq!(align!(usize::MAX), None);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align::align_up($value, $crate::align::ARENA_ALIGNMENT)
  };
}
