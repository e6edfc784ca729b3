/// A save point: the bump position of an arena at the time it was taken.
///
/// Obtained from [`Arena::mark`](crate::Arena::mark) and handed back to
/// [`Arena::pop_to`](crate::Arena::pop_to) to roll back every allocation
/// made since. `Mark::default()` is the arena origin.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mark(usize);

impl Mark {
  pub(crate) fn new(offset: usize) -> Self {
    Self(offset)
  }

  /// Byte offset from the arena base.
  pub fn offset(self) -> usize {
    self.0
  }
}
