//! Arena construction parameters.

/// Configuration for an [`Arena`](crate::Arena).
///
/// Both sizes are rounded up to the backend page size when the arena is
/// created; all values are fixed for the arena's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
  /// Bytes of address space to reserve up front.
  ///
  /// Default: 64 MiB. A value of 0 reserves a single page.
  pub reserve_size: usize,

  /// Minimum number of bytes committed each time the arena grows.
  ///
  /// Default: 0, meaning one page. Larger values trade resident memory for fewer
  /// commit calls.
  pub commit_granularity: usize,
}

impl ArenaConfig {
  /// Default reservation: 64 MiB.
  pub const DEFAULT_RESERVE_SIZE: usize = 64 * 1024 * 1024;

  /// Config reserving `reserve_size` bytes, committing page by page.
  pub fn new(reserve_size: usize) -> Self {
    Self {
      reserve_size,
      commit_granularity: 0,
    }
  }

  /// Sets the minimum commit step.
  pub fn with_commit_granularity(
    mut self,
    bytes: usize,
  ) -> Self {
    self.commit_granularity = bytes;
    self
  }
}

impl Default for ArenaConfig {
  fn default() -> Self {
    Self::new(Self::DEFAULT_RESERVE_SIZE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_reservation_is_64mb() {
    let config = ArenaConfig::default();
    assert_eq!(config.reserve_size, 64 * 1024 * 1024);
    assert_eq!(config.commit_granularity, 0);
  }

  #[test]
  fn granularity_builder() {
    let config = ArenaConfig::new(1 << 20).with_commit_granularity(1 << 16);
    assert_eq!(config.reserve_size, 1 << 20);
    assert_eq!(config.commit_granularity, 1 << 16);
  }
}
