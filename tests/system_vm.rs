#![cfg(any(unix, windows))]

use vmarena::{ARENA_ALIGNMENT, Arena, ArenaConfig, ArenaError, Mark, VirtualMemory};

const MIB: usize = 1024 * 1024;

#[test]
fn large_reservation_commits_lazily() {
  let arena = Arena::new(1024 * MIB).unwrap();
  let page = arena.page_size();

  assert_eq!(arena.reserved(), 1024 * MIB);
  assert_eq!(arena.committed(), 0);

  let block = arena.allocate(100, true).unwrap();
  assert!(block.iter().all(|&b| b == 0));
  block.fill(7);

  assert_eq!(arena.committed(), page);
}

#[test]
fn documented_scenario_on_real_pages() {
  let mut arena = Arena::new(4096).unwrap();
  let base = arena.base_ptr() as usize;

  let p0 = arena.allocate(100, true).unwrap().as_ptr() as usize;
  assert_eq!(p0 - base, 0);

  let p1 = arena.allocate(50, false).unwrap().as_ptr() as usize;
  assert_eq!(p1, p0 + 112);

  arena.pop_to(Mark::default());
  assert_eq!(arena.used(), 0);

  let rest = arena.reserved() - ARENA_ALIGNMENT;
  arena.allocate(1, false).unwrap();
  assert!(matches!(
    arena.allocate(arena.reserved(), false),
    Err(ArenaError::OutOfCapacity { .. })
  ));
  arena.allocate(rest, false).unwrap();
}

#[test]
fn clear_returns_zeroed_pages() {
  let mut arena = Arena::new(4 * MIB).unwrap();

  arena.allocate(3 * MIB, false).unwrap().fill(0xAB);
  arena.clear();
  assert_eq!(arena.committed(), 0);

  let again = arena.allocate(3 * MIB, false).unwrap();
  assert!(again.iter().all(|&b| b == 0));
}

#[test]
fn fill_whole_reservation() {
  let config = ArenaConfig::new(MIB).with_commit_granularity(256 * 1024);
  let arena = Arena::with_config(config).unwrap();

  let mut blocks = 0;
  while let Ok(block) = arena.allocate(1000, false) {
    block[999] = 1;
    blocks += 1;
  }

  assert_eq!(blocks, MIB / 1008);
  assert_eq!(arena.committed(), arena.reserved());
  arena.destroy().unwrap();
}

#[test]
fn reset_region_on_real_pages() {
  let mut arena = Arena::new(2 * MIB).unwrap();
  let len = arena.page_size() * 2;
  arena.allocate(len, false).unwrap().fill(0xCC);

  let base = arena.base_ptr();
  arena.reset_region(base, arena.reserved()).unwrap();
  assert!(matches!(
    arena.reset_region(base, arena.reserved() + 1),
    Err(ArenaError::OutOfBounds { .. })
  ));

  let bytes = unsafe { std::slice::from_raw_parts(base, len) };
  assert!(bytes.iter().all(|&b| b == 0));
}

#[test]
fn typed_values_survive_until_rollback() {
  let mut arena = Arena::new(MIB).unwrap();

  let total: u64 = arena.scoped(|scratch| {
    let values = scratch.alloc_slice_fill_with(1000, |i| i as u64).unwrap();
    values.iter().sum()
  });

  assert_eq!(total, 999 * 1000 / 2);
  assert_eq!(arena.used(), 0);
}

#[test]
fn backend_page_size_is_sane() {
  let vm = vmarena::SystemVm::new();
  assert!(vm.page_size().is_power_of_two());
  assert!(vm.page_size() >= ARENA_ALIGNMENT);
}

#[cfg(target_os = "linux")]
fn committed_as_kb() -> i64 {
  let meminfo = std::fs::read_to_string("/proc/meminfo").unwrap();
  meminfo
    .lines()
    .find_map(|line| line.strip_prefix("Committed_AS:"))
    .and_then(|rest| rest.trim().trim_end_matches("kB").trim().parse().ok())
    .unwrap()
}

#[cfg(target_os = "linux")]
#[test]
fn commit_is_charged_to_the_overcommit_budget() {
  const ALLOC: usize = 64 * MIB;
  let mut arena = Arena::new(256 * MIB).unwrap();

  let before = committed_as_kb();
  arena.allocate(ALLOC, false).unwrap();
  let charged = committed_as_kb() - before;

  // Other tests in this binary run concurrently; leave room for their noise.
  assert!(charged >= (ALLOC / 2 / 1024) as i64, "Committed_AS grew by {charged} kB");

  let before = committed_as_kb();
  arena.clear();
  let returned = before - committed_as_kb();
  assert!(returned >= (ALLOC / 2 / 1024) as i64, "Committed_AS shrank by {returned} kB");
}
