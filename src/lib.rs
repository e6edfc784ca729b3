//! # vmarena - A Virtual Memory Backed Arena Allocator
//!
//! This crate provides a **region allocator** (also known as an arena) that
//! reserves one large range of address space up front and commits physical
//! pages only as the bump pointer reaches them.
//!
//! ## Overview
//!
//! ```text
//!   Arena Layout:
//!
//!   base                                                      base + reserved
//!   ▼                                                                       ▼
//!   ┌─────┬─────┬────┬─────┬─────────────────┬─────────────────────────────┐
//!   │ A1  │ pad │ A2 │ A3  │  committed, free │      reserved only          │
//!   └─────┴─────┴────┴─────┴─────────────────┴─────────────────────────────┘
//!                          ▲                  ▲
//!                          │                  │
//!                        used             committed
//!                    (bump pointer)     (page aligned)
//!
//!   Invariant: used <= committed <= reserved
//! ```
//!
//! Every allocation starts at a multiple of [`ARENA_ALIGNMENT`] (16 bytes)
//! from the base. Memory is given back in bulk: [`Arena::pop`] and
//! [`Arena::pop_to`] roll the bump pointer back like a stack,
//! [`Arena::clear`] rewinds to the base and decommits every page, and
//! [`Arena::destroy`] (or dropping the arena) releases the reservation.
//!
//! ## Crate Structure
//!
//! ```text
//!   vmarena
//!   ├── align      - Alignment arithmetic (align_up, align!)
//!   ├── arena      - Arena core: allocate / pop / clear / reset_region
//!   ├── config     - ArenaConfig
//!   ├── error      - ArenaError, VmError
//!   ├── mark       - Mark save points
//!   ├── typed      - alloc<T>, slice helpers
//!   └── vm         - VirtualMemory trait
//!       ├── posix     - mmap / mprotect / munmap
//!       ├── windows   - VirtualAlloc / VirtualFree
//!       └── simulated - heap-backed test double
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use vmarena::Arena;
//!
//! let mut arena = Arena::new(64 * 1024 * 1024)?;
//!
//! let nums = arena.alloc_zeroed_slice::<i32>(100)?;
//! for (i, n) in nums.iter_mut().enumerate() {
//!   *n = i as i32;
//! }
//! assert_eq!(nums[99], 99);
//!
//! let mark = arena.mark();
//! arena.allocate(4096, false)?;
//! arena.pop_to(mark);
//!
//! arena.clear();
//! arena.destroy()?;
//! # Ok::<(), vmarena::ArenaError>(())
//! ```
//!
//! ## Reserve vs. Commit
//!
//! ```text
//!   init(64 MiB)        allocate(100)         allocate(5000)        clear()
//!   ┌──────────────┐    ┌─┬────────────┐      ┌───┬──────────┐      ┌──────────────┐
//!   │..............│ ─► │█│............│  ─►  │███│..........│  ─►  │..............│
//!   └──────────────┘    └─┴────────────┘      └───┴──────────┘      └──────────────┘
//!   address space       1 page committed      3 pages committed     pages returned,
//!   only                                                            range kept
//! ```
//!
//! ## Memory Contents
//!
//! Blocks are not zeroed unless asked for. After [`Arena::pop`] or
//! [`Arena::pop_to`] the popped bytes stay as they were and a later
//! allocation without `zero` sees them. After [`Arena::clear`] every page is
//! decommitted, and recommitted pages read as zero.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Arena` is `Send` but not `Sync`
//! - **No individual frees**: memory comes back by rollback or in bulk
//! - **Fixed capacity**: the reservation never grows after creation
//! - **Fixed alignment**: types aligned above 16 bytes are rejected
//!
//! ## Safety
//!
//! The arena hands out `&mut` slices that borrow it. Rolling back, clearing
//! and destroying need `&mut self` or `self`, so the borrow checker rules
//! out use-after-clear and double destroy.

pub mod align;
mod arena;
pub mod config;
pub mod error;
mod mark;
mod typed;
pub mod vm;

pub use align::ARENA_ALIGNMENT;
pub use arena::{Arena, ArenaStats};
pub use config::ArenaConfig;
pub use error::{ArenaError, VmError};
pub use mark::Mark;
#[cfg(any(unix, windows))]
pub use vm::SystemVm;
pub use vm::{SimulatedVm, VirtualMemory};
