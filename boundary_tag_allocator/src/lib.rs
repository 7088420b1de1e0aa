//! A boundary-tag allocator over one caller-supplied byte region.
//!
//! ```text
//!   ┌──────────┬───────────────┬────────┬──────────┬─────────┬────────┐
//!   │ begin    │ payload       │ end    │ begin    │ payload │ end    │ ...
//!   │ size,    │               │ size,  │ size,    │         │ size,  │
//!   │ state,   │               │ state  │ state,   │         │ state  │
//!   │ next,prev│               │        │ next,prev│         │        │
//!   └──────────┴───────────────┴────────┴──────────┴─────────┴────────┘
//! ```
//!
//! Blocks tile the region back to back. The end tag of one block sits right
//! before the begin tag of the next, so a released block finds both neighbours
//! in constant time and merges with any that are free. Free blocks are also
//! linked through their begin tags into a list that allocation scans from the
//! most recently released block onwards.
//!
//! ```
//! use boundary_tag_allocator::{Allocator, Arena};
//!
//! let mut buffer = [0u8; 512];
//! let mut arena = Arena::new(&mut buffer).unwrap();
//!
//! let p = arena.allocate(64).unwrap();
//! assert!(p.len() >= 64);
//! unsafe { arena.release(p.cast()) };
//! assert_eq!(arena.stats().free_blocks, 1);
//! ```
#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::as_conversions)]

use core::ptr::NonNull;

mod arena;
mod error;
pub mod inspect;
mod tag;

pub use arena::Arena;
pub use error::ArenaError;
pub use inspect::{Block, Stats};
pub use tag::{BlockState, BEGIN_TAG, END_TAG, TAG_OVERHEAD};

/// An allocator handing out byte ranges of a fixed region.
///
/// # Safety
///
/// Implementations must only return ranges that lie inside their region and
/// do not overlap any other range returned and not yet released.
pub unsafe trait Allocator {
    /// Returns at least `size` bytes, or `None` if `size` is zero or no free
    /// block can take the request.
    fn allocate(&mut self, size: usize) -> Option<NonNull<[u8]>>;

    /// Hands a block back.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Allocator::allocate) on
    /// this same allocator. Releasing it a second time right after the first
    /// release does nothing; any other reuse is undefined behaviour.
    unsafe fn release(&mut self, ptr: NonNull<u8>);
}
