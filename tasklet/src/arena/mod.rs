//! Node storage for the executor.
//!
//! Every posted task lives in a node whose memory comes from an [`Arena`].
//! The executor never touches the global allocator directly: it asks its
//! arena for raw storage when a task is posted and hands that storage back
//! once the task has run (or been discarded).
//!
//! The default arena is [`BlockArena`], which carves nodes out of large
//! recycled blocks so that steady-state posting does not hit the system
//! allocator at all.

mod block;

pub use block::{ArenaStats, BlockArena};

use std::alloc::Layout;
use std::ptr::NonNull;

/// Default size in bytes of a [`BlockArena`] block.
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

/// Default number of empty blocks a [`BlockArena`] keeps for reuse.
pub const DEFAULT_RETAINED_BLOCKS: usize = 1;

/// Smallest block size accepted by [`BlockArena`].
pub const MIN_BLOCK_SIZE: usize = 256;

/// A raw storage provider for executor nodes.
///
/// An arena hands out uninitialized memory for a given [`Layout`] and takes it
/// back later with the same layout. It does not need to be thread-safe: the
/// executor only calls it while holding its own lock.
///
/// # Safety
///
/// Implementors must guarantee that:
/// - [`allocate`](Self::allocate) returns a pointer valid for reads and writes
///   of `layout.size()` bytes and aligned to `layout.align()`,
/// - the storage stays valid and is not handed out again until it is passed
///   back to [`deallocate`](Self::deallocate),
/// - allocation failure never returns. The usual way to fail is
///   [`std::alloc::handle_alloc_error`].
pub unsafe trait Arena {
    /// Allocates uninitialized storage for `layout`.
    fn allocate(&mut self, layout: Layout) -> NonNull<u8>;

    /// Returns storage obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same arena with
    /// exactly this `layout`, and must not be used afterwards.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout);
}
