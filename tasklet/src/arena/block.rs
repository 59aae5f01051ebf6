use super::{Arena, DEFAULT_BLOCK_SIZE, DEFAULT_RETAINED_BLOCKS, MIN_BLOCK_SIZE};

use std::alloc::{self, Layout};
use std::fmt;
use std::mem;
use std::ptr::NonNull;

/// Alignment of every block, and the largest alignment served from a block.
const BLOCK_ALIGN: usize = 64;

/// Offset of the first allocation slot inside a block.
const HEADER: usize = mem::size_of::<BlockHeader>();

/// Size of the back-pointer stored right before every block allocation.
const LINK: usize = mem::size_of::<NonNull<BlockHeader>>();

/// Bookkeeping stored at the start of every block.
#[repr(C)]
struct BlockHeader {
    /// Number of allocations from this block not yet returned.
    live: usize,
}

/// A snapshot of a [`BlockArena`]'s occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Allocations handed out and not yet returned.
    pub live_allocations: usize,
    /// Blocks currently holding allocations, plus the block being filled.
    pub blocks_in_use: usize,
    /// Empty blocks retained for reuse.
    pub spare_blocks: usize,
    /// Live allocations too large or too aligned for a block.
    pub dedicated_allocations: usize,
}

/// A block-recycling bump arena.
///
/// Storage is carved sequentially from fixed-size blocks. Each allocation is
/// preceded by a pointer back to its block, and each block counts how many of
/// its allocations are still live:
///
/// - when the block currently being filled empties, its cursor rewinds,
/// - when a retired block empties, it is kept as a spare (up to
///   `retained_blocks`) or given back to the system allocator.
///
/// Requests that could never fit in a block go straight to the system
/// allocator. Whether a layout is served from a block depends only on the
/// layout, so [`deallocate`](Arena::deallocate) routes it the same way.
///
/// # Examples
///
/// ```rust
/// use std::alloc::Layout;
/// use tasklet::arena::{Arena, BlockArena};
///
/// let mut arena = BlockArena::new(4096, 1);
/// let layout = Layout::new::<u64>();
///
/// let ptr = arena.allocate(layout);
/// assert_eq!(arena.stats().live_allocations, 1);
///
/// unsafe { arena.deallocate(ptr, layout) };
/// assert_eq!(arena.stats().live_allocations, 0);
/// ```
pub struct BlockArena {
    /// Layout used for every block.
    block_layout: Layout,
    /// Maximum number of empty blocks kept in `spare`.
    retained_blocks: usize,
    /// Block new allocations are carved from.
    current: Option<NonNull<BlockHeader>>,
    /// Next free byte offset inside `current`.
    cursor: usize,
    /// Empty blocks ready for reuse.
    spare: Vec<NonNull<BlockHeader>>,
    /// Retired blocks that still hold live allocations.
    retired: usize,
    /// Live allocations, block-backed and dedicated.
    live: usize,
    /// Live dedicated allocations.
    dedicated: usize,
}

// Safety: the arena exclusively owns every block it references. Nothing in it
// is tied to the thread that created it.
unsafe impl Send for BlockArena {}

impl BlockArena {
    /// Creates an empty arena.
    ///
    /// No memory is reserved until the first allocation.
    ///
    /// # Arguments
    ///
    /// * `block_size` - Size in bytes of each block
    /// * `retained_blocks` - Number of empty blocks kept for reuse
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is smaller than [`MIN_BLOCK_SIZE`] or does not
    /// form a valid layout.
    pub fn new(block_size: usize, retained_blocks: usize) -> Self {
        assert!(
            block_size >= MIN_BLOCK_SIZE,
            "block_size must be at least {MIN_BLOCK_SIZE} bytes"
        );

        let block_layout = match Layout::from_size_align(block_size, BLOCK_ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("block_size {block_size} is too large"),
        };

        Self {
            block_layout,
            retained_blocks,
            current: None,
            cursor: HEADER,
            spare: Vec::with_capacity(retained_blocks),
            retired: 0,
            live: 0,
            dedicated: 0,
        }
    }

    /// Returns the size in bytes of each block.
    pub fn block_size(&self) -> usize {
        self.block_layout.size()
    }

    /// Returns a snapshot of the arena's occupancy.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            live_allocations: self.live,
            blocks_in_use: self.retired + usize::from(self.current.is_some()),
            spare_blocks: self.spare.len(),
            dedicated_allocations: self.dedicated,
        }
    }

    /// Offset of the payload for `layout` if carved at `cursor`, and the
    /// offset just past it.
    fn place(cursor: usize, layout: Layout) -> Option<(usize, usize)> {
        let align = layout.align().max(mem::align_of::<NonNull<BlockHeader>>());
        let start = cursor.checked_add(LINK)?.checked_next_multiple_of(align)?;
        let end = start.checked_add(layout.size())?;

        Some((start, end))
    }

    /// Whether `layout` is served from blocks at all.
    fn in_block(&self, layout: Layout) -> bool {
        layout.align() <= BLOCK_ALIGN
            && Self::place(HEADER, layout).is_some_and(|(_, end)| end <= self.block_size())
    }

    /// Retires the current block and installs an empty one.
    fn next_block(&mut self) -> NonNull<BlockHeader> {
        if let Some(current) = self.current.take() {
            // An empty current block is always rewound, so anything that fits
            // a block would have fit here.
            debug_assert!(unsafe { current.as_ref().live } > 0);
            self.retired += 1;
        }

        let block = match self.spare.pop() {
            Some(block) => block,
            None => self.fresh_block(),
        };

        // Safety: `block` is an exclusively owned allocation of `block_layout`.
        unsafe { block.as_ptr().write(BlockHeader { live: 0 }) };

        self.current = Some(block);
        self.cursor = HEADER;

        block
    }

    /// Requests a new block from the system allocator.
    fn fresh_block(&mut self) -> NonNull<BlockHeader> {
        // Safety: `block_layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc(self.block_layout) };
        let Some(block) = NonNull::new(ptr) else {
            alloc::handle_alloc_error(self.block_layout)
        };

        tracing::trace!(
            block_size = self.block_size(),
            blocks_in_use = self.retired + 1,
            "arena acquired a new block"
        );

        block.cast()
    }

    /// Keeps an empty block as a spare or frees it.
    fn recycle(&mut self, block: NonNull<BlockHeader>) {
        if self.spare.len() < self.retained_blocks {
            self.spare.push(block);
        } else {
            // Safety: `block` was allocated with `block_layout` and is empty.
            unsafe { alloc::dealloc(block.as_ptr().cast(), self.block_layout) };
        }
    }

    fn dedicated_layout(layout: Layout) -> Layout {
        // Zero-sized, over-aligned requests still get a real allocation.
        match Layout::from_size_align(layout.size().max(1), layout.align()) {
            Ok(layout) => layout,
            Err(_) => unreachable!("a valid layout stays valid when grown to one byte"),
        }
    }
}

unsafe impl Arena for BlockArena {
    fn allocate(&mut self, layout: Layout) -> NonNull<u8> {
        if !self.in_block(layout) {
            let layout = Self::dedicated_layout(layout);

            // Safety: `dedicated_layout` never has a zero size.
            let ptr = unsafe { alloc::alloc(layout) };
            let Some(ptr) = NonNull::new(ptr) else {
                alloc::handle_alloc_error(layout)
            };

            self.dedicated += 1;
            self.live += 1;
            return ptr;
        }

        let block_size = self.block_size();
        let fits =
            |cursor| Self::place(cursor, layout).is_some_and(|(_, end)| end <= block_size);

        let block = match self.current {
            Some(block) if fits(self.cursor) => block,
            _ => self.next_block(),
        };

        let Some((start, end)) = Self::place(self.cursor, layout) else {
            unreachable!("layout was checked against an empty block");
        };
        self.cursor = end;

        // Safety: `start - LINK .. end` lies inside the block, `start` is
        // aligned for both the payload and the back-pointer, and the block is
        // aligned to `BLOCK_ALIGN`, which bounds `layout.align()`.
        let payload = unsafe {
            let payload = block.cast::<u8>().add(start);
            payload.sub(LINK).cast::<NonNull<BlockHeader>>().write(block);
            (*block.as_ptr()).live += 1;
            payload
        };

        self.live += 1;
        payload
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        self.live -= 1;

        if !self.in_block(layout) {
            self.dedicated -= 1;

            // Safety: the caller returns a pointer from `allocate` with the
            // same layout, which was routed to the system allocator.
            unsafe { alloc::dealloc(ptr.as_ptr(), Self::dedicated_layout(layout)) };
            return;
        }

        // Safety: block allocations are always preceded by their back-pointer.
        let block = unsafe { ptr.sub(LINK).cast::<NonNull<BlockHeader>>().read() };
        let live = unsafe {
            let header = &mut *block.as_ptr();
            header.live -= 1;
            header.live
        };

        if live > 0 {
            return;
        }

        if self.current == Some(block) {
            self.cursor = HEADER;
        } else {
            self.retired -= 1;
            self.recycle(block);
        }
    }
}

impl Default for BlockArena {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE, DEFAULT_RETAINED_BLOCKS)
    }
}

impl fmt::Debug for BlockArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockArena")
            .field("block_size", &self.block_size())
            .field("retained_blocks", &self.retained_blocks)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Drop for BlockArena {
    /// Frees the current block and every spare.
    ///
    /// Blocks still holding live allocations are leaked rather than freed
    /// under their owners.
    fn drop(&mut self) {
        if self.live > 0 {
            tracing::warn!(
                live_allocations = self.live,
                "arena dropped with live allocations, leaking their storage"
            );
        }

        if let Some(current) = self.current.take() {
            if unsafe { current.as_ref().live } == 0 {
                unsafe { alloc::dealloc(current.as_ptr().cast(), self.block_layout) };
            }
        }

        for block in self.spare.drain(..) {
            unsafe { alloc::dealloc(block.as_ptr().cast(), self.block_layout) };
        }
    }
}
