use super::Executor;
use crate::arena::{BlockArena, DEFAULT_BLOCK_SIZE, DEFAULT_RETAINED_BLOCKS, MIN_BLOCK_SIZE};

/// Builder for configuring and creating an executor.
///
/// `ExecutorBuilder` sizes the [`BlockArena`] that stores queued tasks.
/// Tasks posted in bursts larger than one block spill into additional
/// blocks; empty blocks beyond the retained count are returned to the
/// system allocator.
///
/// # Examples
///
/// ```rust
/// use tasklet::ExecutorBuilder;
///
/// let executor = ExecutorBuilder::new()
///     .block_size(4096)
///     .retained_blocks(2)
///     .build();
///
/// assert!(executor.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorBuilder {
    /// Size in bytes of each arena block.
    block_size: usize,

    /// Number of empty blocks kept for reuse.
    retained_blocks: usize,
}

impl ExecutorBuilder {
    /// Creates a new `ExecutorBuilder` with default configuration.
    ///
    /// By default, blocks are [`DEFAULT_BLOCK_SIZE`] bytes and
    /// [`DEFAULT_RETAINED_BLOCKS`] empty block is kept around.
    pub fn new() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            retained_blocks: DEFAULT_RETAINED_BLOCKS,
        }
    }

    /// Sets the size in bytes of each arena block.
    ///
    /// Closures too large to fit a block are still accepted; they get a
    /// dedicated allocation.
    ///
    /// # Panics
    ///
    /// Panics if `size` is smaller than [`MIN_BLOCK_SIZE`].
    pub fn block_size(mut self, size: usize) -> Self {
        assert!(
            size >= MIN_BLOCK_SIZE,
            "block_size must be at least {MIN_BLOCK_SIZE} bytes"
        );

        self.block_size = size;
        self
    }

    /// Sets how many empty blocks the arena keeps instead of freeing them.
    pub fn retained_blocks(mut self, n: usize) -> Self {
        self.retained_blocks = n;
        self
    }

    /// Builds an empty executor with the configured arena.
    pub fn build(self) -> Executor {
        Executor::with_arena(BlockArena::new(self.block_size, self.retained_blocks))
    }
}

impl Default for ExecutorBuilder {
    /// Creates a default `ExecutorBuilder`.
    fn default() -> Self {
        Self::new()
    }
}
