#![allow(dead_code)]

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tasklet::arena::{Arena, BlockArena};

/// Installs a test-friendly `tracing` subscriber, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Allocation counters shared between a [`CountingArena`] and a test.
#[derive(Default)]
pub struct Counts {
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl Counts {
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.allocated() - self.released()
    }
}

/// A block arena that records every allocation and release.
///
/// The counters outlive the arena, so a test can check them after the
/// executor owning the arena is gone.
pub struct CountingArena {
    inner: BlockArena,
    counts: Arc<Counts>,
}

impl CountingArena {
    pub fn new() -> (Self, Arc<Counts>) {
        let counts = Arc::new(Counts::default());
        let arena = Self {
            inner: BlockArena::new(256, 0),
            counts: counts.clone(),
        };

        (arena, counts)
    }
}

unsafe impl Arena for CountingArena {
    fn allocate(&mut self, layout: Layout) -> NonNull<u8> {
        self.counts.allocated.fetch_add(1, Ordering::SeqCst);
        self.inner.allocate(layout)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        self.counts.released.fetch_add(1, Ordering::SeqCst);
        unsafe { self.inner.deallocate(ptr, layout) }
    }
}
