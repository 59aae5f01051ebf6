use super::chain::{Chain, Detached, same_node};
use super::item::{self, Link};
use crate::arena::{Arena, ArenaStats, BlockArena};
use crate::error::ExecError;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// State guarded by the executor lock.
struct Shared<A> {
    /// Tasks posted and not yet detached by `run`.
    queue: Chain,

    /// Storage for every node in `queue` and in an in-progress drain.
    arena: A,
}

/// A deferred-call executor.
///
/// Any number of threads may [`post`](Self::post) closures; a single caller
/// drains them with [`run`](Self::run), at a moment of its choosing, on its
/// own thread. The executor owns no threads and never schedules itself.
///
/// Posting appends to a list under a short lock. Draining detaches the whole
/// list under the same lock, invokes every task outside of it, and then
/// returns the nodes to the arena. Tasks posted while a drain is invoking
/// tasks (including by those tasks) wait for the next drain.
///
/// Tasks still queued when the executor is dropped are discarded without
/// being invoked.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use tasklet::Executor;
///
/// let executor = Executor::new();
/// let hits = Arc::new(AtomicUsize::new(0));
///
/// let counter = hits.clone();
/// executor.post(move || {
///     counter.fetch_add(1, Ordering::Relaxed);
/// });
///
/// assert_eq!(executor.run(), Ok(1));
/// assert_eq!(hits.load(Ordering::Relaxed), 1);
/// ```
pub struct Executor<A: Arena = BlockArena> {
    shared: Mutex<Shared<A>>,

    /// Set while a call to `run` is draining.
    running: AtomicBool,
}

impl Executor {
    /// Creates an empty executor backed by a default [`BlockArena`].
    pub fn new() -> Self {
        Self::with_arena(BlockArena::default())
    }

    /// Returns a snapshot of the node arena's occupancy.
    pub fn arena_stats(&self) -> ArenaStats {
        self.shared.lock().arena.stats()
    }
}

impl<A: Arena> Executor<A> {
    /// Creates an empty executor that stores its nodes in `arena`.
    pub fn with_arena(arena: A) -> Self {
        Self {
            shared: Mutex::new(Shared {
                queue: Chain::new(),
                arena,
            }),
            running: AtomicBool::new(false),
        }
    }

    /// Queues `task` for the next call to [`run`](Self::run).
    ///
    /// Tasks posted from the same thread run in the order they were posted.
    /// Tasks posted concurrently from several threads are queued in the
    /// order their posts acquired the lock.
    ///
    /// May be called concurrently from any thread, including from inside a
    /// running task.
    ///
    /// # Panics
    ///
    /// Aborts through [`std::alloc::handle_alloc_error`] if the arena cannot
    /// provide storage, in which case the task is not queued.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let pending = {
            let mut shared = self.shared.lock();
            let Shared { queue, arena } = &mut *shared;

            let node = item::alloc_node(arena, task);

            // Safety: `node` was just allocated and is linked nowhere else.
            unsafe { queue.push_back(node) };

            queue.len()
        };

        tracing::trace!(pending, "task posted");
    }

    /// Invokes every task that was pending when the call began.
    ///
    /// Tasks run on the calling thread, once each, in the order they were
    /// queued. The lock is not held while tasks run, so producers are never
    /// blocked by a slow task. Anything posted during the drain is left for
    /// the next call.
    ///
    /// Returns the number of tasks invoked.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::AlreadyRunning`] if another call to `run` on this
    /// executor is in progress, whether on another thread or further up the
    /// current stack. The ongoing drain is not disturbed.
    ///
    /// # Panics
    ///
    /// A panicking task is not caught. Before the panic leaves `run`, the
    /// tasks already invoked are released, and the tasks of the batch that
    /// did not get to run are put back at the front of the queue, ahead of
    /// anything posted since, for the next call.
    pub fn run(&self) -> Result<usize, ExecError> {
        let _running = Running::enter(&self.running)?;

        let batch = self.shared.lock().queue.take();
        let Some(batch) = batch else {
            return Ok(0);
        };

        let mut drain = Drain {
            shared: &self.shared,
            cursor: Some(batch.head),
            batch,
            invoked: 0,
        };

        while let Some(node) = drain.cursor {
            // Safety: the detached batch belongs to this call alone until
            // `drain` is dropped.
            let item = unsafe { &mut *node.as_ptr() };

            drain.cursor = *item.next();
            drain.invoked += 1;

            item.invoke();
        }

        let invoked = drain.invoked;
        drop(drain);

        tracing::debug!(invoked, "drained pending tasks");
        Ok(invoked)
    }

    /// Returns the number of queued tasks.
    ///
    /// This is a snapshot: other threads may post concurrently.
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Returns `true` if no task is queued.
    pub fn is_empty(&self) -> bool {
        self.shared.lock().queue.is_empty()
    }

    /// Returns `true` while a call to [`run`](Self::run) is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Calls `f` with the arena, under the executor lock.
    ///
    /// `f` must not call back into this executor.
    pub fn inspect_arena<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        f(&self.shared.lock().arena)
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Arena> fmt::Debug for Executor<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("pending", &self.pending())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<A: Arena> Drop for Executor<A> {
    /// Releases every task that was never run, without invoking it.
    fn drop(&mut self) {
        let shared = self.shared.get_mut();
        let dropped = shared.queue.len();

        if dropped > 0 {
            tracing::debug!(dropped, "discarding tasks that were never run");
        }

        let mut discard = Discard { shared };
        discard.release_all();
    }
}

/// Releases queued tasks without running them.
///
/// If a task's captured state panics while being dropped, the guard's own
/// drop keeps releasing the rest of the queue.
struct Discard<'a, A: Arena> {
    shared: &'a mut Shared<A>,
}

impl<A: Arena> Discard<'_, A> {
    fn release_all(&mut self) {
        let Shared { queue, arena } = &mut *self.shared;

        while let Some(node) = queue.pop_front() {
            // Safety: `pop_front` unlinked the node, and it came from this arena.
            unsafe { item::release(arena, node) };
        }
    }
}

impl<A: Arena> Drop for Discard<'_, A> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Marks an executor as draining for the lifetime of the guard.
struct Running<'a> {
    flag: &'a AtomicBool,
}

impl<'a> Running<'a> {
    fn enter(flag: &'a AtomicBool) -> Result<Self, ExecError> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| ExecError::AlreadyRunning)?;

        Ok(Self { flag })
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A batch being drained by `run`.
///
/// Dropping it, normally or while a task panics, releases every invoked node
/// and re-queues the ones `cursor` had not reached.
struct Drain<'a, A: Arena> {
    shared: &'a Mutex<Shared<A>>,
    batch: Detached,

    /// First node not yet invoked.
    cursor: Link,
    invoked: usize,
}

impl<A: Arena> Drop for Drain<'_, A> {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        let Shared { queue, arena } = &mut *shared;

        let mut node = Some(self.batch.head);
        while !same_node(node, self.cursor) {
            let Some(current) = node else {
                break;
            };

            // Safety: every node before `cursor` was invoked and is reachable
            // only from this batch.
            unsafe {
                node = *(*current.as_ptr()).next();
                item::release(arena, current);
            }
        }

        if let Some(head) = self.cursor {
            let requeued = self.batch.len - self.invoked;

            // Safety: `head..=batch.tail` is the untouched end of the batch.
            unsafe {
                queue.push_front(Detached {
                    head,
                    tail: self.batch.tail,
                    len: requeued,
                });
            }

            tracing::warn!(requeued, "task panicked, re-queued the rest of its batch");
        }
    }
}
