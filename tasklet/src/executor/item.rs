use crate::arena::Arena;

use std::alloc::Layout;
use std::ptr::{self, NonNull};

/// Forward link between queued items.
///
/// The link does not own its target: the list holding the chain does.
pub(crate) type Link = Option<NonNull<dyn Item>>;

/// A queued unit of deferred work.
///
/// The `Item` trait erases the concrete closure type, allowing the executor
/// to keep a heterogeneous chain of nodes behind `NonNull<dyn Item>`.
pub(crate) trait Item: Send {
    /// The link to the next item in the chain.
    fn next(&mut self) -> &mut Link;

    /// Runs the stored closure. Only the first call has any effect.
    fn invoke(&mut self);
}

/// Arena-resident node wrapping one posted closure.
pub(crate) struct Node<F> {
    next: Link,

    /// `None` once the closure has been invoked.
    task: Option<F>,
}

// Safety: `next` is only followed by the list that owns the chain, and the
// closure itself is `Send`.
unsafe impl<F: Send> Send for Node<F> {}

impl<F> Item for Node<F>
where
    F: FnOnce() + Send,
{
    fn next(&mut self) -> &mut Link {
        &mut self.next
    }

    fn invoke(&mut self) {
        if let Some(task) = self.task.take() {
            task();
        }
    }
}

/// Moves `task` into a new node allocated from `arena`.
///
/// The node starts unlinked.
pub(crate) fn alloc_node<F, A>(arena: &mut A, task: F) -> NonNull<dyn Item>
where
    F: FnOnce() + Send + 'static,
    A: Arena + ?Sized,
{
    let node = arena.allocate(Layout::new::<Node<F>>()).cast::<Node<F>>();

    // Safety: the arena returned storage sized and aligned for `Node<F>`.
    unsafe {
        node.as_ptr().write(Node {
            next: None,
            task: Some(task),
        });
    }

    node
}

/// Destroys a node and returns its storage to `arena`.
///
/// A node that was never invoked drops its closure here. The storage is
/// returned even if that drop panics.
///
/// # Safety
///
/// `node` must come from [`alloc_node`] on this same arena, must no longer be
/// reachable from any list, and must not be used afterwards.
pub(crate) unsafe fn release<A>(arena: &mut A, node: NonNull<dyn Item>)
where
    A: Arena + ?Sized,
{
    unsafe {
        let _storage = Storage {
            arena,
            ptr: node.cast::<u8>(),
            layout: Layout::for_value(node.as_ref()),
        };

        ptr::drop_in_place(node.as_ptr());
    }
}

/// Node storage handed back to its arena on drop.
struct Storage<'a, A: Arena + ?Sized> {
    arena: &'a mut A,
    ptr: NonNull<u8>,
    layout: Layout,
}

impl<A: Arena + ?Sized> Drop for Storage<'_, A> {
    fn drop(&mut self) {
        // Safety: built by `release` from a node allocated on this arena.
        unsafe { self.arena.deallocate(self.ptr, self.layout) };
    }
}
