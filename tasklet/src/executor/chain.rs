use super::item::{Item, Link};

use std::mem;
use std::ptr::{self, NonNull};

/// The pending-task list.
///
/// An intrusive singly linked list: the links live in the nodes, and the
/// list keeps only both ends and a length. Appending and detaching the whole
/// list are both O(1).
///
/// # Invariants
///
/// - `head.is_none()` iff `tail.is_none()` iff `len == 0`
/// - otherwise `tail.next` is `None` and `tail` is reachable from `head`
pub(crate) struct Chain {
    head: Link,
    tail: Link,
    len: usize,
}

/// A run of nodes detached from a [`Chain`].
///
/// Owned by whoever detached it until every node is released or spliced back.
pub(crate) struct Detached {
    pub(crate) head: NonNull<dyn Item>,
    pub(crate) tail: NonNull<dyn Item>,
    pub(crate) len: usize,
}

// Safety: the chain exclusively owns its nodes, which are all `Send`.
unsafe impl Send for Chain {}

impl Chain {
    /// Creates an empty list.
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Appends `node` after the current tail.
    ///
    /// # Safety
    ///
    /// `node` must be a live, unlinked node not reachable from any list.
    pub(crate) unsafe fn push_back(&mut self, node: NonNull<dyn Item>) {
        match self.tail {
            Some(tail) => unsafe { *(*tail.as_ptr()).next() = Some(node) },
            None => self.head = Some(node),
        }

        self.tail = Some(node);
        self.len += 1;
    }

    /// Detaches the entire list, leaving it empty.
    ///
    /// Returns `None` if the list was already empty.
    pub(crate) fn take(&mut self) -> Option<Detached> {
        let head = self.head.take()?;
        let tail = self.tail.take()?;
        let len = mem::take(&mut self.len);

        Some(Detached { head, tail, len })
    }

    /// Puts a detached run back in front of the current head.
    ///
    /// # Safety
    ///
    /// `run` must be a well-formed chain from `run.head` to `run.tail` that is
    /// not reachable from any list.
    pub(crate) unsafe fn push_front(&mut self, run: Detached) {
        match self.head {
            Some(head) => unsafe { *(*run.tail.as_ptr()).next() = Some(head) },
            None => self.tail = Some(run.tail),
        }

        self.head = Some(run.head);
        self.len += run.len;
    }

    /// Unlinks and returns the first node.
    pub(crate) fn pop_front(&mut self) -> Link {
        let head = self.head?;

        // Safety: nodes reachable from `head` are live and owned by the list.
        self.head = unsafe { (*head.as_ptr()).next().take() };
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;

        Some(head)
    }
}

/// Whether two links point at the same node.
pub(crate) fn same_node(a: Link, b: Link) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => ptr::addr_eq(a.as_ptr(), b.as_ptr()),
        (None, None) => true,
        _ => false,
    }
}
