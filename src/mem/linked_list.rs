//! Intrusive doubly linked list used for the free-lists of the buddy allocator.

use core::{marker::PhantomData, ptr::NonNull};

/// The links that are stored inside every element of a [`LinkedList`].
#[derive(Debug)]
#[repr(C)]
pub struct ListNode {
    next: Option<NonNull<ListNode>>,
    prev: Option<NonNull<ListNode>>,
}

/// Intrusive doubly linked list.
///
/// The list doesn't own its nodes, it only links memory that was
/// handed to [`push`](Self::push).
pub struct LinkedList {
    head: Option<NonNull<ListNode>>,
}

impl LinkedList {
    /// An empty list, usable in constant contexts.
    pub const EMPTY: LinkedList = LinkedList::new();

    /// Create a new, empty `LinkedList`.
    pub const fn new() -> Self {
        Self { head: None }
    }

    /// Returns whether this list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Push the given node to the front of the list.
    ///
    /// # Safety
    ///
    /// `node` must be valid to write a [`ListNode`], must stay valid while it
    /// is linked and must not already be part of any list.
    pub unsafe fn push(&mut self, node: NonNull<ListNode>) {
        node.as_ptr().write(ListNode {
            next: self.head,
            prev: None,
        });

        if let Some(head) = self.head {
            (*head.as_ptr()).prev = Some(node);
        }
        self.head = Some(node);
    }

    /// Removes the first node from this list.
    pub fn pop(&mut self) -> Option<NonNull<ListNode>> {
        let node = self.head?;
        // SAFETY
        // Every linked node is valid, as required by `push`.
        unsafe { self.remove(node) };
        Some(node)
    }

    /// Unlink the given node from this list.
    ///
    /// # Safety
    ///
    /// `node` must currently be linked into `self`.
    pub unsafe fn remove(&mut self, node: NonNull<ListNode>) {
        let ListNode { next, prev } = node.as_ptr().read();

        match prev {
            Some(prev) => (*prev.as_ptr()).next = next,
            None => self.head = next,
        }

        if let Some(next) = next {
            (*next.as_ptr()).prev = prev;
        }
    }

    /// Returns an iterator over the nodes of this list, starting at the front.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            head: self.head,
            _lifetime: PhantomData,
        }
    }
}

/// Iterator over the nodes of a [`LinkedList`].
pub struct Iter<'list> {
    head: Option<NonNull<ListNode>>,
    _lifetime: PhantomData<&'list LinkedList>,
}

impl Iterator for Iter<'_> {
    type Item = NonNull<ListNode>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.head?;
        // SAFETY
        // Safety arguments must be provided by the caller of `push`.
        self.head = unsafe { (*item.as_ptr()).next };
        Some(item)
    }
}
