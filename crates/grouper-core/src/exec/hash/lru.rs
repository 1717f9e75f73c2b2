use crate::error::{ErrorOrigin, InternalError};
use std::mem::size_of;

///
/// Node
///

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

///
/// LruArena
///
/// Slab of nodes with stable indices threaded on an intrusive doubly-linked
/// list. `head` is least recently used, `tail` most recently used.
///

#[derive(Debug)]
pub(crate) struct LruArena<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> LruArena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert as most recently used and return the stable index.
    pub(crate) fn push_mru(&mut self, value: T) -> Result<usize, InternalError> {
        let node = Node {
            value,
            prev: self.tail,
            next: None,
        };

        let idx = if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(node);
            idx
        } else {
            self.slots.try_reserve(1).map_err(|_| {
                InternalError::out_of_memory(
                    ErrorOrigin::Hash,
                    "hash entry arena",
                    u64::try_from(size_of::<Node<T>>()).unwrap_or(u64::MAX),
                )
            })?;
            self.slots.push(Some(node));
            self.slots.len() - 1
        };

        self.link_tail(idx);
        self.len += 1;

        Ok(idx)
    }

    pub(crate) fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx)?.as_ref().map(|node| &node.value)
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.slots.get_mut(idx)?.as_mut().map(|node| &mut node.value)
    }

    /// Move `idx` to the most-recently-used end.
    pub(crate) fn touch(&mut self, idx: usize) {
        if self.tail == Some(idx) || self.get(idx).is_none() {
            return;
        }

        self.unlink(idx);
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = None;
        }
        self.link_tail_after_current(idx);
    }

    /// Index of the least recently used entry.
    pub(crate) const fn lru(&self) -> Option<usize> {
        self.head
    }

    pub(crate) fn remove(&mut self, idx: usize) -> Option<T> {
        self.get(idx)?;
        self.unlink(idx);
        let node = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        self.len -= 1;

        Some(node.value)
    }

    /// Values in least-recently-used order, emptying the arena.
    pub(crate) fn drain_lru(&mut self) -> Vec<(usize, T)> {
        let mut out = Vec::with_capacity(self.len);
        while let Some(idx) = self.head {
            match self.remove(idx) {
                Some(value) => out.push((idx, value)),
                None => break,
            }
        }

        out
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(idx)?.as_mut()
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.slots.get(idx).and_then(Option::as_ref) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    // Link a freshly placed node whose `prev` already names the old tail.
    fn link_tail(&mut self, idx: usize) {
        match self.tail {
            Some(t) => {
                if let Some(node) = self.node_mut(t) {
                    node.next = Some(idx);
                }
            }
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    fn link_tail_after_current(&mut self, idx: usize) {
        let old_tail = self.tail;
        if let Some(node) = self.node_mut(idx) {
            node.prev = old_tail;
        }
        self.link_tail(idx);
    }
}

///
/// TESTS
///
