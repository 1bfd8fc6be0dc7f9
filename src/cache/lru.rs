//! LRU Recency List Module
//!
//! Implements the recency order used for LRU eviction.

/// Stable handle to an item in a [`RecencyList`].
pub type NodeId = usize;

#[derive(Debug)]
struct Slot<T> {
    item: Option<T>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

// == Recency List ==
/// Doubly-linked recency order stored in an arena.
///
/// - Front = Most recently used
/// - Back = Least recently used
///
/// Handles stay valid until the item is removed; freed slots are reused.
#[derive(Debug)]
pub struct RecencyList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<NodeId>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl<T> RecencyList<T> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts an item as the most recently used and returns its handle.
    pub fn push_front(&mut self, item: T) -> NodeId {
        let slot = Slot {
            item: Some(item),
            prev: None,
            next: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = slot;
                id
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.link_front(id);
        self.len += 1;
        id
    }

    // == Move To Front ==
    /// Marks an item as most recently used.
    pub fn move_to_front(&mut self, id: NodeId) {
        if self.head == Some(id) {
            return;
        }
        self.unlink(id);
        self.link_front(id);
    }

    // == Remove ==
    /// Unlinks an item and frees its slot.
    ///
    /// # Panics
    /// Panics if `id` does not refer to a live item.
    pub fn remove(&mut self, id: NodeId) -> T {
        self.unlink(id);
        let item = self.slots[id]
            .item
            .take()
            .expect("recency handle points at a free slot");
        self.free.push(id);
        self.len -= 1;
        item
    }

    // == Accessors ==
    pub fn get(&self, id: NodeId) -> &T {
        self.slots[id]
            .item
            .as_ref()
            .expect("recency handle points at a free slot")
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        self.slots[id]
            .item
            .as_mut()
            .expect("recency handle points at a free slot")
    }

    /// Handle of the most recently used item.
    pub fn front(&self) -> Option<NodeId> {
        self.head
    }

    /// Handle of the least recently used item.
    pub fn back(&self) -> Option<NodeId> {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates from most to least recently used; `.rev()` walks the other way.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }

    // == Internals ==
    fn link_front(&mut self, id: NodeId) {
        let old_head = self.head;
        {
            let slot = &mut self.slots[id];
            slot.prev = None;
            slot.next = old_head;
        }
        match old_head {
            Some(h) => self.slots[h].prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }

    fn unlink(&mut self, id: NodeId) {
        let (prev, next) = {
            let slot = &self.slots[id];
            (slot.prev, slot.next)
        };
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        let slot = &mut self.slots[id];
        slot.prev = None;
        slot.next = None;
    }
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

// == Iter ==
/// Double-ended iterator over a [`RecencyList`], front to back.
pub struct Iter<'a, T> {
    list: &'a RecencyList<T>,
    front: Option<NodeId>,
    back: Option<NodeId>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let list = self.list;
        let id = self.front?;
        self.front = list.slots[id].next;
        self.remaining -= 1;
        Some(list.get(id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let list = self.list;
        let id = self.back?;
        self.back = list.slots[id].prev;
        self.remaining -= 1;
        Some(list.get(id))
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}
