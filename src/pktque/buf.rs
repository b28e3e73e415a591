//! Growable ring buffer addressed by logical position
//!
//! ```text
//!   head                     tail
//!    │                        │
//!    ▼                        ▼
//!  ┌────┬────┬────┬────┬────┬────┬────┬────┐
//!  │ 12 │ 13 │ 14 │ 15 │ 16 │    │    │    │   slot = pos & (capacity - 1)
//!  └────┴────┴────┴────┴────┴────┴────┴────┘
//! ```
//!
//! `head` and `tail` only ever increase. A position stays meaningful after
//! the item it named has been popped: it simply compares below `head`.

use std::collections::VecDeque;

/// Logical position in a [`PacketBuf`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BufPos(pub u64);

impl BufPos {
    /// Position immediately after this one
    pub fn next(self) -> BufPos {
        BufPos(self.0 + 1)
    }

    /// Position immediately before this one, saturating at zero
    pub fn prev(self) -> BufPos {
        BufPos(self.0.saturating_sub(1))
    }
}

impl std::fmt::Display for BufPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ring buffer with unbounded logical positions over a finite slab
#[derive(Debug)]
pub struct PacketBuf<T> {
    slots: Vec<Option<T>>,
    head: BufPos,
    tail: BufPos,
}

impl<T> PacketBuf<T> {
    /// Default number of slots
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a buffer with at least `capacity` slots (rounded up to a power of two)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: BufPos(0),
            tail: BufPos(0),
        }
    }

    /// Position of the oldest buffered item
    pub fn head(&self) -> BufPos {
        self.head
    }

    /// Position the next pushed item will get
    pub fn tail(&self) -> BufPos {
        self.tail
    }

    pub fn len(&self) -> usize {
        (self.tail.0 - self.head.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Check if `pos` names a buffered item
    pub fn is_valid_pos(&self, pos: BufPos) -> bool {
        self.head <= pos && pos < self.tail
    }

    fn slot(&self, pos: BufPos) -> usize {
        (pos.0 & (self.slots.len() as u64 - 1)) as usize
    }

    /// Append an item at `tail`, growing the slab when full
    pub fn push(&mut self, item: T) -> BufPos {
        if self.len() == self.slots.len() {
            self.grow();
        }
        let pos = self.tail;
        let slot = self.slot(pos);
        self.slots[slot] = Some(item);
        self.tail = pos.next();
        pos
    }

    /// Remove and return the oldest item
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let slot = self.slot(self.head);
        let item = self.slots[slot].take();
        self.head = self.head.next();
        item
    }

    /// Get the item at `pos`, if still buffered
    pub fn get(&self, pos: BufPos) -> Option<&T> {
        if !self.is_valid_pos(pos) {
            return None;
        }
        self.slots[self.slot(pos)].as_ref()
    }

    /// Pop every buffered item, oldest first
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.pop())
    }

    /// Iterate over `(position, item)` from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (BufPos, &T)> + '_ {
        (self.head.0..self.tail.0)
            .filter_map(move |p| self.get(BufPos(p)).map(|item| (BufPos(p), item)))
    }

    fn grow(&mut self) {
        let new_capacity = self.slots.len() * 2;
        let mut items: VecDeque<T> = self.drain().collect();
        let head = self.head;

        self.slots = Vec::with_capacity(new_capacity);
        self.slots.resize_with(new_capacity, || None);

        // Items keep their logical positions, only their slots move
        self.head = BufPos(head.0 - items.len() as u64);
        self.tail = self.head;
        while let Some(item) = items.pop_front() {
            let slot = self.slot(self.tail);
            self.slots[slot] = Some(item);
            self.tail = self.tail.next();
        }
        debug_assert_eq!(self.tail, head);
    }
}

impl<T> Default for PacketBuf<T> {
    fn default() -> Self {
        Self::new()
    }
}
