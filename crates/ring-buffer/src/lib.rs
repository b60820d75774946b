//! Fixed-capacity FIFO with monotonic write positions.
//!
//! Every write bumps a counter `W` that never goes backwards, even across [`RingBuffer::clear`].
//! Readers remember a [`Cursor`] (the `W` they last saw) and resume from it; when the items behind
//! a cursor have been evicted the read silently starts at the oldest live item and the caller can
//! measure the gap with [`RingBuffer::evicted_since`].
//!
//! The buffer itself carries no lock. Owners wrap it in whatever lock fits their access pattern.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resume point for cursor reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub position: u64,
    pub timestamp: DateTime<Utc>,
}

impl Cursor {
    pub fn at(position: u64) -> Self {
        Self {
            position,
            timestamp: Utc::now(),
        }
    }

    pub fn start() -> Self {
        Self::at(0)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    item: T,
    added_at: DateTime<Utc>,
}

/// Borrowed view of one live item with its ring metadata.
#[derive(Debug)]
pub struct RingItem<'a, T> {
    pub position: u64,
    pub added_at: DateTime<Utc>,
    pub item: &'a T,
}

#[derive(Clone, Debug, Default)]
pub struct PageRequest {
    pub after: Option<Cursor>,
    /// Only items added at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// 0 means unbounded.
    pub limit: usize,
    pub restart_on_eviction: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageEntry<T> {
    pub position: u64,
    pub added_at: DateTime<Utc>,
    pub item: T,
}

#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<PageEntry<T>>,
    pub cursor: Cursor,
    /// Items the caller's cursor missed because they were evicted.
    pub evicted: u64,
    /// Set when the read restarted at the oldest live item on request.
    pub restarted: bool,
}

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    slots: VecDeque<Slot<T>>,
    written: u64,
}

impl<T: Clone> RingBuffer<T> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: VecDeque::with_capacity(capacity.min(4096)),
            written: 0,
        }
    }

    /// Append all items, evicting from the front as needed. Returns the new write counter.
    pub fn write<I>(&mut self, items: I) -> u64
    where
        I: IntoIterator<Item = T>,
    {
        let now = Utc::now();
        for item in items {
            self.push_slot(item, now);
        }
        self.written
    }

    /// Append one item and return the position it was written at.
    pub fn write_one(&mut self, item: T) -> u64 {
        let position = self.written;
        self.push_slot(item, Utc::now());
        position
    }

    fn push_slot(&mut self, item: T, added_at: DateTime<Utc>) {
        if self.slots.len() >= self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(Slot { item, added_at });
        self.written += 1;
    }

    /// Next write position, i.e. the total number of items ever written.
    pub fn position(&self) -> u64 {
        self.written
    }

    pub fn oldest_position(&self) -> u64 {
        self.written - self.slots.len() as u64
    }

    pub fn cursor(&self) -> Cursor {
        Cursor::at(self.written)
    }

    /// Number of items a reader holding `cursor` lost to eviction.
    pub fn evicted_since(&self, cursor: &Cursor) -> u64 {
        self.oldest_position().saturating_sub(cursor.position)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn read_all(&self) -> Vec<T> {
        self.slots.iter().map(|slot| slot.item.clone()).collect()
    }

    /// Items at or after `cursor.position`, oldest first, plus the cursor for the next read.
    pub fn read_from(&self, cursor: &Cursor) -> (Vec<T>, Cursor) {
        let start = self.start_index(cursor.position);
        let items = self
            .slots
            .iter()
            .skip(start)
            .map(|slot| slot.item.clone())
            .collect();
        (items, self.cursor())
    }

    /// Filtered read over the whole buffer; `limit == 0` means unbounded.
    pub fn read_all_with_filter<F>(&self, pred: F, limit: usize) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut out = Vec::new();
        for slot in &self.slots {
            if pred(&slot.item) {
                out.push(slot.item.clone());
                if limit > 0 && out.len() >= limit {
                    break;
                }
            }
        }
        out
    }

    /// Filtered cursor read. When `limit` stops the scan early the returned cursor points just past
    /// the last returned item, so the next call picks up where this one stopped.
    pub fn read_from_with_filter<F>(&self, cursor: &Cursor, pred: F, limit: usize) -> (Vec<T>, Cursor)
    where
        F: Fn(&T) -> bool,
    {
        let start = self.start_index(cursor.position);
        let oldest = self.oldest_position();
        let mut out = Vec::new();
        for (offset, slot) in self.slots.iter().enumerate().skip(start) {
            if !pred(&slot.item) {
                continue;
            }
            out.push(slot.item.clone());
            if limit > 0 && out.len() >= limit {
                let next = oldest + offset as u64 + 1;
                return (out, Cursor::at(next));
            }
        }
        (out, self.cursor())
    }

    /// The newest `n` items, oldest first.
    pub fn read_last(&self, n: usize) -> Vec<T> {
        let skip = self.slots.len().saturating_sub(n);
        self.slots
            .iter()
            .skip(skip)
            .map(|slot| slot.item.clone())
            .collect()
    }

    /// Position of the first live item added at or after `ts`.
    pub fn position_at_time(&self, ts: DateTime<Utc>) -> Option<u64> {
        let oldest = self.oldest_position();
        self.slots
            .iter()
            .position(|slot| slot.added_at >= ts)
            .map(|idx| oldest + idx as u64)
    }

    /// Live items added at or after `ts`, oldest first.
    pub fn read_since(&self, ts: DateTime<Utc>) -> Vec<T> {
        self.slots
            .iter()
            .filter(|slot| slot.added_at >= ts)
            .map(|slot| slot.item.clone())
            .collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = RingItem<'_, T>> {
        let oldest = self.oldest_position();
        self.slots
            .iter()
            .enumerate()
            .map(move |(idx, slot)| RingItem {
                position: oldest + idx as u64,
                added_at: slot.added_at,
                item: &slot.item,
            })
    }

    /// Cursor-aware page read used by the query surfaces.
    ///
    /// Order of operations: cursor, `since`, predicate, limit. With a cursor the limit keeps the
    /// first matches and the returned cursor resumes right after the last one; without a cursor
    /// the limit keeps the newest matches.
    pub fn page<F>(&self, req: &PageRequest, pred: F) -> Page<T>
    where
        F: Fn(&T) -> bool,
    {
        let evicted = req
            .after
            .as_ref()
            .map(|cursor| self.evicted_since(cursor))
            .unwrap_or(0);
        let start = req
            .after
            .as_ref()
            .map(|cursor| self.start_index(cursor.position))
            .unwrap_or(0);
        let oldest = self.oldest_position();
        let keep = |slot: &Slot<T>| req.since.map_or(true, |ts| slot.added_at >= ts) && pred(&slot.item);
        let entry = |idx: usize, slot: &Slot<T>| PageEntry {
            position: oldest + idx as u64,
            added_at: slot.added_at,
            item: slot.item.clone(),
        };

        let mut items = Vec::new();
        let mut cursor = self.cursor();
        if req.after.is_some() {
            for (idx, slot) in self.slots.iter().enumerate().skip(start) {
                if !keep(slot) {
                    continue;
                }
                items.push(entry(idx, slot));
                if req.limit > 0 && items.len() >= req.limit {
                    cursor = Cursor::at(oldest + idx as u64 + 1);
                    break;
                }
            }
        } else {
            for (idx, slot) in self.slots.iter().enumerate().rev() {
                if !keep(slot) {
                    continue;
                }
                items.push(entry(idx, slot));
                if req.limit > 0 && items.len() >= req.limit {
                    break;
                }
            }
            items.reverse();
        }
        Page {
            items,
            cursor,
            evicted,
            restarted: req.restart_on_eviction && evicted > 0,
        }
    }

    /// Drop every live item. The write counter is kept so outstanding cursors stay valid.
    pub fn clear(&mut self) -> usize {
        let removed = self.slots.len();
        self.slots.clear();
        removed
    }

    fn start_index(&self, position: u64) -> usize {
        let oldest = self.oldest_position();
        let start = position.max(oldest).min(self.written);
        (start - oldest) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_evicts_oldest_in_order() {
        let mut ring = RingBuffer::new(3);
        ring.write([1, 2, 3, 4, 5]);
        assert_eq!(ring.read_all(), vec![3, 4, 5]);
        assert_eq!(ring.position(), 5);
        assert_eq!(ring.oldest_position(), 2);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn zero_capacity_behaves_as_one() {
        let mut ring = RingBuffer::new(0);
        ring.write([1, 2]);
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.read_all(), vec![2]);
    }

    #[test]
    fn write_one_returns_item_position() {
        let mut ring = RingBuffer::new(2);
        assert_eq!(ring.write_one("a"), 0);
        assert_eq!(ring.write_one("b"), 1);
        assert_eq!(ring.write_one("c"), 2);
        let positions: Vec<u64> = ring.iter().map(|it| it.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn read_last_clamps_to_len() {
        let mut ring = RingBuffer::new(5);
        ring.write([1, 2, 3]);
        assert_eq!(ring.read_last(2), vec![2, 3]);
        assert_eq!(ring.read_last(10), vec![1, 2, 3]);
        assert!(ring.read_last(0).is_empty());
    }

    #[test]
    fn clear_keeps_write_counter() {
        let mut ring = RingBuffer::new(4);
        ring.write([1, 2, 3]);
        let cursor = ring.cursor();
        assert_eq!(ring.clear(), 3);
        assert!(ring.is_empty());
        assert_eq!(ring.position(), 3);
        ring.write([9]);
        let (items, next) = ring.read_from(&cursor);
        assert_eq!(items, vec![9]);
        assert_eq!(next.position, 4);
    }

    #[test]
    fn position_at_time_finds_first_match() {
        let mut ring = RingBuffer::new(4);
        ring.write([1, 2]);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let marker = Utc::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        ring.write([3]);
        assert_eq!(ring.position_at_time(marker), Some(2));
        assert_eq!(ring.read_since(marker), vec![3]);
        let future = Utc::now() + chrono::Duration::seconds(60);
        assert_eq!(ring.position_at_time(future), None);
    }
}
