// src/list.rs

//! Compact relation lists
//!
//! A relation list is a small set of indices hanging off a record, such as
//! the properties of a package. The common single-element case is stored
//! inline in the record's list head; anything else is a run of consecutive
//! entries in a shared pool, terminated by a flag on the last entry.

use crate::array::{Record, RecordArray};
use byteorder::{ByteOrder, LittleEndian};

/// Largest index or pool position a packed 24-bit field can hold
pub const MAX_INDEX: u32 = 0x00FF_FFFF;

/// Flag marking an inline head, and the last entry of a pool run
const LIST_TERMINATOR: u32 = 0x80;

/// Payload of the empty head
const EMPTY_PAYLOAD: u32 = MAX_INDEX;

/// Head of a relation list, decoded from its packed on-disk word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationList {
    #[default]
    Empty,
    /// Exactly one element, stored in the head itself
    Inline(u32),
    /// Pool position of the first entry of a terminated run
    Indirect(u32),
}

impl RelationList {
    /// Decode a packed `payload:24 | flags:8` head word
    pub fn decode(word: u32) -> Self {
        let payload = word & MAX_INDEX;
        let flags = word >> 24;

        if flags == LIST_TERMINATOR {
            RelationList::Inline(payload)
        } else if payload == EMPTY_PAYLOAD {
            RelationList::Empty
        } else {
            RelationList::Indirect(payload)
        }
    }

    pub fn encode(self) -> u32 {
        match self {
            RelationList::Empty => EMPTY_PAYLOAD,
            RelationList::Inline(index) => pack(index, LIST_TERMINATOR),
            RelationList::Indirect(ptr) => pack(ptr, 0),
        }
    }

    /// Point the head at an existing run starting at pool position `ptr`
    pub fn with_ptr(ptr: u32) -> Self {
        RelationList::Indirect(ptr)
    }

    /// Commit `items` as a new list.
    ///
    /// No items gives the empty list and a single item is stored inline
    /// unless `force_indirect` is set; otherwise the items are appended to
    /// `pool` as a terminated run.
    pub fn from_items(pool: &mut RecordArray<ListEntry>, items: &[u32], force_indirect: bool) -> Self {
        match items {
            [] => RelationList::Empty,
            [single] if !force_indirect => RelationList::Inline(checked(*single)),
            _ => {
                let ptr = checked(pool.len() as u32);
                let last = items.len() - 1;
                for (i, &item) in items.iter().enumerate() {
                    pool.push(&ListEntry {
                        data: checked(item),
                        last: i == last,
                    });
                }
                RelationList::Indirect(ptr)
            }
        }
    }

    pub fn is_empty(self) -> bool {
        self == RelationList::Empty
    }

    /// Iterate the elements, in insertion order
    pub fn iter(self, pool: &RecordArray<ListEntry>) -> ListIter<'_> {
        let state = match self {
            RelationList::Empty => IterState::Done,
            RelationList::Inline(index) => IterState::Inline(index),
            RelationList::Indirect(ptr) => IterState::Pool(ptr),
        };
        ListIter { pool, state }
    }

    /// Rewrite an inline element through `map`. Indirect runs are rewritten
    /// by [`remap_pool`].
    pub fn remap(&mut self, map: &[u32]) {
        if let RelationList::Inline(index) = self {
            *index = map[*index as usize];
        }
    }
}

/// One slot of a relation pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    pub data: u32,
    /// Set on the final entry of a run
    pub last: bool,
}

impl Record for ListEntry {
    const SIZE: usize = 4;

    fn decode(bytes: &[u8]) -> Self {
        let word = LittleEndian::read_u32(bytes);
        ListEntry {
            data: word & MAX_INDEX,
            last: (word >> 24) & LIST_TERMINATOR != 0,
        }
    }

    fn encode(&self, out: &mut [u8]) {
        let flags = if self.last { LIST_TERMINATOR } else { 0 };
        LittleEndian::write_u32(out, pack(self.data, flags));
    }
}

/// Iterator over a relation list
pub struct ListIter<'a> {
    pool: &'a RecordArray<ListEntry>,
    state: IterState,
}

enum IterState {
    Inline(u32),
    Pool(u32),
    Done,
}

impl Iterator for ListIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        match self.state {
            IterState::Done => None,
            IterState::Inline(index) => {
                self.state = IterState::Done;
                Some(index)
            }
            IterState::Pool(pos) => {
                // A pool that was not loaded (section omitted) reads as empty.
                let Some(entry) = self.pool.get(pos) else {
                    self.state = IterState::Done;
                    return None;
                };
                self.state = if entry.last {
                    IterState::Done
                } else {
                    IterState::Pool(pos + 1)
                };
                Some(entry.data)
            }
        }
    }
}

/// Rewrite every element stored in `pool` through `map`
pub fn remap_pool(pool: &mut RecordArray<ListEntry>, map: &[u32]) {
    for pos in 0..pool.len() as u32 {
        if let Some(mut entry) = pool.get(pos) {
            entry.data = checked(map[entry.data as usize]);
            pool.set(pos, &entry);
        }
    }
}

/// Sort the elements of every run in `pool` in place. Run boundaries and
/// terminator flags stay where they are.
pub fn sort_runs(pool: &mut RecordArray<ListEntry>) {
    let mut run = Vec::new();
    for pos in 0..pool.len() as u32 {
        let Some(entry) = pool.get(pos) else { break };
        run.push(entry.data);
        if entry.last {
            run.sort_unstable();
            let start = pos + 1 - run.len() as u32;
            for (i, &data) in run.iter().enumerate() {
                let last = i == run.len() - 1;
                pool.set(start + i as u32, &ListEntry { data, last });
            }
            run.clear();
        }
    }
}

pub(crate) fn pack(payload: u32, flags: u32) -> u32 {
    (payload & MAX_INDEX) | (flags << 24)
}

fn checked(value: u32) -> u32 {
    assert!(
        value < EMPTY_PAYLOAD,
        "relation index {} does not fit in 24 bits",
        value
    );
    value
}
