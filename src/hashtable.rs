// src/hashtable.rs

//! String interning
//!
//! Strings are stored once, NUL-terminated, in a byte pool; the byte offset
//! of a string is its identity. The bucket array is an open-addressed table
//! of pool offsets with linear probing. Nothing is ever removed, so no
//! tombstones are needed.

use crate::array::Array;
use memchr::memchr;

/// Bucket value for an unused slot
const EMPTY_BUCKET: u32 = u32::MAX;

const INITIAL_BUCKETS: usize = 16;

/// Interning table that owns the pool it appends to
#[derive(Debug, Clone)]
pub struct HashTable {
    buckets: Vec<u32>,
    count: usize,
    pool: Array,
}

impl Default for HashTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HashTable {
    /// Create a table over a fresh pool
    pub fn new() -> Self {
        Self {
            buckets: vec![EMPTY_BUCKET; INITIAL_BUCKETS],
            count: 0,
            pool: Array::new(),
        }
    }

    /// Intern `key`, returning the pool offset of its single copy
    ///
    /// # Panics
    ///
    /// Panics if `key` contains a NUL byte, which the pool uses as its
    /// terminator.
    pub fn insert(&mut self, key: &str) -> u32 {
        assert!(
            memchr(0, key.as_bytes()).is_none(),
            "interned string {:?} contains a NUL byte",
            key
        );
        if let Some(offset) = self.lookup(key) {
            return offset;
        }

        // Keep the load factor at or below one half.
        if (self.count + 1) * 2 > self.buckets.len() {
            self.grow();
        }

        let offset = self.pool.len() as u32;
        self.pool.extend(key.as_bytes());
        self.pool.extend(&[0]);

        let slot = self.free_slot(key.as_bytes());
        self.buckets[slot] = offset;
        self.count += 1;

        offset
    }

    /// Find the offset of `key` without interning it
    pub fn lookup(&self, key: &str) -> Option<u32> {
        let key = key.as_bytes();
        let mask = self.buckets.len() - 1;
        let mut slot = hash(key) as usize & mask;

        loop {
            let offset = self.buckets[slot];
            if offset == EMPTY_BUCKET {
                return None;
            }
            if pool_bytes(self.pool.as_bytes(), offset) == Some(key) {
                return Some(offset);
            }
            slot = (slot + 1) & mask;
        }
    }

    /// Intern an optional string; `None` interns as the empty string
    pub fn tokenize(&mut self, string: Option<&str>) -> u32 {
        self.insert(string.unwrap_or(""))
    }

    /// Number of distinct strings interned
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// String stored at `offset`
    pub fn get(&self, offset: u32) -> Option<&str> {
        pool_str(self.pool.as_bytes(), offset)
    }

    pub fn pool(&self) -> &Array {
        &self.pool
    }

    /// Release the buckets and keep the pool
    pub fn into_pool(self) -> Array {
        self.pool
    }

    fn free_slot(&self, key: &[u8]) -> usize {
        let mask = self.buckets.len() - 1;
        let mut slot = hash(key) as usize & mask;
        while self.buckets[slot] != EMPTY_BUCKET {
            slot = (slot + 1) & mask;
        }
        slot
    }

    fn grow(&mut self) {
        let doubled = vec![EMPTY_BUCKET; self.buckets.len() * 2];
        let old = std::mem::replace(&mut self.buckets, doubled);
        for offset in old.into_iter().filter(|&o| o != EMPTY_BUCKET) {
            let key = pool_bytes(self.pool.as_bytes(), offset).unwrap_or_default();
            let slot = self.free_slot(key);
            self.buckets[slot] = offset;
        }
    }
}

/// FNV-1a
fn hash(key: &[u8]) -> u32 {
    key.iter().fold(0x811c_9dc5_u32, |h, &b| {
        (h ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}

/// Bytes of the NUL-terminated string starting at `offset`
pub(crate) fn pool_bytes(pool: &[u8], offset: u32) -> Option<&[u8]> {
    let tail = pool.get(offset as usize..)?;
    let end = memchr(0, tail)?;
    Some(&tail[..end])
}

/// The NUL-terminated UTF-8 string starting at `offset`
pub(crate) fn pool_str(pool: &[u8], offset: u32) -> Option<&str> {
    pool_bytes(pool, offset).and_then(|bytes| std::str::from_utf8(bytes).ok())
}

/// Walk a pool string by string, yielding `(offset, string)`
pub(crate) fn pool_strings(pool: &[u8]) -> impl Iterator<Item = (u32, &str)> {
    let mut offset = 0usize;
    std::iter::from_fn(move || {
        while offset < pool.len() {
            let start = offset;
            let end = memchr(0, &pool[start..]).map_or(pool.len(), |n| start + n);
            offset = end + 1;
            if let Ok(string) = std::str::from_utf8(&pool[start..end]) {
                return Some((start as u32, string));
            }
        }
        None
    })
}
