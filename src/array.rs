// src/array.rs

//! Growable byte arrays and fixed-size record views
//!
//! Every table in a package set is an [`Array`]: a byte buffer that is either
//! owned (built by the importer or merger) or borrowed from a memory-mapped
//! file. Cross references are always offsets or indices into these arrays,
//! never pointers, so an array can be written to disk as-is and mapped back
//! without fix-ups.

use memmap2::Mmap;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

/// Smallest allocation made when an owned array first grows.
const MIN_ALLOC: usize = 64;

/// Backing storage of an [`Array`]
#[derive(Debug, Clone)]
enum Storage {
    Owned(Vec<u8>),
    Mapped { map: Arc<Mmap>, range: Range<usize> },
}

/// Append-only byte buffer, owned or aliasing a mapped file
#[derive(Debug, Clone)]
pub struct Array {
    storage: Storage,
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl Array {
    /// Create an empty owned array
    pub fn new() -> Self {
        Self {
            storage: Storage::Owned(Vec::new()),
        }
    }

    /// Wrap an already filled buffer
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            storage: Storage::Owned(data),
        }
    }

    /// Alias `range` of a mapped file. The array is read-only from now on.
    pub(crate) fn mapped(map: Arc<Mmap>, range: Range<usize>) -> Self {
        Self {
            storage: Storage::Mapped { map, range },
        }
    }

    /// Reserve `size` zeroed bytes at the end and return their byte offset.
    ///
    /// The offset stays valid for the lifetime of the array; slices obtained
    /// before the call do not.
    ///
    /// # Panics
    ///
    /// Panics if the array aliases a mapped file.
    pub fn add(&mut self, size: usize) -> usize {
        let data = self.owned_mut();
        let offset = data.len();
        let needed = offset + size;

        if needed > data.capacity() {
            let alloc = (data.capacity() * 2).max(needed).max(MIN_ALLOC);
            data.reserve_exact(alloc - offset);
        }
        data.resize(needed, 0);

        offset
    }

    /// Append `bytes` and return the offset they were written at
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let offset = self.add(bytes.len());
        self.owned_mut()[offset..].copy_from_slice(bytes);
        offset
    }

    /// Number of bytes in use
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes reserved; equal to `len` for mapped arrays
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Owned(data) => data.capacity(),
            Storage::Mapped { range, .. } => range.len(),
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.storage, Storage::Mapped { .. })
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(data) => data,
            Storage::Mapped { map, range } => &map[range.clone()],
        }
    }

    /// Mutable view of the bytes in use.
    ///
    /// # Panics
    ///
    /// Panics if the array aliases a mapped file.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.owned_mut()
    }

    fn owned_mut(&mut self) -> &mut Vec<u8> {
        match &mut self.storage {
            Storage::Owned(data) => data,
            Storage::Mapped { .. } => panic!("memory-mapped arrays are read-only"),
        }
    }
}

/// A fixed-size little-endian record stored in an [`Array`]
pub trait Record: Sized + Copy {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes
    fn decode(bytes: &[u8]) -> Self;

    /// Encode into exactly `SIZE` bytes
    fn encode(&self, out: &mut [u8]);
}

/// An [`Array`] interpreted as a homogeneous array of `T`
#[derive(Debug, Clone)]
pub struct RecordArray<T: Record> {
    array: Array,
    marker: PhantomData<T>,
}

impl<T: Record> Default for RecordArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> RecordArray<T> {
    pub fn new() -> Self {
        Self::from_array(Array::new())
    }

    /// View `array` as records. Trailing bytes that do not form a whole
    /// record are ignored; the file loader rejects such sections up front.
    pub fn from_array(array: Array) -> Self {
        Self {
            array,
            marker: PhantomData,
        }
    }

    /// Append a record and return its index
    pub fn push(&mut self, record: &T) -> u32 {
        let index = self.len() as u32;
        let offset = self.array.add(T::SIZE);
        record.encode(&mut self.array.as_bytes_mut()[offset..offset + T::SIZE]);
        index
    }

    /// Overwrite the record at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds or the array is mapped.
    pub fn set(&mut self, index: u32, record: &T) {
        let offset = index as usize * T::SIZE;
        record.encode(&mut self.array.as_bytes_mut()[offset..offset + T::SIZE]);
    }

    pub fn get(&self, index: u32) -> Option<T> {
        let offset = (index as usize).checked_mul(T::SIZE)?;
        self.array
            .as_bytes()
            .get(offset..offset + T::SIZE)
            .map(T::decode)
    }

    pub fn len(&self) -> usize {
        self.array.len() / T::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.array.as_bytes().chunks_exact(T::SIZE).map(T::decode)
    }

    pub fn array(&self) -> &Array {
        &self.array
    }

    pub fn array_mut(&mut self) -> &mut Array {
        &mut self.array
    }

    pub fn into_array(self) -> Array {
        self.array
    }
}

impl<T: Record> FromIterator<T> for RecordArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut records = Self::new();
        for record in iter {
            records.push(&record);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LittleEndian};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Pair(u32, u32);

    impl Record for Pair {
        const SIZE: usize = 8;

        fn decode(bytes: &[u8]) -> Self {
            Pair(
                LittleEndian::read_u32(&bytes[0..4]),
                LittleEndian::read_u32(&bytes[4..8]),
            )
        }

        fn encode(&self, out: &mut [u8]) {
            LittleEndian::write_u32(&mut out[0..4], self.0);
            LittleEndian::write_u32(&mut out[4..8], self.1);
        }
    }

    #[test]
    fn test_add_returns_stable_offsets() {
        let mut array = Array::new();
        assert_eq!(array.add(3), 0);
        assert_eq!(array.add(5), 3);
        assert_eq!(array.extend(b"abc"), 8);
        assert_eq!(array.len(), 11);
        assert_eq!(&array.as_bytes()[8..], b"abc");
        assert!(array.as_bytes()[..8].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_growth_is_geometric() {
        let mut array = Array::new();
        array.add(1);
        assert!(array.capacity() >= MIN_ALLOC);

        let mut reallocations = 0;
        let mut capacity = array.capacity();
        for _ in 0..10_000 {
            array.add(1);
            if array.capacity() != capacity {
                reallocations += 1;
                capacity = array.capacity();
            }
        }
        assert!(reallocations < 20, "{} reallocations", reallocations);
    }

    #[test]
    fn test_record_array_push_get_set() {
        let mut pairs = RecordArray::<Pair>::new();
        assert_eq!(pairs.push(&Pair(1, 2)), 0);
        assert_eq!(pairs.push(&Pair(3, 4)), 1);
        pairs.set(0, &Pair(9, 9));

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs.get(0), Some(Pair(9, 9)));
        assert_eq!(pairs.get(1), Some(Pair(3, 4)));
        assert_eq!(pairs.get(2), None);
        assert_eq!(pairs.iter().collect::<Vec<_>>(), vec![Pair(9, 9), Pair(3, 4)]);
    }

    #[test]
    fn test_record_array_ignores_partial_tail() {
        let pairs = RecordArray::<Pair>::from_array(Array::from_vec(vec![0; 12]));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.get(1), None);
    }
}
