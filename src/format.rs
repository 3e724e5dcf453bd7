// src/format.rs

//! Binary section format
//!
//! A set file is laid out as
//!
//! ```text
//! header    magic, version, section count        (3 x u32)
//! sections  name offset, file offset, byte size  (3 x u32 each)
//! names     NUL-terminated section names, padded to 4 bytes
//! data      each section's bytes, padded to 4 bytes
//! ```
//!
//! All integers are little-endian. Sections are matched by name against a
//! fixed table, so a file may carry any subset of them and readers skip
//! names they do not know. Opening maps the file and points each array at
//! its bytes; nothing is parsed beyond the section table.

use crate::array::{Array, Record};
use crate::error::{Error, Result};
use crate::hashtable::{HashTable, pool_str};
use crate::list::ListEntry;
use crate::set::{Backing, Entry, Package, PackageSet, Property};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::{BitOr, Range};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File magic, "RZDB"
pub const RAZOR_MAGIC: u32 = 0x525A_4442;

/// Current format version
pub const RAZOR_VERSION: u32 = 1;

const HEADER_SIZE: usize = 12;
const SECTION_SIZE: usize = 12;
const PADDING: [u8; 4] = [0; 4];

/// Groups of sections that can be written or omitted together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionMask(u32);

impl SectionMask {
    /// Packages, properties and the relations between them
    pub const MAIN: SectionMask = SectionMask(1 << 0);
    /// The file tree and file ownership
    pub const FILES: SectionMask = SectionMask(1 << 1);
    /// Summaries, descriptions, urls and licenses
    pub const DETAILS: SectionMask = SectionMask(1 << 2);
    pub const ALL: SectionMask = SectionMask(0b111);
    pub const NONE: SectionMask = SectionMask(0);

    pub fn contains(self, other: SectionMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: SectionMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Parse a category name: `main`, `files`, `details` or `all`
    pub fn from_name(name: &str) -> Option<SectionMask> {
        match name {
            "main" => Some(Self::MAIN),
            "files" => Some(Self::FILES),
            "details" => Some(Self::DETAILS),
            "all" => Some(Self::ALL),
            _ => None,
        }
    }
}

impl BitOr for SectionMask {
    type Output = SectionMask;

    fn bitor(self, rhs: SectionMask) -> SectionMask {
        SectionMask(self.0 | rhs.0)
    }
}

/// The arrays of a set that can be stored as sections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionId {
    StringPool,
    Packages,
    Properties,
    PackagePool,
    PropertyPool,
    Files,
    FilePool,
    FileStringPool,
    DetailsStringPool,
}

impl SectionId {
    /// Record size for record sections, `None` for byte pools
    fn record_size(self) -> Option<usize> {
        match self {
            SectionId::Packages => Some(Package::SIZE),
            SectionId::Properties => Some(Property::SIZE),
            SectionId::Files => Some(Entry::SIZE),
            SectionId::PackagePool | SectionId::PropertyPool | SectionId::FilePool => {
                Some(ListEntry::SIZE)
            }
            SectionId::StringPool | SectionId::FileStringPool | SectionId::DetailsStringPool => {
                None
            }
        }
    }
}

/// Entry of the fixed section table
#[derive(Debug, Clone, Copy)]
pub struct SectionIndex {
    pub name: &'static str,
    pub id: SectionId,
    pub category: SectionMask,
}

/// Every section a set file can hold, in the order they are written
pub const SECTIONS: [SectionIndex; 9] = [
    section("string_pool", SectionId::StringPool, SectionMask::MAIN),
    section("packages", SectionId::Packages, SectionMask::MAIN),
    section("properties", SectionId::Properties, SectionMask::MAIN),
    section("package_pool", SectionId::PackagePool, SectionMask::MAIN),
    section("property_pool", SectionId::PropertyPool, SectionMask::MAIN),
    section("files", SectionId::Files, SectionMask::FILES),
    section("file_pool", SectionId::FilePool, SectionMask::FILES),
    section("file_string_pool", SectionId::FileStringPool, SectionMask::FILES),
    section("details_string_pool", SectionId::DetailsStringPool, SectionMask::DETAILS),
];

const fn section(name: &'static str, id: SectionId, category: SectionMask) -> SectionIndex {
    SectionIndex { name, id, category }
}

fn padding(size: usize) -> usize {
    size.wrapping_neg() & 3
}

fn align(size: usize) -> usize {
    size + padding(size)
}

impl PackageSet {
    /// Write the sections selected by `mask` to `path`
    pub fn write(&self, path: impl AsRef<Path>, mask: SectionMask) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer, mask)?;
        writer.flush()?;

        info!("Wrote package set to {}", path.display());
        Ok(())
    }

    /// Serialize the sections selected by `mask`
    pub fn write_to<W: Write>(&self, writer: &mut W, mask: SectionMask) -> Result<()> {
        // Names go first so every section knows its name offset.
        let mut names = HashTable::new();
        let selected: Vec<(u32, &Array)> = SECTIONS
            .iter()
            .filter(|s| mask.intersects(s.category))
            .map(|s| (names.tokenize(Some(s.name)), self.section(s.id)))
            .collect();
        let name_pool = names.into_pool();

        let mut offset =
            HEADER_SIZE + selected.len() * SECTION_SIZE + align(name_pool.len());
        let mut table = Vec::with_capacity(selected.len());
        for (name, array) in &selected {
            table.push([*name, to_u32(offset)?, to_u32(array.len())?]);
            offset += align(array.len());
        }
        to_u32(offset)?;

        writer.write_u32::<LittleEndian>(RAZOR_MAGIC)?;
        writer.write_u32::<LittleEndian>(RAZOR_VERSION)?;
        writer.write_u32::<LittleEndian>(selected.len() as u32)?;
        for words in &table {
            for &word in words {
                writer.write_u32::<LittleEndian>(word)?;
            }
        }
        writer.write_all(name_pool.as_bytes())?;
        writer.write_all(&PADDING[..padding(name_pool.len())])?;

        for (_, array) in &selected {
            writer.write_all(array.as_bytes())?;
            writer.write_all(&PADDING[..padding(array.len())])?;
        }

        debug!("Wrote {} sections, {} bytes", selected.len(), offset);
        Ok(())
    }

    /// Map `path` read-only and use its sections in place
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut set = PackageSet::unbound(Backing::Mapped(Vec::new()));
        set.bind_sections(path)?;
        Ok(set)
    }

    /// Map another file into this set. Sections it carries replace the ones
    /// bound so far, which lets a set be assembled from a main file plus
    /// separately distributed file lists or details.
    pub fn bind_sections(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let Backing::Mapped(regions) = &self.backing else {
            return Err(Error::MixedStorage);
        };

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SetNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if file.metadata()?.len() < HEADER_SIZE as u64 {
            return Err(Error::Corrupt(format!(
                "{} is shorter than the header",
                path.display()
            )));
        }

        // SAFETY: the map is read-only and private to this process. Set
        // files are replaced by writing a new file, never edited in place.
        let map = Arc::new(unsafe { Mmap::map(&file)? });
        let sections = parse_sections(&map)?;

        let mut regions = regions.clone();
        regions.push(Arc::clone(&map));
        for (id, range) in sections {
            *self.section_mut(id) = Array::mapped(Arc::clone(&map), range);
        }
        self.backing = Backing::Mapped(regions);

        info!("Mapped package set from {}", path.display());
        Ok(())
    }

    /// Read `path` fully into owned arrays
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SetNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut set = PackageSet::unbound(Backing::Owned);
        for (id, range) in parse_sections(&bytes)? {
            *set.section_mut(id) = Array::from_vec(bytes[range].to_vec());
        }

        info!("Loaded package set from {}", path.display());
        Ok(set)
    }
}

/// Validate the header and section table of a set file and resolve every
/// known section to its byte range
fn parse_sections(bytes: &[u8]) -> Result<Vec<(SectionId, Range<usize>)>> {
    let header = bytes
        .get(..HEADER_SIZE)
        .ok_or_else(|| Error::Corrupt("file is shorter than the header".to_string()))?;
    let word = |bytes: &[u8], i: usize| LittleEndian::read_u32(&bytes[i * 4..i * 4 + 4]);

    let magic = word(header, 0);
    if magic != RAZOR_MAGIC {
        return Err(Error::BadMagic { found: magic });
    }
    let version = word(header, 1);
    if version != RAZOR_VERSION {
        return Err(Error::UnsupportedVersion { found: version });
    }
    let count = word(header, 2) as usize;

    let table_end = count
        .checked_mul(SECTION_SIZE)
        .and_then(|n| n.checked_add(HEADER_SIZE))
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| Error::Corrupt(format!("section table of {} entries is truncated", count)))?;
    let table = &bytes[HEADER_SIZE..table_end];
    let names = &bytes[table_end..];

    let mut sections = Vec::with_capacity(count);
    for raw in table.chunks_exact(SECTION_SIZE) {
        let name = pool_str(names, word(raw, 0))
            .ok_or_else(|| Error::Corrupt("section name outside the name pool".to_string()))?;
        let start = word(raw, 1) as usize;
        let size = word(raw, 2) as usize;

        let Some(index) = SECTIONS.iter().find(|s| s.name == name) else {
            warn!("Skipping unknown section '{}'", name);
            continue;
        };

        let end = start
            .checked_add(size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| Error::Corrupt(format!("section '{}' extends past end of file", name)))?;
        if let Some(record) = index.id.record_size() {
            if size % record != 0 {
                return Err(Error::Corrupt(format!(
                    "section '{}' is {} bytes, not a multiple of {}",
                    name, size, record
                )));
            }
        }
        if index.id == SectionId::Files {
            check_tree(&bytes[start..end])?;
        }

        debug!("Section '{}': {} bytes at offset {}", name, size, start);
        sections.push((index.id, start..end));
    }

    Ok(sections)
}

/// Every directory's children must start after it and inside the section,
/// so walking the tree always moves forward and ends.
fn check_tree(files: &[u8]) -> Result<()> {
    let count = files.len() / Entry::SIZE;
    for (index, raw) in files.chunks_exact(Entry::SIZE).enumerate() {
        let entry = Entry::decode(raw);
        if entry.has_children() && (entry.start as usize <= index || entry.start as usize >= count) {
            return Err(Error::Corrupt(format!(
                "file entry {} has children at {} of {}",
                index, entry.start, count
            )));
        }
    }
    Ok(())
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::Corrupt(format!("{} bytes exceed the 4 GiB format limit", value)))
}
