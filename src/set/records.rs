// src/set/records.rs

//! On-disk record types of a package set
//!
//! Each record is a run of little-endian `u32` words. Names of packages and
//! file entries share their word with an 8-bit flag field; relation list
//! heads are packed by [`RelationList`].

use crate::array::Record;
use crate::list::{MAX_INDEX, RelationList, pack};
use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use std::fmt;

/// Entry flag marking the final sibling of a directory run
pub const ENTRY_LAST: u8 = 0x80;

/// A package record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Package {
    /// Offset into the string pool (24 bits)
    pub name: u32,
    pub flags: u8,
    pub version: u32,
    pub arch: u32,
    /// Offsets into the details string pool
    pub summary: u32,
    pub description: u32,
    pub url: u32,
    pub license: u32,
    /// Property indices, pooled in `property_pool`
    pub properties: RelationList,
    /// File entry indices, pooled in `file_pool`
    pub files: RelationList,
}

impl Record for Package {
    const SIZE: usize = 36;

    fn decode(bytes: &[u8]) -> Self {
        let word = |i: usize| LittleEndian::read_u32(&bytes[i * 4..i * 4 + 4]);
        let head = word(0);
        Package {
            name: head & MAX_INDEX,
            flags: (head >> 24) as u8,
            version: word(1),
            arch: word(2),
            summary: word(3),
            description: word(4),
            url: word(5),
            license: word(6),
            properties: RelationList::decode(word(7)),
            files: RelationList::decode(word(8)),
        }
    }

    fn encode(&self, out: &mut [u8]) {
        let words = [
            pack(checked_name(self.name), u32::from(self.flags)),
            self.version,
            self.arch,
            self.summary,
            self.description,
            self.url,
            self.license,
            self.properties.encode(),
            self.files.encode(),
        ];
        LittleEndian::write_u32_into(&words, out);
    }
}

/// A property record: one distinct (name, flags, version) tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Property {
    pub name: u32,
    pub flags: PropertyFlags,
    pub version: u32,
    /// Packages carrying this property, pooled in `package_pool`
    pub packages: RelationList,
}

impl Record for Property {
    const SIZE: usize = 16;

    fn decode(bytes: &[u8]) -> Self {
        let word = |i: usize| LittleEndian::read_u32(&bytes[i * 4..i * 4 + 4]);
        Property {
            name: word(0),
            flags: PropertyFlags(word(1)),
            version: word(2),
            packages: RelationList::decode(word(3)),
        }
    }

    fn encode(&self, out: &mut [u8]) {
        let words = [self.name, self.flags.0, self.version, self.packages.encode()];
        LittleEndian::write_u32_into(&words, out);
    }
}

/// One path component of the file tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entry {
    /// Offset into the file string pool (24 bits)
    pub name: u32,
    pub flags: u8,
    /// Index of the first child, 0 when there are none
    pub start: u32,
    /// Packages owning this path, pooled in `package_pool`
    pub packages: RelationList,
}

impl Entry {
    pub fn is_last(&self) -> bool {
        self.flags & ENTRY_LAST != 0
    }

    pub fn has_children(&self) -> bool {
        self.start != 0
    }
}

impl Record for Entry {
    const SIZE: usize = 12;

    fn decode(bytes: &[u8]) -> Self {
        let word = |i: usize| LittleEndian::read_u32(&bytes[i * 4..i * 4 + 4]);
        let head = word(0);
        Entry {
            name: head & MAX_INDEX,
            flags: (head >> 24) as u8,
            start: word(1),
            packages: RelationList::decode(word(2)),
        }
    }

    fn encode(&self, out: &mut [u8]) {
        let words = [
            pack(checked_name(self.name), u32::from(self.flags)),
            self.start,
            self.packages.encode(),
        ];
        LittleEndian::write_u32_into(&words, out);
    }
}

fn checked_name(name: u32) -> u32 {
    assert!(name <= MAX_INDEX, "string pool offset {} does not fit in 24 bits", name);
    name
}

/// Version relation of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// No version constraint
    Any,
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Any => "",
            Relation::Less => "<",
            Relation::LessEqual => "<=",
            Relation::Equal => "=",
            Relation::GreaterEqual => ">=",
            Relation::Greater => ">",
        }
    }

    fn bits(self) -> u32 {
        match self {
            Relation::Any => 0,
            Relation::Less => PropertyFlags::LESS,
            Relation::LessEqual => PropertyFlags::LESS | PropertyFlags::EQUAL,
            Relation::Equal => PropertyFlags::EQUAL,
            Relation::GreaterEqual => PropertyFlags::GREATER | PropertyFlags::EQUAL,
            Relation::Greater => PropertyFlags::GREATER,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a property expresses about its packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Requires,
    Provides,
    Conflicts,
    Obsoletes,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Requires => "requires",
            PropertyKind::Provides => "provides",
            PropertyKind::Conflicts => "conflicts",
            PropertyKind::Obsoletes => "obsoletes",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packed property flags: relation bits and kind bits in disjoint masks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PropertyFlags(pub u32);

impl PropertyFlags {
    pub const LESS: u32 = 1 << 0;
    pub const GREATER: u32 = 1 << 1;
    pub const EQUAL: u32 = 1 << 2;
    pub const RELATION_MASK: u32 = Self::LESS | Self::GREATER | Self::EQUAL;

    pub const REQUIRES: u32 = 0 << 3;
    pub const PROVIDES: u32 = 1 << 3;
    pub const CONFLICTS: u32 = 2 << 3;
    pub const OBSOLETES: u32 = 3 << 3;
    pub const KIND_MASK: u32 = 3 << 3;

    pub fn new(kind: PropertyKind, relation: Relation) -> Self {
        let kind = match kind {
            PropertyKind::Requires => Self::REQUIRES,
            PropertyKind::Provides => Self::PROVIDES,
            PropertyKind::Conflicts => Self::CONFLICTS,
            PropertyKind::Obsoletes => Self::OBSOLETES,
        };
        PropertyFlags(kind | relation.bits())
    }

    pub fn kind(self) -> PropertyKind {
        match self.0 & Self::KIND_MASK {
            Self::REQUIRES => PropertyKind::Requires,
            Self::PROVIDES => PropertyKind::Provides,
            Self::CONFLICTS => PropertyKind::Conflicts,
            _ => PropertyKind::Obsoletes,
        }
    }

    /// Relation encoded in the flags. Bit patterns that name no relation
    /// (such as `<` and `>` together) read as [`Relation::Any`].
    pub fn relation(self) -> Relation {
        const LE: u32 = PropertyFlags::LESS | PropertyFlags::EQUAL;
        const GE: u32 = PropertyFlags::GREATER | PropertyFlags::EQUAL;

        match self.0 & Self::RELATION_MASK {
            Self::LESS => Relation::Less,
            LE => Relation::LessEqual,
            Self::EQUAL => Relation::Equal,
            GE => Relation::GreaterEqual,
            Self::GREATER => Relation::Greater,
            _ => Relation::Any,
        }
    }
}

/// A package field that can be requested through
/// [`PackageRef::details`](crate::set::PackageRef::details)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    Name,
    Version,
    Arch,
    Summary,
    Description,
    Url,
    License,
}

impl Detail {
    pub const ALL: [Detail; 7] = [
        Detail::Name,
        Detail::Version,
        Detail::Arch,
        Detail::Summary,
        Detail::Description,
        Detail::Url,
        Detail::License,
    ];
}
