// src/set/mod.rs

//! Package sets
//!
//! A [`PackageSet`] holds every package, property and file entry of one
//! package database in nine flat arrays. All cross references are indices
//! or pool offsets, so the same structure works whether the arrays are
//! owned (built by the importer or merger) or borrowed from a mapped file.
//!
//! Read access goes through the borrowed views [`PackageRef`],
//! [`PropertyRef`] and [`EntryRef`]; a finished set is never mutated.

mod query;
pub mod records;

pub use query::Children;
pub use records::{
    Detail, ENTRY_LAST, Entry, Package, Property, PropertyFlags, PropertyKind, Relation,
};

use crate::array::{Array, RecordArray};
use crate::format::SectionId;
use crate::hashtable::pool_str;
use crate::list::{ListEntry, RelationList};
use memmap2::Mmap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Where the arrays of a set live
#[derive(Debug, Clone)]
pub(crate) enum Backing {
    /// Heap buffers built in this process
    Owned,
    /// Read-only regions of one or more mapped files
    Mapped(Vec<Arc<Mmap>>),
}

/// A complete package database
#[derive(Debug, Clone)]
pub struct PackageSet {
    pub(crate) string_pool: Array,
    pub(crate) packages: RecordArray<Package>,
    pub(crate) properties: RecordArray<Property>,
    pub(crate) files: RecordArray<Entry>,
    pub(crate) package_pool: RecordArray<ListEntry>,
    pub(crate) property_pool: RecordArray<ListEntry>,
    pub(crate) file_pool: RecordArray<ListEntry>,
    pub(crate) file_string_pool: Array,
    pub(crate) details_string_pool: Array,
    pub(crate) backing: Backing,
}

impl Default for PackageSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageSet {
    /// Create an empty, owned set: no packages and a bare root directory
    pub fn new() -> Self {
        let mut set = Self::unbound(Backing::Owned);
        for pool in [
            &mut set.string_pool,
            &mut set.file_string_pool,
            &mut set.details_string_pool,
        ] {
            pool.extend(&[0]);
        }
        set.files.push(&Entry {
            name: 0,
            flags: ENTRY_LAST,
            start: 0,
            packages: RelationList::Empty,
        });
        set
    }

    /// A set with every array empty, waiting for sections to be bound
    pub(crate) fn unbound(backing: Backing) -> Self {
        Self {
            string_pool: Array::new(),
            packages: RecordArray::new(),
            properties: RecordArray::new(),
            files: RecordArray::new(),
            package_pool: RecordArray::new(),
            property_pool: RecordArray::new(),
            file_pool: RecordArray::new(),
            file_string_pool: Array::new(),
            details_string_pool: Array::new(),
            backing,
        }
    }

    /// Whether the arrays alias mapped files rather than owned buffers
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    pub(crate) fn section(&self, id: SectionId) -> &Array {
        match id {
            SectionId::StringPool => &self.string_pool,
            SectionId::Packages => self.packages.array(),
            SectionId::Properties => self.properties.array(),
            SectionId::PackagePool => self.package_pool.array(),
            SectionId::PropertyPool => self.property_pool.array(),
            SectionId::Files => self.files.array(),
            SectionId::FilePool => self.file_pool.array(),
            SectionId::FileStringPool => &self.file_string_pool,
            SectionId::DetailsStringPool => &self.details_string_pool,
        }
    }

    pub(crate) fn section_mut(&mut self, id: SectionId) -> &mut Array {
        match id {
            SectionId::StringPool => &mut self.string_pool,
            SectionId::Packages => self.packages.array_mut(),
            SectionId::Properties => self.properties.array_mut(),
            SectionId::PackagePool => self.package_pool.array_mut(),
            SectionId::PropertyPool => self.property_pool.array_mut(),
            SectionId::Files => self.files.array_mut(),
            SectionId::FilePool => self.file_pool.array_mut(),
            SectionId::FileStringPool => &mut self.file_string_pool,
            SectionId::DetailsStringPool => &mut self.details_string_pool,
        }
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Number of file tree entries, including the root
    pub fn entry_count(&self) -> usize {
        self.files.len()
    }

    pub fn package(&self, index: u32) -> Option<PackageRef<'_>> {
        let record = self.packages.get(index)?;
        Some(PackageRef {
            set: self,
            index,
            record,
        })
    }

    /// All packages, sorted by name then version
    pub fn packages(&self) -> impl Iterator<Item = PackageRef<'_>> {
        (0..self.packages.len() as u32).filter_map(move |i| self.package(i))
    }

    /// All packages called `name`, in version order
    pub fn find_packages<'a>(&'a self, name: &str) -> impl Iterator<Item = PackageRef<'a>> {
        let start = self.partition_packages(|p| p.name() < name);
        (start..self.packages.len() as u32)
            .filter_map(move |i| self.package(i))
            .take_while(move |p| p.name() == name)
    }

    /// First package called `name`
    pub fn find_package(&self, name: &str) -> Option<PackageRef<'_>> {
        self.find_packages(name).next()
    }

    pub fn property(&self, index: u32) -> Option<PropertyRef<'_>> {
        let record = self.properties.get(index)?;
        Some(PropertyRef {
            set: self,
            index,
            record,
        })
    }

    /// All properties, sorted by name, flags and version
    pub fn properties(&self) -> impl Iterator<Item = PropertyRef<'_>> {
        (0..self.properties.len() as u32).filter_map(move |i| self.property(i))
    }

    /// Properties called `name`, of any kind
    pub fn properties_named<'a>(&'a self, name: &str) -> impl Iterator<Item = PropertyRef<'a>> {
        let start = self.partition_properties(|p| p.name() < name);
        (start..self.properties.len() as u32)
            .filter_map(move |i| self.property(i))
            .take_while(move |p| p.name() == name)
    }

    pub fn entry(&self, index: u32) -> Option<EntryRef<'_>> {
        let record = self.files.get(index)?;
        Some(EntryRef {
            set: self,
            index,
            record,
        })
    }

    /// String from the identity pool; an offset that resolves to nothing
    /// reads as the empty string
    pub(crate) fn string(&self, offset: u32) -> &str {
        pool_str(self.string_pool.as_bytes(), offset).unwrap_or("")
    }

    pub(crate) fn file_string(&self, offset: u32) -> &str {
        pool_str(self.file_string_pool.as_bytes(), offset).unwrap_or("")
    }

    /// String from the details pool, `None` when details were not loaded
    pub(crate) fn details_string(&self, offset: u32) -> Option<&str> {
        pool_str(self.details_string_pool.as_bytes(), offset)
    }

    fn partition_packages(&self, pred: impl Fn(&PackageRef<'_>) -> bool) -> u32 {
        let (mut lo, mut hi) = (0u32, self.packages.len() as u32);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.package(mid) {
                Some(p) if pred(&p) => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }

    fn partition_properties(&self, pred: impl Fn(&PropertyRef<'_>) -> bool) -> u32 {
        let (mut lo, mut hi) = (0u32, self.properties.len() as u32);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.property(mid) {
                Some(p) if pred(&p) => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }
}

/// A package borrowed from a set
#[derive(Clone, Copy)]
pub struct PackageRef<'a> {
    set: &'a PackageSet,
    index: u32,
    record: Package,
}

impl<'a> PackageRef<'a> {
    /// The set this package lives in
    pub fn set(&self) -> &'a PackageSet {
        self.set
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn record(&self) -> &Package {
        &self.record
    }

    pub fn name(&self) -> &'a str {
        self.set.string(self.record.name)
    }

    pub fn version(&self) -> &'a str {
        self.set.string(self.record.version)
    }

    pub fn arch(&self) -> &'a str {
        self.set.string(self.record.arch)
    }

    /// One field of the package. Descriptive fields are `None` when the set
    /// was opened without its details section.
    pub fn detail(&self, detail: Detail) -> Option<&'a str> {
        match detail {
            Detail::Name => Some(self.name()),
            Detail::Version => Some(self.version()),
            Detail::Arch => Some(self.arch()),
            Detail::Summary => self.set.details_string(self.record.summary),
            Detail::Description => self.set.details_string(self.record.description),
            Detail::Url => self.set.details_string(self.record.url),
            Detail::License => self.set.details_string(self.record.license),
        }
    }

    /// Several fields at once
    pub fn details(&self, requested: &[Detail]) -> BTreeMap<Detail, Option<&'a str>> {
        requested.iter().map(|&d| (d, self.detail(d))).collect()
    }

    pub fn properties(&self) -> impl Iterator<Item = PropertyRef<'a>> + use<'a> {
        let set = self.set;
        self.record
            .properties
            .iter(&set.property_pool)
            .filter_map(move |i| set.property(i))
    }

    /// Indices of the file entries this package owns
    pub fn files(&self) -> impl Iterator<Item = u32> + use<'a> {
        self.record.files.iter(&self.set.file_pool)
    }
}

impl fmt::Debug for PackageRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageRef")
            .field("index", &self.index)
            .field("name", &self.name())
            .field("version", &self.version())
            .field("arch", &self.arch())
            .finish()
    }
}

impl fmt::Display for PackageRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name(), self.version())?;
        if !self.arch().is_empty() {
            write!(f, ".{}", self.arch())?;
        }
        Ok(())
    }
}

/// A property borrowed from a set
#[derive(Clone, Copy)]
pub struct PropertyRef<'a> {
    set: &'a PackageSet,
    index: u32,
    record: Property,
}

impl<'a> PropertyRef<'a> {
    pub fn set(&self) -> &'a PackageSet {
        self.set
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn record(&self) -> &Property {
        &self.record
    }

    pub fn name(&self) -> &'a str {
        self.set.string(self.record.name)
    }

    pub fn version(&self) -> &'a str {
        self.set.string(self.record.version)
    }

    pub fn flags(&self) -> PropertyFlags {
        self.record.flags
    }

    pub fn kind(&self) -> PropertyKind {
        self.record.flags.kind()
    }

    pub fn relation(&self) -> Relation {
        self.record.flags.relation()
    }

    /// Packages carrying this property
    pub fn packages(&self) -> impl Iterator<Item = PackageRef<'a>> + use<'a> {
        let set = self.set;
        self.record
            .packages
            .iter(&set.package_pool)
            .filter_map(move |i| set.package(i))
    }
}

impl fmt::Debug for PropertyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRef")
            .field("index", &self.index)
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("relation", &self.relation())
            .field("version", &self.version())
            .finish()
    }
}

impl fmt::Display for PropertyRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        if self.relation() != Relation::Any {
            write!(f, " {} {}", self.relation(), self.version())?;
        }
        Ok(())
    }
}

/// A file tree entry borrowed from a set
#[derive(Clone, Copy)]
pub struct EntryRef<'a> {
    set: &'a PackageSet,
    index: u32,
    record: Entry,
}

impl<'a> EntryRef<'a> {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn record(&self) -> &Entry {
        &self.record
    }

    /// This path component, without any directory prefix
    pub fn name(&self) -> &'a str {
        self.set.file_string(self.record.name)
    }

    pub fn has_children(&self) -> bool {
        self.record.has_children()
    }

    pub fn children(&self) -> Children<'a> {
        Children::new(self.set, &self.record)
    }

    /// Packages owning exactly this path
    pub fn packages(&self) -> impl Iterator<Item = PackageRef<'a>> + use<'a> {
        let set = self.set;
        self.record
            .packages
            .iter(&set.package_pool)
            .filter_map(move |i| set.package(i))
    }
}

impl fmt::Debug for EntryRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryRef")
            .field("index", &self.index)
            .field("name", &self.name())
            .field("start", &self.record.start)
            .field("last", &self.record.is_last())
            .finish()
    }
}
