// src/assemble.rs

//! Finalization shared by the importer and the merger
//!
//! Both builders accumulate a [`Draft`]: interned strings, packages whose
//! relation lists point at provisional property and tree node ids, and a
//! [`TreeBuilder`]. [`Draft::finish`] sorts everything into its final order,
//! rewrites the lists to the new indices and fills in the back references
//! from properties and files to the packages that carry them.

use crate::array::RecordArray;
use crate::hashtable::HashTable;
use crate::list::{ListEntry, RelationList, remap_pool, sort_runs};
use crate::set::{Backing, Package, PackageSet, Property, PropertyFlags};
use crate::tree::TreeBuilder;
use crate::version::versioncmp;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug)]
pub(crate) struct Draft {
    pub strings: HashTable,
    pub details: HashTable,
    pub file_strings: HashTable,
    /// Packages with lists into `property_pool` and `file_pool`, in any
    /// order. Every list holds distinct ids.
    pub packages: Vec<Package>,
    /// Properties in first-seen order, without package lists
    pub properties: Vec<Property>,
    pub property_pool: RecordArray<ListEntry>,
    /// Holds tree node ids until [`Draft::finish`] maps them to entries
    pub file_pool: RecordArray<ListEntry>,
    pub tree: TreeBuilder,
    property_ids: HashMap<(u32, PropertyFlags, u32), u32>,
}

impl Draft {
    pub(crate) fn new() -> Self {
        let mut draft = Self {
            strings: HashTable::new(),
            details: HashTable::new(),
            file_strings: HashTable::new(),
            packages: Vec::new(),
            properties: Vec::new(),
            property_pool: RecordArray::new(),
            file_pool: RecordArray::new(),
            tree: TreeBuilder::new(),
            property_ids: HashMap::new(),
        };
        // Offset 0 of every pool is the empty string.
        draft.strings.insert("");
        draft.details.insert("");
        draft.file_strings.insert("");
        draft
    }

    /// Provisional id of the property `(name, flags, version)`, created on
    /// first use. Arguments are offsets into `strings`.
    pub(crate) fn property(&mut self, name: u32, flags: PropertyFlags, version: u32) -> u32 {
        let next = self.properties.len() as u32;
        let id = *self.property_ids.entry((name, flags, version)).or_insert(next);
        if id == next {
            self.properties.push(Property {
                name,
                flags,
                version,
                packages: RelationList::Empty,
            });
        }
        id
    }

    /// Sort, remap and cross-link everything into a finished set
    pub(crate) fn finish(mut self) -> PackageSet {
        let property_order = self.sort_properties();
        let property_map = inverse(&property_order);
        remap_pool(&mut self.property_pool, &property_map);
        sort_runs(&mut self.property_pool);
        for package in &mut self.packages {
            package.properties.remap(&property_map);
        }

        let mut keep = vec![false; self.tree.len()];
        for package in &self.packages {
            for node in package.files.iter(&self.file_pool) {
                keep[node as usize] = true;
            }
        }
        let (mut entries, entry_map) = self.tree.emit(self.file_strings.pool().as_bytes(), &keep);
        remap_pool(&mut self.file_pool, &entry_map);
        sort_runs(&mut self.file_pool);
        for package in &mut self.packages {
            package.files.remap(&entry_map);
        }

        let package_order = self.sort_packages();
        let packages: Vec<Package> = package_order
            .iter()
            .map(|&i| self.packages[i as usize])
            .collect();

        // Packages are visited in final order, so every back-reference
        // list comes out sorted.
        let mut property_owners = vec![Vec::new(); self.properties.len()];
        let mut entry_owners = vec![Vec::new(); entries.len()];
        for (index, package) in packages.iter().enumerate() {
            for property in package.properties.iter(&self.property_pool) {
                property_owners[property as usize].push(index as u32);
            }
            for entry in package.files.iter(&self.file_pool) {
                entry_owners[entry as usize].push(index as u32);
            }
        }

        let mut package_pool = RecordArray::new();
        let properties: RecordArray<Property> = property_order
            .iter()
            .zip(&property_owners)
            .map(|(&old, owners)| Property {
                packages: RelationList::from_items(&mut package_pool, owners, false),
                ..self.properties[old as usize]
            })
            .collect();
        for (entry, owners) in entries.iter_mut().zip(&entry_owners) {
            entry.packages = RelationList::from_items(&mut package_pool, owners, false);
        }

        debug!(
            "Assembled set: {} packages, {} properties, {} file entries",
            packages.len(),
            properties.len(),
            entries.len()
        );

        PackageSet {
            string_pool: self.strings.into_pool(),
            packages: packages.into_iter().collect(),
            properties,
            files: entries.into_iter().collect(),
            package_pool,
            property_pool: self.property_pool,
            file_pool: self.file_pool,
            file_string_pool: self.file_strings.into_pool(),
            details_string_pool: self.details.into_pool(),
            backing: Backing::Owned,
        }
    }

    /// Provisional property ids in final order: name, flags, then version
    fn sort_properties(&self) -> Vec<u32> {
        let string = |offset: u32| self.strings.get(offset).unwrap_or("");
        let mut order: Vec<u32> = (0..self.properties.len() as u32).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (&self.properties[a as usize], &self.properties[b as usize]);
            string(a.name)
                .cmp(string(b.name))
                .then(a.flags.cmp(&b.flags))
                .then_with(|| versioncmp(string(a.version), string(b.version)))
        });
        order
    }

    /// Package positions in final order: name, version, then arch
    fn sort_packages(&self) -> Vec<u32> {
        let string = |offset: u32| self.strings.get(offset).unwrap_or("");
        let mut order: Vec<u32> = (0..self.packages.len() as u32).collect();
        order.sort_by(|&a, &b| compare_packages(&self.packages[a as usize], &self.packages[b as usize], string));
        order
    }
}

fn compare_packages<'a>(a: &Package, b: &Package, string: impl Fn(u32) -> &'a str) -> Ordering {
    string(a.name)
        .cmp(string(b.name))
        .then_with(|| versioncmp(string(a.version), string(b.version)))
        .then_with(|| string(a.arch).cmp(string(b.arch)))
}

/// Turn "position to old id" into "old id to position"
fn inverse(order: &[u32]) -> Vec<u32> {
    let mut map = vec![0; order.len()];
    for (position, &old) in order.iter().enumerate() {
        map[old as usize] = position as u32;
    }
    map
}
