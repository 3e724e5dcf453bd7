// src/merger.rs

//! Merging package sets
//!
//! A [`Merger`] takes two input sets and builds a third from whichever of
//! their packages the driver hands to [`Merger::add_package`]. Strings of
//! both inputs are re-interned into shared pools, properties are
//! deduplicated across inputs and both file trees are coalesced by path, so
//! a directory present in both inputs becomes one entry.
//!
//! [`merge`] and [`update`] are the two drivers built on top of it.

use crate::assemble::Draft;
use crate::hashtable::{HashTable, pool_strings};
use crate::list::RelationList;
use crate::set::{EntryRef, Package, PackageRef, PackageSet};
use crate::tree::{ROOT, TreeBuilder};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ptr;
use tracing::debug;

/// Offset and index translation for one input set
#[derive(Debug)]
struct Source {
    strings: Vec<u32>,
    details: Vec<u32>,
    /// Input entry index to tree node
    entries: Vec<u32>,
}

impl Source {
    fn new(set: &PackageSet, draft: &mut Draft) -> Self {
        let strings = reintern(&mut draft.strings, set.string_pool.as_bytes());
        let details = reintern(&mut draft.details, set.details_string_pool.as_bytes());

        let mut entries = vec![ROOT; set.entry_count()];
        if let Some(root) = set.root() {
            graft(&mut draft.tree, &mut draft.file_strings, root, ROOT, &mut entries);
        }

        Self {
            strings,
            details,
            entries,
        }
    }

    fn string(&self, offset: u32) -> u32 {
        self.strings.get(offset as usize).copied().unwrap_or(0)
    }

    fn detail(&self, offset: u32) -> u32 {
        self.details.get(offset as usize).copied().unwrap_or(0)
    }
}

/// A package collected for the output, lists holding provisional ids
#[derive(Debug)]
struct Collected {
    record: Package,
    properties: Vec<u32>,
    files: Vec<u32>,
}

/// Merge context over two input sets
#[derive(Debug)]
pub struct Merger<'a> {
    inputs: [&'a PackageSet; 2],
    sources: [Source; 2],
    draft: Draft,
    packages: Vec<Collected>,
    identities: HashMap<(u32, u32, u32), usize>,
}

impl<'a> Merger<'a> {
    /// Start merging `set1` and `set2`. Passing the same set twice is fine.
    pub fn new(set1: &'a PackageSet, set2: &'a PackageSet) -> Self {
        let mut draft = Draft::new();
        let sources = [Source::new(set1, &mut draft), Source::new(set2, &mut draft)];
        debug!(
            "Merging sets of {} and {} packages ({} shared strings)",
            set1.package_count(),
            set2.package_count(),
            draft.strings.len()
        );

        Self {
            inputs: [set1, set2],
            sources,
            draft,
            packages: Vec::new(),
            identities: HashMap::new(),
        }
    }

    /// Include `package` in the output. A package with the same name,
    /// version and arch as one already added is folded into it, taking
    /// the union of both property and file lists.
    ///
    /// # Panics
    ///
    /// Panics if `package` belongs to neither input set.
    pub fn add_package(&mut self, package: PackageRef<'_>) {
        let side = self
            .inputs
            .iter()
            .position(|&input| ptr::eq(input, package.set()))
            .unwrap_or_else(|| panic!("package {} belongs to neither merge input", package));
        let source = &self.sources[side];
        let draft = &mut self.draft;

        let input = package.record();
        let record = Package {
            name: source.string(input.name),
            flags: input.flags,
            version: source.string(input.version),
            arch: source.string(input.arch),
            summary: source.detail(input.summary),
            description: source.detail(input.description),
            url: source.detail(input.url),
            license: source.detail(input.license),
            properties: RelationList::Empty,
            files: RelationList::Empty,
        };

        let identity = (record.name, record.version, record.arch);
        let slot = *self.identities.entry(identity).or_insert_with(|| {
            self.packages.push(Collected {
                record,
                properties: Vec::new(),
                files: Vec::new(),
            });
            self.packages.len() - 1
        });
        let collected = &mut self.packages[slot];

        for property in package.properties() {
            let property = property.record();
            let id = draft.property(
                source.string(property.name),
                property.flags,
                source.string(property.version),
            );
            collected.properties.push(id);
        }
        for entry in package.files() {
            if let Some(&node) = source.entries.get(entry as usize) {
                collected.files.push(node);
            }
        }
    }

    /// Number of distinct packages added so far
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Build the merged set
    pub fn finish(self) -> PackageSet {
        let mut draft = self.draft;
        for mut collected in self.packages {
            collected.properties.sort_unstable();
            collected.properties.dedup();
            collected.files.sort_unstable();
            collected.files.dedup();

            let mut record = collected.record;
            record.properties = RelationList::from_items(&mut draft.property_pool, &collected.properties, false);
            record.files = RelationList::from_items(&mut draft.file_pool, &collected.files, false);
            draft.packages.push(record);
        }
        draft.finish()
    }
}

/// Map every string of `pool` to its offset in `table`
fn reintern(table: &mut HashTable, pool: &[u8]) -> Vec<u32> {
    let mut map = vec![0; pool.len()];
    for (offset, string) in pool_strings(pool) {
        map[offset as usize] = table.insert(string);
    }
    map
}

/// Copy the subtree below `dir` under tree node `node`
fn graft(tree: &mut TreeBuilder, names: &mut HashTable, dir: EntryRef<'_>, node: u32, map: &mut [u32]) {
    for child in dir.children() {
        let name = names.insert(child.name());
        let child_node = tree.child(node, name);
        map[child.index() as usize] = child_node;
        if child.has_children() {
            graft(tree, names, child, child_node, map);
        }
    }
}

/// Union of two sets
pub fn merge(a: &PackageSet, b: &PackageSet) -> PackageSet {
    let mut merger = Merger::new(a, b);
    for package in a.packages().chain(b.packages()) {
        merger.add_package(package);
    }
    merger.finish()
}

/// Update `set` from `upstream`.
///
/// Each package named in `names` is replaced by the newest upstream
/// package of that name, or installed if `set` lacks it. With no names,
/// every package of `set` that upstream carries is replaced. Named packages
/// upstream does not carry are left alone.
pub fn update(set: &PackageSet, upstream: &PackageSet, names: &[&str]) -> PackageSet {
    // Packages are in version order, so the last of each name wins.
    let newest: BTreeMap<&str, PackageRef<'_>> = upstream.packages().map(|p| (p.name(), p)).collect();

    let selected: HashSet<&str> = if names.is_empty() {
        set.packages()
            .map(|p| p.name())
            .filter(|name| newest.contains_key(name))
            .collect()
    } else {
        names
            .iter()
            .copied()
            .filter(|name| newest.contains_key(name))
            .collect()
    };

    let mut merger = Merger::new(set, upstream);
    for package in set.packages().filter(|p| !selected.contains(p.name())) {
        merger.add_package(package);
    }
    for (_, &package) in newest.iter().filter(|(name, _)| selected.contains(*name)) {
        merger.add_package(package);
    }
    debug!("Updated {} package names", selected.len());
    merger.finish()
}
