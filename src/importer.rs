// src/importer.rs

//! Building package sets
//!
//! The [`Importer`] is fed one package at a time:
//!
//! ```
//! use razor::importer::Importer;
//!
//! let mut importer = Importer::new();
//! importer.begin_package("bash", "5.2.26-1");
//! importer.set_arch("x86_64");
//! importer.add_requires("glibc", "2.38");
//! importer.add_provides("sh", "");
//! importer.add_file("/usr/bin/bash");
//! importer.finish_package();
//!
//! let set = importer.finish();
//! assert_eq!(set.package_count(), 1);
//! ```
//!
//! Strings and properties are deduplicated as they arrive; ordering,
//! index assignment and the file tree layout are settled in
//! [`Importer::finish`]. Every string passed in must be free of NUL bytes;
//! one that is not panics in [`HashTable::insert`](crate::hashtable::HashTable::insert).

use crate::assemble::Draft;
use crate::list::RelationList;
use crate::set::{Package, PackageSet, PropertyFlags, PropertyKind, Relation};
use tracing::{debug, warn};

/// Incremental builder for a [`PackageSet`]
#[derive(Debug)]
pub struct Importer {
    draft: Draft,
    current: Option<OpenPackage>,
}

/// The package between `begin_package` and `finish_package`
#[derive(Debug)]
struct OpenPackage {
    record: Package,
    properties: Vec<u32>,
    files: Vec<u32>,
}

impl Default for Importer {
    fn default() -> Self {
        Self::new()
    }
}

impl Importer {
    pub fn new() -> Self {
        Self {
            draft: Draft::new(),
            current: None,
        }
    }

    /// Start a package. An empty version is stored as the empty string.
    ///
    /// # Panics
    ///
    /// Panics if the previous package was not finished, or if `name` or
    /// `version` contains a NUL byte.
    pub fn begin_package(&mut self, name: &str, version: &str) {
        if let Some(open) = &self.current {
            panic!(
                "begin_package({}) while package {} is still open",
                name,
                self.draft.strings.get(open.record.name).unwrap_or("")
            );
        }

        let record = Package {
            name: self.draft.strings.insert(name),
            version: self.draft.strings.insert(version),
            ..Package::default()
        };
        self.current = Some(OpenPackage {
            record,
            properties: Vec::new(),
            files: Vec::new(),
        });
    }

    /// # Panics
    ///
    /// Panics outside `begin_package`/`finish_package`.
    pub fn set_arch(&mut self, arch: &str) {
        let arch = self.draft.strings.insert(arch);
        self.open("set_arch").record.arch = arch;
    }

    /// Descriptive fields, kept in the details pool
    ///
    /// # Panics
    ///
    /// Panics outside `begin_package`/`finish_package`.
    pub fn set_details(&mut self, summary: &str, description: &str, url: &str, license: &str) {
        let details = &mut self.draft.details;
        let [summary, description, url, license] =
            [summary, description, url, license].map(|s| details.insert(s));

        let record = &mut self.open("set_details").record;
        record.summary = summary;
        record.description = description;
        record.url = url;
        record.license = license;
    }

    /// Attach a property to the open package. Identical properties are
    /// shared between packages and recorded once per package.
    ///
    /// # Panics
    ///
    /// Panics outside `begin_package`/`finish_package`.
    pub fn add_property(&mut self, name: &str, relation: Relation, kind: PropertyKind, version: &str) {
        self.open("add_property");
        let name = self.draft.strings.insert(name);
        let version = self.draft.strings.insert(version);
        let id = self.draft.property(name, PropertyFlags::new(kind, relation), version);
        self.open("add_property").properties.push(id);
    }

    /// Require `name`, at least at `version` when one is given
    pub fn add_requires(&mut self, name: &str, version: &str) {
        let relation = versioned(version, Relation::GreaterEqual);
        self.add_property(name, relation, PropertyKind::Requires, version);
    }

    /// Provide `name`, exactly at `version` when one is given
    pub fn add_provides(&mut self, name: &str, version: &str) {
        let relation = versioned(version, Relation::Equal);
        self.add_property(name, relation, PropertyKind::Provides, version);
    }

    pub fn add_conflicts(&mut self, name: &str, relation: Relation, version: &str) {
        self.add_property(name, relation, PropertyKind::Conflicts, version);
    }

    pub fn add_obsoletes(&mut self, name: &str, relation: Relation, version: &str) {
        self.add_property(name, relation, PropertyKind::Obsoletes, version);
    }

    /// Record that the open package owns `path`. Missing parent directories
    /// are created; they are not owned unless added themselves.
    ///
    /// # Panics
    ///
    /// Panics outside `begin_package`/`finish_package`.
    pub fn add_file(&mut self, path: &str) {
        self.open("add_file");
        let draft = &mut self.draft;
        match draft.tree.insert_path(&mut draft.file_strings, path) {
            Some(node) => self.open("add_file").files.push(node),
            None => warn!("Ignoring file path without components: {:?}", path),
        }
    }

    /// Commit the open package
    ///
    /// # Panics
    ///
    /// Panics if no package is open.
    pub fn finish_package(&mut self) {
        let Some(mut open) = self.current.take() else {
            panic!("finish_package called without begin_package");
        };

        open.properties.sort_unstable();
        open.properties.dedup();
        open.files.sort_unstable();
        open.files.dedup();

        let draft = &mut self.draft;
        open.record.properties = RelationList::from_items(&mut draft.property_pool, &open.properties, false);
        open.record.files = RelationList::from_items(&mut draft.file_pool, &open.files, false);
        draft.packages.push(open.record);
    }

    /// Number of packages committed so far
    pub fn package_count(&self) -> usize {
        self.draft.packages.len()
    }

    /// Sort and link everything into a finished set
    ///
    /// # Panics
    ///
    /// Panics if a package is still open.
    pub fn finish(self) -> PackageSet {
        assert!(
            self.current.is_none(),
            "finish called with a package still open"
        );
        debug!(
            "Importer finishing {} packages, {} properties",
            self.draft.packages.len(),
            self.draft.properties.len()
        );
        self.draft.finish()
    }

    fn open(&mut self, call: &str) -> &mut OpenPackage {
        match self.current.as_mut() {
            Some(open) => open,
            None => panic!("{} called outside begin_package/finish_package", call),
        }
    }
}

fn versioned(version: &str, relation: Relation) -> Relation {
    if version.is_empty() {
        Relation::Any
    } else {
        relation
    }
}
