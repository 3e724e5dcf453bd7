// src/set/query.rs

//! Read-only lookups over a finished set: the file tree, property
//! providers and unsatisfied requirements.

use super::records::{Entry, PropertyKind, Relation};
use super::{EntryRef, PackageRef, PackageSet, PropertyRef};
use crate::version::versioncmp;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

/// Iterator over the contiguous run of children of a directory entry
pub struct Children<'a> {
    set: &'a PackageSet,
    next: Option<u32>,
}

impl<'a> Children<'a> {
    pub(crate) fn new(set: &'a PackageSet, dir: &Entry) -> Self {
        Self {
            set,
            next: dir.has_children().then_some(dir.start),
        }
    }
}

impl<'a> Iterator for Children<'a> {
    type Item = EntryRef<'a>;

    fn next(&mut self) -> Option<EntryRef<'a>> {
        let entry = self.set.entry(self.next?)?;
        self.next = if entry.record().is_last() {
            None
        } else {
            Some(entry.index() + 1)
        };
        Some(entry)
    }
}

impl PackageSet {
    /// The root directory, absent when the file sections were not loaded
    pub fn root(&self) -> Option<EntryRef<'_>> {
        self.entry(0)
    }

    /// Resolve an absolute path to its entry. Empty components are ignored,
    /// so `/usr//bin/` finds `/usr/bin`.
    pub fn find_entry(&self, path: &str) -> Option<EntryRef<'_>> {
        let mut entry = self.root()?;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            entry = entry.children().find(|e| e.name() == component)?;
        }
        Some(entry)
    }

    /// Every path at or below `path`, in tree order
    pub fn list_files(&self, path: &str) -> Vec<String> {
        let Some(entry) = self.find_entry(path) else {
            return Vec::new();
        };

        let mut prefix = normalize(path);
        let mut paths = Vec::new();
        if entry.index() != 0 {
            paths.push(prefix.clone());
        }
        self.walk(entry, &mut prefix, &mut |_, path| paths.push(path.to_string()));
        paths
    }

    /// Packages owning `path`
    pub fn file_packages(&self, path: &str) -> Vec<PackageRef<'_>> {
        self.find_entry(path)
            .map(|entry| entry.packages().collect())
            .unwrap_or_default()
    }

    /// Packages with a provides property called `name`
    pub fn what_provides(&self, name: &str) -> Vec<PackageRef<'_>> {
        self.packages_with(name, PropertyKind::Provides)
    }

    /// Packages with a requires property called `name`
    pub fn what_requires(&self, name: &str) -> Vec<PackageRef<'_>> {
        self.packages_with(name, PropertyKind::Requires)
    }

    /// Requires properties that nothing in the set satisfies.
    ///
    /// A requirement is met by a provides property of the same name whose
    /// version falls in the required relation (an unversioned provide meets
    /// anything), by a package of that name and version, or, for absolute
    /// paths, by a file entry.
    pub fn unsatisfied_requires(&self) -> Vec<PropertyRef<'_>> {
        self.properties()
            .filter(|p| p.kind() == PropertyKind::Requires)
            .filter(|required| !self.is_satisfied(required))
            .collect()
    }

    fn is_satisfied(&self, required: &PropertyRef<'_>) -> bool {
        let name = required.name();
        let relation = required.relation();
        let version = required.version();

        if name.starts_with('/') && self.find_entry(name).is_some() {
            return true;
        }

        let provided = self
            .properties_named(name)
            .filter(|p| p.kind() == PropertyKind::Provides)
            .any(|p| satisfies(relation, version, p.version()));

        provided
            || self
                .find_packages(name)
                .any(|p| satisfies(relation, version, p.version()))
    }

    fn packages_with(&self, name: &str, kind: PropertyKind) -> Vec<PackageRef<'_>> {
        let indices: BTreeSet<u32> = self
            .properties_named(name)
            .filter(|p| p.kind() == kind)
            .flat_map(|p| p.packages().map(|pkg| pkg.index()))
            .collect();
        indices.into_iter().filter_map(|i| self.package(i)).collect()
    }

    /// Depth-first walk below `dir`, handing each entry its full path
    fn walk<'a>(
        &'a self,
        dir: EntryRef<'a>,
        prefix: &mut String,
        visit: &mut dyn FnMut(EntryRef<'a>, &str),
    ) {
        for child in dir.children() {
            let len = prefix.len();
            prefix.push('/');
            prefix.push_str(child.name());
            visit(child, prefix);
            if child.has_children() {
                self.walk(child, prefix, visit);
            }
            prefix.truncate(len);
        }
    }
}

impl PackageRef<'_> {
    /// Full paths of the files this package owns, in tree order
    pub fn file_paths(&self) -> Vec<String> {
        let owned: HashSet<u32> = self.files().collect();
        let set = self.set();
        let Some(root) = set.root() else {
            return Vec::new();
        };

        let mut paths = Vec::new();
        set.walk(root, &mut String::new(), &mut |entry, path| {
            if owned.contains(&entry.index()) {
                paths.push(path.to_string());
            }
        });
        paths
    }
}

/// Whether a provided version meets a required relation
fn satisfies(required: Relation, required_version: &str, provided_version: &str) -> bool {
    if required == Relation::Any || provided_version.is_empty() {
        return true;
    }

    match versioncmp(provided_version, required_version) {
        Ordering::Less => matches!(required, Relation::Less | Relation::LessEqual),
        Ordering::Equal => matches!(
            required,
            Relation::LessEqual | Relation::Equal | Relation::GreaterEqual
        ),
        Ordering::Greater => matches!(required, Relation::Greater | Relation::GreaterEqual),
    }
}

/// `/a//b/` to `/a/b`; the root is the empty string so children append cleanly
fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|c| !c.is_empty())
        .fold(String::new(), |mut out, c| {
            out.push('/');
            out.push_str(c);
            out
        })
}
