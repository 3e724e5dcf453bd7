// src/diff.rs

//! Differences between package sets and the install steps they imply

use crate::set::{PackageRef, PackageSet};
use crate::version::versioncmp;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// What moving from one set to another does to a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAction {
    /// Only in the upstream set
    Add,
    /// Only in the current set
    Remove,
}

impl DiffAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffAction::Add => "add",
            DiffAction::Remove => "remove",
        }
    }
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Walk `set` and `upstream` side by side, reporting every package that
/// differs by name or version.
///
/// Both sets must be sorted by name then version, which every set built
/// by this crate is. Packages equal in name and version are skipped; arch
/// is not compared. Callbacks arrive in merged name/version order.
pub fn diff<'a, F>(set: &'a PackageSet, upstream: &'a PackageSet, mut callback: F)
where
    F: FnMut(DiffAction, PackageRef<'a>),
{
    let mut ours = set.packages().peekable();
    let mut theirs = upstream.packages().peekable();

    loop {
        let order = match (ours.peek(), theirs.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a
                .name()
                .cmp(b.name())
                .then_with(|| versioncmp(a.version(), b.version())),
        };

        match order {
            Ordering::Less => {
                if let Some(package) = ours.next() {
                    callback(DiffAction::Remove, package);
                }
            }
            Ordering::Greater => {
                if let Some(package) = theirs.next() {
                    callback(DiffAction::Add, package);
                }
            }
            Ordering::Equal => {
                ours.next();
                theirs.next();
            }
        }
    }
}

/// Direction of an install step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallAction {
    Add,
    Remove,
}

impl fmt::Display for InstallAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallAction::Add => "install",
            InstallAction::Remove => "remove",
        })
    }
}

/// One step of a transaction. `package.set()` is the set the package
/// comes from: the next set for additions, the current one for removals.
#[derive(Debug, Clone, Copy)]
pub struct InstallStep<'a> {
    pub action: InstallAction,
    pub package: PackageRef<'a>,
}

/// The steps that turn `set` into `next`.
///
/// Steps come out in diff order (by package name, then version). They are
/// not reordered for dependencies: a package may be added before the
/// packages it requires.
#[derive(Debug)]
pub struct InstallIterator<'a> {
    steps: std::vec::IntoIter<InstallStep<'a>>,
}

impl<'a> InstallIterator<'a> {
    pub fn new(set: &'a PackageSet, next: &'a PackageSet) -> Self {
        let mut steps = Vec::new();
        diff(set, next, |action, package| {
            let action = match action {
                DiffAction::Add => InstallAction::Add,
                DiffAction::Remove => InstallAction::Remove,
            };
            steps.push(InstallStep { action, package });
        });
        Self {
            steps: steps.into_iter(),
        }
    }
}

impl<'a> Iterator for InstallIterator<'a> {
    type Item = InstallStep<'a>;

    fn next(&mut self) -> Option<InstallStep<'a>> {
        self.steps.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.steps.size_hint()
    }
}

impl ExactSizeIterator for InstallIterator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::Importer;

    fn build(packages: &[(&str, &str, &str)]) -> PackageSet {
        let mut importer = Importer::new();
        for (name, version, arch) in packages {
            importer.begin_package(name, version);
            importer.set_arch(arch);
            importer.finish_package();
        }
        importer.finish()
    }

    fn diff_list(set: &PackageSet, upstream: &PackageSet) -> Vec<String> {
        let mut out = Vec::new();
        diff(set, upstream, |action, package| {
            out.push(format!("{} {}-{}", action, package.name(), package.version()))
        });
        out
    }

    #[test]
    fn test_identical_sets() {
        let a = build(&[("bash", "5.2", "x86_64"), ("zsh", "5.9", "x86_64")]);
        assert!(diff_list(&a, &a).is_empty());
    }

    #[test]
    fn test_new_package_is_single_add() {
        let a = build(&[("foo", "1.0", "")]);
        let b = build(&[("bar", "2.0", ""), ("foo", "1.0", "")]);
        assert_eq!(diff_list(&a, &b), vec!["add bar-2.0"]);
    }

    #[test]
    fn test_upgrade_removes_before_adding() {
        let a = build(&[("foo", "1.0", "")]);
        let b = build(&[("foo", "2.0", "")]);
        assert_eq!(diff_list(&a, &b), vec!["remove foo-1.0", "add foo-2.0"]);
    }

    #[test]
    fn test_upgrade_and_new() {
        let set = build(&[("bash", "5.1", "x86_64"), ("vim", "9.0", "x86_64")]);
        let upstream = build(&[
            ("bash", "5.2", "x86_64"),
            ("nano", "7.2", "x86_64"),
            ("vim", "9.0", "x86_64"),
        ]);
        assert_eq!(
            diff_list(&set, &upstream),
            vec!["remove bash-5.1", "add bash-5.2", "add nano-7.2"]
        );
    }

    #[test]
    fn test_empty_sides() {
        let empty = PackageSet::new();
        let set = build(&[("a", "1", ""), ("b", "1", "")]);
        assert_eq!(diff_list(&set, &empty), vec!["remove a-1", "remove b-1"]);
        assert_eq!(diff_list(&empty, &set), vec!["add a-1", "add b-1"]);
        assert!(diff_list(&empty, &empty).is_empty());
    }

    #[test]
    fn test_versions_compare_numerically() {
        let set = build(&[("kernel", "6.10", "")]);
        let upstream = build(&[("kernel", "6.9", "")]);
        assert_eq!(diff_list(&set, &upstream), vec!["add kernel-6.9", "remove kernel-6.10"]);
    }

    #[test]
    fn test_arch_is_ignored() {
        let set = build(&[("bash", "5.2", "i686")]);
        let upstream = build(&[("bash", "5.2", "x86_64")]);
        assert!(diff_list(&set, &upstream).is_empty());
    }

    #[test]
    fn test_install_iterator_sources() {
        let set = build(&[("bash", "5.1", ""), ("old", "1", "")]);
        let next = build(&[("bash", "5.2", ""), ("new", "1", "")]);

        let steps = InstallIterator::new(&set, &next);
        assert_eq!(steps.len(), 4);
        let steps: Vec<(InstallAction, String, bool)> = steps
            .map(|s| {
                let from_next = std::ptr::eq(s.package.set(), &next);
                (s.action, s.package.to_string(), from_next)
            })
            .collect();
        assert_eq!(
            steps,
            vec![
                (InstallAction::Remove, "bash-5.1".to_string(), false),
                (InstallAction::Add, "bash-5.2".to_string(), true),
                (InstallAction::Add, "new-1".to_string(), true),
                (InstallAction::Remove, "old-1".to_string(), false),
            ]
        );
    }
}
