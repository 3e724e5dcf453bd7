// tests/integration_test.rs

//! Integration tests for razor
//!
//! These tests build sets, persist them and read them back through the
//! public API only.

use razor::diff::{DiffAction, InstallAction, InstallIterator, diff};
use razor::importer::Importer;
use razor::merger::{merge, update};
use razor::set::{Detail, PropertyKind};
use razor::{Error, PackageSet, SectionMask};
use tempfile::TempDir;

fn system_set() -> PackageSet {
    let mut importer = Importer::new();

    importer.begin_package("bash", "5.2.26-1");
    importer.set_arch("x86_64");
    importer.set_details("The GNU Bourne Again shell", "Bash is a shell", "https://www.gnu.org/software/bash", "GPLv3+");
    importer.add_requires("glibc", "2.38");
    importer.add_requires("libtinfo.so.6", "");
    importer.add_provides("bash", "5.2.26-1");
    importer.add_provides("/bin/sh", "");
    importer.add_file("/usr/bin/bash");
    importer.add_file("/usr/bin/sh");
    importer.add_file("/etc/skel/.bashrc");
    importer.finish_package();

    importer.begin_package("glibc", "2.38-14");
    importer.set_arch("x86_64");
    importer.set_details("The GNU libc libraries", "", "https://www.gnu.org/software/libc", "LGPLv2+");
    importer.add_provides("glibc", "2.38-14");
    importer.add_provides("libc.so.6", "");
    importer.add_file("/usr/lib64/libc.so.6");
    importer.add_file("/etc/ld.so.conf");
    importer.finish_package();

    importer.begin_package("ncurses-libs", "6.4-7");
    importer.set_arch("x86_64");
    importer.add_requires("glibc", "");
    importer.add_provides("libtinfo.so.6", "");
    importer.add_file("/usr/lib64/libtinfo.so.6");
    importer.finish_package();

    importer.begin_package("vim-minimal", "9.0-1");
    importer.set_arch("x86_64");
    importer.add_requires("libgpm.so.2", "");
    importer.add_requires("glibc", "");
    importer.add_file("/usr/bin/vi");
    importer.finish_package();

    importer.finish()
}

fn upstream_set() -> PackageSet {
    let mut importer = Importer::new();
    for (name, version, files) in [
        ("bash", "5.2.32-1", &["/usr/bin/bash", "/usr/bin/sh"][..]),
        ("glibc", "2.38-14", &["/usr/lib64/libc.so.6", "/etc/ld.so.conf"][..]),
        ("gpm-libs", "1.20-3", &["/usr/lib64/libgpm.so.2"][..]),
        ("ncurses-libs", "6.4-7", &["/usr/lib64/libtinfo.so.6"][..]),
    ] {
        importer.begin_package(name, version);
        importer.set_arch("x86_64");
        importer.add_provides(name, version);
        if name == "gpm-libs" {
            importer.add_provides("libgpm.so.2", "");
        }
        for file in files {
            importer.add_file(file);
        }
        importer.finish_package();
    }
    importer.finish()
}

fn listing(set: &PackageSet) -> Vec<String> {
    set.packages().map(|p| p.to_string()).collect()
}

/// Every directory's children form one sorted run ending in the last flag,
/// and each `start` points past its parent.
fn assert_tree_well_formed(set: &PackageSet) {
    let root = set.root().expect("file tree loaded");
    let mut pending = vec![root];
    let mut seen = 1;
    while let Some(dir) = pending.pop() {
        let children: Vec<_> = dir.children().collect();
        if children.is_empty() {
            assert!(!dir.has_children());
            continue;
        }
        assert!(dir.record().start > dir.index());
        for pair in children.windows(2) {
            assert!(pair[0].name() < pair[1].name());
            assert_eq!(pair[0].index() + 1, pair[1].index());
            assert!(!pair[0].record().is_last());
        }
        assert!(children.last().unwrap().record().is_last());
        seen += children.len();
        pending.extend(children.into_iter().filter(|c| c.has_children()));
    }
    assert_eq!(seen, set.entry_count());
}

#[test]
fn test_write_and_open_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("system.rzdb");
    let built = system_set();
    built.write(&path, SectionMask::ALL).unwrap();

    let opened = PackageSet::open(&path).unwrap();
    assert!(opened.is_mapped());
    assert_eq!(listing(&opened), listing(&built));
    assert_eq!(opened.property_count(), built.property_count());
    assert_eq!(opened.entry_count(), built.entry_count());
    assert_eq!(opened.list_files("/"), built.list_files("/"));

    let bash = opened.find_package("bash").unwrap();
    assert_eq!(bash.arch(), "x86_64");
    assert_eq!(bash.detail(Detail::License), Some("GPLv3+"));
    assert_eq!(
        bash.file_paths(),
        vec!["/etc/skel/.bashrc", "/usr/bin/bash", "/usr/bin/sh"]
    );
    let requires: Vec<String> = bash
        .properties()
        .filter(|p| p.kind() == PropertyKind::Requires)
        .map(|p| p.to_string())
        .collect();
    assert_eq!(requires, vec!["glibc >= 2.38", "libtinfo.so.6"]);
    assert_tree_well_formed(&opened);

    // Every array, back-references included, survives unchanged.
    let mut expected = Vec::new();
    let mut actual = Vec::new();
    built.write_to(&mut expected, SectionMask::ALL).unwrap();
    opened.write_to(&mut actual, SectionMask::ALL).unwrap();
    assert_eq!(actual, expected);
}

#[test]
fn test_load_matches_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("system.rzdb");
    system_set().write(&path, SectionMask::ALL).unwrap();

    let mapped = PackageSet::open(&path).unwrap();
    let loaded = PackageSet::load(&path).unwrap();
    assert!(!loaded.is_mapped());
    assert_eq!(listing(&loaded), listing(&mapped));
    assert_eq!(loaded.list_files("/usr"), mapped.list_files("/usr"));

    // A loaded set is owned, so it can be rewritten byte for byte.
    let mut first = Vec::new();
    let mut second = Vec::new();
    mapped.write_to(&mut first, SectionMask::ALL).unwrap();
    loaded.write_to(&mut second, SectionMask::ALL).unwrap();
    assert_eq!(first, second);

    let mut built = Vec::new();
    system_set().write_to(&mut built, SectionMask::ALL).unwrap();
    assert_eq!(second, built);
}

#[test]
fn test_main_only_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("main.rzdb");
    system_set().write(&path, SectionMask::MAIN).unwrap();

    let set = PackageSet::open(&path).unwrap();
    assert_eq!(set.package_count(), 4);
    assert!(set.root().is_none());
    assert!(set.list_files("/").is_empty());
    assert!(set.file_packages("/usr/bin/bash").is_empty());

    let bash = set.find_package("bash").unwrap();
    assert_eq!(bash.detail(Detail::Summary), None);
    assert_eq!(bash.detail(Detail::Version), Some("5.2.26-1"));
    assert!(bash.file_paths().is_empty());
}

#[test]
fn test_bind_split_sections() {
    let dir = TempDir::new().unwrap();
    let main = dir.path().join("main.rzdb");
    let files = dir.path().join("files.rzdb");
    let details = dir.path().join("details.rzdb");
    let built = system_set();
    built.write(&main, SectionMask::MAIN).unwrap();
    built.write(&files, SectionMask::FILES).unwrap();
    built.write(&details, SectionMask::DETAILS).unwrap();

    let mut set = PackageSet::open(&main).unwrap();
    set.bind_sections(&files).unwrap();
    set.bind_sections(&details).unwrap();

    assert_eq!(set.list_files("/"), built.list_files("/"));
    let owners: Vec<String> = set
        .file_packages("/usr/lib64/libc.so.6")
        .iter()
        .map(|p| p.to_string())
        .collect();
    assert_eq!(owners, vec!["glibc-2.38-14.x86_64"]);
    assert_eq!(
        set.find_package("glibc").unwrap().detail(Detail::Url),
        Some("https://www.gnu.org/software/libc")
    );
}

#[test]
fn test_open_errors() {
    let dir = TempDir::new().unwrap();

    let missing = dir.path().join("missing.rzdb");
    assert!(matches!(PackageSet::open(&missing), Err(Error::SetNotFound(_))));
    assert!(matches!(PackageSet::load(&missing), Err(Error::SetNotFound(_))));

    let garbage = dir.path().join("garbage.rzdb");
    std::fs::write(&garbage, b"this is not a package set at all").unwrap();
    assert!(matches!(PackageSet::open(&garbage), Err(Error::BadMagic { .. })));

    let short = dir.path().join("short.rzdb");
    std::fs::write(&short, b"RZ").unwrap();
    assert!(matches!(PackageSet::open(&short), Err(Error::Corrupt(_))));

    let mut owned = system_set();
    let path = dir.path().join("files.rzdb");
    owned.write(&path, SectionMask::FILES).unwrap();
    assert!(matches!(owned.bind_sections(&path), Err(Error::MixedStorage)));
}

#[test]
fn test_queries() {
    let set = system_set();

    let providers: Vec<&str> = set.what_provides("libtinfo.so.6").iter().map(|p| p.name()).collect();
    assert_eq!(providers, vec!["ncurses-libs"]);

    let glibc_users: Vec<&str> = set.what_requires("glibc").iter().map(|p| p.name()).collect();
    assert_eq!(glibc_users, vec!["bash", "ncurses-libs", "vim-minimal"]);

    let unsatisfied: Vec<String> = set
        .unsatisfied_requires()
        .iter()
        .map(|p| p.to_string())
        .collect();
    assert_eq!(unsatisfied, vec!["libgpm.so.2"]);

    assert_eq!(
        set.list_files("/etc"),
        vec!["/etc", "/etc/ld.so.conf", "/etc/skel", "/etc/skel/.bashrc"]
    );
    assert!(set.find_entry("/usr/bin/").is_some());
    assert!(set.find_entry("/usr/sbin").is_none());
    assert_tree_well_formed(&set);
}

#[test]
fn test_diff_against_upstream() {
    let set = system_set();
    let upstream = upstream_set();

    let mut actions = Vec::new();
    diff(&set, &upstream, |action, package| {
        let marker = if action == DiffAction::Add { '+' } else { '-' };
        actions.push(format!("{}{}", marker, package));
    });
    assert_eq!(
        actions,
        vec![
            "-bash-5.2.26-1.x86_64",
            "+bash-5.2.32-1.x86_64",
            "+gpm-libs-1.20-3.x86_64",
            "-vim-minimal-9.0-1.x86_64",
        ]
    );
}

#[test]
fn test_install_iterator_over_mapped_sets() {
    let dir = TempDir::new().unwrap();
    let current = dir.path().join("current.rzdb");
    let next = dir.path().join("next.rzdb");
    system_set().write(&current, SectionMask::ALL).unwrap();
    upstream_set().write(&next, SectionMask::ALL).unwrap();

    let current = PackageSet::open(&current).unwrap();
    let next = PackageSet::open(&next).unwrap();
    let steps: Vec<(InstallAction, String)> = InstallIterator::new(&current, &next)
        .map(|step| {
            let expected = match step.action {
                InstallAction::Add => &next,
                InstallAction::Remove => &current,
            };
            assert!(std::ptr::eq(step.package.set(), expected));
            (step.action, step.package.name().to_string())
        })
        .collect();

    assert_eq!(
        steps,
        vec![
            (InstallAction::Remove, "bash".to_string()),
            (InstallAction::Add, "bash".to_string()),
            (InstallAction::Add, "gpm-libs".to_string()),
            (InstallAction::Remove, "vim-minimal".to_string()),
        ]
    );
}

#[test]
fn test_merge_with_itself_is_identity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("system.rzdb");
    system_set().write(&path, SectionMask::ALL).unwrap();
    let set = PackageSet::open(&path).unwrap();

    let merged = merge(&set, &set);
    assert_eq!(listing(&merged), listing(&set));
    assert_eq!(merged.property_count(), set.property_count());
    assert_eq!(merged.entry_count(), set.entry_count());
    assert_eq!(merged.list_files("/"), set.list_files("/"));
    assert_eq!(
        merged.find_package("bash").unwrap().detail(Detail::Summary),
        Some("The GNU Bourne Again shell")
    );

    let mut changes = 0;
    diff(&set, &merged, |_, _| changes += 1);
    assert_eq!(changes, 0);
    assert_tree_well_formed(&merged);
}

#[test]
fn test_merge_coalesces_trees() {
    let merged = merge(&system_set(), &upstream_set());

    assert_eq!(
        listing(&merged),
        vec![
            "bash-5.2.26-1.x86_64",
            "bash-5.2.32-1.x86_64",
            "glibc-2.38-14.x86_64",
            "gpm-libs-1.20-3.x86_64",
            "ncurses-libs-6.4-7.x86_64",
            "vim-minimal-9.0-1.x86_64",
        ]
    );
    let lib64 = merged.find_entry("/usr/lib64").unwrap();
    let libs: Vec<&str> = lib64.children().map(|e| e.name()).collect();
    assert_eq!(libs, vec!["libc.so.6", "libgpm.so.2", "libtinfo.so.6"]);

    let owners: Vec<String> = merged
        .file_packages("/usr/bin/bash")
        .iter()
        .map(|p| p.version().to_string())
        .collect();
    assert_eq!(owners, vec!["5.2.26-1", "5.2.32-1"]);
    assert!(merged.unsatisfied_requires().is_empty());
    assert_tree_well_formed(&merged);
}

#[test]
fn test_update_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("updated.rzdb");

    let set = system_set();
    let upstream = upstream_set();
    update(&set, &upstream, &["bash", "gpm-libs"])
        .write(&path, SectionMask::ALL)
        .unwrap();

    let updated = PackageSet::open(&path).unwrap();
    assert_eq!(
        listing(&updated),
        vec![
            "bash-5.2.32-1.x86_64",
            "glibc-2.38-14.x86_64",
            "gpm-libs-1.20-3.x86_64",
            "ncurses-libs-6.4-7.x86_64",
            "vim-minimal-9.0-1.x86_64",
        ]
    );
    // The old bash owned /etc/skel; the new one does not.
    assert!(updated.find_entry("/etc/skel").is_none());
    assert!(updated.unsatisfied_requires().is_empty());
    assert_tree_well_formed(&updated);
}
