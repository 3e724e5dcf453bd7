// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use razor::diff::{DiffAction, InstallIterator, diff};
use razor::merger::{merge, update};
use razor::set::{Detail, PackageRef, PropertyKind};
use razor::{PackageSet, SectionMask};
use serde::Serialize;
use tracing::info;

const DEFAULT_SET: &str = "/var/lib/razor/system.rzdb";

#[derive(Parser)]
#[command(name = "razor")]
#[command(author, version, about = "Query, merge and compare memory-mapped package sets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show set statistics
    Info {
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List packages
    List {
        /// Only packages whose name contains this
        pattern: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List what a package requires
    Requires {
        /// Package name
        package: String,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List what a package provides
    Provides {
        /// Package name
        package: String,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List packages requiring a property
    WhatRequires {
        /// Property name
        name: String,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List packages providing a property
    WhatProvides {
        /// Property name
        name: String,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List files at or below a path
    Files {
        /// Directory to list
        #[arg(default_value = "/")]
        path: String,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List packages owning a path
    FilePackages {
        /// Absolute path
        path: String,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List the files of a package
    PackageFiles {
        /// Package name
        package: String,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List requirements nothing in the set provides
    Unsatisfied {
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// Show packages that differ from another set
    Diff {
        /// Set to compare against
        upstream: String,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// List the steps that turn the set into another
    InstallOrder {
        /// Target set
        next: String,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
    },
    /// Write the union of two sets
    Merge {
        /// First input set
        first: String,
        /// Second input set
        second: String,
        /// Where to write the resulting set
        #[arg(short, long)]
        output: String,
        /// Section categories to write (main, files, details)
        #[arg(long, default_value = "main,files,details", value_parser = parse_sections)]
        sections: SectionMask,
    },
    /// Update packages from an upstream set
    Update {
        /// Upstream set
        upstream: String,
        /// Package names (updates all if omitted)
        packages: Vec<String>,
        /// Package set file
        #[arg(short, long, default_value = DEFAULT_SET)]
        set: String,
        /// Where to write the resulting set
        #[arg(short, long)]
        output: String,
        /// Section categories to write (main, files, details)
        #[arg(long, default_value = "main,files,details", value_parser = parse_sections)]
        sections: SectionMask,
    },
    /// Rewrite a set keeping only some section categories
    Strip {
        /// Input set
        input: String,
        /// Where to write the resulting set
        #[arg(short, long)]
        output: String,
        /// Section categories to write (main, files, details)
        #[arg(long, default_value = "main,files,details", value_parser = parse_sections)]
        sections: SectionMask,
    },
}

/// One row of `list --json`
#[derive(Serialize)]
struct PackageRow<'a> {
    name: &'a str,
    version: &'a str,
    arch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
}

impl<'a> From<PackageRef<'a>> for PackageRow<'a> {
    fn from(package: PackageRef<'a>) -> Self {
        Self {
            name: package.name(),
            version: package.version(),
            arch: package.arch(),
            summary: package.detail(Detail::Summary).filter(|s| !s.is_empty()),
        }
    }
}

/// Parse a comma separated list of section categories
fn parse_sections(list: &str) -> std::result::Result<SectionMask, String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .try_fold(SectionMask::NONE, |mask, name| {
            SectionMask::from_name(name)
                .map(|category| mask | category)
                .ok_or_else(|| format!("unknown section category '{}'", name))
        })
}

fn find_package<'a>(set: &'a PackageSet, name: &str) -> Result<PackageRef<'a>> {
    set.find_package(name)
        .ok_or_else(|| anyhow::anyhow!("Package '{}' not found", name))
}

fn print_properties(set: &PackageSet, package: &str, kind: PropertyKind) -> Result<()> {
    let package = find_package(set, package)?;
    for property in package.properties().filter(|p| p.kind() == kind) {
        println!("{}", property);
    }
    Ok(())
}

fn print_packages(packages: &[PackageRef<'_>]) {
    for package in packages {
        println!("{}", package);
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Info { set: path }) => {
            let set = PackageSet::open(&path)?;
            println!("Package set: {}", path);
            println!("  Packages: {}", set.package_count());
            println!("  Properties: {}", set.property_count());
            println!("  File entries: {}", set.entry_count());
            println!("  Unsatisfied requires: {}", set.unsatisfied_requires().len());
            Ok(())
        }
        Some(Commands::List {
            pattern,
            json,
            set: path,
        }) => {
            let set = PackageSet::open(&path)?;
            let packages: Vec<PackageRef<'_>> = set
                .packages()
                .filter(|p| pattern.as_deref().is_none_or(|pat| p.name().contains(pat)))
                .collect();

            if json {
                let rows: Vec<PackageRow<'_>> = packages.into_iter().map(PackageRow::from).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if packages.is_empty() {
                println!("No packages found.");
            } else {
                print_packages(&packages);
                println!("\nTotal: {} package(s)", packages.len());
            }
            Ok(())
        }
        Some(Commands::Requires { package, set: path }) => {
            let set = PackageSet::open(&path)?;
            print_properties(&set, &package, PropertyKind::Requires)
        }
        Some(Commands::Provides { package, set: path }) => {
            let set = PackageSet::open(&path)?;
            print_properties(&set, &package, PropertyKind::Provides)
        }
        Some(Commands::WhatRequires { name, set: path }) => {
            let set = PackageSet::open(&path)?;
            print_packages(&set.what_requires(&name));
            Ok(())
        }
        Some(Commands::WhatProvides { name, set: path }) => {
            let set = PackageSet::open(&path)?;
            print_packages(&set.what_provides(&name));
            Ok(())
        }
        Some(Commands::Files { path: dir, set: path }) => {
            let set = PackageSet::open(&path)?;
            if set.find_entry(&dir).is_none() {
                return Err(anyhow::anyhow!("No such path in set: {}", dir));
            }
            for file in set.list_files(&dir) {
                println!("{}", file);
            }
            Ok(())
        }
        Some(Commands::FilePackages { path: file, set: path }) => {
            let set = PackageSet::open(&path)?;
            print_packages(&set.file_packages(&file));
            Ok(())
        }
        Some(Commands::PackageFiles { package, set: path }) => {
            let set = PackageSet::open(&path)?;
            for file in find_package(&set, &package)?.file_paths() {
                println!("{}", file);
            }
            Ok(())
        }
        Some(Commands::Unsatisfied { set: path }) => {
            let set = PackageSet::open(&path)?;
            for property in set.unsatisfied_requires() {
                for package in property.packages() {
                    println!("{} requires {}", package, property);
                }
            }
            Ok(())
        }
        Some(Commands::Diff { upstream, set: path }) => {
            let set = PackageSet::open(&path)?;
            let upstream = PackageSet::open(&upstream)?;
            diff(&set, &upstream, |action, package| {
                let marker = match action {
                    DiffAction::Add => '+',
                    DiffAction::Remove => '-',
                };
                println!("{} {}", marker, package);
            });
            Ok(())
        }
        Some(Commands::InstallOrder { next, set: path }) => {
            let set = PackageSet::open(&path)?;
            let next = PackageSet::open(&next)?;
            for step in InstallIterator::new(&set, &next) {
                println!("{} {}", step.action, step.package);
            }
            Ok(())
        }
        Some(Commands::Merge {
            first,
            second,
            output,
            sections,
        }) => {
            info!("Merging {} and {}", first, second);
            let first = PackageSet::open(&first)?;
            let second = PackageSet::open(&second)?;
            let merged = merge(&first, &second);
            merged.write(&output, sections)?;
            println!("Wrote {} package(s) to {}", merged.package_count(), output);
            Ok(())
        }
        Some(Commands::Update {
            upstream,
            packages,
            set: path,
            output,
            sections,
        }) => {
            info!("Updating {} from {}", path, upstream);
            let set = PackageSet::open(&path)?;
            let upstream = PackageSet::open(&upstream)?;
            let names: Vec<&str> = packages.iter().map(String::as_str).collect();
            let updated = update(&set, &upstream, &names);

            let mut changes = 0;
            diff(&set, &updated, |_, _| changes += 1);
            updated.write(&output, sections)?;
            println!("Wrote {} package(s) to {} ({} change(s))", updated.package_count(), output, changes);
            Ok(())
        }
        Some(Commands::Strip {
            input,
            output,
            sections,
        }) => {
            let set = PackageSet::open(&input)?;
            set.write(&output, sections)?;
            println!("Wrote {} to {}", input, output);
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("Razor v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'razor --help' for usage information");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use razor::importer::Importer;

    #[test]
    fn test_parse_sections() {
        assert_eq!(parse_sections("main"), Ok(SectionMask::MAIN));
        assert_eq!(
            parse_sections("main, details"),
            Ok(SectionMask::MAIN | SectionMask::DETAILS)
        );
        assert_eq!(parse_sections("all"), Ok(SectionMask::ALL));
        assert_eq!(parse_sections(""), Ok(SectionMask::NONE));
        assert!(parse_sections("main,bogus").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["razor", "list"]).unwrap();
        match cli.command {
            Some(Commands::List { pattern, json, set }) => {
                assert_eq!(pattern, None);
                assert!(!json);
                assert_eq!(set, DEFAULT_SET);
            }
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn test_cli_update_arguments() {
        let cli = Cli::try_parse_from([
            "razor", "update", "up.rzdb", "bash", "zsh", "-o", "out.rzdb", "--sections", "main",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Update {
                upstream,
                packages,
                output,
                sections,
                ..
            }) => {
                assert_eq!(upstream, "up.rzdb");
                assert_eq!(packages, vec!["bash", "zsh"]);
                assert_eq!(output, "out.rzdb");
                assert_eq!(sections, SectionMask::MAIN);
            }
            _ => panic!("expected update command"),
        }
    }

    #[test]
    fn test_cli_merge_requires_output() {
        assert!(Cli::try_parse_from(["razor", "merge", "a.rzdb", "b.rzdb"]).is_err());
    }

    #[test]
    fn test_package_row_json() {
        let mut importer = Importer::new();
        importer.begin_package("bash", "5.2");
        importer.set_arch("x86_64");
        importer.set_details("The GNU shell", "", "", "");
        importer.finish_package();
        importer.begin_package("tiny", "1");
        importer.finish_package();
        let set = importer.finish();

        let rows: Vec<PackageRow<'_>> = set.packages().map(PackageRow::from).collect();
        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["name"], "bash");
        assert_eq!(json[0]["summary"], "The GNU shell");
        assert_eq!(json[1]["arch"], "");
        assert!(json[1].get("summary").is_none());
    }

    #[test]
    fn test_find_package_error() {
        let set = PackageSet::new();
        let err = find_package(&set, "ghost").unwrap_err();
        assert_eq!(err.to_string(), "Package 'ghost' not found");
    }
}
