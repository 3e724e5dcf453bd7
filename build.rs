// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

const DEFAULT_SET: &str = "/var/lib/razor/system.rzdb";

fn set_arg() -> Arg {
    Arg::new("set")
        .short('s')
        .long("set")
        .value_name("PATH")
        .default_value(DEFAULT_SET)
        .help("Package set file")
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("PATH")
        .required(true)
        .help("Where to write the resulting set")
}

fn sections_arg() -> Arg {
    Arg::new("sections")
        .long("sections")
        .value_name("LIST")
        .default_value("main,files,details")
        .help("Section categories to write (main, files, details)")
}

fn build_cli() -> Command {
    Command::new("razor")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Razor Contributors")
        .about("Query, merge and compare memory-mapped package sets")
        .subcommand_required(false)
        .subcommand(Command::new("info").about("Show set statistics").arg(set_arg()))
        .subcommand(
            Command::new("list")
                .about("List packages")
                .arg(Arg::new("pattern").help("Only packages whose name contains this"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print JSON instead of text"),
                )
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("requires")
                .about("List what a package requires")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("provides")
                .about("List what a package provides")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("what-requires")
                .about("List packages requiring a property")
                .arg(Arg::new("name").required(true).help("Property name"))
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("what-provides")
                .about("List packages providing a property")
                .arg(Arg::new("name").required(true).help("Property name"))
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("files")
                .about("List files at or below a path")
                .arg(Arg::new("path").default_value("/").help("Directory to list"))
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("file-packages")
                .about("List packages owning a path")
                .arg(Arg::new("path").required(true).help("Absolute path"))
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("package-files")
                .about("List the files of a package")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("unsatisfied")
                .about("List requirements nothing in the set provides")
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("diff")
                .about("Show packages that differ from another set")
                .arg(Arg::new("upstream").required(true).help("Set to compare against"))
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("install-order")
                .about("List the steps that turn the set into another")
                .arg(Arg::new("next").required(true).help("Target set"))
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("merge")
                .about("Write the union of two sets")
                .arg(Arg::new("first").required(true).help("First input set"))
                .arg(Arg::new("second").required(true).help("Second input set"))
                .arg(output_arg())
                .arg(sections_arg()),
        )
        .subcommand(
            Command::new("update")
                .about("Update packages from an upstream set")
                .arg(Arg::new("upstream").required(true).help("Upstream set"))
                .arg(
                    Arg::new("packages")
                        .num_args(0..)
                        .help("Package names (updates all if omitted)"),
                )
                .arg(set_arg())
                .arg(output_arg())
                .arg(sections_arg()),
        )
        .subcommand(
            Command::new("strip")
                .about("Rewrite a set keeping only some section categories")
                .arg(Arg::new("input").required(true).help("Input set"))
                .arg(output_arg())
                .arg(sections_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("razor.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
