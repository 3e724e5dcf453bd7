// src/lib.rs

//! Razor package metadata database
//!
//! A package set records packages, their dependency properties and the
//! files they own in a handful of flat arrays that can be written to disk
//! and mapped straight back into memory without parsing.
//!
//! # Architecture
//!
//! - Building: [`importer::Importer`] assembles a set one package at a time
//! - Storage: [`format`] writes sets as a table of named sections and opens
//!   them by memory-mapping, optionally only some section categories
//! - Combining: [`merger`] unions two sets, deduplicating strings,
//!   properties, packages and file tree directories
//! - Comparing: [`diff`] walks two sorted sets and yields install steps
//! - Queries: [`set::PackageSet`] answers package, property and file lookups

pub mod array;
mod assemble;
pub mod diff;
mod error;
pub mod format;
pub mod hashtable;
pub mod importer;
pub mod list;
pub mod merger;
pub mod set;
mod tree;
pub mod version;

pub use error::{Error, Result};
pub use format::SectionMask;
pub use set::{PackageRef, PackageSet};
