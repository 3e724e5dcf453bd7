// src/error.rs

use thiserror::Error;

/// Core error types for razor
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Package set file not found
    #[error("Package set not found at path: {0}")]
    SetNotFound(String),

    /// The file does not start with the set file magic
    #[error("Not a package set file (magic {found:#010x})")]
    BadMagic { found: u32 },

    /// The file was written by an incompatible format version
    #[error("Unsupported package set format version {found}")]
    UnsupportedVersion { found: u32 },

    /// Structurally invalid file
    #[error("Corrupt package set: {0}")]
    Corrupt(String),

    /// Mapped sections cannot be bound into a set built in memory
    #[error("Cannot bind mapped sections into an owned package set")]
    MixedStorage,
}

/// Result type alias using razor's Error type
pub type Result<T> = std::result::Result<T, Error>;
