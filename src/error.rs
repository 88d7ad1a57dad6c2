//! Error types shared by the converter and restorer.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CharencError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    /// Input bytes are not valid in the declared encoding.
    #[error("Decode error with {encoding}: invalid sequence of {length} byte(s) at offset {offset}")]
    Decode {
        encoding: String,
        offset: usize,
        length: usize,
    },

    /// Strict-mode restore hit a character the target encoding cannot represent.
    #[error(
        "Encode error with {encoding}: character {character:?} (U+{:04X}) in position {position} cannot be encoded",
        code_point(.character)
    )]
    Encode {
        encoding: String,
        character: char,
        position: usize,
    },

    /// A metadata record already exists, so the file is presumably UTF-8 already.
    #[error("{} is already converted. Restore it first", .0.display())]
    AlreadyConverted(PathBuf),

    #[error("No metadata found for {}. Run convert first", .0.display())]
    MissingMetadata(PathBuf),

    #[error("Cannot read metadata {}: {source}", .path.display())]
    InvalidMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn code_point(c: &char) -> u32 {
    *c as u32
}

/// Attach an action and a path to an I/O error.
pub fn io_error(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> CharencError {
    let path = path.to_path_buf();
    move |source| CharencError::Io {
        action,
        path,
        source,
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, CharencError>;
