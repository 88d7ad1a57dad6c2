//! Utility modules for file I/O, encoding and hashing.

pub mod encoding;
pub mod file_helper;
pub mod hashing;
