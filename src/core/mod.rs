//! Convert and restore operations plus the metadata record they share.

pub mod converter;
pub mod metadata;
pub mod restorer;
