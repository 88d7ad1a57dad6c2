//! Metadata side-records linking a converted file to its original encoding.
//!
//! Records live in a hidden directory next to the file:
//! `<dir>/<meta_dir_name>/<file name>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{io_error, CharencError, Result};
use crate::utils::file_helper;

pub const SCHEMA: &str = "charenc-simple";

/// What convert remembers so restore can undo it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub original_file: String,
    pub original_encoding: String,
    pub original_hash: String,
    pub converted_hash: String,
    #[serde(default)]
    pub backup_path: Option<String>,
    pub converted_at: String,
}

fn default_schema() -> String {
    SCHEMA.to_string()
}

/// Locates, reads and writes metadata records.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir_name: String,
}

impl MetadataStore {
    pub fn new(dir_name: impl Into<String>) -> Self {
        Self {
            dir_name: dir_name.into(),
        }
    }

    pub fn meta_dir(&self, file: &Path) -> PathBuf {
        file_helper::get_directory(file).join(&self.dir_name)
    }

    pub fn meta_path(&self, file: &Path) -> PathBuf {
        let name = file_helper::get_file_name(file).unwrap_or_default();
        self.meta_dir(file).join(format!("{}.json", name))
    }

    pub fn load(&self, file: &Path) -> Result<Metadata> {
        let path = self.meta_path(file);
        if !file_helper::file_exists(&path) {
            return Err(CharencError::MissingMetadata(file.to_path_buf()));
        }
        let content = fs::read_to_string(&path).map_err(io_error("Cannot read metadata", &path))?;
        let metadata: Metadata = serde_json::from_str(&content)
            .map_err(|source| CharencError::InvalidMetadata { path: path.clone(), source })?;
        if metadata.schema != SCHEMA {
            warn!("Metadata {} has unexpected schema {:?}", path.display(), metadata.schema);
        }
        debug!("Loaded metadata from {}", path.display());
        Ok(metadata)
    }

    /// Write the record, creating the metadata directory if needed.
    pub fn save(&self, file: &Path, metadata: &Metadata) -> Result<PathBuf> {
        let dir = self.meta_dir(file);
        fs::create_dir_all(&dir).map_err(io_error("Cannot create metadata directory", &dir))?;

        let path = self.meta_path(file);
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|source| CharencError::InvalidMetadata { path: path.clone(), source })?;
        file_helper::write_atomic(&path, json.as_bytes())?;
        debug!("Saved metadata to {}", path.display());
        Ok(path)
    }

    /// Delete the record and, if nothing else is left, its directory.
    ///
    /// Returns whether the record file was removed. Failures are logged, not raised.
    pub fn remove(&self, file: &Path) -> bool {
        let path = self.meta_path(file);
        let removed = match file_helper::remove_if_exists(&path) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Cannot remove metadata {}: {}", path.display(), e);
                false
            }
        };
        file_helper::remove_dir_if_empty(&self.meta_dir(file));
        removed
    }
}

/// Where convert copies the original bytes: `<file name>.<encoding>.bak` beside the file.
pub fn backup_path(file: &Path, encoding: &str) -> PathBuf {
    let name = file_helper::get_file_name(file).unwrap_or_default();
    file_helper::get_directory(file).join(format!("{}.{}.bak", name, encoding))
}
