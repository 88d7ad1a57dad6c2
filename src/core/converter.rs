//! Converts a legacy-encoded file to UTF-8 and records how to undo it.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::metadata::{self, Metadata, MetadataStore, SCHEMA};
use crate::error::{io_error, CharencError, Result};
use crate::utils::{encoding, file_helper, hashing};

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertResult {
    pub status: &'static str,
    pub file: String,
    pub original_encoding: String,
    pub backup: Option<String>,
    pub metadata: String,
}

/// File converter.
pub struct Converter {
    store: MetadataStore,
}

impl Converter {
    pub fn new(store: MetadataStore) -> Self {
        Self { store }
    }

    /// Convert `file_path` from `encoding_label` to UTF-8 in place.
    ///
    /// Decoding happens before anything is written, so a DecodeError leaves
    /// no backup, metadata or modified file behind. A failure after the
    /// backup is written removes it again.
    pub fn convert(&self, file_path: &Path, encoding_label: &str, backup: bool) -> Result<ConvertResult> {
        let path = file_helper::resolve_existing(file_path)?;
        if file_helper::file_exists(&self.store.meta_path(&path)) {
            return Err(CharencError::AlreadyConverted(path));
        }
        let source = encoding::resolve_encoding(encoding_label)?;
        debug!("Converting {} from {} ({})", path.display(), encoding_label, source.name());

        let original_bytes = fs::read(&path).map_err(io_error("Cannot read file", &path))?;
        let text = encoding::decode_strict(&original_bytes, source, encoding_label)?;

        // Hashes are computed in memory before any file is touched.
        let utf8_bytes = text.into_bytes();
        let original_hash = hashing::sha256_hex(&original_bytes);
        let converted_hash = hashing::sha256_hex(&utf8_bytes);

        let backup_path = if backup {
            let target = metadata::backup_path(&path, encoding_label);
            fs::copy(&path, &target).map_err(io_error("Backup failed", &target))?;
            info!("Backup written to {}", target.display());
            Some(target.to_string_lossy().into_owned())
        } else {
            None
        };

        // Metadata goes first so a converted file never exists without its record.
        let record = Metadata {
            schema: SCHEMA.to_string(),
            original_file: path.to_string_lossy().into_owned(),
            original_encoding: encoding_label.to_string(),
            original_hash,
            converted_hash,
            backup_path: backup_path.clone(),
            converted_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        };
        let committed = self
            .store
            .save(&path, &record)
            .and_then(|meta_path| file_helper::write_atomic(&path, &utf8_bytes).map(|_| meta_path));
        let meta_path = match committed {
            Ok(meta_path) => meta_path,
            Err(e) => {
                self.roll_back(&path, backup_path.as_deref());
                return Err(e);
            }
        };
        info!("Converted {} from {} to UTF-8", path.display(), encoding_label);

        Ok(ConvertResult {
            status: "success",
            file: path.to_string_lossy().into_owned(),
            original_encoding: encoding_label.to_string(),
            backup: backup_path,
            metadata: meta_path.to_string_lossy().into_owned(),
        })
    }

    /// Undo the backup and record of a conversion that did not complete.
    fn roll_back(&self, path: &Path, backup_path: Option<&str>) {
        self.store.remove(path);
        if let Some(backup) = backup_path {
            if let Err(e) = file_helper::remove_if_exists(Path::new(backup)) {
                warn!("Cannot remove backup {}: {}", backup, e);
            }
        }
    }
}
