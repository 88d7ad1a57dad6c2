//! Restores an edited UTF-8 file to the encoding it had before conversion.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::metadata::MetadataStore;
use crate::error::{io_error, Result};
use crate::utils::encoding::{self, Codec, ErrorPolicy};
use crate::utils::{file_helper, hashing};

/// Options for a restore run.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub errors: ErrorPolicy,
    /// Keep the backup and metadata record after restoring.
    pub keep_backup: bool,
    /// Overrides the encoding recorded in the metadata.
    pub encoding: Option<String>,
    /// Write here instead of overwriting the file.
    pub output: Option<PathBuf>,
}

/// Result of a successful restore.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreResult {
    pub status: &'static str,
    pub file: String,
    pub encoding: String,
    pub errors: ErrorPolicy,
    /// The UTF-8 file was unchanged since conversion.
    pub converted_hash_matched: bool,
    /// The restored bytes are identical to the pre-conversion file.
    pub matches_original: bool,
    pub warning: Option<String>,
    pub backup_removed: bool,
    pub metadata_removed: bool,
}

/// File restorer.
pub struct Restorer {
    store: MetadataStore,
}

impl Restorer {
    pub fn new(store: MetadataStore) -> Self {
        Self { store }
    }

    pub fn restore(&self, file_path: &Path, options: &RestoreOptions) -> Result<RestoreResult> {
        let path = file_helper::resolve_existing(file_path)?;
        let metadata = self.store.load(&path)?;

        let target_label = options
            .encoding
            .clone()
            .unwrap_or_else(|| metadata.original_encoding.clone());
        let target = encoding::resolve_encoding(&target_label)?;
        debug!("Restoring {} to {} ({})", path.display(), target_label, target.name());

        let current_bytes = fs::read(&path).map_err(io_error("Cannot read file", &path))?;
        let text = encoding::decode_strict(&current_bytes, Codec::utf8(), "utf-8")?;

        let current_hash = hashing::sha256_hex(&current_bytes);
        let converted_hash_matched = current_hash == metadata.converted_hash;
        let warning = if converted_hash_matched {
            None
        } else {
            let message = format!(
                "File changed since conversion (recorded {}, current {})",
                metadata.converted_hash, current_hash
            );
            warn!("{}: {}", path.display(), message);
            Some(message)
        };

        let restored = encoding::encode_with_policy(&text, target, &target_label, options.errors)?;
        let matches_original = hashing::sha256_hex(&restored) == metadata.original_hash;

        let output_path = match &options.output {
            Some(output) => absolute(output)?,
            None => path.clone(),
        };
        file_helper::write_atomic(&output_path, &restored)?;
        info!("Restored {} as {}", output_path.display(), target_label);

        let (backup_removed, metadata_removed) = if options.keep_backup {
            (false, false)
        } else {
            (self.remove_backup(metadata.backup_path.as_deref()), self.store.remove(&path))
        };

        Ok(RestoreResult {
            status: "success",
            file: output_path.to_string_lossy().into_owned(),
            encoding: target_label,
            errors: options.errors,
            converted_hash_matched,
            matches_original,
            warning,
            backup_removed,
            metadata_removed,
        })
    }

    fn remove_backup(&self, backup_path: Option<&str>) -> bool {
        let Some(backup) = backup_path else {
            return false;
        };
        match file_helper::remove_if_exists(Path::new(backup)) {
            Ok(true) => {
                info!("Removed backup {}", backup);
                true
            }
            Ok(false) => {
                warn!("Backup {} no longer exists", backup);
                false
            }
            Err(e) => {
                warn!("Cannot remove backup {}: {}", backup, e);
                false
            }
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(io_error("Cannot resolve path", path))?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::converter::Converter;
    use crate::error::CharencError;

    // "こんにちは" in cp932
    const KONNICHIWA_CP932: &[u8] = &[0x82, 0xB1, 0x82, 0xF1, 0x82, 0xC9, 0x82, 0xBF, 0x82, 0xCD];

    fn store() -> MetadataStore {
        MetadataStore::new(".charenc_meta")
    }

    fn convert(path: &Path, bytes: &[u8], encoding: &str) {
        fs::write(path, bytes).unwrap();
        Converter::new(store()).convert(path, encoding, true).unwrap();
    }

    #[test]
    fn test_round_trip_restores_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("greeting.txt");
        convert(&file, KONNICHIWA_CP932, "cp932");

        let result = Restorer::new(store()).restore(&file, &RestoreOptions::default()).unwrap();
        assert_eq!(fs::read(&file).unwrap(), KONNICHIWA_CP932);
        assert!(result.converted_hash_matched);
        assert!(result.matches_original);
        assert!(result.warning.is_none());
        assert!(result.backup_removed);
        assert!(result.metadata_removed);
        assert!(!dir.path().join("greeting.txt.cp932.bak").exists());
        assert!(!dir.path().join(".charenc_meta").exists());
    }

    #[test]
    fn test_round_trip_other_encodings() {
        let dir = tempfile::tempdir().unwrap();
        let cases: [(&str, &str); 4] = [
            ("euc-jp", "日本語のテキスト"),
            ("iso-2022-jp", "abc 日本語 def"),
            ("latin-1", "café crème"),
            ("utf-16le", "\u{FEFF}héllo 😀"),
        ];
        for (i, (label, text)) in cases.iter().enumerate() {
            let enc = encoding::resolve_encoding(label).unwrap();
            let original = encoding::encode_with_policy(text, enc, label, ErrorPolicy::Strict).unwrap();
            let file = dir.path().join(format!("case{}.txt", i));
            convert(&file, &original, label);
            assert_eq!(fs::read_to_string(&file).unwrap(), *text);

            Restorer::new(store()).restore(&file, &RestoreOptions::default()).unwrap();
            assert_eq!(fs::read(&file).unwrap(), original, "round trip failed for {}", label);
        }
    }

    #[test]
    fn test_edit_warns_but_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("greeting.txt");
        convert(&file, KONNICHIWA_CP932, "cp932");
        fs::write(&file, "こんにちは!").unwrap();

        let result = Restorer::new(store()).restore(&file, &RestoreOptions::default()).unwrap();
        let mut expected = KONNICHIWA_CP932.to_vec();
        expected.push(b'!');
        assert_eq!(fs::read(&file).unwrap(), expected);
        assert!(!result.converted_hash_matched);
        assert!(!result.matches_original);
        let warning = result.warning.expect("hash mismatch warning");
        assert!(warning.contains(&hashing::sha256_hex("こんにちは".as_bytes())));
        assert!(warning.contains(&hashing::sha256_hex("こんにちは!".as_bytes())));
    }

    #[test]
    fn test_keep_backup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("greeting.txt");
        convert(&file, KONNICHIWA_CP932, "cp932");

        let restorer = Restorer::new(store());
        let mut outputs = Vec::new();
        for name in ["out1.txt", "out2.txt"] {
            let options = RestoreOptions {
                keep_backup: true,
                output: Some(dir.path().join(name)),
                ..Default::default()
            };
            let result = restorer.restore(&file, &options).unwrap();
            assert!(!result.backup_removed);
            assert!(!result.metadata_removed);
            outputs.push(fs::read(dir.path().join(name)).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[0], KONNICHIWA_CP932);
        // The UTF-8 working copy is untouched when restoring elsewhere.
        assert_eq!(fs::read_to_string(&file).unwrap(), "こんにちは");
        assert!(dir.path().join("greeting.txt.cp932.bak").exists());
        assert!(store().load(&file).is_ok());
    }

    #[test]
    fn test_strict_encode_error_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        convert(&file, b"abc", "cp932");
        fs::write(&file, "abc😀").unwrap();

        let err = Restorer::new(store()).restore(&file, &RestoreOptions::default()).unwrap_err();
        match err {
            CharencError::Encode {
                character,
                position,
                ..
            } => {
                assert_eq!(character, '😀');
                assert_eq!(position, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read_to_string(&file).unwrap(), "abc😀");
        assert!(store().load(&file).is_ok());
    }

    #[test]
    fn test_substituting_policies() {
        let cases = [
            (ErrorPolicy::Replace, b"abc?".to_vec()),
            (ErrorPolicy::BackslashReplace, b"abc\\U0001f600".to_vec()),
            (ErrorPolicy::XmlCharRefReplace, b"abc&#128512;".to_vec()),
        ];
        for (policy, expected) in cases {
            let dir = tempfile::tempdir().unwrap();
            let file = dir.path().join("a.txt");
            convert(&file, b"abc", "cp932");
            fs::write(&file, "abc😀").unwrap();

            let options = RestoreOptions {
                errors: policy,
                ..Default::default()
            };
            let result = Restorer::new(store()).restore(&file, &options).unwrap();
            assert_eq!(result.errors, policy);
            assert_eq!(fs::read(&file).unwrap(), expected);
        }
    }

    #[test]
    fn test_missing_metadata_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "hello").unwrap();

        let err = Restorer::new(store()).restore(&file, &RestoreOptions::default()).unwrap_err();
        assert!(matches!(err, CharencError::MissingMetadata(_)));
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
    }

    #[test]
    fn test_encoding_override() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("greeting.txt");
        convert(&file, KONNICHIWA_CP932, "cp932");

        let options = RestoreOptions {
            encoding: Some("euc-jp".to_string()),
            ..Default::default()
        };
        let result = Restorer::new(store()).restore(&file, &options).unwrap();
        assert_eq!(result.encoding, "euc-jp");
        assert!(!result.matches_original);
        let bytes = fs::read(&file).unwrap();
        assert_eq!(encoding::decode_strict(&bytes, Codec::from(encoding_rs::EUC_JP), "euc-jp").unwrap(), "こんにちは");
    }

    #[test]
    fn test_missing_backup_still_cleans_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("greeting.txt");
        convert(&file, KONNICHIWA_CP932, "cp932");
        fs::remove_file(dir.path().join("greeting.txt.cp932.bak")).unwrap();

        let result = Restorer::new(store()).restore(&file, &RestoreOptions::default()).unwrap();
        assert!(!result.backup_removed);
        assert!(result.metadata_removed);
        assert_eq!(fs::read(&file).unwrap(), KONNICHIWA_CP932);
        assert!(!dir.path().join(".charenc_meta").exists());
    }

    #[test]
    fn test_latin1_restore_rejects_euro() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("menu.txt");
        convert(&file, b"caf\xE9 \x80", "latin-1");
        assert_eq!(fs::read_to_string(&file).unwrap(), "café \u{80}");
        fs::write(&file, "café €").unwrap();

        let err = Restorer::new(store()).restore(&file, &RestoreOptions::default()).unwrap_err();
        assert!(matches!(err, CharencError::Encode { character: '€', position: 5, .. }));
        assert_eq!(fs::read_to_string(&file).unwrap(), "café €");
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        convert(&file, b"abc", "cp932");
        fs::write(&file, b"ab\xC3").unwrap();

        let err = Restorer::new(store()).restore(&file, &RestoreOptions::default()).unwrap_err();
        assert!(matches!(err, CharencError::Decode { .. }));
    }
}
