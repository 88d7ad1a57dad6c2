//! Encoding utilities for converting legacy encodings to UTF-8 and back.
//!
//! Uses encoding_rs crate instead of Windows APIs for portability.
//! encoding_rs follows the WHATWG table, which folds ASCII and ISO-8859-1
//! into windows-1252 and only encodes to byte-oriented encodings. ASCII,
//! ISO-8859-1 and UTF-16 output are therefore handled here directly.

use std::collections::HashMap;

use encoding_rs::{DecoderResult, Encoder, EncoderResult, Encoding};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{CharencError, Result};

/// A resolved text codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Code points below 0x80, one byte each.
    Ascii,
    /// Code points below 0x100, one byte each.
    Latin1,
    Whatwg(&'static Encoding),
}

impl Codec {
    pub fn utf8() -> Self {
        Codec::Whatwg(encoding_rs::UTF_8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::Ascii => "US-ASCII",
            Codec::Latin1 => "ISO-8859-1",
            Codec::Whatwg(encoding) => encoding.name(),
        }
    }

    /// Upper bound (exclusive) of code points for the single-byte identity codecs.
    fn byte_limit(&self) -> Option<u32> {
        match self {
            Codec::Ascii => Some(0x80),
            Codec::Latin1 => Some(0x100),
            Codec::Whatwg(_) => None,
        }
    }
}

impl From<&'static Encoding> for Codec {
    fn from(encoding: &'static Encoding) -> Self {
        Codec::Whatwg(encoding)
    }
}

/// One row of the supported encodings reference table.
#[derive(Debug, Clone, Serialize)]
pub struct EncodingEntry {
    pub identifier: &'static str,
    pub family: &'static str,
    pub codec: &'static str,
}

static SUPPORTED_ENCODINGS: Lazy<Vec<(&'static str, &'static str, Codec)>> = Lazy::new(|| {
    let sjis = Codec::Whatwg(encoding_rs::SHIFT_JIS);
    let euc_jp = Codec::Whatwg(encoding_rs::EUC_JP);
    let iso_2022_jp = Codec::Whatwg(encoding_rs::ISO_2022_JP);
    let utf_16le = Codec::Whatwg(encoding_rs::UTF_16LE);
    let utf_16be = Codec::Whatwg(encoding_rs::UTF_16BE);
    let cp1252 = Codec::Whatwg(encoding_rs::WINDOWS_1252);
    let latin9 = Codec::Whatwg(encoding_rs::ISO_8859_15);
    vec![
        ("cp932", "Japanese", sjis),
        ("ms932", "Japanese", sjis),
        ("windows-31j", "Japanese", sjis),
        ("shift_jis", "Japanese", sjis),
        ("shift-jis", "Japanese", sjis),
        ("sjis", "Japanese", sjis),
        ("euc-jp", "Japanese", euc_jp),
        ("euc_jp", "Japanese", euc_jp),
        ("eucjp", "Japanese", euc_jp),
        ("iso-2022-jp", "Japanese", iso_2022_jp),
        ("iso2022_jp", "Japanese", iso_2022_jp),
        ("utf-8", "Unicode", Codec::utf8()),
        ("utf8", "Unicode", Codec::utf8()),
        ("utf-16le", "Unicode", utf_16le),
        ("utf_16_le", "Unicode", utf_16le),
        ("utf-16be", "Unicode", utf_16be),
        ("utf_16_be", "Unicode", utf_16be),
        ("ascii", "Western", Codec::Ascii),
        ("us-ascii", "Western", Codec::Ascii),
        ("ansi_x3.4-1968", "Western", Codec::Ascii),
        ("cp1252", "Western", cp1252),
        ("windows-1252", "Western", cp1252),
        ("x-cp1252", "Western", cp1252),
        ("latin-1", "Western", Codec::Latin1),
        ("latin1", "Western", Codec::Latin1),
        ("l1", "Western", Codec::Latin1),
        ("iso-8859-1", "Western", Codec::Latin1),
        ("iso8859-1", "Western", Codec::Latin1),
        ("iso88591", "Western", Codec::Latin1),
        ("iso_8859-1", "Western", Codec::Latin1),
        ("iso_8859-1:1987", "Western", Codec::Latin1),
        ("iso-ir-100", "Western", Codec::Latin1),
        ("csisolatin1", "Western", Codec::Latin1),
        ("cp819", "Western", Codec::Latin1),
        ("ibm819", "Western", Codec::Latin1),
        ("iso-8859-15", "Western", latin9),
        ("latin-9", "Western", latin9),
    ]
});

static ALIASES: Lazy<HashMap<&'static str, Codec>> = Lazy::new(|| {
    SUPPORTED_ENCODINGS
        .iter()
        .map(|(name, _, codec)| (*name, *codec))
        .collect()
});

/// The reference table of identifiers accepted without falling back to WHATWG labels.
pub fn supported_encodings() -> Vec<EncodingEntry> {
    SUPPORTED_ENCODINGS
        .iter()
        .map(|(identifier, family, codec)| EncodingEntry {
            identifier: *identifier,
            family: *family,
            codec: codec.name(),
        })
        .collect()
}

/// Resolve a user-supplied encoding identifier.
///
/// Python-style aliases are looked up first, anything else is handed to
/// encoding_rs' label matching. Every WHATWG label that encoding_rs maps to
/// a different codec (the ASCII and ISO-8859-1 families) is in the table.
pub fn resolve_encoding(label: &str) -> Result<Codec> {
    let normalized = label.trim().to_ascii_lowercase();
    if let Some(codec) = ALIASES.get(normalized.as_str()) {
        return Ok(*codec);
    }
    match Encoding::for_label(normalized.as_bytes()) {
        // The replacement encoding only ever produces errors.
        Some(encoding) if encoding != encoding_rs::REPLACEMENT => Ok(Codec::Whatwg(encoding)),
        _ => Err(CharencError::UnknownEncoding(label.to_string())),
    }
}

/// Decode bytes without BOM sniffing and without replacement.
///
/// A BOM, if present, survives as U+FEFF so re-encoding reproduces it.
pub fn decode_strict(data: &[u8], codec: Codec, label: &str) -> Result<String> {
    match codec {
        Codec::Ascii => match data.iter().position(|b| !b.is_ascii()) {
            Some(offset) => Err(CharencError::Decode {
                encoding: label.to_string(),
                offset,
                length: 1,
            }),
            None => Ok(data.iter().map(|&b| b as char).collect()),
        },
        Codec::Latin1 => Ok(data.iter().map(|&b| b as char).collect()),
        Codec::Whatwg(encoding) => decode_whatwg(data, encoding, label),
    }
}

fn decode_whatwg(data: &[u8], encoding: &'static Encoding, label: &str) -> Result<String> {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(data.len())
        .unwrap_or(data.len());
    let mut text = String::with_capacity(capacity);
    let mut total_read = 0;

    loop {
        let (result, read) =
            decoder.decode_to_string_without_replacement(&data[total_read..], &mut text, true);
        total_read += read;
        match result {
            DecoderResult::InputEmpty => return Ok(text),
            DecoderResult::OutputFull => {
                let remaining = data.len() - total_read;
                text.reserve(
                    decoder
                        .max_utf8_buffer_length_without_replacement(remaining)
                        .unwrap_or(remaining)
                        .max(4),
                );
            }
            DecoderResult::Malformed(bad, extra) => {
                let length = bad as usize;
                return Err(CharencError::Decode {
                    encoding: label.to_string(),
                    offset: total_read - extra as usize - length,
                    length,
                });
            }
        }
    }
}

/// What to do with a character the target encoding cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Fail on the first unconvertible character
    #[default]
    #[value(name = "strict")]
    Strict,
    /// Substitute '?'
    #[value(name = "replace")]
    Replace,
    /// Substitute \xNN, \uNNNN or \UNNNNNNNN
    #[value(name = "backslashreplace")]
    BackslashReplace,
    /// Substitute &#NNN;
    #[value(name = "xmlcharrefreplace")]
    XmlCharRefReplace,
}

impl ErrorPolicy {
    /// Replacement text for an unmappable character, `None` in strict mode.
    pub fn substitute(&self, c: char) -> Option<String> {
        let code = c as u32;
        match self {
            ErrorPolicy::Strict => None,
            ErrorPolicy::Replace => Some("?".to_string()),
            ErrorPolicy::BackslashReplace => Some(if code < 0x100 {
                format!("\\x{:02x}", code)
            } else if code < 0x10000 {
                format!("\\u{:04x}", code)
            } else {
                format!("\\U{:08x}", code)
            }),
            ErrorPolicy::XmlCharRefReplace => Some(format!("&#{};", code)),
        }
    }
}

fn unmappable(policy: ErrorPolicy, text: &str, byte_offset: usize, c: char, label: &str) -> Result<String> {
    policy.substitute(c).ok_or_else(|| CharencError::Encode {
        encoding: label.to_string(),
        character: c,
        position: text[..byte_offset].chars().count(),
    })
}

/// Encode text into the target encoding, handling unmappable characters per `policy`.
pub fn encode_with_policy(text: &str, codec: Codec, label: &str, policy: ErrorPolicy) -> Result<Vec<u8>> {
    let encoding = match codec {
        Codec::Ascii | Codec::Latin1 => return encode_single_byte(text, codec, label, policy),
        Codec::Whatwg(encoding) => encoding,
    };
    if encoding == encoding_rs::UTF_8 {
        return Ok(text.as_bytes().to_vec());
    }
    if encoding == encoding_rs::UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == encoding_rs::UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }

    let mut encoder = encoding.new_encoder();
    let mut out = Vec::with_capacity(text.len());
    let mut total_read = 0;

    while total_read < text.len() {
        let remaining = &text[total_read..];
        reserve_for(&encoder, &mut out, remaining.len());
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(remaining, &mut out, false);
        total_read += read;
        match result {
            EncoderResult::InputEmpty | EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(c) => {
                let substitute = unmappable(policy, text, total_read - c.len_utf8(), c, label)?;
                // Substitutes are ASCII; routing them through the encoder keeps
                // stateful encodings (ISO-2022-JP) in the right mode.
                feed(&mut encoder, &substitute, &mut out, false);
            }
        }
    }
    feed(&mut encoder, "", &mut out, true);
    Ok(out)
}

fn encode_single_byte(text: &str, codec: Codec, label: &str, policy: ErrorPolicy) -> Result<Vec<u8>> {
    let limit = codec.byte_limit().unwrap_or(0x80);
    let mut out = Vec::with_capacity(text.len());
    for (byte_offset, c) in text.char_indices() {
        let code = c as u32;
        if code < limit {
            out.push(code as u8);
        } else {
            out.extend_from_slice(unmappable(policy, text, byte_offset, c, label)?.as_bytes());
        }
    }
    Ok(out)
}

fn feed(encoder: &mut Encoder, input: &str, out: &mut Vec<u8>, last: bool) {
    let mut read_total = 0;
    loop {
        reserve_for(encoder, out, input.len() - read_total);
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(&input[read_total..], out, last);
        read_total += read;
        match result {
            EncoderResult::InputEmpty => return,
            EncoderResult::OutputFull => {}
            // ASCII input never hits this arm.
            EncoderResult::Unmappable(_) => {}
        }
    }
}

fn reserve_for(encoder: &Encoder, out: &mut Vec<u8>, input_len: usize) {
    let needed = encoder
        .max_buffer_length_from_utf8_without_replacement(input_len)
        .unwrap_or(input_len * 4)
        .max(8);
    out.reserve(needed);
}
