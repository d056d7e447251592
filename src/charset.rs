//! The two 8-bit character sets at the edges of the codecs.
//!
//! SIE files are written in PC8 (code page 437). Bank files are ISO-8859-1. Everything inside
//! the codecs is either raw bytes or `String`, and the conversion happens here and nowhere else.

use crate::error::{CodecError, CodecResult};
use codepage_437::{FromCp437, IntoCp437, CP437_CONTROL};
use encoding_rs::{EncoderResult, WINDOWS_1252};

/// Decodes PC8 bytes. Every byte has a mapping, so this cannot fail.
pub fn decode_pc8(bytes: &[u8]) -> String {
    String::from_cp437(bytes.to_vec(), &CP437_CONTROL)
}

/// Encodes text as PC8.
pub fn encode_pc8(text: &str) -> CodecResult<Vec<u8>> {
    text.to_string()
        .into_cp437(&CP437_CONTROL)
        .map_err(|_| CodecError::Encoding {
            encoding: "PC8",
            text: text.to_string(),
        })
}

/// Decodes bank file bytes. `encoding_rs` treats the ISO-8859-1 label as windows-1252, which
/// agrees with ISO-8859-1 on every printable position.
pub fn decode_latin1(bytes: &[u8]) -> String {
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Encodes text for a bank file. Characters without a single byte representation become `?`,
/// so the byte length always equals the character count.
pub fn encode_latin1_lossy(text: &str) -> Vec<u8> {
    let mut encoder = WINDOWS_1252.new_encoder();
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(rest.len())
            .unwrap_or(rest.len() * 4);
        out.reserve(needed + 1);
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(rest, &mut out, true);
        rest = &rest[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(_) => out.push(b'?'),
        }
    }
    out
}
