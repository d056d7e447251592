//! CRC32 integrity pre-pass for SIE files carrying `#KSUMMA`.

use crate::error::{CodecError, CodecResult};
use crate::sie::cursor::{Cursor, Halt};
use crate::sie::records::RecordTable;
use tracing::debug;

const POLYNOMIAL: u32 = 0xEDB8_8320;

const fn make_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                POLYNOMIAL ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

static TABLE: [u32; 256] = make_table();

/// A running reflected CRC32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc32 {
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = (self.state >> 8) ^ TABLE[((self.state ^ u32::from(b)) & 0xff) as usize];
        }
    }

    pub fn finish(&self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

/// What the pre-pass found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    /// No `#KSUMMA` on the second line; the file is taken as it is.
    Unchecked,
    /// The declared checksum matched.
    Verified(u32),
}

/// Folds the fields of `lines` into `crc`. `first_line` is the 1-based number of `lines[0]`.
pub(crate) fn fold_lines(
    crc: &mut Crc32,
    lines: &[&[u8]],
    first_line: usize,
    table: &RecordTable,
) -> CodecResult<()> {
    for (offset, line) in lines.iter().enumerate() {
        let line_no = first_line + offset;
        let mut cursor = Cursor::folding(line, crc);
        fold_line(&mut cursor, table).map_err(|halt| match halt {
            Halt::Done => CodecError::malformed(line_no, "unexpected end of line"),
            Halt::Bad(reason) => CodecError::malformed(line_no, reason),
        })?;
    }
    Ok(())
}

fn fold_line(cursor: &mut Cursor<'_>, table: &RecordTable) -> Result<(), Halt> {
    match cursor.skip_whitespace() {
        Ok(b'#') => {}
        Ok(_) | Err(Halt::Done) => return Ok(()),
        Err(e) => return Err(e),
    }
    let label = cursor.label()?;
    match table.get(&label) {
        Some(def) => {
            cursor.read_record(&def.format)?;
        }
        None => cursor.rest()?,
    }
    Ok(())
}

/// Checks the flag line and, when present, the checksum of a split SIE file. Every line keeps
/// its terminator.
pub fn verify(lines: &[&[u8]], table: &RecordTable) -> CodecResult<Integrity> {
    let first = lines.first().ok_or_else(|| CodecError::NotImportable {
        reason: "the file is empty".to_string(),
    })?;
    check_flag(first)?;

    let starts_with_ksumma = lines
        .get(1)
        .map(|l| l.starts_with(b"#KSUMMA"))
        .unwrap_or(false);
    if !starts_with_ksumma {
        debug!("No #KSUMMA record, skipping checksum verification");
        return Ok(Integrity::Unchecked);
    }
    if lines.len() < 3 {
        return Err(CodecError::malformed(
            lines.len(),
            "#KSUMMA opened but the closing checksum line is missing",
        ));
    }

    let last = lines.len() - 1;
    let mut crc = Crc32::new();
    fold_lines(&mut crc, &lines[2..last], 3, table)?;
    let computed = crc.finish();

    let declared = declared_checksum(lines[last], last + 1)?;
    if declared != computed {
        return Err(CodecError::ChecksumMismatch { declared, computed });
    }
    debug!("Checksum {computed} verified");
    Ok(Integrity::Verified(computed))
}

fn label_and_value(line: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Halt> {
    let mut cursor = Cursor::new(line);
    cursor.skip_whitespace()?;
    let label = cursor.label()?;
    let value = cursor.string()?;
    Ok((label, value))
}

fn check_flag(line: &[u8]) -> CodecResult<()> {
    match label_and_value(line) {
        Ok((label, flag)) if label == b"#FLAGGA" && flag == b"0" => Ok(()),
        Ok((label, flag)) if label == b"#FLAGGA" => Err(CodecError::NotImportable {
            reason: format!(
                "#FLAGGA is '{}', the file has already been imported",
                String::from_utf8_lossy(&flag)
            ),
        }),
        _ => Err(CodecError::NotImportable {
            reason: "the first line must be '#FLAGGA 0'".to_string(),
        }),
    }
}

fn declared_checksum(line: &[u8], line_no: usize) -> CodecResult<u32> {
    let malformed = || CodecError::malformed(line_no, "the last line must be '#KSUMMA <checksum>'");
    let (label, value) = label_and_value(line).map_err(|_| malformed())?;
    if label != b"#KSUMMA" {
        return Err(malformed());
    }
    let text = String::from_utf8_lossy(&value);
    text.parse::<u32>()
        .map_err(|_| CodecError::malformed(line_no, format!("'{text}' is not a checksum")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sie::split_lines;

    const BODY: &[u8] = b"#KONTO 1910 Kassa\n\
#KONTO 3010 \"F\x94rs\x84ljning\"\n\
#VER A 1 20170101 \"Test\"\n\
{\n\
#TRANS 1910 {} 100.00\n\
#TRANS 3010 {} -100.00\n\
}\n";

    fn file(checksum: u32) -> Vec<u8> {
        let mut data = b"#FLAGGA 0\n#KSUMMA\n".to_vec();
        data.extend_from_slice(BODY);
        data.extend_from_slice(format!("#KSUMMA {checksum}\n").as_bytes());
        data
    }

    #[test]
    fn test_standard_check_value() {
        let mut crc = Crc32::new();
        crc.update(b"123456789");
        assert_eq!(crc.finish(), 0xCBF4_3926);
    }

    #[test]
    fn test_table_entries() {
        assert_eq!(TABLE[0], 0);
        assert_eq!(TABLE[1], 0x7707_3096);
        assert_eq!(TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_verify_declared_checksum() {
        let data = file(1_574_298_909);
        let lines = split_lines(&data);
        let result = verify(&lines, &RecordTable::sie4()).unwrap();
        assert_eq!(result, Integrity::Verified(1_574_298_909));
    }

    #[test]
    fn test_any_flipped_byte_fails() {
        let good = file(1_574_298_909);
        let body_start = b"#FLAGGA 0\n#KSUMMA\n".len();
        let table = RecordTable::sie4();
        let mut flips = 0;
        for i in body_start..body_start + BODY.len() {
            // Only bytes that end up inside a field contribute.
            if matches!(good[i], b' ' | b'\n' | b'"' | b'{' | b'}') {
                continue;
            }
            let mut bad = good.clone();
            bad[i] ^= 0x01;
            let lines = split_lines(&bad);
            let result = verify(&lines, &table);
            assert!(result.is_err(), "flipping byte {i} was not detected");
            flips += 1;
        }
        assert!(flips > 50);
    }

    #[test]
    fn test_mismatch_reports_both_values() {
        let data = file(42);
        let lines = split_lines(&data);
        match verify(&lines, &RecordTable::sie4()) {
            Err(CodecError::ChecksumMismatch { declared, computed }) => {
                assert_eq!(declared, 42);
                assert_eq!(computed, 1_574_298_909);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_without_ksumma_is_unchecked() {
        let data = b"#FLAGGA 0\n#SIETYP 4\n";
        let lines = split_lines(data);
        assert_eq!(
            verify(&lines, &RecordTable::sie4()).unwrap(),
            Integrity::Unchecked
        );
    }

    #[test]
    fn test_flag_must_be_zero() {
        let lines = split_lines(b"#FLAGGA 1\n#SIETYP 4\n");
        assert!(matches!(
            verify(&lines, &RecordTable::sie4()),
            Err(CodecError::NotImportable { .. })
        ));
        let lines = split_lines(b"#SIETYP 4\n");
        assert!(matches!(
            verify(&lines, &RecordTable::sie4()),
            Err(CodecError::NotImportable { .. })
        ));
    }

    #[test]
    fn test_missing_closing_checksum() {
        let data = b"#FLAGGA 0\n#KSUMMA\n#KONTO 1910 Kassa\n";
        let lines = split_lines(data);
        assert!(verify(&lines, &RecordTable::sie4()).is_err());
    }
}
