use crate::charset::decode_pc8;
use crate::error::{CodecError, CodecResult};
use crate::model::Accounting;
use crate::sie::builder::{Builder, RecordSink, SieImport};
use crate::sie::crc::{self, Integrity};
use crate::sie::cursor::{Cursor, Halt};
use crate::sie::records::RecordTable;
use crate::sie::remap::{AccountMapping, Remapper};
use std::borrow::Cow;
use tracing::{debug, info};

/// Splits raw file content into lines that keep their `\n`.
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    data.split_inclusive(|&b| b == b'\n').collect()
}

/// The tokenizer relies on every line ending in a newline, including the last one.
fn terminated(data: &[u8]) -> Cow<'_, [u8]> {
    match data.last() {
        Some(b'\n') | None => Cow::Borrowed(data),
        Some(_) => {
            let mut owned = data.to_vec();
            owned.push(b'\n');
            Cow::Owned(owned)
        }
    }
}

fn halt_to_error(halt: Halt, line: usize) -> CodecError {
    match halt {
        Halt::Done => CodecError::malformed(line, "unexpected end of line"),
        Halt::Bad(reason) => CodecError::malformed(line, reason),
    }
}

/// Parses one line and hands the record to `sink`. Lines that do not start with a label, such
/// as the braces around transactions, are ignored.
pub(crate) fn dispatch_line<S: RecordSink>(
    sink: &mut S,
    table: &RecordTable,
    line: &[u8],
    line_no: usize,
) -> CodecResult<()> {
    let mut cursor = Cursor::new(line);
    match cursor.skip_whitespace() {
        Ok(b'#') => {}
        Ok(_) | Err(Halt::Done) => return Ok(()),
        Err(halt) => return Err(halt_to_error(halt, line_no)),
    }
    let label = cursor.label().map_err(|h| halt_to_error(h, line_no))?;
    let Some(def) = table.get(&label) else {
        sink.warning(format!(
            "Unknown record {} at line {line_no}, skipped",
            decode_pc8(&label)
        ));
        return Ok(());
    };
    let params = cursor
        .read_record(&def.format)
        .map_err(|h| halt_to_error(h, line_no))?;
    sink.record(def, params, line_no)
}

/// Runs only the flag and checksum checks.
pub fn verify_file(data: &[u8]) -> CodecResult<Integrity> {
    let data = terminated(data);
    let lines = split_lines(&data);
    crc::verify(&lines, &RecordTable::sie4())
}

/// Imports a SIE 4 file into a new accounting.
pub fn import(data: &[u8]) -> CodecResult<SieImport> {
    import_into(Accounting::new(), data, None)
}

/// Imports a SIE 4 file on top of `acc`, optionally renumbering accounts through `mapping`.
///
/// The checksum is verified before any record is built, so a tampered file never produces a
/// partial graph.
pub fn import_into(
    acc: Accounting,
    data: &[u8],
    mapping: Option<&AccountMapping>,
) -> CodecResult<SieImport> {
    let data = terminated(data);
    let lines = split_lines(&data);
    let table = RecordTable::sie4();

    let integrity = crc::verify(&lines, &table)?;
    debug!("Integrity check: {integrity:?}");

    let builder = Builder::new(acc);
    let result = match mapping {
        None => run(builder, &table, &lines)?,
        Some(mapping) => {
            let remapper = run(Remapper::new(builder, mapping), &table, &lines)?;
            remapper.into_inner()
        }
    }
    .finish();

    info!(
        "Imported {} accounts and {} verifications with {} warnings",
        result.accounting.accounts().count(),
        result.accounting.verifications().count(),
        result.warnings.len()
    );
    Ok(result)
}

fn run<S: RecordSink>(mut sink: S, table: &RecordTable, lines: &[&[u8]]) -> CodecResult<S> {
    // The flag line has been checked already.
    for (offset, line) in lines.iter().enumerate().skip(1) {
        dispatch_line(&mut sink, table, line, offset + 1)?;
    }
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::accounting::AccountType;
    use crate::test::SMALL_SIE;
    use rust_decimal::Decimal;

    #[test]
    fn test_split_lines_keeps_terminators() {
        let lines = split_lines(b"a\nb\r\nc");
        assert_eq!(lines, vec![&b"a\n"[..], &b"b\r\n"[..], &b"c"[..]]);
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn test_missing_final_newline_is_added() {
        let result = import(b"#FLAGGA 0\n#SIETYP 4\n#KONTO 1910 Kassa").unwrap();
        assert!(result.accounting.find_account("1910").is_some());
    }

    #[test]
    fn test_import_small_file() {
        let result = import(SMALL_SIE).unwrap();
        let acc = &result.accounting;
        assert_eq!(acc.orgname.as_deref(), Some("Övningsbolaget AB"));
        assert_eq!(acc.accounts().count(), 4);
        let kassa = acc.account(acc.find_account("1910").unwrap());
        assert_eq!(kassa.name, "Kassa");
        assert_eq!(kassa.account_type, Some(AccountType::Asset));
        assert_eq!(
            kassa.balance.as_ref().unwrap().opening_balance,
            Some(Decimal::new(1_000_000, 2))
        );
        assert_eq!(acc.verifications().count(), 2);
        assert_eq!(acc.transactions().len(), 5);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_unknown_label_is_skipped_with_warning() {
        let result = import(b"#FLAGGA 0\n#SIETYP 4\n#FOO bar \"baz\"\n").unwrap();
        assert_eq!(result.warnings, vec!["Unknown record #FOO at line 3, skipped"]);
    }

    #[test]
    fn test_broken_checksum_stops_import() {
        let data = b"#FLAGGA 0\n#KSUMMA\n#KONTO 1910 Kassa\n#KSUMMA 1\n";
        assert!(matches!(
            import(data),
            Err(CodecError::ChecksumMismatch { declared: 1, .. })
        ));
    }

    #[test]
    fn test_unbalanced_quote_is_malformed() {
        let data = b"#FLAGGA 0\n#FNAMN \"Open End\n";
        assert!(matches!(
            import(data),
            Err(CodecError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_import_with_mapping() {
        let mapping = AccountMapping::parse("1911 1910\n3011 3010\n");
        let result = import_into(Accounting::new(), SMALL_SIE, Some(&mapping)).unwrap();
        let numbers: Vec<_> = result
            .accounting
            .accounts()
            .map(|(_, a)| a.number.as_str())
            .collect();
        assert_eq!(numbers, vec!["1911", "3011"]);
    }

    #[test]
    fn test_verify_file() {
        assert_eq!(verify_file(SMALL_SIE).unwrap(), Integrity::Unchecked);
        assert!(verify_file(b"#FLAGGA 1\n").is_err());
    }
}
