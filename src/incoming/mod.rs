//! Readers for the payment notification files the giro banks deliver, and for LB files.
//!
//! Every dialect is a set of two character record tags with a fixed column layout per tag.
//! [`read_records`] walks the lines and hands each one to the dialect's [`RecordReader`], which
//! matches on the tag and builds its result as it goes. Blank lines are skipped and do not count
//! as lines.

mod columns;
pub mod bg;
pub mod lb;
pub mod pg;
pub mod totalin;

pub(crate) use columns::Columns;

use crate::error::{CodecError, CodecResult};
use crate::model::incoming::PaymentFile;
use serde::{Deserialize, Serialize};
use tracing::trace;

pub use lb::{parse_lb, LbReport};

/// The incoming file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Plusgirot TOTALIN.
    Pg,
    /// Bankgirot BGMAX.
    Bg,
    /// Bankgirot Leverantörsbetalningar, requests and reports.
    Lb,
}

serde_plain::derive_display_from_serialize!(Format);
serde_plain::derive_fromstr_from_deserialize!(Format);

pub(crate) trait RecordReader {
    fn record(&mut self, tag: &str, columns: &Columns) -> CodecResult<()>;
}

/// Feeds every non-blank line of `data` to `reader` and returns the number of lines read.
pub(crate) fn read_records<R: RecordReader>(data: &[u8], reader: &mut R) -> CodecResult<usize> {
    let mut count = 0;
    for raw in data.split(|&b| b == b'\n') {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() || raw[0] == b'\r' {
            continue;
        }
        count += 1;
        let columns = Columns::new(raw, count);
        let tag = columns.tag();
        trace!("Line {count}: record {tag}");
        reader.record(&tag, &columns)?;
    }
    Ok(count)
}

pub(crate) fn unknown_record(tag: &str, columns: &Columns) -> CodecError {
    CodecError::UnknownRecord {
        tag: tag.to_string(),
        line: columns.line(),
    }
}

pub(crate) fn no_open(tag: &str, context: &'static str, columns: &Columns) -> CodecError {
    CodecError::NoOpenContext {
        record: tag.to_string(),
        context,
        line: columns.line(),
    }
}

/// Reads a TOTALIN or BGMAX file. LB files have their own result type, see [`parse_lb`].
pub fn parse_payments(format: Format, data: &[u8]) -> CodecResult<PaymentFile> {
    match format {
        Format::Pg => pg::parse(data),
        Format::Bg => bg::parse(data),
        Format::Lb => Err(CodecError::InvalidValue(
            "LB files are not payment notifications".to_string(),
        )),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a record line by placing text at 1-based columns, blank elsewhere.
    pub(crate) fn line(width: usize, fields: &[(usize, &str)]) -> String {
        let mut chars = vec![' '; width];
        for (start, text) in fields {
            for (i, c) in text.chars().enumerate() {
                chars[start - 1 + i] = c;
            }
        }
        chars.into_iter().collect()
    }

    struct Tags(Vec<(String, usize)>);

    impl RecordReader for Tags {
        fn record(&mut self, tag: &str, columns: &Columns) -> CodecResult<()> {
            if tag == "XX" {
                return Err(unknown_record(tag, columns));
            }
            self.0.push((tag.to_string(), columns.line()));
            Ok(())
        }
    }

    #[test]
    fn test_line_helper() {
        assert_eq!(line(8, &[(1, "20"), (5, "ab")]), "20  ab  ");
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut tags = Tags(Vec::new());
        let count = read_records(b"00 first\r\n\r\n\n10 second\n99 last", &mut tags).unwrap();
        assert_eq!(count, 3);
        assert_eq!(
            tags.0,
            vec![
                ("00".to_string(), 1),
                ("10".to_string(), 2),
                ("99".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_reader_error_stops_reading() {
        let mut tags = Tags(Vec::new());
        let err = read_records(b"00\nXX\n99\n", &mut tags).unwrap_err();
        assert!(matches!(err, CodecError::UnknownRecord { line: 2, .. }));
        assert_eq!(tags.0.len(), 1);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("bg".parse::<Format>().unwrap(), Format::Bg);
        assert_eq!(Format::Lb.to_string(), "lb");
        assert!(parse_payments(Format::Lb, b"").is_err());
    }
}
