//! Column access for one line of an incoming payment file.
//!
//! Positions are 1-based and inclusive, the way the bank manuals number them. A line that is
//! shorter than a requested range yields whatever part of the range exists, so trailing blanks
//! that were stripped in transit read back as empty text.

use crate::charset::decode_latin1;
use crate::error::{CodecError, CodecResult};
use crate::giro::TransferDate;
use crate::model::Amount;
use chrono::NaiveDate;

pub(crate) struct Columns<'a> {
    bytes: &'a [u8],
    line: usize,
}

impl<'a> Columns<'a> {
    pub(crate) fn new(bytes: &'a [u8], line: usize) -> Self {
        Self { bytes, line }
    }

    /// The line number, counting only lines with content.
    pub(crate) fn line(&self) -> usize {
        self.line
    }

    /// The record tag, the first two columns.
    pub(crate) fn tag(&self) -> String {
        decode_latin1(self.raw(1, 2))
    }

    fn raw(&self, start: usize, end: usize) -> &'a [u8] {
        let from = (start - 1).min(self.bytes.len());
        let to = end.min(self.bytes.len());
        &self.bytes[from..to]
    }

    fn field(&self, start: usize, end: usize) -> String {
        decode_latin1(self.raw(start, end))
    }

    pub(crate) fn error(&self, start: usize, end: usize, reason: impl Into<String>) -> CodecError {
        CodecError::Field {
            line: self.line,
            start,
            end,
            reason: reason.into(),
        }
    }

    /// Text with trailing blanks removed.
    pub(crate) fn text(&self, start: usize, end: usize) -> String {
        self.field(start, end).trim_end().to_string()
    }

    /// A right aligned, zero filled account or giro number with the leading zeros removed.
    pub(crate) fn account(&self, start: usize, end: usize) -> String {
        self.field(start, end)
            .trim_end()
            .trim_start_matches('0')
            .to_string()
    }

    pub(crate) fn integer(&self, start: usize, end: usize) -> CodecResult<i64> {
        let field = self.field(start, end);
        field
            .trim()
            .parse()
            .map_err(|_| self.error(start, end, format!("'{field}' is not a number")))
    }

    fn parse_date(&self, start: usize, end: usize, format: &str) -> CodecResult<NaiveDate> {
        let field = self.field(start, end);
        NaiveDate::parse_from_str(&field, format)
            .map_err(|e| self.error(start, end, format!("'{field}' is not a date: {e}")))
    }

    /// `YYYYMMDD`.
    pub(crate) fn date(&self, start: usize, end: usize) -> CodecResult<NaiveDate> {
        self.parse_date(start, end, "%Y%m%d")
    }

    /// `YYMMDD`.
    pub(crate) fn short_date(&self, start: usize, end: usize) -> CodecResult<NaiveDate> {
        self.parse_date(start, end, "%y%m%d")
    }

    /// `YYMMDD`, or `000000` for no date.
    pub(crate) fn short_date_or_zero(
        &self,
        start: usize,
        end: usize,
    ) -> CodecResult<Option<NaiveDate>> {
        if self.field(start, end) == "000000" {
            return Ok(None);
        }
        self.short_date(start, end).map(Some)
    }

    /// `YYMMDD`, `GENAST`, or blank for no date.
    pub(crate) fn payment_date(
        &self,
        start: usize,
        end: usize,
    ) -> CodecResult<Option<TransferDate>> {
        match self.field(start, end).trim() {
            "" => Ok(None),
            "GENAST" => Ok(Some(TransferDate::Genast)),
            _ => self.short_date(start, end).map(|d| Some(TransferDate::On(d))),
        }
    }

    fn implied(&self, start: usize, end: usize, scale: u32) -> CodecResult<Amount> {
        let field = self.field(start, end);
        Amount::from_implied(&field, scale).map_err(|e| self.error(start, end, e.to_string()))
    }

    /// An amount with two implied decimals.
    pub(crate) fn amount(&self, start: usize, end: usize) -> CodecResult<Amount> {
        self.implied(start, end, 2)
    }

    /// An amount column followed by a one column sign, `-` for negative.
    pub(crate) fn signed_amount(&self, start: usize, end: usize) -> CodecResult<Amount> {
        let amount = self.amount(start, end)?;
        Ok(match self.field(end + 1, end + 1).as_str() {
            "-" => -amount,
            _ => amount,
        })
    }

    /// A conversion rate with four implied decimals.
    pub(crate) fn rate(&self, start: usize, end: usize) -> CodecResult<Amount> {
        self.implied(start, end, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_text_and_account() {
        let columns = Columns::new(b"0500099123460000000000SEK  ", 1);
        assert_eq!(columns.tag(), "05");
        assert_eq!(columns.account(3, 12), "9912346");
        assert_eq!(columns.account(13, 22), "");
        assert_eq!(columns.text(23, 27), "SEK");
        assert_eq!(columns.text(70, 80), "");
    }

    #[test]
    fn test_latin1_text() {
        let columns = Columns::new(b"50F\xd6RETAGET AB", 1);
        assert_eq!(columns.text(3, 37), "FÖRETAGET AB");
    }

    #[test]
    fn test_numbers() {
        let columns = Columns::new(b"90 000001200000000000302550abc", 7);
        assert_eq!(columns.integer(3, 10).unwrap(), 12);
        assert_eq!(
            columns.amount(11, 27).unwrap(),
            Amount::from_str("3025.50").unwrap()
        );
        assert!(matches!(
            columns.integer(28, 30),
            Err(CodecError::Field {
                line: 7,
                start: 28,
                end: 30,
                ..
            })
        ));
        assert!(columns.amount(28, 30).is_err());
    }

    #[test]
    fn test_rate_and_sign() {
        let columns = Columns::new(b"4000000001050-000000001234 ", 1);
        assert_eq!(
            columns.signed_amount(3, 13).unwrap(),
            Amount::from_str("-10.50").unwrap()
        );
        assert_eq!(
            columns.signed_amount(15, 26).unwrap(),
            Amount::from_str("12.34").unwrap()
        );
        assert_eq!(
            columns.rate(15, 26).unwrap(),
            Amount::from_str("0.1234").unwrap()
        );
    }

    #[test]
    fn test_dates() {
        let columns = Columns::new(b"1120110524170505000000GENAST      ", 1);
        assert_eq!(columns.date(3, 10).unwrap(), date(2011, 5, 24));
        assert_eq!(columns.short_date(11, 16).unwrap(), date(2017, 5, 5));
        assert_eq!(columns.short_date_or_zero(17, 22).unwrap(), None);
        assert_eq!(
            columns.payment_date(23, 28).unwrap(),
            Some(TransferDate::Genast)
        );
        assert_eq!(columns.payment_date(29, 34).unwrap(), None);
        assert_eq!(
            columns.payment_date(11, 16).unwrap(),
            Some(TransferDate::On(date(2017, 5, 5)))
        );
        assert!(columns.short_date(23, 28).is_err());
    }
}
