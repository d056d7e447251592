//! Tokenizer for one SIE line.
//!
//! A [`Cursor`] walks the raw bytes of a line and hands out labels, strings, numerics and object
//! lists. When a checksum is attached, every consumed field is folded into it as well, which is
//! how the integrity pre-pass and the import pass share one tokenizer.

use crate::charset::decode_pc8;
use crate::sie::crc::Crc32;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

const WHITESPACE: &[u8] = b" \t\x0c";
const NEWLINE: &[u8] = b"\n\r";

/// Why a cursor stopped before producing a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Halt {
    /// The line is exhausted.
    Done,
    /// The line is not valid SIE.
    Bad(String),
}

pub(crate) type Step<T> = Result<T, Halt>;

fn is_whitespace(c: u8) -> bool {
    WHITESPACE.contains(&c)
}

fn is_whitespace_or_newline(c: u8) -> bool {
    is_whitespace(c) || NEWLINE.contains(&c)
}

fn unescape(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && raw.get(i + 1) == Some(&b'"') {
            out.push(b'"');
            i += 2;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    out
}

pub(crate) struct Cursor<'a> {
    line: &'a [u8],
    pos: usize,
    crc: Option<&'a mut Crc32>,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(line: &'a [u8]) -> Self {
        Self {
            line,
            pos: 0,
            crc: None,
        }
    }

    /// A cursor that folds every consumed field into `crc`.
    pub(crate) fn folding(line: &'a [u8], crc: &'a mut Crc32) -> Self {
        Self {
            line,
            pos: 0,
            crc: Some(crc),
        }
    }

    fn fold(&mut self, bytes: &[u8]) {
        if let Some(crc) = self.crc.as_deref_mut() {
            crc.update(bytes);
        }
    }

    /// The byte `offset` positions ahead, rejecting control characters other than tab, CR, LF.
    fn getc(&self, offset: usize) -> Step<u8> {
        let at = self.pos + offset;
        let c = *self.line.get(at).ok_or(Halt::Done)?;
        if (c < 32 || c == 127) && !matches!(c, b'\t' | b'\n' | b'\r') {
            return Err(Halt::Bad(format!(
                "control character {c:#04x} in column {}",
                at + 1
            )));
        }
        Ok(c)
    }

    /// Skips blanks and returns the first byte after them.
    pub(crate) fn skip_whitespace(&mut self) -> Step<u8> {
        loop {
            let c = self.getc(0)?;
            if !is_whitespace(c) {
                return Ok(c);
            }
            self.pos += 1;
        }
    }

    /// True when only the line terminator is left.
    pub(crate) fn at_end_of_record(&self) -> Step<bool> {
        Ok(is_whitespace_or_newline(self.getc(0)?))
    }

    pub(crate) fn label(&mut self) -> Step<Vec<u8>> {
        let line = self.line;
        let start = self.pos;
        loop {
            match self.getc(0) {
                Ok(c) if c == b'#' || c.is_ascii_uppercase() => self.pos += 1,
                Ok(_) => break,
                Err(Halt::Done) if self.pos > start => break,
                Err(e) => return Err(e),
            }
        }
        let label = line[start..self.pos].to_vec();
        self.fold(&label);
        self.skip_whitespace()?;
        Ok(label)
    }

    /// Scans a quoted token whose opening quote has already been passed and returns its raw
    /// bytes. Leaves the cursor after the closing quote.
    fn quoted(&mut self) -> Step<&'a [u8]> {
        let line = self.line;
        let start = self.pos;
        loop {
            let c = self.getc(0)?;
            if c == b'\\' {
                if self.getc(1)? == b'"' {
                    self.pos += 1;
                }
            } else if c == b'"' {
                break;
            }
            self.pos += 1;
        }
        let raw = &line[start..self.pos];
        self.pos += 1;
        Ok(raw)
    }

    pub(crate) fn string(&mut self) -> Step<Vec<u8>> {
        let line = self.line;
        let raw = if self.getc(0)? == b'"' {
            self.pos += 1;
            self.quoted()?
        } else {
            let start = self.pos;
            while !is_whitespace_or_newline(self.getc(0)?) {
                self.pos += 1;
            }
            &line[start..self.pos]
        };
        self.skip_whitespace()?;
        let value = unescape(raw);
        self.fold(&value);
        Ok(value)
    }

    /// Like [`Cursor::string`], but an unquoted value also ends at `{` so that an account
    /// number may be glued to the object list that follows it.
    pub(crate) fn numeric(&mut self) -> Step<Vec<u8>> {
        let line = self.line;
        let start;
        let end;
        if self.getc(0)? == b'"' {
            self.pos += 1;
            start = self.pos;
            loop {
                let c = self.getc(0)?;
                if c == b'"' {
                    break;
                }
                if !c.is_ascii_digit() {
                    return Err(Halt::Bad(format!(
                        "non-digit '{}' in quoted number",
                        char::from(c)
                    )));
                }
                self.pos += 1;
            }
            end = self.pos;
            self.pos += 1;
        } else {
            start = self.pos;
            loop {
                let c = self.getc(0)?;
                if is_whitespace_or_newline(c) || c == b'{' {
                    break;
                }
                self.pos += 1;
            }
            end = self.pos;
        }
        self.skip_whitespace()?;
        let value = line[start..end].to_vec();
        self.fold(&value);
        Ok(value)
    }

    /// A `{dimension object ...}` list. Inside an unquoted item `}}` does not end the list.
    pub(crate) fn object_list(&mut self) -> Step<Vec<Vec<u8>>> {
        let line = self.line;
        if self.getc(0)? != b'{' {
            return Err(Halt::Bad("expected '{' to open an object list".to_string()));
        }
        self.pos += 1;
        self.skip_whitespace()?;

        let mut items = Vec::new();
        loop {
            let c = self.getc(0)?;
            if c == b'}' {
                self.pos += 1;
                break;
            }
            if c == b'"' {
                self.pos += 1;
                let raw = self.quoted()?;
                items.push(unescape(raw));
            } else {
                let start = self.pos;
                loop {
                    let c = self.getc(0)?;
                    if c == b'}' {
                        if self.getc(1)? != b'}' {
                            break;
                        }
                    } else if is_whitespace(c) {
                        break;
                    }
                    self.pos += 1;
                }
                items.push(line[start..self.pos].to_vec());
            }
            self.skip_whitespace()?;
        }
        self.skip_whitespace()?;
        if items.len() % 2 != 0 {
            return Err(Halt::Bad(format!(
                "object list has {} items, expected dimension and object pairs",
                items.len()
            )));
        }
        for item in &items {
            self.fold(item);
        }
        Ok(items)
    }

    /// Consumes whatever is left of the line as plain strings and object lists. Used for labels
    /// without a known format so that they are still covered by the checksum.
    pub(crate) fn rest(&mut self) -> Step<()> {
        while !self.at_end_of_record()? {
            if self.getc(0)? == b'{' {
                self.object_list()?;
            } else {
                self.string()?;
            }
        }
        Ok(())
    }

    /// Reads the parameters of one record according to its format.
    pub(crate) fn read_record(&mut self, format: &[Slot]) -> Step<Params> {
        let mut values = Vec::with_capacity(format.len());
        for slot in format {
            if slot.optional && self.at_end_of_record()? {
                values.push(None);
                continue;
            }
            let param = match slot.kind {
                Kind::Text => Param::Text(decode_pc8(&self.string()?)),
                Kind::Numeric => Param::Text(decode_pc8(&self.numeric()?)),
                Kind::Decimal => {
                    let raw = self.string()?;
                    if raw.is_empty() {
                        if slot.optional {
                            Param::Empty
                        } else {
                            Param::Decimal(Decimal::ZERO)
                        }
                    } else {
                        let s = decode_pc8(&raw);
                        let value = Decimal::from_str(&s)
                            .map_err(|_| Halt::Bad(format!("'{s}' is not a decimal number")))?;
                        Param::Decimal(value)
                    }
                }
                Kind::Integer => {
                    let raw = self.string()?;
                    if raw.is_empty() {
                        Param::Empty
                    } else {
                        let s = decode_pc8(&raw);
                        let value = i64::from_str(&s)
                            .map_err(|_| Halt::Bad(format!("'{s}' is not an integer")))?;
                        Param::Integer(value)
                    }
                }
                Kind::Date => {
                    let raw = self.string()?;
                    if raw.is_empty() && slot.optional {
                        Param::Empty
                    } else {
                        let s = decode_pc8(&raw);
                        let date = NaiveDate::parse_from_str(&s, "%Y%m%d")
                            .map_err(|_| Halt::Bad(format!("'{s}' is not a YYYYMMDD date")))?;
                        Param::Date(date)
                    }
                }
                Kind::List => Param::List(
                    self.object_list()?
                        .iter()
                        .map(|item| decode_pc8(item))
                        .collect(),
                ),
            };
            values.push(Some(param));
        }
        Ok(Params { values })
    }
}

/// The parameter types of a record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    /// `T`
    Text,
    /// `T*`, text that may be followed directly by an object list.
    Numeric,
    /// `N`
    Decimal,
    /// `I`
    Integer,
    /// `D`, `YYYYMMDD`.
    Date,
    /// `L`
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) kind: Kind,
    pub(crate) optional: bool,
}

/// Parses a compact format such as `"I T N [N]"`.
pub(crate) fn parse_format(format: &str) -> Vec<Slot> {
    format
        .split_whitespace()
        .filter_map(|token| {
            let (optional, code) = match token.strip_prefix('[').and_then(|t| t.strip_suffix(']'))
            {
                Some(inner) => (true, inner),
                None => (false, token),
            };
            let kind = match code {
                "T" => Kind::Text,
                "T*" => Kind::Numeric,
                "N" => Kind::Decimal,
                "I" => Kind::Integer,
                "D" => Kind::Date,
                "L" => Kind::List,
                _ => return None,
            };
            Some(Slot { kind, optional })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Param {
    Text(String),
    Decimal(Decimal),
    Integer(i64),
    Date(NaiveDate),
    List(Vec<String>),
    /// An empty integer, optional decimal or optional date.
    Empty,
}

/// The parameters of one record, indexed by position. Absent optional parameters are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Params {
    values: Vec<Option<Param>>,
}

impl Params {
    pub(crate) fn get(&self, index: usize) -> Option<&Param> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn text(&self, index: usize) -> &str {
        match self.get(index) {
            Some(Param::Text(s)) => s,
            _ => "",
        }
    }

    /// A text parameter that is present and not empty.
    pub(crate) fn opt_text(&self, index: usize) -> Option<String> {
        match self.get(index) {
            Some(Param::Text(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    pub(crate) fn set_text(&mut self, index: usize, value: String) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = Some(Param::Text(value));
        }
    }

    pub(crate) fn decimal(&self, index: usize) -> Decimal {
        match self.get(index) {
            Some(Param::Decimal(d)) => *d,
            _ => Decimal::ZERO,
        }
    }

    /// An optional decimal that is present and not zero.
    pub(crate) fn opt_decimal(&self, index: usize) -> Option<Decimal> {
        match self.get(index) {
            Some(Param::Decimal(d)) if !d.is_zero() => Some(*d),
            _ => None,
        }
    }

    pub(crate) fn integer(&self, index: usize) -> Option<i64> {
        match self.get(index) {
            Some(Param::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub(crate) fn date(&self, index: usize) -> Option<NaiveDate> {
        match self.get(index) {
            Some(Param::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub(crate) fn list(&self, index: usize) -> &[String] {
        match self.get(index) {
            Some(Param::List(items)) => items,
            _ => &[],
        }
    }
}
