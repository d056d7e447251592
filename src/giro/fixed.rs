//! Fixed-width record lines.
//!
//! Every Bankgirot and Plusgirot record is a run of columns with a two or four character tag in
//! front. [`Record`] appends the columns left to right and checks the total width at the end.
//! Text columns are cut to fit; numeric columns never are, a number that does not fit is an
//! error.

use crate::error::{CodecError, CodecResult};
use crate::model::Amount;

/// The width of every record line in the order and notification files.
pub const RECORD_WIDTH: usize = 80;

#[derive(Debug, Clone)]
pub(crate) struct Record {
    tag: &'static str,
    line: String,
}

fn truncated(value: &str, width: usize) -> &str {
    match value.char_indices().nth(width) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

impl Record {
    pub(crate) fn new(tag: &'static str) -> Self {
        let mut line = String::with_capacity(RECORD_WIDTH);
        line.push_str(tag);
        Self { tag, line }
    }

    /// Left aligned text, cut to `width` characters.
    pub(crate) fn text(&mut self, value: &str, width: usize) -> &mut Self {
        let value = truncated(value, width);
        self.line.push_str(value);
        self.blank(width - value.chars().count())
    }

    /// Right aligned text, cut to `width` characters.
    pub(crate) fn text_right(&mut self, value: &str, width: usize) -> &mut Self {
        let value = truncated(value, width);
        self.blank(width - value.chars().count());
        self.line.push_str(value);
        self
    }

    /// Left aligned text that must not be cut, such as an account number.
    pub(crate) fn code(&mut self, value: &str, width: usize) -> CodecResult<&mut Self> {
        if value.chars().count() > width {
            return Err(CodecError::FieldOverflow {
                value: value.to_string(),
                width,
            });
        }
        Ok(self.text(value, width))
    }

    /// Right aligned and zero filled. Only digits are accepted.
    pub(crate) fn digits(&mut self, value: &str, width: usize) -> CodecResult<&mut Self> {
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::InvalidValue(format!(
                "'{value}' is not a number ({} record)",
                self.tag
            )));
        }
        if value.len() > width {
            return Err(CodecError::FieldOverflow {
                value: value.to_string(),
                width,
            });
        }
        self.line.extend(std::iter::repeat_n('0', width - value.len()));
        self.line.push_str(value);
        Ok(self)
    }

    pub(crate) fn number(&mut self, value: u64, width: usize) -> CodecResult<&mut Self> {
        self.digits(&value.to_string(), width)
    }

    /// A non-negative amount as whole öre.
    pub(crate) fn ore(&mut self, amount: Amount, width: usize) -> CodecResult<&mut Self> {
        let ore = amount
            .to_ore()
            .and_then(|ore| u64::try_from(ore).ok())
            .ok_or_else(|| {
                CodecError::InvalidValue(format!(
                    "amount {amount} cannot be written in a {} record",
                    self.tag
                ))
            })?;
        self.number(ore, width)
    }

    pub(crate) fn blank(&mut self, width: usize) -> &mut Self {
        self.line.extend(std::iter::repeat_n(' ', width));
        self
    }

    /// Text that is copied as is. Used for the fixed words of a record.
    pub(crate) fn literal(&mut self, value: &str) -> &mut Self {
        self.line.push_str(value);
        self
    }

    pub(crate) fn finish(&self) -> CodecResult<String> {
        self.finish_width(RECORD_WIDTH)
    }

    /// Fills the rest of the line with blanks. A line that is already too wide is an error.
    pub(crate) fn finish_padded(&mut self) -> CodecResult<String> {
        let width = self.line.chars().count();
        self.blank(RECORD_WIDTH.saturating_sub(width));
        self.finish()
    }

    pub(crate) fn finish_width(&self, expected: usize) -> CodecResult<String> {
        let width = self.line.chars().count();
        if width != expected {
            return Err(CodecError::RecordWidth {
                tag: self.tag.to_string(),
                width,
                expected,
            });
        }
        Ok(self.line.clone())
    }
}

/// Joins record lines into file content with a trailing newline.
pub(crate) fn join_lines(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
