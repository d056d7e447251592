//! Writes Plusgirot TOTALIN files for a set of purchases, the way a real notification for them
//! would look. Used to produce test input for the TOTALIN reader and for matching runs.

use crate::charset::encode_latin1_lossy;
use crate::error::{CodecError, CodecResult};
use crate::giro::fixed::{join_lines, Record};
use crate::model::Amount;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A purchase waiting for payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalinPurchase {
    pub ocr: String,
    pub total: Amount,
    /// The purchase is paid in this many equal parts, one transaction each.
    #[serde(default = "one")]
    pub partial_payments: u32,
    #[serde(default)]
    pub buyer_name: Option<String>,
    /// Street on the first line, then `ZIP CITY`.
    #[serde(default)]
    pub buyer_address: Option<String>,
}

fn one() -> u32 {
    1
}

impl TotalinPurchase {
    pub fn new(ocr: impl Into<String>, total: Amount) -> Self {
        Self {
            ocr: ocr.into(),
            total,
            partial_payments: 1,
            buyer_name: None,
            buyer_address: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalinFile {
    pub file_id: u64,
    pub timestamp: NaiveDateTime,
    /// The receiving plusgiro account. Anything but digits is dropped.
    pub pgnum: String,
    /// Transaction numbers are derived from this one, counting per purchase.
    pub start_transaction: u64,
    pub purchases: Vec<TotalinPurchase>,
}

/// Splits `street\nZIP CITY`. The postal code is the longest run of digits and blanks that is
/// followed by a blank and a city name.
fn split_address(address: &str) -> Option<(&str, &str, &str)> {
    let (street, rest) = address.split_once('\n')?;
    let rest = rest.lines().next()?;
    let prefix = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ' '))
        .unwrap_or(rest.len());
    let split = rest[..prefix]
        .char_indices()
        .rev()
        .find(|&(i, c)| c == ' ' && i > 0 && i + 1 < rest.len())
        .map(|(i, _)| i)?;
    if street.is_empty() {
        return None;
    }
    Some((street.trim(), rest[..split].trim(), rest[split + 1..].trim()))
}

/// TK50 to TK52 for one transaction.
fn payer_records(purchase: &TotalinPurchase) -> CodecResult<Vec<String>> {
    let mut lines = Vec::new();
    if let Some(name) = purchase.buyer_name.as_deref().filter(|n| !n.is_empty()) {
        lines.push(Record::new("50").text(name, 35).blank(35).finish_padded()?);
    }
    if let Some((street, zip, city)) = purchase.buyer_address.as_deref().and_then(split_address) {
        lines.push(Record::new("51").text(street, 35).blank(35).finish_padded()?);
        lines.push(Record::new("52").text(zip, 9).text(city, 35).finish_padded()?);
    }
    Ok(lines)
}

fn transaction_number(number: u64) -> String {
    format!("{number:1>17}")
}

fn ore(amount: Amount) -> CodecResult<i64> {
    amount
        .to_ore()
        .filter(|ore| *ore >= 0)
        .ok_or_else(|| CodecError::InvalidValue(format!("purchase total {amount}")))
}

/// The file content, ISO-8859-1 encoded.
pub fn generate(file: &TotalinFile) -> CodecResult<Vec<u8>> {
    let date = file.timestamp.format("%Y%m%d").to_string();
    let pgnum: String = file.pgnum.chars().filter(char::is_ascii_digit).collect();

    let mut lines = vec![Record::new("00")
        .literal("TI")
        .number(file.file_id, 8)?
        .blank(2)
        .literal(&file.timestamp.format("%Y%m%d%H%M%S").to_string())
        .literal("000000")
        .literal("01TL1TOTALIN-T")
        .finish_padded()?];
    lines.push(
        Record::new("10")
            .code(&pgnum, 36)?
            .literal("SEK")
            .literal(&date)
            .finish_padded()?,
    );

    let mut count = 0u64;
    let mut total = 0i64;
    for (transaction, purchase) in (file.start_transaction..).zip(&file.purchases) {
        let parts = purchase.partial_payments.max(1);
        let part = ore(purchase.total)? / i64::from(parts);
        for n in 1..=u64::from(parts) {
            lines.push(
                Record::new("20")
                    .text(&purchase.ocr, 35)
                    .number(part as u64, 15)?
                    .literal(&transaction_number(transaction + 10 * n))
                    .blank(8)
                    .finish_padded()?,
            );
            lines.extend(payer_records(purchase)?);
            count += 1;
            total += part;
        }
    }

    lines.push(
        Record::new("90")
            .number(count, 8)?
            .number(total as u64, 17)?
            .literal(&date)
            .literal("001")
            .finish_padded()?,
    );
    let line_count = lines.len() as u64 + 1;
    lines.push(Record::new("99").number(line_count, 15)?.finish_padded()?);

    debug!(
        "Generated TOTALIN file {} with {count} transactions",
        file.file_id
    );
    Ok(encode_latin1_lossy(&join_lines(&lines)))
}
