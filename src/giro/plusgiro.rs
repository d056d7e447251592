//! Plusgirot CFP PO3 payment orders.

use crate::error::{CodecError, CodecResult};
use crate::giro::fixed::{join_lines, Record};
use crate::model::{Amount, IdentifierType, SupplierInvoice, TransferMethod};
use chrono::NaiveDate;
use tracing::debug;

const MESSAGE_WIDTH: usize = 35;
const MAX_MESSAGE_RECORDS: usize = 5;

/// MH00, the sender and the account the payments are drawn from.
pub fn header_record(orgnum: &str, sending_bank_account: &str) -> CodecResult<String> {
    Record::new("MH00")
        .blank(8)
        .code(&orgnum.replace('-', ""), 10)?
        .blank(12)
        .code(sending_bank_account, 10)?
        .literal("SEK")
        .blank(6)
        .literal("SEK")
        .blank(24)
        .finish()
}

fn field<'a>(
    value: &'a Option<String>,
    name: &'static str,
    si: &SupplierInvoice,
) -> CodecResult<&'a str> {
    value.as_deref().ok_or_else(|| CodecError::MissingField {
        field: name,
        context: format!("plusgiro payment of invoice {}", si.id),
    })
}

/// PI00. Payment types are 00 for plusgiro, 05 for bankgiro and 09 for bank accounts.
pub fn payment_instruction_record(si: &SupplierInvoice, today: NaiveDate) -> CodecResult<String> {
    let uses_reference = |accepted: &[IdentifierType]| {
        accepted.contains(&si.invoice_identifier_type)
    };
    let (payment_type, clearing, address, reference) = match si.transfer_method {
        TransferMethod::Pgnum => (
            "00",
            "",
            field(&si.pgnum, "pgnum", si)?,
            uses_reference(&[IdentifierType::Ocr, IdentifierType::InvoiceNumber])
                .then(|| si.reference())
                .flatten()
                .unwrap_or_default()
                .to_string(),
        ),
        TransferMethod::Bgnum => (
            "05",
            "",
            field(&si.bgnum, "bgnum", si)?,
            uses_reference(&[IdentifierType::Ocr, IdentifierType::InvoiceNumber])
                .then(|| si.reference())
                .flatten()
                .unwrap_or_default()
                .to_string(),
        ),
        TransferMethod::Bankaccount => (
            "09",
            field(&si.bankclearing, "bankclearing", si)?,
            field(&si.bankaccount, "bankaccount", si)?,
            uses_reference(&[IdentifierType::Message, IdentifierType::InvoiceNumber])
                .then(|| si.reference())
                .flatten()
                .unwrap_or_default()
                .chars()
                .take(12)
                .collect::<String>(),
        ),
        TransferMethod::Address => {
            return Err(CodecError::UnsupportedTransferMethod(
                si.transfer_method.to_string(),
            ))
        }
    };
    let date = si.transfer_date.unwrap_or(today);
    Record::new("PI00")
        .literal(payment_type)
        .code(clearing, 5)?
        .code(address, 10)?
        .blank(3)
        .literal(&date.format("%Y%m%d").to_string())
        .ore(si.amount, 13)?
        .text(&reference, 25)
        .blank(10)
        .finish()
}

/// BA00, our own reference: the invoice id.
pub fn reference_record(si: &SupplierInvoice) -> CodecResult<String> {
    Record::new("BA00")
        .text(&si.recipient, 18)
        .blank(9)
        .text(&si.id.to_string(), 35)
        .blank(14)
        .finish()
}

/// Greedy word wrap. Words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(width) {
            let piece: String = piece.iter().collect();
            let len = current.chars().count();
            if len > 0 && len + 1 + piece.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// BM99, the free text message for giro payments, two lines per record.
pub fn message_records(si: &SupplierInvoice) -> CodecResult<Vec<String>> {
    let giro = matches!(
        si.transfer_method,
        TransferMethod::Pgnum | TransferMethod::Bgnum
    );
    let message = match (&si.message, si.invoice_identifier_type) {
        (Some(message), IdentifierType::Message) if giro => message,
        _ => return Ok(Vec::new()),
    };
    wrap(message, MESSAGE_WIDTH)
        .chunks(2)
        .take(MAX_MESSAGE_RECORDS)
        .map(|pair| {
            Record::new("BM99")
                .text(&pair[0], MESSAGE_WIDTH)
                .text(pair.get(1).map(String::as_str).unwrap_or_default(), MESSAGE_WIDTH)
                .blank(6)
                .finish()
        })
        .collect()
}

/// MT00, number of payments and their sum.
pub fn closing_record(invoices: &[SupplierInvoice]) -> CodecResult<String> {
    let total = invoices
        .iter()
        .map(|si| si.amount)
        .sum::<Amount>();
    Record::new("MT00")
        .blank(25)
        .number(invoices.len() as u64, 7)?
        .ore(total, 15)?
        .blank(29)
        .finish()
}

pub fn order_records(
    orgnum: &str,
    sending_bank_account: &str,
    invoices: &[SupplierInvoice],
    today: NaiveDate,
) -> CodecResult<Vec<String>> {
    let mut lines = vec![header_record(orgnum, sending_bank_account)?];
    for si in invoices {
        lines.push(payment_instruction_record(si, today)?);
        lines.push(reference_record(si)?);
        lines.extend(message_records(si)?);
    }
    lines.push(closing_record(invoices)?);
    debug!(
        "Generated {} PO3 records for {} invoices",
        lines.len(),
        invoices.len()
    );
    Ok(lines)
}

/// The order file content.
pub fn order(
    orgnum: &str,
    sending_bank_account: &str,
    invoices: &[SupplierInvoice],
    today: NaiveDate,
) -> CodecResult<String> {
    Ok(join_lines(&order_records(
        orgnum,
        sending_bank_account,
        invoices,
        today,
    )?))
}
