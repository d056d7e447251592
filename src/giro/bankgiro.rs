//! Bankgirot Leverantörsbetalningar (LB) payment orders.

use crate::error::{CodecError, CodecResult};
use crate::giro::fixed::{join_lines, Record};
use crate::giro::toid;
use crate::model::{Amount, BankgiroProvider, BgcOrder, SupplierInvoice, TransferMethod};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::debug;

pub const DEFAULT_FIXED_INFORMATION: &str = "VID SIGILLFEL KONTAKTA 0708562650.";

const PRODUCT: &str = "LEVERANTORSBETALNINGAR";
/// Longest reference that fits in a payment record without information records.
const REFERENCE_WIDTH: usize = 25;
const INFORMATION_WIDTH: usize = 50;
const MAX_INFORMATION_RECORDS: usize = 90;
const PLUSGIRO_INFORMATION_WIDTH: usize = 35;
const MAX_PLUSGIRO_INFORMATION_RECORDS: usize = 9;
/// Amendment code for cancelling a single payment.
const CANCEL_PAYMENT: &str = "14";

/// When Bankgirot should execute a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDate {
    /// As soon as possible.
    Genast,
    On(NaiveDate),
}

impl TransferDate {
    /// Weekend dates move back to the Friday before. A date that is not after `today` cannot be
    /// scheduled and becomes [`TransferDate::Genast`].
    pub fn for_payment(requested: Option<NaiveDate>, today: NaiveDate) -> Self {
        let Some(date) = requested else {
            return TransferDate::Genast;
        };
        let back = match date.weekday() {
            Weekday::Sat => 1,
            Weekday::Sun => 2,
            _ => 0,
        };
        match date.checked_sub_days(Days::new(back)) {
            Some(date) if date > today => TransferDate::On(date),
            _ => TransferDate::Genast,
        }
    }
}

impl Display for TransferDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferDate::Genast => f.write_str("GENAST"),
            TransferDate::On(date) => write!(f, "{}", date.format("%y%m%d")),
        }
    }
}

/// What goes into an order besides the invoices.
#[derive(Debug, Clone)]
pub struct OrderOptions {
    pub today: NaiveDate,
    /// Text for the fixed information record. No record is written when this is `None`.
    pub fixed_information: Option<String>,
}

impl OrderOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            fixed_information: None,
        }
    }
}

/// Giro numbers are often written with a dash or spaces.
pub(crate) fn giro_number(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '-' | ' ')).collect()
}

fn yymmdd(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// The payee column: the transfer address, or the giro number of the invoice's transfer method.
fn payee(si: &SupplierInvoice) -> CodecResult<String> {
    let fallback = match si.transfer_method {
        TransferMethod::Bgnum => si.bgnum.as_deref(),
        TransferMethod::Pgnum => si.pgnum.as_deref(),
        _ => None,
    };
    let address = Some(si.transfer_address.as_str())
        .filter(|a| !a.is_empty())
        .or(fallback)
        .ok_or_else(|| CodecError::MissingField {
            field: "transfer_address",
            context: format!("invoice {}", si.id),
        })?;
    Ok(giro_number(address))
}

/// TK11.
pub fn opening_record(bgnum: &str, today: NaiveDate) -> CodecResult<String> {
    Record::new("11")
        .digits(&giro_number(bgnum), 10)?
        .literal(&yymmdd(today))
        .literal(PRODUCT)
        .blank(40)
        .finish()
}

/// TK12. The information is valid for five days.
pub fn fixed_information_record(text: Option<&str>, today: NaiveDate) -> CodecResult<String> {
    let valid_until = today + Days::new(5);
    Record::new("12")
        .text(text.unwrap_or(DEFAULT_FIXED_INFORMATION), 50)
        .literal(&yymmdd(valid_until))
        .blank(22)
        .finish()
}

fn payment(tag: &'static str, si: &SupplierInvoice, today: NaiveDate) -> CodecResult<String> {
    let date = TransferDate::for_payment(si.transfer_date, today);
    Record::new(tag)
        .digits(&payee(si)?, 10)?
        .text(&si.invoice_identifier, REFERENCE_WIDTH)
        .ore(si.amount, 12)?
        .text_right(&date.to_string(), 6)
        .blank(5)
        .text_right(&toid::encode(&si.id), 20)
        .finish()
}

/// TK14, payment to a bankgiro number or a payee number.
pub fn payment_record(si: &SupplierInvoice, today: NaiveDate) -> CodecResult<String> {
    payment("14", si, today)
}

/// TK54, payment to a plusgiro number.
pub fn plusgiro_payment_record(si: &SupplierInvoice, today: NaiveDate) -> CodecResult<String> {
    payment("54", si, today)
}

fn chunks(text: &str, width: usize, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width)
        .take(max)
        .map(|c| c.iter().collect())
        .collect()
}

/// TK25, the part of a long reference that does not fit in the payment record.
pub fn information_records(si: &SupplierInvoice) -> CodecResult<Vec<String>> {
    let address = payee(si)?;
    chunks(
        &si.invoice_identifier,
        INFORMATION_WIDTH,
        MAX_INFORMATION_RECORDS,
    )
    .iter()
    .map(|slice| {
        Record::new("25")
            .digits(&address, 10)?
            .text(slice, INFORMATION_WIDTH)
            .blank(18)
            .finish()
    })
    .collect()
}

/// TK65, information records for plusgiro payments.
pub fn plusgiro_information_records(si: &SupplierInvoice) -> CodecResult<Vec<String>> {
    let address = payee(si)?;
    chunks(
        &si.invoice_identifier,
        PLUSGIRO_INFORMATION_WIDTH,
        MAX_PLUSGIRO_INFORMATION_RECORDS,
    )
    .iter()
    .map(|slice| {
        Record::new("65")
            .digits(&address, 10)?
            .text(slice, PLUSGIRO_INFORMATION_WIDTH)
            .blank(33)
            .finish()
    })
    .collect()
}

/// TK40, registers the bank account a payee number pays out to.
pub fn account_number_record(si: &SupplierInvoice) -> CodecResult<String> {
    let missing = |field| CodecError::MissingField {
        field,
        context: format!("account transfer of invoice {}", si.id),
    };
    let clearing = si.bankclearing.as_deref().ok_or_else(|| missing("bankclearing"))?;
    let account = si.bankaccount.as_deref().ok_or_else(|| missing("bankaccount"))?;
    let clearing: String = clearing.chars().take(4).collect();
    Record::new("40")
        .literal("0000")
        .digits(&payee(si)?, 6)?
        .digits(&clearing, 4)?
        .digits(&giro_number(account), 12)?
        .text_right(&si.invoice_identifier.chars().take(12).collect::<String>(), 12)
        // Salary marker, never set.
        .blank(1)
        .blank(39)
        .finish()
}

/// TK29. `total` is in öre and may be negative.
pub fn total_amount_record(bgnum: &str, count: usize, total: i64) -> CodecResult<String> {
    let sign = if total < 0 { "-" } else { " " };
    Record::new("29")
        .digits(&giro_number(bgnum), 10)?
        .number(count as u64, 8)?
        .number(total.unsigned_abs(), 12)?
        .literal(sign)
        .blank(47)
        .finish()
}

/// The records of one invoice, in the order Bankgirot expects them.
fn invoice_records(si: &SupplierInvoice, today: NaiveDate) -> CodecResult<Vec<String>> {
    let long_reference = si.invoice_identifier.chars().count() > REFERENCE_WIDTH;
    let mut lines = Vec::new();
    match si.transfer_method {
        TransferMethod::Bgnum => {
            lines.push(payment_record(si, today)?);
            if long_reference {
                lines.extend(information_records(si)?);
            }
        }
        TransferMethod::Pgnum => {
            lines.push(plusgiro_payment_record(si, today)?);
            if long_reference {
                lines.extend(plusgiro_information_records(si)?);
            }
        }
        TransferMethod::Bankaccount => {
            lines.push(account_number_record(si)?);
            lines.push(payment_record(si, today)?);
            if long_reference {
                lines.extend(information_records(si)?);
            }
        }
        TransferMethod::Address => {
            return Err(CodecError::UnsupportedTransferMethod(
                si.transfer_method.to_string(),
            ))
        }
    }
    Ok(lines)
}

/// All record lines of a payment order, opening and total records included.
pub fn order_records(
    provider: &BankgiroProvider,
    invoices: &[SupplierInvoice],
    options: &OrderOptions,
) -> CodecResult<Vec<String>> {
    let mut lines = vec![opening_record(&provider.bgnum, options.today)?];
    if let Some(text) = &options.fixed_information {
        lines.push(fixed_information_record(Some(text), options.today)?);
    }
    let mut total = 0i64;
    for si in invoices {
        lines.extend(invoice_records(si, options.today)?);
        total += si.amount.to_ore().ok_or_else(|| {
            CodecError::InvalidValue(format!("amount {} of invoice {}", si.amount, si.id))
        })?;
    }
    lines.push(total_amount_record(&provider.bgnum, invoices.len(), total)?);
    debug!(
        "Generated {} LB records for {} invoices",
        lines.len(),
        invoices.len()
    );
    Ok(lines)
}

/// The unsigned order file content.
pub fn order(
    provider: &BankgiroProvider,
    invoices: &[SupplierInvoice],
    options: &OrderOptions,
) -> CodecResult<String> {
    Ok(join_lines(&order_records(provider, invoices, options)?))
}

/// Builds a new, unsigned [`BgcOrder`].
pub fn create_order(
    provider: &BankgiroProvider,
    invoices: &[SupplierInvoice],
    options: &OrderOptions,
    created: DateTime<Utc>,
) -> CodecResult<BgcOrder> {
    Ok(BgcOrder::new(order(provider, invoices, options)?, created))
}

/// The `LB` record that cancels one earlier payment. Both date columns are left blank and the
/// amount is written in öre, matching how the record is read back.
pub fn cancellation_record(
    si: &SupplierInvoice,
    service_bureau_number: &str,
    sender_bgnum: &str,
) -> CodecResult<String> {
    let payment_type = match si.transfer_method {
        TransferMethod::Pgnum => "PGBET",
        _ => "",
    };
    Record::new("LB")
        .literal(CANCEL_PAYMENT)
        .digits(service_bureau_number, 6)?
        .digits(&giro_number(sender_bgnum), 10)?
        .digits(&payee(si)?, 10)?
        .blank(12)
        .ore(si.amount, 12)?
        .blank(12)
        .text(payment_type, 5)
        .literal("SEK")
        .blank(6)
        .finish()
}

/// An unsigned order cancelling every payment in `invoices`.
pub fn cancellation_order(
    provider: &BankgiroProvider,
    invoices: &[SupplierInvoice],
    service_bureau_number: &str,
) -> CodecResult<String> {
    let lines = invoices
        .iter()
        .map(|si| cancellation_record(si, service_bureau_number, &provider.bgnum))
        .collect::<CodecResult<Vec<_>>>()?;
    Ok(join_lines(&lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::giro::fixed::RECORD_WIDTH;
    use crate::model::{EntityId, IdentifierType};
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn provider() -> BankgiroProvider {
        BankgiroProvider {
            bgnum: "123-4566".to_string(),
        }
    }

    fn invoice(id: &str, method: TransferMethod, address: &str) -> SupplierInvoice {
        SupplierInvoice {
            id: EntityId::from_str(id).unwrap(),
            transfer_method: method,
            transfer_address: address.to_string(),
            invoice_identifier: "56897456986".to_string(),
            invoice_identifier_type: IdentifierType::InvoiceNumber,
            amount: Amount::from_str("980.00").unwrap(),
            transfer_date: Some(date(2017, 5, 5)),
            recipient: "Mottagaren AB".to_string(),
            bgnum: None,
            pgnum: None,
            bankclearing: None,
            bankaccount: None,
            ocr: None,
            invoice_number: Some("56897456986".to_string()),
            message: None,
        }
    }

    fn bottles() -> String {
        let mut text: String = (1..=99)
            .rev()
            .map(|i| {
                format!("{i} bottles of beer on the wall, ").repeat(2)
                    + "Take one down, pass it around, "
            })
            .collect();
        text.push_str("no more bottles of beer!");
        text
    }

    #[test]
    fn test_transfer_date_rules() {
        let wednesday = Some(date(2017, 9, 20));
        assert_eq!(
            TransferDate::for_payment(wednesday, date(2017, 9, 19)).to_string(),
            "170920"
        );
        for today in [date(2017, 9, 20), date(2017, 9, 21)] {
            assert_eq!(
                TransferDate::for_payment(wednesday, today),
                TransferDate::Genast
            );
        }
        let sunday = Some(date(2017, 9, 24));
        assert_eq!(
            TransferDate::for_payment(sunday, date(2017, 9, 21)).to_string(),
            "170922"
        );
        for day in 22..=25 {
            assert_eq!(
                TransferDate::for_payment(sunday, date(2017, 9, day)),
                TransferDate::Genast
            );
        }
        assert_eq!(
            TransferDate::for_payment(None, date(2017, 9, 1)),
            TransferDate::Genast
        );
    }

    #[test]
    fn test_opening_record() {
        assert_eq!(
            opening_record("1234566", date(2017, 5, 8)).unwrap(),
            format!("110001234566170508LEVERANTORSBETALNINGAR{}", " ".repeat(40))
        );
    }

    #[test]
    fn test_fixed_information_record() {
        let line = fixed_information_record(None, date(2017, 5, 29)).unwrap();
        assert_eq!(line.len(), RECORD_WIDTH);
        assert!(line.starts_with("12VID SIGILLFEL KONTAKTA 0708562650.  "));
        assert_eq!(&line[52..58], "170603");
        let long = "x".repeat(70);
        let line = fixed_information_record(Some(&long), date(2017, 5, 29)).unwrap();
        assert_eq!(&line[2..52], "x".repeat(50));
    }

    #[test]
    fn test_payment_record() {
        let si = invoice("591462b6907e1340e0ffbd5a", TransferMethod::Bgnum, "8888885");
        assert_eq!(
            payment_record(&si, date(2017, 5, 1)).unwrap(),
            "14000888888556897456986              000000098000170505     LEKGFNUQPYJUBYH7XVNA"
        );
        assert_eq!(
            payment_record(&si, date(2017, 6, 1)).unwrap(),
            "14000888888556897456986              000000098000GENAST     LEKGFNUQPYJUBYH7XVNA"
        );
    }

    #[test]
    fn test_plusgiro_payment_record() {
        let mut si = invoice("591462b6907e1340e0ffbd5a", TransferMethod::Pgnum, "");
        si.pgnum = Some("4765101-3".to_string());
        assert_eq!(
            plusgiro_payment_record(&si, date(2017, 5, 1)).unwrap(),
            "54004765101356897456986              000000098000170505     LEKGFNUQPYJUBYH7XVNA"
        );
    }

    #[test]
    fn test_information_records() {
        let mut si = invoice("591462b6907e1340e0ffbd5a", TransferMethod::Bgnum, "8888885");
        si.invoice_identifier = bottles();
        let lines = information_records(&si).unwrap();
        assert_eq!(lines.len(), MAX_INFORMATION_RECORDS);
        for line in &lines {
            assert_eq!(line.len(), RECORD_WIDTH);
            assert_eq!(&line[..12], "250008888885");
            assert!(line[62..].trim().is_empty());
        }

        si.invoice_identifier = "a".repeat(100);
        assert_eq!(information_records(&si).unwrap().len(), 2);
        si.invoice_identifier = "a".repeat(101);
        let lines = information_records(&si).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].trim_end(), "250008888885a");
    }

    #[test]
    fn test_plusgiro_information_records() {
        let mut si = invoice("591462b6907e1340e0ffbd5a", TransferMethod::Pgnum, "47651013");
        si.invoice_identifier = bottles();
        let lines = plusgiro_information_records(&si).unwrap();
        assert_eq!(lines.len(), MAX_PLUSGIRO_INFORMATION_RECORDS);
        for line in &lines {
            assert_eq!(line.len(), RECORD_WIDTH);
            assert_eq!(&line[..12], "650047651013");
            assert!(line[47..].trim().is_empty());
        }
    }

    #[test]
    fn test_account_number_record() {
        let mut si = invoice("591462b6907e1340e0ffbd5a", TransferMethod::Bankaccount, "18");
        si.bankclearing = Some("4321".to_string());
        si.bankaccount = Some("47651013".to_string());
        let line = account_number_record(&si).unwrap();
        assert_eq!(
            line,
            format!("4000000000184321000047651013 56897456986{}", " ".repeat(40))
        );

        si.bankaccount = None;
        assert!(matches!(
            account_number_record(&si),
            Err(CodecError::MissingField {
                field: "bankaccount",
                ..
            })
        ));
    }

    #[test]
    fn test_total_amount_record() {
        assert_eq!(
            total_amount_record("1234566", 7, 500029900).unwrap(),
            format!("29000123456600000007000500029900 {}", " ".repeat(47))
        );
        let negative = total_amount_record("1234566", 1, -100).unwrap();
        assert_eq!(&negative[30..33], "00-");
    }

    #[test]
    fn test_order() {
        let mut second = invoice("591462b6907e1340e0ffbd5e", TransferMethod::Pgnum, "47651013");
        second.amount = Amount::from_str("20.00").unwrap();
        second.invoice_identifier = "x".repeat(40);
        let invoices = vec![
            invoice("591462b6907e1340e0ffbd5a", TransferMethod::Bgnum, "8888885"),
            second,
        ];
        let mut options = OrderOptions::new(date(2017, 5, 8));
        options.fixed_information = Some("Ring oss".to_string());
        let content = order(&provider(), &invoices, &options).unwrap();
        assert!(content.ends_with('\n'));
        let lines: Vec<&str> = content.lines().collect();
        let tags: Vec<&str> = lines.iter().map(|l| &l[..2]).collect();
        assert_eq!(tags, vec!["11", "12", "14", "54", "65", "65", "29"]);
        assert!(lines.iter().all(|l| l.len() == RECORD_WIDTH));
        assert!(lines[2].contains("GENAST"));
        assert!(lines[3].ends_with("LEKGFNUQPYJUBYH7XVPA"));
        assert_eq!(&lines[6][..33], "29000123456600000002000000100000 ");
    }

    #[test]
    fn test_order_rejects_address_payments() {
        let invoices = vec![invoice(
            "591462b6907e1340e0ffbd5a",
            TransferMethod::Address,
            "8888885",
        )];
        let result = order(&provider(), &invoices, &OrderOptions::new(date(2017, 5, 8)));
        assert!(matches!(
            result,
            Err(CodecError::UnsupportedTransferMethod(m)) if m == "address"
        ));
    }

    #[test]
    fn test_create_order() {
        let invoices = vec![invoice(
            "591462b6907e1340e0ffbd5a",
            TransferMethod::Bgnum,
            "8888885",
        )];
        let created = Utc::now();
        let order = create_order(
            &provider(),
            &invoices,
            &OrderOptions::new(date(2017, 5, 8)),
            created,
        )
        .unwrap();
        assert_eq!(order.created, created);
        assert!(!order.is_signed());
        assert_eq!(order.order_unsigned.lines().count(), 3);
    }

    #[test]
    fn test_cancellation_record() {
        let si = invoice("591462b6907e1340e0ffbd5a", TransferMethod::Pgnum, "47651013");
        let line = cancellation_record(&si, "4711", "1234566").unwrap();
        assert_eq!(line.len(), RECORD_WIDTH);
        assert_eq!(&line[..30], "LB1400471100012345660047651013");
        assert_eq!(&line[42..54], "000000098000");
        assert_eq!(&line[66..74], "PGBETSEK");
        assert!(line[30..42].trim().is_empty());
    }

    #[test]
    fn test_cancellation_order() {
        let invoices = vec![
            invoice("591462b6907e1340e0ffbd5a", TransferMethod::Bgnum, "8888885"),
            invoice("591462b6907e1340e0ffbd5e", TransferMethod::Bgnum, "8888885"),
        ];
        let content = cancellation_order(&provider(), &invoices, "4711").unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().all(|l| l.starts_with("LB14") && &l[66..71] == "     "));
    }

    #[test]
    fn test_records_are_80_wide_for_long_fields() {
        let mut si = invoice("591462b6907e1340e0ffbd5a", TransferMethod::Bankaccount, "999999");
        si.bankclearing = Some("812345".to_string());
        si.bankaccount = Some("9 876 543-2".to_string());
        for n in 0..60 {
            si.invoice_identifier = "ö".repeat(n * 7);
            for line in invoice_records(&si, date(2017, 5, 1)).unwrap() {
                assert_eq!(line.chars().count(), RECORD_WIDTH, "{line}");
            }
        }
    }
}
