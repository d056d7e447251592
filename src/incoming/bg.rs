//! Bankgirot BGMAX.

use crate::error::{CodecError, CodecResult};
use crate::incoming::{no_open, read_records, unknown_record, Columns, RecordReader};
use crate::model::incoming::{
    push_pair, FileKind, GiroAccount, PaymentChannel, PaymentFile, ReferenceCode, ReverseCode,
    Transaction,
};
use crate::model::Amount;
use tracing::{debug, info};

const LAYOUT: &str = "BGMAX";
const VERSION: &str = "01";

#[derive(Default)]
struct Reader {
    file: Option<PaymentFile>,
    ended: bool,
}

/// Cleans the reference column according to what the reference code says it holds.
fn reference(raw: String, code: &str) -> (String, ReferenceCode) {
    match code {
        "0" => (String::new(), ReferenceCode::Empty),
        "1" => (String::new(), ReferenceCode::NoAgreement),
        "2" => (raw.trim().to_string(), ReferenceCode::Ocr),
        "3" => (raw, ReferenceCode::Multiple),
        "4" => (raw.trim_end().to_string(), ReferenceCode::Ocr),
        _ => (raw, ReferenceCode::Faulty),
    }
}

/// TK20 and TK21 share their first columns.
fn payment(columns: &Columns, amount: Amount) -> CodecResult<Transaction> {
    let payer = columns.account(3, 12);
    let (customer_ref, reference_code) = reference(columns.text(13, 37), &columns.text(56, 56));
    let channel = columns.text(57, 57);
    let mut transaction = Transaction::new(customer_ref, amount, columns.text(58, 69));
    transaction.payer_account = payer;
    transaction.reference_code = Some(reference_code);
    transaction.payment_channel = Some(
        PaymentChannel::from_code(&channel)
            .ok_or_else(|| columns.error(57, 57, format!("payment channel '{channel}'")))?,
    );
    transaction.image_flag = Some(columns.text(70, 70));
    Ok(transaction)
}

impl Reader {
    fn file(&mut self, tag: &str, columns: &Columns) -> CodecResult<&mut PaymentFile> {
        self.file
            .as_mut()
            .ok_or_else(|| no_open(tag, "file header", columns))
    }

    fn account(&mut self, tag: &str, columns: &Columns) -> CodecResult<&mut GiroAccount> {
        self.file(tag, columns)?
            .accounts
            .last_mut()
            .ok_or_else(|| no_open(tag, "deposit", columns))
    }

    fn transaction(&mut self, tag: &str, columns: &Columns) -> CodecResult<&mut Transaction> {
        self.account(tag, columns)?
            .transactions
            .last_mut()
            .ok_or_else(|| no_open(tag, "payment", columns))
    }

    fn header(&mut self, columns: &Columns) -> CodecResult<()> {
        let layout = columns.text(3, 22);
        let version = columns.text(23, 24);
        let timestamp = columns.text(25, 44);
        let test_mark = columns.text(45, 45);
        let header_error = |reason: String| CodecError::Header {
            line: columns.line(),
            reason,
        };
        if layout != LAYOUT {
            return Err(header_error(format!("layout '{layout}', expected {LAYOUT}")));
        }
        if version != VERSION {
            return Err(header_error(format!("version '{version}', expected {VERSION}")));
        }
        let test = match test_mark.as_str() {
            "P" => false,
            "T" => true,
            _ => return Err(header_error(format!("test mark '{test_mark}'"))),
        };
        debug!("BGMAX file created {timestamp}");
        self.file = Some(PaymentFile {
            kind: FileKind::Bg,
            file_id: timestamp.clone(),
            timestamp,
            test,
            accounts: Vec::new(),
        });
        Ok(())
    }

    fn deposit(&mut self, tag: &str, columns: &Columns) -> CodecResult<()> {
        let receiver = columns.account(3, 37);
        let date = columns.date(38, 45)?;
        let sequence = columns.integer(46, 50)?;
        let total = columns.amount(51, 68)?;
        let count = columns.integer(72, 79)?;
        let deposit_type = columns.text(80, 80);
        let account = self.account(tag, columns)?;
        let parsed = account.transactions.len() as i64;
        if count != parsed {
            return Err(CodecError::CountMismatch {
                what: "deposit payment count",
                declared: count,
                parsed,
            });
        }
        account.receiver_bank_account = Some(receiver);
        account.transaction_date = Some(date);
        account.statement_reference = Some(sequence.to_string());
        account.total = Some(total);
        account.count = Some(count);
        account.deposit_type = Some(deposit_type);
        Ok(())
    }

    fn end(&mut self, tag: &str, columns: &Columns) -> CodecResult<()> {
        let payments = columns.integer(3, 10)?;
        let deductions = columns.integer(11, 18)?;
        let extra_references = columns.integer(19, 26)?;
        let deposits = columns.integer(27, 38)?;
        let file = self.file(tag, columns)?;
        let parsed = file.accounts.len() as i64;
        if deposits != parsed {
            return Err(CodecError::CountMismatch {
                what: "deposit count",
                declared: deposits,
                parsed,
            });
        }
        let parsed = file.transaction_count() as i64;
        if payments + deductions != parsed {
            return Err(CodecError::CountMismatch {
                what: "payment count",
                declared: payments + deductions,
                parsed,
            });
        }
        debug!("{extra_references} extra reference records");
        self.ended = true;
        Ok(())
    }
}

impl RecordReader for Reader {
    fn record(&mut self, tag: &str, columns: &Columns) -> CodecResult<()> {
        match tag {
            "01" => self.header(columns)?,
            "05" => {
                let mut account =
                    GiroAccount::new(columns.account(3, 12), columns.text(23, 25), None);
                account.pg_account = Some(columns.account(13, 22)).filter(|pg| !pg.is_empty());
                self.file(tag, columns)?.accounts.push(account);
            }
            "20" => {
                let transaction = payment(columns, columns.amount(38, 55)?)?;
                self.account(tag, columns)?.transactions.push(transaction);
            }
            "21" => {
                let mut transaction = payment(columns, -columns.amount(38, 55)?)?;
                let code = columns.text(71, 71);
                transaction.reverse_code = ReverseCode::from_code(&code)
                    .ok_or_else(|| columns.error(71, 71, format!("deduction code '{code}'")))?;
                self.account(tag, columns)?.transactions.push(transaction);
            }
            "22" | "23" => {
                let customer_ref = columns.text(13, 37).trim().to_string();
                self.transaction(tag, columns)?.customer_refs.push(customer_ref);
            }
            "25" => {
                let message = columns.text(3, 52);
                self.transaction(tag, columns)?.messages.push(message);
            }
            "26" => {
                let (first, second) = (columns.text(3, 37), columns.text(38, 72));
                push_pair(&mut self.transaction(tag, columns)?.sender_names, first, second);
            }
            "27" => {
                let (street, postal_code) = (columns.text(3, 37), columns.text(38, 46));
                let transaction = self.transaction(tag, columns)?;
                transaction.sender_addresses.push(street);
                transaction.sender_postal_code = postal_code;
            }
            "28" => {
                let (city, country_code) = (columns.text(3, 37), columns.text(73, 74));
                let transaction = self.transaction(tag, columns)?;
                transaction.sender_city = city;
                if !country_code.is_empty() {
                    transaction.sender_country_code = country_code;
                }
            }
            "29" => {
                let orgnum = columns.text(3, 14);
                if !orgnum.is_empty() {
                    self.transaction(tag, columns)?.payer_organization_number =
                        orgnum.trim_start_matches('0').to_string();
                }
            }
            "15" => self.deposit(tag, columns)?,
            "70" => self.end(tag, columns)?,
            _ => return Err(unknown_record(tag, columns)),
        }
        Ok(())
    }
}

/// Reads a BGMAX file. Deposit and file end records are checked against what was read.
pub fn parse(data: &[u8]) -> CodecResult<PaymentFile> {
    let mut reader = Reader::default();
    let lines = read_records(data, &mut reader)?;
    let file = reader.file.ok_or_else(|| CodecError::Header {
        line: 1,
        reason: "no BGMAX file header".to_string(),
    })?;
    if !reader.ended {
        return Err(CodecError::malformed(lines, "BGMAX file ends without an end record"));
    }
    info!(
        "Read BGMAX file {} with {} payments in {} deposits",
        file.file_id,
        file.transaction_count(),
        file.accounts.len()
    );
    Ok(file)
}
