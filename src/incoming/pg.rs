//! Plusgirot TOTALIN.

use crate::error::{CodecError, CodecResult};
use crate::incoming::{no_open, read_records, unknown_record, Columns, RecordReader};
use crate::model::incoming::{
    push_pair, FileKind, ForeignPayment, GiroAccount, PayerAccountType, PaymentFile,
    ReverseCode, Transaction,
};
use tracing::{debug, info};

const FILE_TYPE: &str = "TL1";
const PRODUCTION: &str = "TOTALIN";
const TEST: &str = "TOTALIN-T";

#[derive(Default)]
struct Reader {
    file: Option<PaymentFile>,
    ended: bool,
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
            .ok_or_else(|| no_open(tag, "account", columns))
    }

    fn transaction(&mut self, tag: &str, columns: &Columns) -> CodecResult<&mut Transaction> {
        self.account(tag, columns)?
            .transactions
            .last_mut()
            .ok_or_else(|| no_open(tag, "transaction", columns))
    }

    fn header(&mut self, columns: &Columns) -> CodecResult<()> {
        let customer = columns.text(3, 14);
        let timestamp = columns.text(15, 34);
        let delivery = columns.integer(35, 36)?;
        let file_type = columns.text(37, 39);
        let name = columns.text(40, 49);
        if file_type != FILE_TYPE {
            return Err(CodecError::Header {
                line: columns.line(),
                reason: format!("file type '{file_type}', expected {FILE_TYPE}"),
            });
        }
        if name != PRODUCTION && name != TEST {
            return Err(CodecError::Header {
                line: columns.line(),
                reason: format!("'{name}' is not a TOTALIN file"),
            });
        }
        debug!("TOTALIN file for customer {customer}, delivery {delivery}");
        self.file = Some(PaymentFile {
            kind: FileKind::Pg,
            file_id: format!("{customer}{timestamp}{delivery}"),
            timestamp,
            test: name == TEST,
            accounts: Vec::new(),
        });
        Ok(())
    }

    fn account_end(&mut self, tag: &str, columns: &Columns) -> CodecResult<()> {
        let count = columns.integer(3, 10)?;
        let total = columns.amount(11, 27)?;
        let reference = columns.text(28, 38);
        let account = self.account(tag, columns)?;
        let parsed = account.transactions.len() as i64;
        if count != parsed {
            return Err(CodecError::CountMismatch {
                what: "transaction count",
                declared: count,
                parsed,
            });
        }
        account.count = Some(count);
        account.total = Some(total);
        account.statement_reference = Some(reference);
        Ok(())
    }
}

impl RecordReader for Reader {
    fn record(&mut self, tag: &str, columns: &Columns) -> CodecResult<()> {
        match tag {
            "00" => self.header(columns)?,
            "10" => {
                let account = GiroAccount::new(
                    columns.text(3, 38),
                    columns.text(39, 41),
                    Some(columns.date(42, 49)?),
                );
                self.file(tag, columns)?.accounts.push(account);
            }
            "20" => {
                let mut transaction = Transaction::new(
                    columns.text(3, 37),
                    columns.amount(38, 52)?,
                    columns.text(53, 69),
                );
                transaction.bg_number = Some(columns.text(70, 77)).filter(|bg| !bg.is_empty());
                self.account(tag, columns)?.transactions.push(transaction);
            }
            "25" => {
                let mut transaction = Transaction::new(
                    columns.text(3, 37),
                    -columns.amount(38, 52)?,
                    columns.text(53, 69),
                );
                let code = columns.text(70, 70);
                transaction.reverse_code = ReverseCode::from_code(&code)
                    .ok_or_else(|| columns.error(70, 70, format!("reverse code '{code}'")))?;
                self.account(tag, columns)?.transactions.push(transaction);
            }
            "30" | "40" | "50" | "51" | "61" | "62" => {
                let (first, second) = (columns.text(3, 37), columns.text(38, 72));
                let transaction = self.transaction(tag, columns)?;
                let list = match tag {
                    "30" => &mut transaction.customer_refs,
                    "40" => &mut transaction.messages,
                    "50" => &mut transaction.sender_names,
                    "51" => &mut transaction.sender_addresses,
                    "61" => &mut transaction.payer_names,
                    _ => &mut transaction.payer_addresses,
                };
                push_pair(list, first, second);
            }
            "52" | "63" => {
                let (code, city, country) =
                    (columns.text(3, 11), columns.text(12, 46), columns.text(47, 48));
                let transaction = self.transaction(tag, columns)?;
                let (postal, town, country_code) = if tag == "52" {
                    (
                        &mut transaction.sender_postal_code,
                        &mut transaction.sender_city,
                        &mut transaction.sender_country_code,
                    )
                } else {
                    (
                        &mut transaction.payer_postal_code,
                        &mut transaction.payer_city,
                        &mut transaction.payer_country_code,
                    )
                };
                *postal = code;
                *town = city;
                if !country.is_empty() {
                    *country_code = country;
                }
            }
            "60" => {
                let account = columns.text(3, 38);
                let account_type = columns.text(39, 39);
                let orgnum = columns.text(40, 59);
                let transaction = self.transaction(tag, columns)?;
                if !account.trim_start_matches('0').is_empty() {
                    transaction.payer_account = account;
                    transaction.payer_account_type = Some(match account_type.as_str() {
                        "1" => PayerAccountType::BankAccount,
                        "2" => PayerAccountType::BankGiro,
                        _ => PayerAccountType::Other,
                    });
                }
                if !orgnum.is_empty() {
                    transaction.payer_organization_number = orgnum;
                }
            }
            "70" => {
                let bank_costs = Some(columns.amount(3, 17)?).filter(|c| !c.is_zero());
                let foreign = ForeignPayment {
                    bank_cost_currency: bank_costs.map(|_| columns.text(18, 20)),
                    bank_costs,
                    amount: columns.amount(39, 53)?,
                    currency: columns.text(54, 56),
                    conversion_rate: columns.rate(57, 68)?,
                };
                self.transaction(tag, columns)?.foreign = Some(foreign);
            }
            "90" => self.account_end(tag, columns)?,
            "99" => {
                self.file(tag, columns)?;
                let declared = columns.integer(3, 17)?;
                let parsed = columns.line() as i64;
                if declared != parsed {
                    return Err(CodecError::CountMismatch {
                        what: "line count",
                        declared,
                        parsed,
                    });
                }
                self.ended = true;
            }
            _ => return Err(unknown_record(tag, columns)),
        }
        Ok(())
    }
}

/// Reads a TOTALIN file. The account and file end records are checked against what was read.
pub fn parse(data: &[u8]) -> CodecResult<PaymentFile> {
    let mut reader = Reader::default();
    let lines = read_records(data, &mut reader)?;
    let file = reader.file.ok_or_else(|| CodecError::Header {
        line: 1,
        reason: "no TOTALIN file header".to_string(),
    })?;
    if !reader.ended {
        return Err(CodecError::malformed(lines, "TOTALIN file ends without an end record"));
    }
    info!(
        "Read TOTALIN file {} with {} payments on {} accounts",
        file.file_id,
        file.transaction_count(),
        file.accounts.len()
    );
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::{decode_latin1, encode_latin1_lossy};
    use crate::incoming::tests::line;
    use crate::model::Amount;
    use crate::test::TOTALIN_FILE;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn amount(s: &str) -> Amount {
        Amount::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_file() {
        let file = parse(TOTALIN_FILE).unwrap();
        assert_eq!(file.kind, FileKind::Pg);
        assert!(file.test);
        assert_eq!(file.file_id, "TI00000042201705051200000000001");
        assert_eq!(file.accounts.len(), 1);

        let account = &file.accounts[0];
        assert_eq!(account.account, "12345674");
        assert_eq!(account.currency, "SEK");
        assert_eq!(
            account.transaction_date,
            NaiveDate::from_ymd_opt(2017, 5, 5)
        );
        assert_eq!(account.count, Some(2));
        assert_eq!(account.total, Some(amount("350.00")));
        assert_eq!(account.statement_reference.as_deref(), Some("20170505001"));

        let first = &account.transactions[0];
        assert_eq!(first.customer_refs, vec!["1234567897"]);
        assert_eq!(first.amount, amount("100.00"));
        assert_eq!(first.transaction_number, "11111111111111111");
        assert_eq!(first.reverse_code, ReverseCode::No);
        assert_eq!(first.bg_number, None);
        assert_eq!(first.sender_names, vec!["Anna Andersson"]);
        assert_eq!(first.sender_addresses, vec!["Storgatan 1"]);
        assert_eq!(first.sender_postal_code, "123 45");
        assert_eq!(first.sender_city, "Småstad");

        let second = &account.transactions[1];
        assert_eq!(second.customer_refs, vec!["9876543217"]);
        assert_eq!(second.amount, amount("250.00"));
        assert!(second.sender_names.is_empty());
    }

    fn wrap(body: &[String]) -> String {
        let mut lines = vec![line(
            80,
            &[(1, "00TI00000001"), (15, "20110524100000000000"), (35, "01TL1TOTALIN")],
        )];
        lines.extend_from_slice(body);
        lines.push(line(80, &[(1, "99"), (3, &format!("{:015}", lines.len() + 1))]));
        lines.join("\n")
    }

    #[test]
    fn test_reversal_and_payer_records() {
        let body = vec![
            line(80, &[(1, "10"), (3, "10181"), (39, "SEK20111024")]),
            line(
                80,
                &[
                    (1, "20"),
                    (3, "38952344444"),
                    (38, "000000000302550"),
                    (53, "22222333334444451"),
                ],
            ),
            line(80, &[(1, "30"), (3, "REF 2")]),
            line(80, &[(1, "40"), (3, "FAKTURANR:38952344444"), (38, "INTERN REF:  9780858")]),
            line(80, &[(1, "60"), (3, "1234567"), (39, "1"), (40, "9999999999")]),
            line(80, &[(1, "61"), (3, "TESTBOLAGET AB")]),
            line(80, &[(1, "62"), (3, "GATAN 12")]),
            line(80, &[(1, "63"), (3, "12345"), (12, "TESTSTAD"), (47, "DK")]),
            line(
                80,
                &[
                    (1, "25"),
                    (3, "987654123"),
                    (38, "000000000052550"),
                    (53, "22222333334444459"),
                    (70, "1"),
                ],
            ),
            line(80, &[(1, "60"), (3, "000000000"), (39, "2")]),
            line(
                80,
                &[
                    (1, "70"),
                    (3, "000000000001500SEK"),
                    (39, "000000000001000EUR000000105000"),
                ],
            ),
            line(80, &[(1, "90"), (3, "00000002"), (11, "00000000000250000"), (28, "20111024001")]),
        ];
        let file = parse(wrap(&body).as_bytes()).unwrap();
        assert!(!file.test);
        let account = &file.accounts[0];
        assert_eq!(account.account, "10181");

        let first = &account.transactions[0];
        assert_eq!(first.customer_refs, vec!["38952344444", "REF 2"]);
        assert_eq!(
            first.messages,
            vec!["FAKTURANR:38952344444", "INTERN REF:  9780858"]
        );
        assert_eq!(first.payer_account, "1234567");
        assert_eq!(first.payer_account_type, Some(PayerAccountType::BankAccount));
        assert_eq!(first.payer_organization_number, "9999999999");
        assert_eq!(first.payer_names, vec!["TESTBOLAGET AB"]);
        assert_eq!(first.payer_addresses, vec!["GATAN 12"]);
        assert_eq!(first.payer_postal_code, "12345");
        assert_eq!(first.payer_city, "TESTSTAD");
        assert_eq!(first.payer_country_code, "DK");

        let reversal = &account.transactions[1];
        assert_eq!(reversal.amount, amount("-525.50"));
        assert_eq!(reversal.reverse_code, ReverseCode::Partial);
        assert_eq!(reversal.payer_account, "");
        assert_eq!(reversal.payer_account_type, None);
        let foreign = reversal.foreign.as_ref().unwrap();
        assert_eq!(foreign.bank_costs, Some(amount("15.00")));
        assert_eq!(foreign.bank_cost_currency.as_deref(), Some("SEK"));
        assert_eq!(foreign.amount, amount("10.00"));
        assert_eq!(foreign.currency, "EUR");
        assert_eq!(foreign.conversion_rate, amount("10.5"));
    }

    #[test]
    fn test_wrong_line_count_is_fatal() {
        let mut content = decode_latin1(TOTALIN_FILE);
        let last = content.trim_end().rfind('\n').unwrap();
        content.truncate(last + 1);
        content.push_str(&line(80, &[(1, "99"), (3, "000000000000042")]));
        assert!(matches!(
            parse(&encode_latin1_lossy(&content)),
            Err(CodecError::CountMismatch {
                what: "line count",
                declared: 42,
                ..
            })
        ));
    }

    #[test]
    fn test_wrong_transaction_count_is_fatal() {
        let content = decode_latin1(TOTALIN_FILE).replace("9000000002", "9000000003");
        assert!(matches!(
            parse(&encode_latin1_lossy(&content)),
            Err(CodecError::CountMismatch {
                what: "transaction count",
                declared: 3,
                parsed: 2
            })
        ));
    }

    #[test]
    fn test_structure_errors() {
        let transaction_first = wrap(&[line(80, &[(1, "30"), (3, "REF")])]);
        assert!(matches!(
            parse(transaction_first.as_bytes()),
            Err(CodecError::NoOpenContext { .. })
        ));

        let unknown = wrap(&[line(80, &[(1, "33")])]);
        assert!(matches!(
            parse(unknown.as_bytes()),
            Err(CodecError::UnknownRecord { line: 2, .. })
        ));

        let truncated = decode_latin1(TOTALIN_FILE)
            .lines()
            .take(3)
            .collect::<Vec<_>>()
            .join("\n");
        assert!(matches!(
            parse(truncated.as_bytes()),
            Err(CodecError::Malformed { .. })
        ));

        let bad_code = wrap(&[
            line(80, &[(1, "10"), (3, "10181"), (39, "SEK20111024")]),
            line(80, &[(1, "25"), (3, "1"), (38, "000000000000100"), (70, "9")]),
        ]);
        assert!(matches!(
            parse(bad_code.as_bytes()),
            Err(CodecError::Field { start: 70, .. })
        ));
    }
}
