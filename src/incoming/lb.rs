//! Bankgirot Leverantörsbetalningar files.
//!
//! An LB file is one or more sections, each opened by a TK11 record. Column 47 of the opening
//! record tells what the section is: blank for a payment order (our own files read back), or the
//! code of the report Bankgirot sent back. The record layouts after the opening depend on it.

use crate::error::{CodecError, CodecResult};
use crate::giro::rejection::{rejection_text, Language};
use crate::giro::{toid, TransferDate};
use crate::incoming::{no_open, read_records, unknown_record, Columns, RecordReader};
use crate::model::{Amount, EntityId, TransferMethod};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

const PRODUCTS: [&str; 2] = ["LEVERANTORSBETALNINGAR", "LEVERANTÖRSBETALNINGAR"];

/// What a section holds, from column 47 of its opening record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// A payment order.
    Request,
    /// Payment specification, code 1.
    Payments,
    /// Reconciliation report, code 2.
    Reconciliation,
    /// Rejected payments, code 6.
    Rejected,
    /// Stopped payments, code 7.
    Stopped,
}

impl ReportKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "" => Some(ReportKind::Request),
            "1" => Some(ReportKind::Payments),
            "2" => Some(ReportKind::Reconciliation),
            "6" => Some(ReportKind::Rejected),
            "7" => Some(ReportKind::Stopped),
            _ => None,
        }
    }
}

/// TK11.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    pub sender_bgnum: String,
    pub created: NaiveDate,
    pub product: String,
    pub payment_date: Option<TransferDate>,
    pub kind: ReportKind,
    pub currency: String,
}

/// A payment as written in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedPayment {
    pub method: TransferMethod,
    pub payee: String,
    pub reference: String,
    pub amount: Amount,
    pub payment_date: Option<TransferDate>,
    pub information: String,
}

/// An `LB` cancellation or date amendment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub code: i64,
    pub service_bureau_number: String,
    pub sender_bgnum: String,
    pub payee: String,
    pub payment_date: Option<TransferDate>,
    pub new_payment_date: Option<TransferDate>,
    pub amount: Amount,
    pub payment_type: String,
    pub currency: String,
}

/// A payment Bankgirot has carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPayment {
    pub method: TransferMethod,
    pub payee: String,
    pub reference: String,
    pub amount: Amount,
    pub payment_code: String,
    pub referenced_bgnum: String,
    pub information: String,
}

/// One of the TK40 to TK42 balance records of a reconciliation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub amounts: [Amount; 4],
}

/// TK43, a payment or credit under monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredInstruction {
    pub date: Option<NaiveDate>,
    pub amount: Amount,
    pub remaining: Amount,
    pub code: i64,
}

/// A rejection comment and the payment it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// The last order record before the comment.
    pub faulty_line: String,
    /// The information column of the rejected payment, our reference token.
    pub reference: String,
    pub code: String,
    pub comment: String,
}

impl Rejection {
    pub fn description(&self, language: Language) -> Option<&'static str> {
        rejection_text(&self.code, language)
    }

    pub fn reference_id(&self) -> Option<EntityId> {
        toid::decode(&self.reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppedPayment {
    pub payee: String,
    pub reference: String,
    pub amount: Amount,
    pub payment_date: Option<TransferDate>,
    pub information: String,
}

/// TK49 in a stopped payments report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub code: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "report", rename_all = "lowercase")]
pub enum SectionContent {
    Request {
        payments: Vec<RequestedPayment>,
        cancellations: Vec<Cancellation>,
    },
    Payments {
        completed: Vec<CompletedPayment>,
        total: Option<Amount>,
    },
    Reconciliation {
        opening_balance: Option<Balance>,
        changes: Option<Balance>,
        closing_balance: Option<Balance>,
        monitored: Vec<MonitoredInstruction>,
        count: Option<i64>,
    },
    Rejected {
        rejected: Vec<String>,
        errors: Vec<Rejection>,
    },
    Stopped {
        stopped: Vec<StoppedPayment>,
        comments: Vec<Comment>,
    },
}

impl SectionContent {
    fn new(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Request => SectionContent::Request {
                payments: Vec::new(),
                cancellations: Vec::new(),
            },
            ReportKind::Payments => SectionContent::Payments {
                completed: Vec::new(),
                total: None,
            },
            ReportKind::Reconciliation => SectionContent::Reconciliation {
                opening_balance: None,
                changes: None,
                closing_balance: None,
                monitored: Vec::new(),
                count: None,
            },
            ReportKind::Rejected => SectionContent::Rejected {
                rejected: Vec::new(),
                errors: Vec::new(),
            },
            ReportKind::Stopped => SectionContent::Stopped {
                stopped: Vec::new(),
                comments: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbSection {
    pub opening: Opening,
    pub content: SectionContent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbReport {
    pub sections: Vec<LbSection>,
}

impl LbReport {
    /// The ids behind the reference tokens of all completed payments. Tokens that are not ours
    /// are skipped.
    pub fn completed_ids(&self) -> Vec<EntityId> {
        self.sections
            .iter()
            .flat_map(|section| match &section.content {
                SectionContent::Payments { completed, .. } => completed.as_slice(),
                _ => &[][..],
            })
            .filter_map(|payment| toid::decode(&payment.information))
            .collect()
    }

    /// The ids behind the reference tokens of all stopped payments.
    pub fn stopped_ids(&self) -> Vec<EntityId> {
        self.sections
            .iter()
            .flat_map(|section| match &section.content {
                SectionContent::Stopped { stopped, .. } => stopped.as_slice(),
                _ => &[][..],
            })
            .filter_map(|payment| toid::decode(&payment.information))
            .collect()
    }

    pub fn rejections(&self) -> impl Iterator<Item = &Rejection> {
        self.sections
            .iter()
            .flat_map(|section| match &section.content {
                SectionContent::Rejected { errors, .. } => errors.as_slice(),
                _ => &[][..],
            })
    }
}

#[derive(Default)]
struct Reader {
    sections: Vec<LbSection>,
    previous: String,
    faulty_line: String,
    token: String,
}

impl Reader {
    fn opening(&mut self, columns: &Columns) -> CodecResult<()> {
        let code = columns.text(47, 47);
        let kind = ReportKind::from_code(&code).ok_or_else(|| CodecError::Header {
            line: columns.line(),
            reason: format!("unknown report code '{code}'"),
        })?;
        let product = columns.text(19, 40);
        if !PRODUCTS.contains(&product.as_str()) {
            return Err(CodecError::Header {
                line: columns.line(),
                reason: format!("product '{product}'"),
            });
        }
        let payment_date = match kind {
            ReportKind::Stopped => None,
            _ => columns.payment_date(41, 46)?,
        };
        let opening = Opening {
            sender_bgnum: columns.account(3, 12),
            created: columns.short_date(13, 18)?,
            product,
            payment_date,
            kind,
            currency: columns.text(60, 62),
        };
        debug!("LB section {kind:?} from {}", opening.sender_bgnum);
        self.faulty_line.clear();
        self.token.clear();
        self.sections.push(LbSection {
            opening,
            content: SectionContent::new(kind),
        });
        Ok(())
    }
}

fn request(
    tag: &str,
    columns: &Columns,
    previous: &str,
    payments: &mut Vec<RequestedPayment>,
    cancellations: &mut Vec<Cancellation>,
) -> CodecResult<()> {
    match tag {
        "14" | "54" => payments.push(RequestedPayment {
            method: match (tag, previous) {
                ("54", _) => TransferMethod::Pgnum,
                (_, "40") => TransferMethod::Bankaccount,
                _ => TransferMethod::Bgnum,
            },
            payee: columns.account(3, 12),
            reference: columns.text(13, 37),
            amount: columns.amount(38, 49)?,
            payment_date: columns.payment_date(50, 55)?,
            information: columns.text(61, 80),
        }),
        "LB" => cancellations.push(Cancellation {
            code: columns.integer(3, 4)?,
            service_bureau_number: columns.account(5, 10),
            sender_bgnum: columns.account(11, 20),
            payee: columns.account(21, 30),
            payment_date: columns.payment_date(31, 36)?,
            new_payment_date: columns.payment_date(37, 42)?,
            amount: columns.amount(43, 54)?,
            payment_type: columns.text(67, 71),
            currency: columns.text(72, 74),
        }),
        "12" | "13" | "15" | "16" | "17" | "25" | "26" | "27" | "29" | "40" | "65" => {
            trace!("Skipping order record {tag}")
        }
        _ => return Err(unknown_record(tag, columns)),
    }
    Ok(())
}

fn payment_report(
    tag: &str,
    columns: &Columns,
    completed: &mut Vec<CompletedPayment>,
    total: &mut Option<Amount>,
) -> CodecResult<()> {
    match tag {
        "14" | "54" => completed.push(CompletedPayment {
            method: if tag == "54" {
                TransferMethod::Pgnum
            } else {
                TransferMethod::Bgnum
            },
            payee: columns.account(3, 12),
            reference: columns.text(13, 37),
            amount: columns.amount(38, 49)?,
            payment_code: columns.text(50, 50),
            referenced_bgnum: columns.account(51, 60),
            information: columns.text(61, 80),
        }),
        "29" => *total = Some(columns.amount(21, 32)?),
        "15" | "16" | "17" | "20" | "21" | "25" | "26" | "27" | "40" | "65" => {
            trace!("Skipping report record {tag}")
        }
        _ => return Err(unknown_record(tag, columns)),
    }
    Ok(())
}

fn balance(columns: &Columns) -> CodecResult<Balance> {
    Ok(Balance {
        amounts: [
            columns.signed_amount(3, 15)?,
            columns.signed_amount(17, 29)?,
            columns.signed_amount(31, 43)?,
            columns.signed_amount(45, 57)?,
        ],
    })
}

impl RecordReader for Reader {
    fn record(&mut self, tag: &str, columns: &Columns) -> CodecResult<()> {
        if tag == "11" {
            self.opening(columns)?;
            self.previous = tag.to_string();
            return Ok(());
        }
        let Reader {
            sections,
            previous,
            faulty_line,
            token,
        } = self;
        let section = sections
            .last_mut()
            .ok_or_else(|| no_open(tag, "LB section", columns))?;
        match &mut section.content {
            SectionContent::Request {
                payments,
                cancellations,
            } => request(tag, columns, previous, payments, cancellations)?,
            SectionContent::Payments { completed, total } => {
                payment_report(tag, columns, completed, total)?
            }
            SectionContent::Reconciliation {
                opening_balance,
                changes,
                closing_balance,
                monitored,
                count,
            } => match tag {
                "40" => *opening_balance = Some(balance(columns)?),
                "41" => *changes = Some(balance(columns)?),
                "42" => *closing_balance = Some(balance(columns)?),
                "43" => monitored.push(MonitoredInstruction {
                    date: columns.short_date_or_zero(3, 8)?,
                    amount: columns.signed_amount(15, 27)?,
                    remaining: columns.signed_amount(29, 41)?,
                    code: columns.integer(43, 44)?,
                }),
                "29" => *count = Some(columns.integer(13, 20)?),
                _ => return Err(unknown_record(tag, columns)),
            },
            SectionContent::Rejected { rejected, errors } => match tag {
                "14" | "54" => {
                    *faulty_line = columns.text(1, 80);
                    *token = columns.text(61, 80);
                    rejected.push(token.clone());
                }
                "12" | "15" | "16" | "17" | "25" | "26" | "27" | "40" | "65" | "LB" => {
                    *faulty_line = columns.text(1, 80)
                }
                "13" => {}
                "49" => {
                    let alpha = columns.text(3, 6);
                    if !alpha.is_empty() {
                        errors.push(Rejection {
                            faulty_line: faulty_line.clone(),
                            reference: token.clone(),
                            code: format!("{alpha}{}", columns.text(7, 10)),
                            comment: columns.text(11, 80),
                        });
                    }
                }
                "29" => {
                    faulty_line.clear();
                    token.clear();
                }
                _ => return Err(unknown_record(tag, columns)),
            },
            SectionContent::Stopped { stopped, comments } => match tag {
                "14" | "15" | "16" | "17" | "54" => stopped.push(StoppedPayment {
                    payee: columns.account(3, 12),
                    reference: columns.text(13, 37),
                    amount: columns.amount(38, 49)?,
                    payment_date: columns.payment_date(50, 55)?,
                    information: columns.text(61, 80),
                }),
                "49" => comments.push(Comment {
                    code: format!("{}{}", columns.text(3, 6), columns.text(7, 10)),
                    comment: columns.text(11, 80),
                }),
                "12" | "13" | "25" | "26" | "27" | "29" | "40" | "65" => {
                    trace!("Skipping stopped order record {tag}")
                }
                _ => return Err(unknown_record(tag, columns)),
            },
        }
        *previous = tag.to_string();
        Ok(())
    }
}

/// Reads an LB order or report file.
pub fn parse_lb(data: &[u8]) -> CodecResult<LbReport> {
    let mut reader = Reader::default();
    read_records(data, &mut reader)?;
    info!("Read LB file with {} sections", reader.sections.len());
    Ok(LbReport {
        sections: reader.sections,
    })
}
