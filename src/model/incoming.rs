//! Incoming payment notifications as read from TOTALIN and BGMAX files.

use crate::model::Amount;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Marks reversed payments and how much of the original was taken back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReverseCode {
    #[default]
    No,
    Yes,
    Full,
    Partial,
    #[serde(rename = "Final part")]
    FinalPart,
}

serde_plain::derive_display_from_serialize!(ReverseCode);

impl ReverseCode {
    /// Reads the deduction code column of a reversed payment.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "" => Some(ReverseCode::Yes),
            "0" => Some(ReverseCode::Full),
            "1" => Some(ReverseCode::Partial),
            "2" => Some(ReverseCode::FinalPart),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayerAccountType {
    #[serde(rename = "Bank account")]
    BankAccount,
    #[serde(rename = "Bank Giro")]
    BankGiro,
    Other,
}

/// How a BGMAX payment reached Bankgirot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentChannel {
    /// Electronic bank transfer.
    #[serde(rename = "EB")]
    Electronic,
    /// Leverantörsbetalningar.
    #[serde(rename = "LB")]
    SupplierPayment,
    /// Paper form.
    Blankett,
    Autogiro,
}

impl PaymentChannel {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(PaymentChannel::Electronic),
            "2" => Some(PaymentChannel::SupplierPayment),
            "3" => Some(PaymentChannel::Blankett),
            "4" => Some(PaymentChannel::Autogiro),
            _ => None,
        }
    }
}

/// What the reference column of a BGMAX payment contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceCode {
    Empty,
    #[serde(rename = "Empty: No service agreement")]
    NoAgreement,
    #[serde(rename = "OCR")]
    Ocr,
    Multiple,
    Faulty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignPayment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_costs: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_cost_currency: Option<String>,
    pub amount: Amount,
    pub currency: String,
    pub conversion_rate: Amount,
}

/// One incoming payment and everything the file says about its payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer_refs: Vec<String>,
    pub amount: Amount,
    pub transaction_number: String,
    pub reverse_code: ReverseCode,
    pub messages: Vec<String>,
    pub sender_names: Vec<String>,
    pub sender_addresses: Vec<String>,
    pub sender_postal_code: String,
    pub sender_city: String,
    pub sender_country_code: String,
    pub payer_account: String,
    pub payer_account_type: Option<PayerAccountType>,
    pub payer_organization_number: String,
    pub payer_names: Vec<String>,
    pub payer_addresses: Vec<String>,
    pub payer_postal_code: String,
    pub payer_city: String,
    pub payer_country_code: String,
    pub bg_number: Option<String>,
    pub reference_code: Option<ReferenceCode>,
    pub payment_channel: Option<PaymentChannel>,
    pub image_flag: Option<String>,
    pub foreign: Option<ForeignPayment>,
}

impl Transaction {
    pub fn new(
        customer_ref: impl Into<String>,
        amount: Amount,
        transaction_number: impl Into<String>,
    ) -> Self {
        Self {
            customer_refs: vec![customer_ref.into()],
            amount,
            transaction_number: transaction_number.into(),
            reverse_code: ReverseCode::No,
            messages: Vec::new(),
            sender_names: Vec::new(),
            sender_addresses: Vec::new(),
            sender_postal_code: String::new(),
            sender_city: String::new(),
            sender_country_code: "SE".to_string(),
            payer_account: String::new(),
            payer_account_type: None,
            payer_organization_number: String::new(),
            payer_names: Vec::new(),
            payer_addresses: Vec::new(),
            payer_postal_code: String::new(),
            payer_city: String::new(),
            payer_country_code: "SE".to_string(),
            bg_number: None,
            reference_code: None,
            payment_channel: None,
            image_flag: None,
            foreign: None,
        }
    }
}

/// Appends a two-column attribute record to a list, dropping an empty second column.
pub(crate) fn push_pair(list: &mut Vec<String>, first: String, second: String) {
    list.push(first);
    if !second.is_empty() {
        list.push(second);
    }
}

/// The payments booked on one receiving account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiroAccount {
    pub account: String,
    pub currency: String,
    pub transaction_date: Option<NaiveDate>,
    pub transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_bank_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_type: Option<String>,
}

impl GiroAccount {
    pub fn new(
        account: impl Into<String>,
        currency: impl Into<String>,
        transaction_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            account: account.into(),
            currency: currency.into(),
            transaction_date,
            transactions: Vec::new(),
            pg_account: None,
            receiver_bank_account: None,
            count: None,
            total: None,
            statement_reference: None,
            deposit_type: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Plusgirot TOTALIN.
    Pg,
    /// Bankgirot BGMAX.
    Bg,
}

/// The parsed content of one incoming payment file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFile {
    pub kind: FileKind,
    /// Unique per delivered file.
    pub file_id: String,
    pub timestamp: String,
    /// A TOTALIN-T or BGMAX test file.
    pub test: bool,
    pub accounts: Vec<GiroAccount>,
}

impl PaymentFile {
    pub fn transaction_count(&self) -> usize {
        self.accounts.iter().map(|a| a.transactions.len()).sum()
    }
}
