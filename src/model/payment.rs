//! Outgoing payment orders and the invoice fields the order codecs read.

use crate::model::Amount;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The 12-byte identifier of a stored entity, written as 24 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId([u8; 12]);

impl EntityId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl FromStr for EntityId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| anyhow::anyhow!("Invalid entity id '{s}': {e}"))?;
        Ok(Self(bytes))
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for EntityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EntityId::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// How the money reaches the supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMethod {
    Bgnum,
    Pgnum,
    Bankaccount,
    Address,
}

serde_plain::derive_display_from_serialize!(TransferMethod);
serde_plain::derive_fromstr_from_deserialize!(TransferMethod);

/// Which of the invoice reference fields identifies the payment towards the supplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentifierType {
    #[default]
    Ocr,
    InvoiceNumber,
    Message,
}

serde_plain::derive_display_from_serialize!(IdentifierType);
serde_plain::derive_fromstr_from_deserialize!(IdentifierType);

/// The supplier invoice fields the order codecs consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInvoice {
    pub id: EntityId,
    pub transfer_method: TransferMethod,
    /// Bankgiro or plusgiro number, or payee number for account transfers.
    #[serde(default)]
    pub transfer_address: String,
    /// The reference written into the payment record, OCR or invoice number.
    #[serde(default)]
    pub invoice_identifier: String,
    #[serde(default)]
    pub invoice_identifier_type: IdentifierType,
    pub amount: Amount,
    #[serde(default)]
    pub transfer_date: Option<NaiveDate>,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub bgnum: Option<String>,
    #[serde(default)]
    pub pgnum: Option<String>,
    #[serde(default)]
    pub bankclearing: Option<String>,
    #[serde(default)]
    pub bankaccount: Option<String>,
    #[serde(default)]
    pub ocr: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SupplierInvoice {
    /// The reference field named by `invoice_identifier_type`.
    pub fn reference(&self) -> Option<&str> {
        match self.invoice_identifier_type {
            IdentifierType::Ocr => self.ocr.as_deref(),
            IdentifierType::InvoiceNumber => self.invoice_number.as_deref(),
            IdentifierType::Message => self.message.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankgiroProvider {
    pub bgnum: String,
}

/// A payment order file sent to Bankgirot, before and after sealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgcOrder {
    pub created: DateTime<Utc>,
    pub order_unsigned: String,
    #[serde(default)]
    pub order_signed: Option<String>,
    #[serde(default)]
    pub sent: Option<DateTime<Utc>>,
}

impl BgcOrder {
    pub fn new(order_unsigned: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            created,
            order_unsigned: order_unsigned.into(),
            order_signed: None,
            sent: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.order_signed.is_some()
    }

    pub fn mark_sent(&mut self, when: DateTime<Utc>) {
        self.sent = Some(when);
    }
}

/// The input of an order command: who pays and which invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentBatch {
    #[serde(default)]
    pub provider: Option<BankgiroProvider>,
    #[serde(default)]
    pub orgnum: Option<String>,
    pub invoices: Vec<SupplierInvoice>,
}
