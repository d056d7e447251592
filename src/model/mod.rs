//! Plain data records the codecs read and write: the accounting graph, outgoing payment orders
//! and incoming payment notifications.
pub mod accounting;
mod amount;
pub mod incoming;
pub mod payment;

pub use accounting::Accounting;
pub use amount::{Amount, AmountError};
pub use payment::{
    BankgiroProvider, BgcOrder, EntityId, IdentifierType, PaymentBatch, SupplierInvoice,
    TransferMethod,
};
