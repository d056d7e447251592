//! Outgoing payment orders for Bankgirot and Plusgirot, and the seal that protects them.

pub mod bankgiro;
pub(crate) mod fixed;
pub mod plusgiro;
pub mod rejection;
pub mod seal;
pub mod signer;
pub mod toid;

pub use bankgiro::{OrderOptions, TransferDate};
pub use fixed::RECORD_WIDTH;
pub use rejection::{rejection_text, Language};
pub use seal::{seal, sign_order};
pub use signer::{DeviceSigner, KeyMode, Signer, SoftwareSigner};
