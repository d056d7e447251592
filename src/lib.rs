//! Codecs for Swedish accounting and payment interchange files.
//!
//! - [`sie`] reads and writes SIE 4 accounting files, including the `#KSUMMA` checksum.
//! - [`giro`] writes Bankgirot and Plusgirot payment orders and seals LB orders.
//! - [`incoming`] reads the payment notifications and reports the giro banks deliver.
//!
//! The codecs work on bytes and plain [`model`] records. The `giro` binary wraps them in a CLI.

pub mod args;
pub mod charset;
pub mod commands;
mod config;
mod error;
mod fs;
pub mod giro;
pub mod incoming;
pub mod model;
pub mod sie;

#[cfg(test)]
mod test;

pub use config::Config;
pub use error::{CodecError, CodecResult, Error, Result};
pub use model::Amount;
