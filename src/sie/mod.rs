//! SIE 4 (Standard Import och Export) files.
//!
//! Import runs in two passes over the same [`RecordTable`]: a checksum pass that only
//! tokenizes, then the building pass. Export renders an [`Accounting`](crate::model::Accounting)
//! back into PC8 encoded lines.

mod builder;
mod crc;
mod cursor;
mod export;
mod import;
mod records;
mod remap;

pub use builder::SieImport;
pub use crc::{Crc32, Integrity};
pub use export::{export, export_lines, ExportContext};
pub use import::{import, import_into, split_lines, verify_file};
pub use records::{Label, RecordTable};
pub use remap::AccountMapping;
