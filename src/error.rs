//! Error types.
//!
//! Application code (configuration, commands, file handling) uses `anyhow` through [`Result`].
//! The codecs return [`CodecError`] so that callers can tell the fatal classes apart.

use thiserror::Error;

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Everything that can go wrong while reading or writing one of the interchange formats.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("checksum mismatch: file declares {declared}, computed {computed}")]
    ChecksumMismatch { declared: u32, computed: u32 },

    #[error("file cannot be imported: {reason}")]
    NotImportable { reason: String },

    #[error("unsupported SIE type '{0}', only type 4 can be imported")]
    UnsupportedSieVersion(String),

    #[error("unsupported SIE character format '{0}', expected PC8")]
    UnsupportedFormat(String),

    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("account {number} is defined twice, second definition at line {line}")]
    DuplicateAccount { number: String, line: usize },

    #[error("{record} at line {line} appears outside of any open {context}")]
    NoOpenContext {
        record: String,
        context: &'static str,
        line: usize,
    },

    #[error("{what} mismatch: declared {declared}, parsed {parsed}")]
    CountMismatch {
        what: &'static str,
        declared: i64,
        parsed: i64,
    },

    #[error("invalid field in columns {start}-{end} at line {line}: {reason}")]
    Field {
        line: usize,
        start: usize,
        end: usize,
        reason: String,
    },

    #[error("unknown record type '{tag}' at line {line}")]
    UnknownRecord { tag: String, line: usize },

    #[error("invalid file header at line {line}: {reason}")]
    Header { line: usize, reason: String },

    #[error("record {tag} is {width} columns wide, expected {expected}")]
    RecordWidth {
        tag: String,
        width: usize,
        expected: usize,
    },

    #[error("'{value}' does not fit in {width} columns")]
    FieldOverflow { value: String, width: usize },

    #[error("transfer method '{0}' is not supported for this order type")]
    UnsupportedTransferMethod(String),

    #[error("{field} is required for {context}")]
    MissingField {
        field: &'static str,
        context: String,
    },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("text cannot be represented in {encoding}: '{text}'")]
    Encoding { encoding: &'static str, text: String },

    #[error("signing device failed: {0}")]
    Signer(#[from] std::io::Error),

    #[error("signing device did not accept the unlock request, answered '{0}'")]
    SignerHandshake(String),

    #[error("invalid signing key: {0}")]
    SignerKey(String),
}

impl CodecError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        CodecError::Malformed {
            line,
            reason: reason.into(),
        }
    }
}
