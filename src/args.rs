//! These structs provide the CLI interface for the giro CLI.

use crate::incoming::Format;
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// giro: Swedish accounting and payment files.
///
/// Imports and exports SIE 4 accounting files, writes Bankgirot (LB) and Plusgirot (CFP PO3)
/// payment orders, seals LB orders for transmission, and reads the payment notifications and
/// reports the giro banks send back (TOTALIN, BGMAX and LB reports).
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the giro home directory and a default configuration file.
    ///
    /// Settings that the payment commands need, like the signer lock or the plusgiro sending
    /// account, are added to `$GIRO_HOME/config.json` by hand afterwards.
    Init,
    /// Import, verify and export SIE 4 files.
    Sie(SieArgs),
    /// Write and seal Bankgirot Leverantörsbetalningar orders.
    Bankgiro(BankgiroArgs),
    /// Write Plusgirot CFP PO3 orders.
    Plusgiro(PlusgiroArgs),
    /// Read incoming payment files and reference tokens.
    Payments(PaymentsArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the giro configuration is held. Defaults to ~/giro
    #[arg(long, env = "GIRO_HOME", default_value_t = default_giro_home())]
    giro_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, giro_home: PathBuf) -> Self {
        Self {
            log_level,
            giro_home: giro_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn giro_home(&self) -> &DisplayPath {
        &self.giro_home
    }
}

/// (Not shown): Args for the `giro sie` command.
#[derive(Debug, Parser, Clone)]
pub struct SieArgs {
    #[command(subcommand)]
    command: SieSubcommand,
}

impl SieArgs {
    pub fn command(&self) -> &SieSubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum SieSubcommand {
    /// Verify and import a SIE 4 file and report the warnings.
    Import(SieImportArgs),
    /// Check only the flag and the checksum of a SIE file.
    Verify(FileArgs),
    /// Write an accounting, as JSON, to a SIE 4 file.
    Export(SieExportArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct SieImportArgs {
    /// The SIE file.
    file: PathBuf,

    /// An account mapping file. Each line maps a new account number to an old one, e.g.
    /// `3001 3000`. Accounts without a mapping are left out of the import.
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Write the imported accounting here as JSON.
    #[arg(long)]
    output: Option<PathBuf>,
}

impl SieImportArgs {
    pub fn new(file: PathBuf, mapping: Option<PathBuf>, output: Option<PathBuf>) -> Self {
        Self {
            file,
            mapping,
            output,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn mapping(&self) -> Option<&Path> {
        self.mapping.as_deref()
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

#[derive(Debug, Parser, Clone)]
pub struct FileArgs {
    /// The file to read.
    file: PathBuf,
}

impl FileArgs {
    pub fn new(file: PathBuf) -> Self {
        Self { file }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

#[derive(Debug, Parser, Clone)]
pub struct SieExportArgs {
    /// The accounting as JSON, as written by `giro sie import --output`.
    input: PathBuf,

    /// The SIE file to write.
    #[arg(long)]
    output: PathBuf,

    /// Add `#KSUMMA` records.
    #[arg(long)]
    checksum: bool,

    /// The name written in `#GEN`.
    #[arg(long, default_value = "giro")]
    generated_by: String,
}

impl SieExportArgs {
    pub fn new(input: PathBuf, output: PathBuf, checksum: bool, generated_by: String) -> Self {
        Self {
            input,
            output,
            checksum,
            generated_by,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn checksum(&self) -> bool {
        self.checksum
    }

    pub fn generated_by(&self) -> &str {
        &self.generated_by
    }
}

/// (Not shown): Args for the `giro bankgiro` command.
#[derive(Debug, Parser, Clone)]
pub struct BankgiroArgs {
    #[command(subcommand)]
    command: BankgiroSubcommand,
}

impl BankgiroArgs {
    pub fn command(&self) -> &BankgiroSubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum BankgiroSubcommand {
    /// Write a payment order for a batch of supplier invoices.
    Order(BankgiroOrderArgs),
    /// Write an order that cancels earlier payments of a batch.
    Cancel(OrderArgs),
    /// Seal an existing order file.
    Seal(SealArgs),
}

/// An input file and an output file.
#[derive(Debug, Parser, Clone)]
pub struct OrderArgs {
    /// The payment batch as JSON: `provider`, `orgnum` and `invoices`.
    input: PathBuf,

    /// The order file to write.
    #[arg(long)]
    output: PathBuf,
}

impl OrderArgs {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self { input, output }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

#[derive(Debug, Parser, Clone)]
pub struct BankgiroOrderArgs {
    #[clap(flatten)]
    order: OrderArgs,

    /// Seal the order after writing it.
    #[arg(long)]
    seal: bool,

    /// Seal with `bankgiro.test_key` instead of the signing device.
    #[arg(long)]
    software_signer: bool,
}

impl BankgiroOrderArgs {
    pub fn new(order: OrderArgs, seal: bool, software_signer: bool) -> Self {
        Self {
            order,
            seal,
            software_signer,
        }
    }

    pub fn order(&self) -> &OrderArgs {
        &self.order
    }

    pub fn seal(&self) -> bool {
        self.seal
    }

    pub fn software_signer(&self) -> bool {
        self.software_signer
    }
}

#[derive(Debug, Parser, Clone)]
pub struct SealArgs {
    /// The unsealed order file.
    file: PathBuf,

    /// The sealed file to write.
    #[arg(long)]
    output: PathBuf,

    /// Seal with `bankgiro.test_key` instead of the signing device.
    #[arg(long)]
    software_signer: bool,
}

impl SealArgs {
    pub fn new(file: PathBuf, output: PathBuf, software_signer: bool) -> Self {
        Self {
            file,
            output,
            software_signer,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn software_signer(&self) -> bool {
        self.software_signer
    }
}

/// (Not shown): Args for the `giro plusgiro` command.
#[derive(Debug, Parser, Clone)]
pub struct PlusgiroArgs {
    #[command(subcommand)]
    command: PlusgiroSubcommand,
}

impl PlusgiroArgs {
    pub fn command(&self) -> &PlusgiroSubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum PlusgiroSubcommand {
    /// Write a CFP PO3 order for a batch of supplier invoices.
    Order(OrderArgs),
}

/// (Not shown): Args for the `giro payments` command.
#[derive(Debug, Parser, Clone)]
pub struct PaymentsArgs {
    #[command(subcommand)]
    command: PaymentsSubcommand,
}

impl PaymentsArgs {
    pub fn command(&self) -> &PaymentsSubcommand {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum PaymentsSubcommand {
    /// Read a TOTALIN, BGMAX or LB file.
    Parse(ParseArgs),
    /// Decode the reference token of a payment we sent.
    Reference(ReferenceArgs),
    /// Write a TOTALIN file for a set of purchases.
    Totalin(OrderArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct ParseArgs {
    /// The incoming file.
    file: PathBuf,

    /// The file format: pg, bg or lb.
    #[arg(long)]
    format: Format,

    /// Write the result here as JSON.
    #[arg(long)]
    output: Option<PathBuf>,
}

impl ParseArgs {
    pub fn new(file: PathBuf, format: Format, output: Option<PathBuf>) -> Self {
        Self {
            file,
            format,
            output,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

#[derive(Debug, Parser, Clone)]
pub struct ReferenceArgs {
    /// The 20 character token from the information column of a payment.
    token: String,

    /// Only accept the token if it names one of these ids.
    #[arg(long = "known")]
    known: Vec<String>,
}

impl ReferenceArgs {
    pub fn new(token: impl Into<String>, known: Vec<String>) -> Self {
        Self {
            token: token.into(),
            known,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn known(&self) -> &[String] {
        &self.known
    }
}

fn default_giro_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("giro"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --giro-home or GIRO_HOME instead of relying on the default \
                giro home directory.",
            );
            PathBuf::from("giro")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bankgiro_order() {
        let args = Args::try_parse_from([
            "giro",
            "--giro-home",
            "/tmp/giro",
            "bankgiro",
            "order",
            "batch.json",
            "--output",
            "order.txt",
            "--seal",
        ])
        .unwrap();
        assert_eq!(args.common().giro_home().path(), Path::new("/tmp/giro"));
        let Command::Bankgiro(bankgiro) = args.command() else {
            panic!("wrong command {:?}", args.command());
        };
        let BankgiroSubcommand::Order(order) = bankgiro.command() else {
            panic!("wrong subcommand");
        };
        assert!(order.seal());
        assert!(!order.software_signer());
        assert_eq!(order.order().output(), Path::new("order.txt"));
    }

    #[test]
    fn test_parse_payments() {
        let args = Args::try_parse_from([
            "giro",
            "--log-level",
            "debug",
            "payments",
            "parse",
            "bgmax.txt",
            "--format",
            "bg",
        ])
        .unwrap();
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        let Command::Payments(payments) = args.command() else {
            panic!("wrong command");
        };
        let PaymentsSubcommand::Parse(parse) = payments.command() else {
            panic!("wrong subcommand");
        };
        assert_eq!(parse.format(), Format::Bg);
        assert_eq!(parse.output(), None);

        assert!(Args::try_parse_from(["giro", "payments", "parse", "x", "--format", "xml"]).is_err());
    }
}
