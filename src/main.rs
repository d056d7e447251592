use chrono::Utc;
use clap::Parser;
use giro_sie::args::{
    Args, BankgiroSubcommand, Command, PaymentsSubcommand, PlusgiroSubcommand, SieSubcommand,
};
use giro_sie::{commands, Config, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().giro_home().path();
    let now = Utc::now();
    let today = now.date_naive();

    let _: () = match args.command() {
        Command::Init => commands::init(home)?.print(),

        Command::Sie(sie_args) => match sie_args.command() {
            SieSubcommand::Import(a) => commands::sie_import(a.file(), a.mapping(), a.output())?
                .print(),
            SieSubcommand::Verify(a) => commands::sie_verify(a.file())?.print(),
            SieSubcommand::Export(a) => {
                commands::sie_export(a.input(), a.output(), a.checksum(), a.generated_by(), today)?
                    .print()
            }
        },

        Command::Bankgiro(bankgiro_args) => {
            let config = Config::load(home)?;
            match bankgiro_args.command() {
                BankgiroSubcommand::Order(a) => commands::bankgiro_order(
                    &config,
                    a.order().input(),
                    a.order().output(),
                    a.seal(),
                    a.software_signer(),
                    now,
                )?
                .print(),
                BankgiroSubcommand::Cancel(a) => {
                    commands::bankgiro_cancel(&config, a.input(), a.output())?.print()
                }
                BankgiroSubcommand::Seal(a) => {
                    commands::bankgiro_seal(&config, a.file(), a.output(), a.software_signer(), now)?
                        .print()
                }
            }
        }

        Command::Plusgiro(plusgiro_args) => {
            let config = Config::load(home)?;
            match plusgiro_args.command() {
                PlusgiroSubcommand::Order(a) => {
                    commands::plusgiro_order(&config, a.input(), a.output(), today)?.print()
                }
            }
        }

        Command::Payments(payments_args) => match payments_args.command() {
            PaymentsSubcommand::Parse(a) => {
                commands::payments_parse(a.file(), a.format(), a.output())?.print()
            }
            PaymentsSubcommand::Reference(a) => {
                commands::payments_reference(a.token(), a.known())?.print()
            }
            PaymentsSubcommand::Totalin(a) => {
                commands::payments_totalin(a.input(), a.output())?.print()
            }
        },
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => {
            // The library and the binary, at the level given on the command line.
            EnvFilter::new(format!(
                "{}={level},{}={level}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                env!("CARGO_BIN_NAME"),
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
