// feuermig - Fox112 → FeuerON person migrations

mod exit_codes;
mod inspect;
mod migrate;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "feuermig")]
#[command(about = "Reconcile Fox112 person data against FeuerON report exports and write import files")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a migration from a TOML config file
    #[command(after_help = "\
Examples:
  feuermig run passive.toml
  feuermig run contact.toml --output kontakt_import.csv --summary kontakt.json
  feuermig run address.toml --json --strict")]
    Run {
        /// Path to the migration config
        config: PathBuf,

        /// Import file to write (overrides files.output)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the run result as JSON to this file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Print the run result as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Exit with 63 when any record was skipped
        #[arg(long)]
        strict: bool,
    },

    /// Validate a migration config without running it
    #[command(after_help = "\
Examples:
  feuermig validate passive.toml")]
    Validate {
        /// Path to the migration config
        config: PathBuf,
    },

    /// Print the records read from one export as JSON
    #[command(after_help = "\
Examples:
  feuermig inspect adressenliste.csv --report address --side target
  feuermig inspect fox112.xlsx --report passive --side source
  feuermig inspect fox112.xml")]
    Inspect {
        /// Export file (.csv, .xlsx, ...; .xml for the Fox112 history export)
        file: PathBuf,

        /// Report type that determines the layout
        #[arg(long, value_enum, default_value = "contact")]
        report: ReportArg,

        /// Which side of the migration the file belongs to
        #[arg(long, value_enum, default_value = "target")]
        side: SideArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportArg {
    /// Adressenliste
    Address,
    /// Erreichbarkeiten, existing members
    Contact,
    /// Bankverbindungen
    Bank,
    /// Erreichbarkeiten, new passive members
    Passive,
}

impl From<ReportArg> for feuermig_recon::ReportKind {
    fn from(arg: ReportArg) -> Self {
        match arg {
            ReportArg::Address => Self::Address,
            ReportArg::Contact => Self::Contact,
            ReportArg::Bank => Self::Bank,
            ReportArg::Passive => Self::Passive,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    /// Fox112 master export
    Source,
    /// FeuerON report export
    Target,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  feuermig-recon ", env!("CARGO_PKG_VERSION"),
    )
}

/// Logging goes to stderr so stdout stays clean for `--json`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "error",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, output, summary, json, strict } => {
            migrate::cmd_run(migrate::RunArgs { config, output, summary, json, strict })
        }
        Commands::Validate { config } => migrate::cmd_validate(config),
        Commands::Inspect { file, report, side } => {
            let side = match side {
                SideArg::Source => feuermig_recon::Side::Source,
                SideArg::Target => feuermig_recon::Side::Target,
            };
            inspect::cmd_inspect(file, report.into(), side)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
