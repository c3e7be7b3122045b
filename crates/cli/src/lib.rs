pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use billroute_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "billroute",
    about = "Billroute invoice approval CLI",
    long_about = "Route scanned invoices to department approvers, escalate them through the supervisor chain, and inspect their approval state.",
    after_help = "Examples:\n  billroute migrate\n  billroute seed\n  billroute assign INV-DEMO-001\n  billroute escalate INV-DEMO-001\n  billroute status INV-DEMO-001"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a billroute.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url for this invocation")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo thresholds, employees and invoice")]
    Seed,
    #[command(about = "Assign an invoice to the least-loaded approver of its department")]
    Assign { invoice_id: String },
    #[command(about = "Sign off the current level and move the invoice up the chain")]
    Escalate { invoice_id: String },
    #[command(about = "Show where an invoice sits in the approval chain")]
    Status { invoice_id: String },
    #[command(about = "Parse and classify an invoice without assigning it")]
    Details { invoice_id: String },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    // Commands report config errors themselves; logging just stays off.
    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(options),
        Command::Seed => commands::seed::run(options),
        Command::Assign { invoice_id } => commands::assign::run(options, &invoice_id),
        Command::Escalate { invoice_id } => commands::escalate::run(options, &invoice_id),
        Command::Status { invoice_id } => commands::status::run(options, &invoice_id),
        Command::Details { invoice_id } => commands::details::run(options, &invoice_id),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
