use anyhow::Result;
use btcwatch::core::log::init_logging;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for btcwatch::AppCommand {
    fn from(cmd: Commands) -> btcwatch::AppCommand {
        match cmd {
            Commands::Rate { currency } => btcwatch::AppCommand::Rate { currency },
            Commands::History { currency } => btcwatch::AppCommand::History { currency },
            Commands::Refresh { currency, all } => btcwatch::AppCommand::Refresh { currency, all },
            Commands::Watch { currency } => btcwatch::AppCommand::Watch { currency },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch and display the current Bitcoin price
    Rate {
        /// Quote currency: USD, EUR, CNY or AUD
        #[arg(long)]
        currency: Option<String>,
    },
    /// Display the stored daily price history
    History {
        /// Quote currency: USD, EUR, CNY or AUD
        #[arg(long)]
        currency: Option<String>,
    },
    /// Reconcile the stored history with the remote window
    Refresh {
        /// Quote currency: USD, EUR, CNY or AUD
        #[arg(long)]
        currency: Option<String>,
        /// Refresh every supported currency
        #[arg(long)]
        all: bool,
    },
    /// Poll the price live until interrupted
    Watch {
        /// Quote currency: USD, EUR, CNY or AUD
        #[arg(long)]
        currency: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => btcwatch::cli::setup::setup(),
        Some(cmd) => btcwatch::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
