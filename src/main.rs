use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use xrate::cli::ui;
use xrate::core::log::init_logging;

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

impl From<Commands> for xrate::AppCommand {
    fn from(cmd: Commands) -> xrate::AppCommand {
        match cmd {
            Commands::Convert { amount, from, to } => xrate::AppCommand::Convert {
                amount,
                from: from.to_uppercase(),
                to: to.to_uppercase(),
            },
            Commands::Rates { base } => xrate::AppCommand::Rates {
                base: base.map(|b| b.to_uppercase()),
            },
            Commands::Watch { interval } => xrate::AppCommand::Watch {
                interval_secs: interval,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert an amount between two currencies
    Convert {
        /// Amount to convert, must be greater than zero
        #[arg(allow_negative_numbers = true)]
        amount: f64,
        /// Currency code to convert from
        from: String,
        /// Currency code to convert to
        to: String,
    },
    /// Display the cached exchange rates
    Rates {
        /// Show rates against this currency instead of the provider base
        #[arg(short, long)]
        base: Option<String>,
    },
    /// Keep refreshing rates in the background and print every update
    Watch {
        /// Refresh interval in seconds, overrides the configured one
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => xrate::cli::setup::setup(),
        Some(cmd) => xrate::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
        eprintln!(
            "{} {}",
            ui::style_text("Error:", ui::StyleType::Error),
            ui::describe_error(e)
        );
        std::process::exit(1);
    }
    result
}
