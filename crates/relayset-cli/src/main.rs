use std::io;

use clap::Parser;
use relayset_cli::cli::{Cli, Commands};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::study::StudyArgs;

fn run(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Study {
            network,
            config,
            faults,
            out,
            format,
            strict,
            bus_sweep,
        } => {
            info!("Running setpoint study on {}", network.display());
            commands::study::handle(&StudyArgs {
                network,
                config: config.as_deref(),
                faults: faults.as_deref(),
                out,
                format: *format,
                strict: *strict,
                bus_sweep: *bus_sweep,
            })
        }
        Commands::Faults {
            network,
            config,
            case,
            out,
        } => {
            info!("Computing fault currents for {}", network.display());
            commands::faults::handle(
                network,
                config.as_deref(),
                case.map(Into::into),
                out.as_deref(),
            )
        }
        Commands::Validate { network } => {
            info!("Validating {}", network.display());
            commands::validate::handle(network)
        }
        Commands::Coefficients { config, format } => {
            commands::coefficients::handle(config.as_deref(), *format)
        }
        Commands::Completions { shell, out } => commands::completions::handle(*shell, out.as_deref()),
    }
}

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let Some(command) = &cli.command else {
        info!("No subcommand provided. Use `relayset --help` for more information.");
        return;
    };

    if let Err(err) = run(command) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
