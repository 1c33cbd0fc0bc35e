use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::Shell;
use relayset_algo::OperatingCase;
use relayset_io::TableFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "relayset", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Derive relay setpoints for the max and min operating cases
    Study {
        /// Network file (topology YAML/JSON or pandapower JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        network: PathBuf,
        /// Study configuration (TOML, YAML or JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Precomputed fault currents (CSV) instead of the IEC 60909 solver
        #[arg(long, value_hint = ValueHint::FilePath)]
        faults: Option<PathBuf>,
        /// Output directory for the study tables
        #[arg(short, long, default_value = "relayset-out", value_hint = ValueHint::DirPath)]
        out: PathBuf,
        /// Table format
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
        /// Fail when a fault column is missing instead of skipping it
        #[arg(long)]
        strict: bool,
        /// Add the per-bus targeted three-phase sweep tables
        #[arg(long)]
        bus_sweep: bool,
    },
    /// Compute short-circuit currents and write them as a fault table
    Faults {
        /// Network file (topology YAML/JSON or pandapower JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        network: PathBuf,
        /// Study configuration (only `lv_tol_percent` and `fault_types` are used)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Operating case to solve; both when omitted
        #[arg(long, value_enum)]
        case: Option<CaseArg>,
        /// Write the currents to this CSV instead of printing a summary
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    /// Check a network for problems before running a study
    Validate {
        /// Network file (topology YAML/JSON or pandapower JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        network: PathBuf,
    },
    /// Show the effective coefficient table per device role
    Coefficients {
        /// Study configuration (TOML, YAML or JSON); built-in defaults otherwise
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = RunFormat::Plain)]
        format: RunFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Parquet,
    Json,
}

impl From<OutputFormat> for TableFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Csv => TableFormat::Csv,
            OutputFormat::Parquet => TableFormat::Parquet,
            OutputFormat::Json => TableFormat::Json,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CaseArg {
    Max,
    Min,
}

impl From<CaseArg> for OperatingCase {
    fn from(case: CaseArg) -> Self {
        match case {
            CaseArg::Max => OperatingCase::Max,
            CaseArg::Min => OperatingCase::Min,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RunFormat {
    Plain,
    Json,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn study_defaults() {
        let cli = Cli::try_parse_from(["relayset", "study", "net.yaml"]).unwrap();
        match cli.command {
            Some(Commands::Study {
                network,
                config,
                faults,
                out,
                format,
                strict,
                bus_sweep,
            }) => {
                assert_eq!(network, PathBuf::from("net.yaml"));
                assert!(config.is_none() && faults.is_none());
                assert_eq!(out, PathBuf::from("relayset-out"));
                assert_eq!(format, OutputFormat::Csv);
                assert!(!strict && !bus_sweep);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log_level, tracing::Level::INFO);
    }

    #[test]
    fn faults_case_parses() {
        let cli =
            Cli::try_parse_from(["relayset", "faults", "net.yaml", "--case", "min"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Faults { case: Some(CaseArg::Min), .. })
        ));
        assert!(Cli::try_parse_from(["relayset", "faults", "net.yaml", "--case", "peak"]).is_err());
    }
}
