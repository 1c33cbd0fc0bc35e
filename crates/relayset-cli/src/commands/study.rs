use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use relayset_algo::{
    CaseTables, FaultSolver, FaultType, Iec60909Solver, ScenarioOrchestrator, SetpointCalculator,
};
use relayset_cli::cli::OutputFormat;
use relayset_core::Network;
use relayset_io::{export_tables, load_fault_table, TableFormat};
use tabwriter::TabWriter;
use tracing::{info, warn};

use super::telemetry::{record_run_timed, RunRecord};
use super::{load_config, load_network};

pub struct StudyArgs<'a> {
    pub network: &'a Path,
    pub config: Option<&'a Path>,
    pub faults: Option<&'a Path>,
    pub out: &'a Path,
    pub format: OutputFormat,
    pub strict: bool,
    pub bus_sweep: bool,
}

pub fn handle(args: &StudyArgs<'_>) -> Result<()> {
    let start = Instant::now();
    let mut outputs = Vec::new();
    let res = run(args, &mut outputs);

    let mut inputs = vec![args.network];
    inputs.extend(args.config);
    inputs.extend(args.faults);
    let format = TableFormat::from(args.format);
    let record = RunRecord {
        dir: args.out,
        command: "study",
        inputs,
        outputs,
        params: vec![
            ("network", args.network.display().to_string()),
            ("solver", solver_label(args.faults).to_string()),
            ("format", format.extension().to_string()),
            ("strict", args.strict.to_string()),
            ("bus_sweep", args.bus_sweep.to_string()),
        ],
    };
    record_run_timed(&record, start, &res);
    res
}

fn solver_label(faults: Option<&Path>) -> &'static str {
    if faults.is_some() {
        "tabulated"
    } else {
        "iec60909"
    }
}

fn run(args: &StudyArgs<'_>, outputs: &mut Vec<PathBuf>) -> Result<()> {
    let imported = load_network(args.network)?;
    let network = &imported.network;

    let mut config = load_config(args.config)?;
    config.strict |= args.strict;
    config.bus_sweep |= args.bus_sweep;
    config.validate().context("invalid study settings")?;

    let solver: Box<dyn FaultSolver> = match args.faults {
        Some(path) => Box::new(load_fault_table(path, network)?),
        None => {
            if imported.diagnostics.has_errors() {
                for issue in imported.diagnostics.errors() {
                    warn!("{issue}");
                }
                bail!(
                    "network '{}' has {}; run `relayset validate` for details",
                    args.network.display(),
                    imported.diagnostics.summary()
                );
            }
            Box::new(Iec60909Solver::new())
        }
    };
    info!(
        "running study on {} buses with the {} solver",
        network.stats().num_buses,
        solver.name()
    );

    let calculator = SetpointCalculator::new(config.setpoint_config()?)?;
    let format = TableFormat::from(args.format);
    let mut orchestrator = ScenarioOrchestrator::new(network, solver.as_ref(), calculator)
        .with_options(config.study_options());

    match orchestrator.run() {
        Ok(tables) => {
            outputs.extend(export_tables(tables.named_tables(), args.out, format)?);
            print_summary(network, &[&tables.max, &tables.min], outputs)?;
            Ok(())
        }
        Err(err) => {
            for case in orchestrator.completed_cases() {
                outputs.extend(export_tables(case.named_tables(), args.out, format)?);
            }
            if !outputs.is_empty() {
                info!("kept {} tables from completed cases", outputs.len());
            }
            Err(err).context("study failed")
        }
    }
}

fn print_summary(network: &Network, cases: &[&CaseTables], written: &[PathBuf]) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "CASE\tPEAK 3PH (kA)\tAT BUS\tBUSES\tLINE ENDS\tTRANSFORMERS")?;
    for case in cases {
        let peak = case
            .results
            .snapshot(FaultType::ThreePhase)
            .and_then(|snapshot| snapshot.peak());
        let (peak_ka, at) = match peak {
            Some((bus, ikss)) => (
                format!("{:.3}", ikss.value()),
                network
                    .bus(bus)
                    .map_or_else(|| bus.value().to_string(), |b| b.name.clone()),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            case.case,
            peak_ka,
            at,
            case.bus.height(),
            case.line_end.height(),
            case.transformer.height()
        )?;
    }
    writer.flush()?;

    println!("Wrote {} tables:", written.len());
    for path in written {
        println!("  {}", path.display());
    }
    Ok(())
}
