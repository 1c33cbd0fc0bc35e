use std::{
    io::{self, Write},
    path::Path,
    time::Instant,
};

use anyhow::{Context, Result};
use relayset_algo::{FaultRecord, FaultRequest, FaultSolver, Iec60909Solver, OperatingCase};
use relayset_core::Network;
use relayset_io::write_fault_table;
use tabwriter::TabWriter;
use tracing::info;

use super::telemetry::{record_run_timed, RunRecord};
use super::{load_config, load_network};

pub fn handle(
    network_path: &Path,
    config_path: Option<&Path>,
    case: Option<OperatingCase>,
    out: Option<&Path>,
) -> Result<()> {
    let start = Instant::now();
    let res = run(network_path, config_path, case, out);
    if let Some(out) = out {
        let mut inputs = vec![network_path];
        inputs.extend(config_path);
        let record = RunRecord {
            dir: out
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new(".")),
            command: "faults",
            inputs,
            outputs: if res.is_ok() { vec![out.to_path_buf()] } else { Vec::new() },
            params: vec![
                ("network", network_path.display().to_string()),
                ("case", case.map_or("all", |c| c.as_str()).to_string()),
            ],
        };
        record_run_timed(&record, start, &res);
    }
    res
}

fn run(
    network_path: &Path,
    config_path: Option<&Path>,
    case: Option<OperatingCase>,
    out: Option<&Path>,
) -> Result<()> {
    let imported = load_network(network_path)?;
    let config = load_config(config_path)?;
    config.validate().context("invalid study settings")?;

    let solver = Iec60909Solver::new();
    let cases = match case {
        Some(case) => vec![case],
        None => OperatingCase::ALL.to_vec(),
    };

    let mut records = Vec::new();
    for case in cases {
        for &fault_type in &config.fault_types {
            let request = FaultRequest::new(fault_type, case).with_lv_tol(config.lv_tol_percent);
            let snapshot = solver
                .solve(&imported.network, &request)
                .with_context(|| format!("solving {fault_type} faults for the {case} case"))?;
            records.extend(snapshot.records());
        }
    }

    match out {
        Some(path) => {
            write_fault_table(path, &imported.network, &records)?;
            info!("wrote {} fault currents to {}", records.len(), path.display());
            Ok(())
        }
        None => print_records(&imported.network, &records),
    }
}

fn print_records(network: &Network, records: &[FaultRecord]) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "BUS\tNAME\tCASE\tFAULT\tIKSS (kA)")?;
    for record in records {
        let name = network.bus(record.bus).map_or("", |b| b.name.as_str());
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{:.3}",
            record.bus.value(),
            name,
            record.case,
            record.fault_type,
            record.ikss.value()
        )?;
    }
    writer.flush()?;
    Ok(())
}
