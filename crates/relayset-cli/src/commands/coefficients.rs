use std::{
    io::{self, Write},
    path::Path,
};

use anyhow::Result;
use relayset_algo::{CtReferral, DeviceRole, FaultType, ProtectionStage, SetpointConfig};
use relayset_cli::cli::RunFormat;
use serde::Serialize;
use tabwriter::TabWriter;

use super::load_config;

#[derive(Serialize)]
struct CoefficientRow {
    role: DeviceRole,
    fault: FaultType,
    stage: ProtectionStage,
    k: Option<f64>,
    factor: f64,
    delay_s: Option<f64>,
}

fn rows(config: &SetpointConfig) -> Vec<CoefficientRow> {
    let mut rows = Vec::new();
    for role in DeviceRole::ALL {
        let table = config.coefficients_for(role);
        for fault in FaultType::ALL {
            for stage in ProtectionStage::ALL {
                let settings = config.stage(stage);
                rows.push(CoefficientRow {
                    role,
                    fault,
                    stage,
                    k: table.get(fault, stage),
                    factor: settings.factor,
                    delay_s: settings.delay.map(|d| d.value()),
                });
            }
        }
    }
    rows
}

pub fn handle(config: Option<&Path>, format: RunFormat) -> Result<()> {
    let config = load_config(config)?;
    config.validate()?;
    let setpoints = config.setpoint_config()?;
    let rows = rows(&setpoints);

    match format {
        RunFormat::Json => {
            serde_json::to_writer_pretty(io::stdout(), &rows)?;
            println!();
        }
        RunFormat::Plain => {
            println!(
                "CT {}/{} A, thresholds referred to the {} side",
                setpoints.ct_primary_a,
                setpoints.ct_secondary_a,
                match setpoints.referral {
                    CtReferral::Secondary => "secondary",
                    CtReferral::Primary => "primary",
                }
            );
            let mut writer = TabWriter::new(io::stdout());
            writeln!(writer, "ROLE\tFAULT\tSTAGE\tK\tFACTOR\tDELAY (s)")?;
            for row in &rows {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    row.role,
                    row.fault,
                    row.stage,
                    row.k.map_or("-".to_string(), |k| k.to_string()),
                    row.factor,
                    row.delay_s.map_or("-".to_string(), |d| d.to_string())
                )?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
