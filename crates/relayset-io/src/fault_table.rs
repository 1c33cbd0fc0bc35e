//! Precomputed fault currents in long CSV form.
//!
//! Expected format:
//! ```csv
//! bus,bus_id,case,fault,ikss_ka
//! 35kV Main Bus,0,max,3ph,6.72
//! 35kV Main Bus,,min,3ph,3.35
//! ,2,max,1ph,1.05
//! ```
//!
//! `bus_id` is optional and wins when filled in; the name must then agree
//! with it. Without an id, `bus` is a bus name or a numeric bus id, and
//! names win when a bus is named like another bus's id. Written tables
//! always carry both.

use std::{collections::HashMap, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use relayset_algo::{FaultRecord, FaultType, OperatingCase, TabulatedSolver};
use relayset_core::{BusId, Kiloamperes, Network};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FaultRow {
    #[serde(default)]
    bus: String,
    #[serde(default)]
    bus_id: Option<usize>,
    case: OperatingCase,
    fault: FaultType,
    ikss_ka: f64,
}

/// Maps the `bus` column onto topology ids.
struct BusLookup {
    by_name: HashMap<String, Vec<BusId>>,
    by_id: HashMap<usize, BusId>,
}

impl BusLookup {
    fn new(network: &Network) -> Self {
        let mut by_name: HashMap<String, Vec<BusId>> = HashMap::new();
        let mut by_id = HashMap::new();
        for bus in network.buses() {
            by_name.entry(bus.name.clone()).or_default().push(bus.id);
            by_id.insert(bus.id.value(), bus.id);
        }
        Self { by_name, by_id }
    }

    fn resolve(&self, network: &Network, bus: &str, bus_id: Option<usize>) -> Result<BusId> {
        let bus = bus.trim();
        if let Some(id) = bus_id {
            let found = self
                .by_id
                .get(&id)
                .copied()
                .ok_or_else(|| anyhow!("unknown bus id {id}"))?;
            if let Some(named) = network.bus(found) {
                if !bus.is_empty() && named.name != bus {
                    bail!("bus id {id} is '{}', not '{bus}'", named.name);
                }
            }
            return Ok(found);
        }
        if bus.is_empty() {
            bail!("row has neither a bus name nor a bus id");
        }
        match self.by_name.get(bus).map(Vec::as_slice) {
            Some([id]) => return Ok(*id),
            Some(_) => bail!("bus name '{bus}' is ambiguous; use the bus id"),
            None => {}
        }
        bus.parse::<usize>()
            .ok()
            .and_then(|id| self.by_id.get(&id).copied())
            .ok_or_else(|| anyhow!("unknown bus '{bus}'"))
    }
}

/// Read fault records, resolving buses against `network`.
pub fn read_fault_records(path: &Path, network: &Network) -> Result<Vec<FaultRecord>> {
    let lookup = BusLookup::new(network);
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening fault table '{}'", path.display()))?;

    let mut records = Vec::new();
    for (line, result) in reader.deserialize::<FaultRow>().enumerate() {
        // Header is line 1
        let row: FaultRow =
            result.with_context(|| format!("reading fault table row {}", line + 2))?;
        let bus = lookup
            .resolve(network, &row.bus, row.bus_id)
            .with_context(|| format!("fault table row {}", line + 2))?;
        records.push(FaultRecord {
            bus,
            fault_type: row.fault,
            case: row.case,
            ikss: Kiloamperes(row.ikss_ka),
        });
    }
    Ok(records)
}

/// Load a fault table as a solver.
pub fn load_fault_table(path: &Path, network: &Network) -> Result<TabulatedSolver> {
    let records = read_fault_records(path, network)?;
    let count = records.len();
    let solver = TabulatedSolver::from_records(records)
        .with_context(|| format!("loading fault table '{}'", path.display()))?;
    info!(
        "loaded {} fault currents from {}",
        count,
        path.display()
    );
    Ok(solver)
}

/// Write fault records in the format [`read_fault_records`] accepts.
pub fn write_fault_table<'a>(
    path: &Path,
    network: &Network,
    records: impl IntoIterator<Item = &'a FaultRecord>,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating fault table '{}'", path.display()))?;
    for record in records {
        writer
            .serialize(FaultRow {
                bus: network
                    .bus(record.bus)
                    .map(|b| b.name.clone())
                    .unwrap_or_default(),
                bus_id: Some(record.bus.value()),
                case: record.case,
                fault: record.fault_type,
                ikss_ka: record.ikss.value(),
            })
            .context("writing fault table row")?;
    }
    writer.flush().context("flushing fault table")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayset_algo::{FaultRequest, FaultSolver};
    use relayset_core::{Bus, Kilovolts};
    use std::fs;

    fn network() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(0), "Main", Kilovolts(35.0)));
        network.add_bus(Bus::new(BusId::new(5), "LV", Kilovolts(6.3)));
        network.add_bus(Bus::new(BusId::new(6), "Twin", Kilovolts(6.3)));
        network.add_bus(Bus::new(BusId::new(7), "Twin", Kilovolts(6.3)));
        network
    }

    #[test]
    fn reads_names_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faults.csv");
        fs::write(
            &path,
            "bus,case,fault,ikss_ka\nMain,max,3ph,6.72\n5,max,3ph,16.9\n7,min,1ph,0.5\n",
        )
        .unwrap();

        let solver = load_fault_table(&path, &network()).unwrap();
        assert!(solver.covers(OperatingCase::Max, FaultType::ThreePhase));
        assert!(!solver.covers(OperatingCase::Max, FaultType::TwoPhase));

        let snapshot = solver
            .solve(
                &network(),
                &FaultRequest::new(FaultType::ThreePhase, OperatingCase::Max),
            )
            .unwrap();
        assert_eq!(snapshot.current_at(BusId::new(0)), Some(Kiloamperes(6.72)));
        assert_eq!(snapshot.current_at(BusId::new(5)), Some(Kiloamperes(16.9)));
    }

    #[test]
    fn ambiguous_name_and_bad_rows_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faults.csv");

        fs::write(&path, "bus,case,fault,ikss_ka\nTwin,max,3ph,1.0\n").unwrap();
        let err = format!("{:#}", load_fault_table(&path, &network()).unwrap_err());
        assert!(err.contains("row 2"));
        assert!(err.contains("ambiguous"));

        fs::write(&path, "bus,case,fault,ikss_ka\nMain,peak,3ph,1.0\n").unwrap();
        assert!(load_fault_table(&path, &network()).is_err());

        fs::write(&path, "bus,case,fault,ikss_ka\nMain,max,3ph,-1.0\n").unwrap();
        assert!(load_fault_table(&path, &network()).is_err());
    }

    #[test]
    fn written_table_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![
            FaultRecord {
                bus: BusId::new(5),
                fault_type: FaultType::TwoPhase,
                case: OperatingCase::Min,
                ikss: Kiloamperes(12.5),
            },
            FaultRecord {
                bus: BusId::new(6),
                fault_type: FaultType::TwoPhase,
                case: OperatingCase::Min,
                ikss: Kiloamperes(0.0),
            },
        ];
        write_fault_table(&path, &network(), &records).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "bus,bus_id,case,fault,ikss_ka\nLV,5,min,2ph,12.5\nTwin,6,min,2ph,0.0"
        ));
        assert_eq!(read_fault_records(&path, &network()).unwrap(), records);
    }

    #[test]
    fn bus_id_column_wins_over_colliding_name() {
        let mut network = network();
        // Unique name that spells the id of one of the "Twin" buses
        network.add_bus(Bus::new(BusId::new(8), "6", Kilovolts(0.4)));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let records = vec![FaultRecord {
            bus: BusId::new(6),
            fault_type: FaultType::ThreePhase,
            case: OperatingCase::Max,
            ikss: Kiloamperes(9.1),
        }];

        write_fault_table(&path, &network, &records).unwrap();
        let read = read_fault_records(&path, &network).unwrap();
        assert_eq!(read[0].bus, BusId::new(6));

        // Without an id the name "6" still resolves to the bus named "6"
        fs::write(&path, "bus,case,fault,ikss_ka\n6,max,3ph,9.1\n").unwrap();
        assert_eq!(read_fault_records(&path, &network).unwrap()[0].bus, BusId::new(8));
    }

    #[test]
    fn bus_id_must_agree_with_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faults.csv");

        fs::write(&path, "bus,bus_id,case,fault,ikss_ka\nMain,5,max,3ph,1.0\n").unwrap();
        let err = format!("{:#}", read_fault_records(&path, &network()).unwrap_err());
        assert!(err.contains("bus id 5 is 'LV'"));

        fs::write(&path, "bus,bus_id,case,fault,ikss_ka\n,42,max,3ph,1.0\n").unwrap();
        let err = format!("{:#}", read_fault_records(&path, &network()).unwrap_err());
        assert!(err.contains("unknown bus id 42"));

        fs::write(&path, "bus,bus_id,case,fault,ikss_ka\n,7,min,3ph,1.0\n").unwrap();
        assert_eq!(read_fault_records(&path, &network()).unwrap()[0].bus, BusId::new(7));
    }
}
