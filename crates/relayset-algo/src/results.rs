//! Per-case store of solved fault currents.

use crate::fault::{FaultRecord, FaultSnapshot, FaultType, OperatingCase};
use crate::table::{ka_values, table_error};
use polars::prelude::*;
use relayset_core::{BusId, Kiloamperes, Network, RelayError, RelayResult};
use std::collections::BTreeMap;
use tracing::debug;

/// Fault currents by bus and fault type for one operating case.
///
/// Holds at most one snapshot per fault type. Recording a second snapshot for
/// the same fault type replaces the first one wholesale; values are never
/// merged across solver calls.
#[derive(Debug, Clone)]
pub struct FaultCurrentResultSet {
    case: OperatingCase,
    snapshots: BTreeMap<FaultType, FaultSnapshot>,
}

impl FaultCurrentResultSet {
    pub fn new(case: OperatingCase) -> Self {
        Self {
            case,
            snapshots: BTreeMap::new(),
        }
    }

    pub fn case(&self) -> OperatingCase {
        self.case
    }

    /// Store a solver snapshot.
    ///
    /// Fails with `InvalidInput` when the snapshot belongs to another case or
    /// carries a negative or non-finite current.
    pub fn record(&mut self, snapshot: FaultSnapshot) -> RelayResult<()> {
        if snapshot.case != self.case {
            return Err(RelayError::InvalidInput(format!(
                "cannot record a {} case snapshot in the {} case result set",
                snapshot.case, self.case
            )));
        }
        if let Some((bus, ikss)) = snapshot
            .iter()
            .find(|(_, ikss)| !ikss.is_finite() || ikss.value() < 0.0)
        {
            return Err(RelayError::InvalidInput(format!(
                "{} fault current at {bus} is not a usable value ({})",
                snapshot.fault_type,
                ikss.value()
            )));
        }
        debug!(
            "recorded {} {} snapshot with {} buses",
            self.case,
            snapshot.fault_type,
            snapshot.len()
        );
        self.snapshots.insert(snapshot.fault_type, snapshot);
        Ok(())
    }

    pub fn has_snapshot(&self, fault_type: FaultType) -> bool {
        self.snapshots.contains_key(&fault_type)
    }

    pub fn snapshot(&self, fault_type: FaultType) -> Option<&FaultSnapshot> {
        self.snapshots.get(&fault_type)
    }

    /// Fault types with a recorded snapshot, in 3ph, 2ph, 1ph order.
    pub fn fault_types(&self) -> impl Iterator<Item = FaultType> + '_ {
        self.snapshots.keys().copied()
    }

    /// `None` when nothing was computed for the bus and fault type.
    pub fn current_at(&self, bus: BusId, fault_type: FaultType) -> Option<Kiloamperes> {
        self.snapshots
            .get(&fault_type)
            .and_then(|snapshot| snapshot.current_at(bus))
    }

    /// Like [`current_at`](Self::current_at) but treats a missing value as an error.
    pub fn require_current_at(&self, bus: BusId, fault_type: FaultType) -> RelayResult<Kiloamperes> {
        let snapshot = self.snapshots.get(&fault_type).ok_or_else(|| {
            RelayError::InvalidInput(format!(
                "no {fault_type} snapshot recorded for the {} case",
                self.case
            ))
        })?;
        snapshot.current_at(bus).ok_or_else(|| {
            RelayError::InvalidInput(format!(
                "{bus} is absent from the {fault_type} {} case snapshot",
                self.case
            ))
        })
    }

    pub fn records(&self) -> impl Iterator<Item = FaultRecord> + '_ {
        self.snapshots.values().flat_map(|snapshot| snapshot.records())
    }

    /// Wide bus table joined on bus id in topology order.
    ///
    /// Columns: `bus_id`, `bus_name`, `vn_kv`, then one `<fault>_ikss_ka`
    /// column per recorded fault type. Buses missing from a snapshot get a
    /// null, never a zero.
    pub fn bus_table(&self, network: &Network) -> RelayResult<DataFrame> {
        let buses = network.buses();
        let mut columns = vec![
            Series::new(
                "bus_id",
                buses.iter().map(|b| b.id.value() as u64).collect::<Vec<_>>(),
            ),
            Series::new(
                "bus_name",
                buses.iter().map(|b| b.name.clone()).collect::<Vec<_>>(),
            ),
            Series::new(
                "vn_kv",
                buses.iter().map(|b| b.vn_kv.value()).collect::<Vec<_>>(),
            ),
        ];
        for fault_type in self.fault_types() {
            let values = ka_values(buses.iter().map(|b| self.current_at(b.id, fault_type)));
            columns.push(Series::new(&fault_type.column_name(), values));
        }
        DataFrame::new(columns).map_err(table_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::f64_column;
    use relayset_core::{Bus, Kilovolts};

    fn snapshot(fault_type: FaultType, case: OperatingCase, values: &[(usize, f64)]) -> FaultSnapshot {
        let mut snapshot = FaultSnapshot::new(fault_type, case);
        for (bus, ikss) in values {
            snapshot.insert(BusId::new(*bus), Kiloamperes(*ikss));
        }
        snapshot
    }

    #[test]
    fn record_replaces_previous_snapshot() {
        let mut results = FaultCurrentResultSet::new(OperatingCase::Max);
        results
            .record(snapshot(FaultType::ThreePhase, OperatingCase::Max, &[(0, 6.72), (1, 2.0)]))
            .unwrap();
        results
            .record(snapshot(FaultType::ThreePhase, OperatingCase::Max, &[(0, 5.0)]))
            .unwrap();

        assert_eq!(
            results.current_at(BusId::new(0), FaultType::ThreePhase),
            Some(Kiloamperes(5.0))
        );
        assert_eq!(results.current_at(BusId::new(1), FaultType::ThreePhase), None);
        assert_eq!(results.records().count(), 1);
    }

    #[test]
    fn record_rejects_case_mismatch() {
        let mut results = FaultCurrentResultSet::new(OperatingCase::Max);
        let err = results
            .record(snapshot(FaultType::ThreePhase, OperatingCase::Min, &[(0, 1.0)]))
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(_)));
    }

    #[test]
    fn record_rejects_non_finite_current() {
        let mut results = FaultCurrentResultSet::new(OperatingCase::Min);
        let err = results
            .record(snapshot(FaultType::TwoPhase, OperatingCase::Min, &[(0, f64::NAN)]))
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(_)));
    }

    #[test]
    fn missing_values_are_none_or_errors() {
        let mut results = FaultCurrentResultSet::new(OperatingCase::Max);
        results
            .record(snapshot(FaultType::ThreePhase, OperatingCase::Max, &[(0, 6.72)]))
            .unwrap();

        assert_eq!(results.current_at(BusId::new(0), FaultType::SinglePhase), None);
        assert!(matches!(
            results.require_current_at(BusId::new(0), FaultType::SinglePhase),
            Err(RelayError::InvalidInput(_))
        ));
        assert!(matches!(
            results.require_current_at(BusId::new(3), FaultType::ThreePhase),
            Err(RelayError::InvalidInput(_))
        ));
        assert_eq!(
            results
                .require_current_at(BusId::new(0), FaultType::ThreePhase)
                .unwrap(),
            Kiloamperes(6.72)
        );
    }

    #[test]
    fn bus_table_joins_in_topology_order() {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(5), "B", Kilovolts(6.3)));
        network.add_bus(Bus::new(BusId::new(2), "A", Kilovolts(6.3)));

        let mut results = FaultCurrentResultSet::new(OperatingCase::Max);
        results
            .record(snapshot(FaultType::ThreePhase, OperatingCase::Max, &[(2, 6.72), (5, 0.0)]))
            .unwrap();
        results
            .record(snapshot(FaultType::SinglePhase, OperatingCase::Max, &[(5, 4.1)]))
            .unwrap();

        let table = results.bus_table(&network).unwrap();
        assert_eq!(
            table.get_column_names(),
            vec!["bus_id", "bus_name", "vn_kv", "3ph_ikss_ka", "1ph_ikss_ka"]
        );
        assert_eq!(f64_column(&table, "bus_id").unwrap(), vec![Some(5.0), Some(2.0)]);
        assert_eq!(
            f64_column(&table, "3ph_ikss_ka").unwrap(),
            vec![Some(0.0), Some(6.72)]
        );
        assert_eq!(f64_column(&table, "1ph_ikss_ka").unwrap(), vec![Some(4.1), None]);
    }
}
