//! Solver backed by precomputed study results.

use crate::fault::{FaultRecord, FaultRequest, FaultSnapshot, FaultSolver, FaultType, OperatingCase};
use relayset_core::{BusId, Kiloamperes, Network, RelayError, RelayResult};
use std::collections::{BTreeMap, HashMap};

/// Serves fault currents from a table of `(bus, case, fault, I″k)` rows,
/// e.g. results exported from another short-circuit program.
#[derive(Debug, Clone, Default)]
pub struct TabulatedSolver {
    tables: HashMap<(OperatingCase, FaultType), BTreeMap<BusId, Kiloamperes>>,
}

impl TabulatedSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        case: OperatingCase,
        fault_type: FaultType,
        bus: BusId,
        ikss: Kiloamperes,
    ) -> RelayResult<()> {
        if !ikss.is_finite() || ikss.value() < 0.0 {
            return Err(RelayError::InvalidInput(format!(
                "tabulated {case} {fault_type} current at {bus} is not usable ({})",
                ikss.value()
            )));
        }
        self.tables
            .entry((case, fault_type))
            .or_default()
            .insert(bus, ikss);
        Ok(())
    }

    pub fn from_records(records: impl IntoIterator<Item = FaultRecord>) -> RelayResult<Self> {
        let mut solver = Self::new();
        for record in records {
            solver.insert(record.case, record.fault_type, record.bus, record.ikss)?;
        }
        Ok(solver)
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn covers(&self, case: OperatingCase, fault_type: FaultType) -> bool {
        self.tables.contains_key(&(case, fault_type))
    }
}

impl FaultSolver for TabulatedSolver {
    fn name(&self) -> &str {
        "tabulated"
    }

    fn solve(&self, network: &Network, request: &FaultRequest) -> RelayResult<FaultSnapshot> {
        request.validate()?;
        let table = self
            .tables
            .get(&(request.case, request.fault_type))
            .ok_or_else(|| {
                RelayError::SolverFailure(format!(
                    "no tabulated results for the {} case {} fault",
                    request.case, request.fault_type
                ))
            })?;

        let mut snapshot = FaultSnapshot::new(request.fault_type, request.case);
        for bus in network.buses() {
            if request.target_bus.is_some_and(|target| target != bus.id) {
                continue;
            }
            if let Some(ikss) = table.get(&bus.id) {
                snapshot.insert(bus.id, *ikss);
            }
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayset_core::{Bus, Kilovolts};

    fn network() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(0), "A", Kilovolts(6.3)));
        network.add_bus(Bus::new(BusId::new(1), "B", Kilovolts(6.3)));
        network
    }

    #[test]
    fn serves_only_known_buses() {
        let mut solver = TabulatedSolver::new();
        solver
            .insert(OperatingCase::Max, FaultType::ThreePhase, BusId::new(1), Kiloamperes(6.72))
            .unwrap();
        solver
            .insert(OperatingCase::Max, FaultType::ThreePhase, BusId::new(8), Kiloamperes(1.0))
            .unwrap();

        let snapshot = solver
            .solve(&network(), &FaultRequest::new(FaultType::ThreePhase, OperatingCase::Max))
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.current_at(BusId::new(0)), None);
        assert_eq!(snapshot.current_at(BusId::new(1)), Some(Kiloamperes(6.72)));
    }

    #[test]
    fn missing_case_is_solver_failure() {
        let solver = TabulatedSolver::new();
        let err = solver
            .solve(&network(), &FaultRequest::new(FaultType::TwoPhase, OperatingCase::Min))
            .unwrap_err();
        assert!(matches!(err, RelayError::SolverFailure(_)));
    }

    #[test]
    fn target_bus_restricts_snapshot() {
        let mut solver = TabulatedSolver::new();
        for bus in 0..2 {
            solver
                .insert(OperatingCase::Min, FaultType::ThreePhase, BusId::new(bus), Kiloamperes(2.0))
                .unwrap();
        }
        let request = FaultRequest::new(FaultType::ThreePhase, OperatingCase::Min)
            .with_target_bus(BusId::new(0));
        let snapshot = solver.solve(&network(), &request).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.current_at(BusId::new(0)).is_some());
    }

    #[test]
    fn rejects_negative_currents() {
        let mut solver = TabulatedSolver::new();
        assert!(solver
            .insert(OperatingCase::Max, FaultType::ThreePhase, BusId::new(0), Kiloamperes(-1.0))
            .is_err());
        assert!(solver.is_empty());
    }
}
