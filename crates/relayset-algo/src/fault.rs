//! Fault requests, solver snapshots and the [`FaultSolver`] seam.
//!
//! Every solver call returns an owned [`FaultSnapshot`]. Nothing is written
//! back into the topology, so two calls can never overwrite each other's
//! results.

use relayset_core::{BusId, Kiloamperes, Network, RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Short-circuit fault type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FaultType {
    #[serde(rename = "3ph")]
    ThreePhase,
    #[serde(rename = "2ph")]
    TwoPhase,
    #[serde(rename = "1ph")]
    SinglePhase,
}

impl FaultType {
    pub const ALL: [FaultType; 3] = [
        FaultType::ThreePhase,
        FaultType::TwoPhase,
        FaultType::SinglePhase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultType::ThreePhase => "3ph",
            FaultType::TwoPhase => "2ph",
            FaultType::SinglePhase => "1ph",
        }
    }

    /// Bus-table column holding this fault type's current, e.g. `3ph_ikss_ka`.
    pub fn column_name(&self) -> String {
        format!("{}_ikss_ka", self.as_str())
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultType {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "3ph" | "three_phase" | "lll" => Ok(FaultType::ThreePhase),
            "2ph" | "two_phase" | "ll" => Ok(FaultType::TwoPhase),
            "1ph" | "single_phase" | "lg" => Ok(FaultType::SinglePhase),
            other => Err(RelayError::Parse(format!(
                "unknown fault type '{other}'; expected 3ph, 2ph or 1ph"
            ))),
        }
    }
}

/// Network operating state used for a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingCase {
    /// Strongest sources, highest currents
    Max,
    /// Weakest sources, conductors at end temperature
    Min,
}

impl OperatingCase {
    pub const ALL: [OperatingCase; 2] = [OperatingCase::Max, OperatingCase::Min];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingCase::Max => "max",
            OperatingCase::Min => "min",
        }
    }
}

impl fmt::Display for OperatingCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingCase {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" | "maximum" => Ok(OperatingCase::Max),
            "min" | "minimum" => Ok(OperatingCase::Min),
            other => Err(RelayError::Parse(format!(
                "unknown operating case '{other}'; expected max or min"
            ))),
        }
    }
}

/// Low-voltage tolerance percentages accepted for the voltage factor.
pub const LV_TOLERANCES: [f64; 2] = [6.0, 10.0];

/// One solver invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultRequest {
    pub fault_type: FaultType,
    pub case: OperatingCase,
    /// Low-voltage tolerance of the supply, 6 or 10 percent
    pub lv_tol_percent: f64,
    /// Restrict the solve to a single bus
    pub target_bus: Option<BusId>,
}

impl FaultRequest {
    pub fn new(fault_type: FaultType, case: OperatingCase) -> Self {
        Self {
            fault_type,
            case,
            lv_tol_percent: 6.0,
            target_bus: None,
        }
    }

    pub fn with_lv_tol(mut self, lv_tol_percent: f64) -> Self {
        self.lv_tol_percent = lv_tol_percent;
        self
    }

    pub fn with_target_bus(mut self, bus: BusId) -> Self {
        self.target_bus = Some(bus);
        self
    }

    /// Reject tolerances other than 6 % and 10 %.
    pub fn validate(&self) -> RelayResult<()> {
        if LV_TOLERANCES.contains(&self.lv_tol_percent) {
            Ok(())
        } else {
            Err(RelayError::SolverFailure(format!(
                "lv_tol_percent must be 6 or 10, got {}",
                self.lv_tol_percent
            )))
        }
    }
}

/// Fault current at one bus for one fault type and case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultRecord {
    pub bus: BusId,
    pub fault_type: FaultType,
    pub case: OperatingCase,
    pub ikss: Kiloamperes,
}

/// Owned result of one solver call.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultSnapshot {
    pub fault_type: FaultType,
    pub case: OperatingCase,
    currents: BTreeMap<BusId, Kiloamperes>,
}

impl FaultSnapshot {
    pub fn new(fault_type: FaultType, case: OperatingCase) -> Self {
        Self {
            fault_type,
            case,
            currents: BTreeMap::new(),
        }
    }

    /// Store the current for a bus, replacing any earlier value.
    pub fn insert(&mut self, bus: BusId, ikss: Kiloamperes) {
        self.currents.insert(bus, ikss);
    }

    pub fn current_at(&self, bus: BusId) -> Option<Kiloamperes> {
        self.currents.get(&bus).copied()
    }

    pub fn len(&self) -> usize {
        self.currents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BusId, Kiloamperes)> + '_ {
        self.currents.iter().map(|(bus, ikss)| (*bus, *ikss))
    }

    pub fn records(&self) -> impl Iterator<Item = FaultRecord> + '_ {
        self.iter().map(move |(bus, ikss)| FaultRecord {
            bus,
            fault_type: self.fault_type,
            case: self.case,
            ikss,
        })
    }

    /// Largest current in the snapshot.
    pub fn peak(&self) -> Option<(BusId, Kiloamperes)> {
        self.iter()
            .max_by(|a, b| a.1.value().total_cmp(&b.1.value()))
    }
}

/// Computes fault currents for a topology.
///
/// Implementations take `&self` and keep no per-call state, so one solver can
/// serve both operating cases.
pub trait FaultSolver: Send + Sync {
    /// Short name used in logs and run manifests.
    fn name(&self) -> &str;

    fn solve(&self, network: &Network, request: &FaultRequest) -> RelayResult<FaultSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_type_names() {
        assert_eq!(FaultType::ThreePhase.column_name(), "3ph_ikss_ka");
        assert_eq!("1PH".parse::<FaultType>().unwrap(), FaultType::SinglePhase);
        assert!("4ph".parse::<FaultType>().is_err());
        assert_eq!(
            serde_json::to_string(&FaultType::TwoPhase).unwrap(),
            "\"2ph\""
        );
    }

    #[test]
    fn request_tolerance() {
        let request = FaultRequest::new(FaultType::ThreePhase, OperatingCase::Max);
        assert!(request.validate().is_ok());
        assert!(request.clone().with_lv_tol(10.0).validate().is_ok());
        let err = request.with_lv_tol(8.0).validate().unwrap_err();
        assert!(matches!(err, RelayError::SolverFailure(_)));
    }

    #[test]
    fn snapshot_replaces_and_reports_peak() {
        let mut snapshot = FaultSnapshot::new(FaultType::ThreePhase, OperatingCase::Min);
        snapshot.insert(BusId::new(0), Kiloamperes(3.35));
        snapshot.insert(BusId::new(1), Kiloamperes(1.2));
        snapshot.insert(BusId::new(0), Kiloamperes(3.0));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.current_at(BusId::new(0)), Some(Kiloamperes(3.0)));
        assert_eq!(snapshot.current_at(BusId::new(7)), None);
        assert_eq!(snapshot.peak(), Some((BusId::new(0), Kiloamperes(3.0))));
        assert!(snapshot
            .records()
            .all(|r| r.case == OperatingCase::Min && r.fault_type == FaultType::ThreePhase));
    }
}
