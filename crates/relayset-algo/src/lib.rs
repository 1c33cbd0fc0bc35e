//! # relayset-algo: Fault Studies and Relay Setpoints
//!
//! This crate turns short-circuit results into protective-relay current
//! setpoints for a medium-voltage network.
//!
//! ## Pipeline
//!
//! | Step | Type | Output |
//! |------|------|--------|
//! | Solve | [`FaultSolver`] | one owned [`FaultSnapshot`] per fault type and case |
//! | Collect | [`FaultCurrentResultSet`] | bus table (`3ph_ikss_ka`, `2ph_ikss_ka`, `1ph_ikss_ka`) |
//! | Map | [`DeviceTerminalMapper`] | line-end and transformer-terminal tables |
//! | Scale | [`SetpointCalculator`] | `setpoint_<fault>_<stage>` columns |
//! | Drive | [`ScenarioOrchestrator`] | six tables, max and min case |
//!
//! ## Solvers
//!
//! - [`Iec60909Solver`]: equivalent voltage source method on the topology
//! - [`TabulatedSolver`]: precomputed currents from another study
//!
//! ## Example
//!
//! ```ignore
//! use relayset_algo::*;
//!
//! let solver = Iec60909Solver::new();
//! let calculator = SetpointCalculator::new(SetpointConfig::default())?;
//! let tables = ScenarioOrchestrator::new(&network, &solver, calculator).run()?;
//!
//! let max_bus = tables.get("max_bus").unwrap();
//! println!("{max_bus}");
//! ```

pub mod coefficients;
pub mod fault;
pub mod orchestrator;
pub mod results;
pub mod setpoints;
pub mod short_circuit;
pub mod table;
pub mod tabulated;
pub mod terminals;

pub use coefficients::{
    CoefficientTable, CtReferral, DeviceRole, ProtectionStage, SetpointConfig, StageSettings,
};
pub use fault::{
    FaultRecord, FaultRequest, FaultSnapshot, FaultSolver, FaultType, OperatingCase,
    LV_TOLERANCES,
};
pub use orchestrator::{
    CaseTables, ScenarioOrchestrator, StudyOptions, StudyState, StudyTables, TABLE_NAMES,
};
pub use results::FaultCurrentResultSet;
pub use setpoints::{setpoint_records, SetpointCalculator, SetpointRecord, Terminal};
pub use short_circuit::{Iec60909Solver, VoltageFactor};
pub use tabulated::TabulatedSolver;
pub use terminals::{DeviceKind, DeviceTerminalMapper, DeviceTerminalRecord};
