//! Two-case study driver.
//!
//! ```text
//! Idle → SolvingMax → AggregatingMax → SolvingMin → AggregatingMin → Done
//!             └──────────────┴───────────────┴──────────────┴──→ Error
//! ```
//!
//! Each `Solving*` state calls the solver once per fault type and records the
//! owned snapshots; each `Aggregating*` state builds the bus, line-end and
//! transformer tables and applies the setpoints. A failure stops the run; the
//! cases finished before it stay available through
//! [`ScenarioOrchestrator::completed_cases`].

use crate::coefficients::DeviceRole;
use crate::fault::{FaultRequest, FaultSolver, FaultType, OperatingCase};
use crate::results::FaultCurrentResultSet;
use crate::setpoints::SetpointCalculator;
use crate::table::{ka_values, table_error};
use crate::terminals::DeviceTerminalMapper;
use polars::prelude::*;
use relayset_core::{Kiloamperes, Network, RelayError, RelayResult};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error, info};

/// Names of the six study tables, in output order.
pub const TABLE_NAMES: [&str; 6] = [
    "max_bus",
    "max_line_end",
    "max_transformer",
    "min_bus",
    "min_line_end",
    "min_transformer",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyState {
    Idle,
    SolvingMax,
    AggregatingMax,
    SolvingMin,
    AggregatingMin,
    Done,
    Error,
}

impl StudyState {
    fn solving(case: OperatingCase) -> Self {
        match case {
            OperatingCase::Max => StudyState::SolvingMax,
            OperatingCase::Min => StudyState::SolvingMin,
        }
    }

    fn aggregating(case: OperatingCase) -> Self {
        match case {
            OperatingCase::Max => StudyState::AggregatingMax,
            OperatingCase::Min => StudyState::AggregatingMin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudyOptions {
    pub lv_tol_percent: f64,
    pub fault_types: Vec<FaultType>,
    /// Also solve a targeted three-phase fault at every bus
    pub bus_sweep: bool,
}

impl Default for StudyOptions {
    fn default() -> Self {
        Self {
            lv_tol_percent: 6.0,
            fault_types: FaultType::ALL.to_vec(),
            bus_sweep: false,
        }
    }
}

/// Tables of one operating case.
#[derive(Debug, Clone)]
pub struct CaseTables {
    pub case: OperatingCase,
    pub results: FaultCurrentResultSet,
    pub bus: DataFrame,
    pub line_end: DataFrame,
    pub transformer: DataFrame,
    /// `bus_name`, `ikss_ka` from the targeted sweep
    pub bus_sweep: Option<DataFrame>,
}

impl CaseTables {
    pub fn named_tables(&self) -> Vec<(String, &DataFrame)> {
        let prefix = self.case.as_str();
        let mut tables = vec![
            (format!("{prefix}_bus"), &self.bus),
            (format!("{prefix}_line_end"), &self.line_end),
            (format!("{prefix}_transformer"), &self.transformer),
        ];
        if let Some(sweep) = &self.bus_sweep {
            tables.push((format!("{prefix}_bus_sweep"), sweep));
        }
        tables
    }
}

/// Output of a complete study.
#[derive(Debug, Clone)]
pub struct StudyTables {
    pub max: CaseTables,
    pub min: CaseTables,
}

impl StudyTables {
    pub fn case(&self, case: OperatingCase) -> &CaseTables {
        match case {
            OperatingCase::Max => &self.max,
            OperatingCase::Min => &self.min,
        }
    }

    /// All tables, max case first.
    pub fn named_tables(&self) -> Vec<(String, &DataFrame)> {
        let mut tables = self.max.named_tables();
        tables.extend(self.min.named_tables());
        tables
    }

    pub fn get(&self, name: &str) -> Option<&DataFrame> {
        self.named_tables()
            .into_iter()
            .find(|(table, _)| table == name)
            .map(|(_, df)| df)
    }
}

/// Runs solver, aggregation and setpoints for the max and min cases.
pub struct ScenarioOrchestrator<'a> {
    network: &'a Network,
    solver: &'a dyn FaultSolver,
    calculator: SetpointCalculator,
    mapper: DeviceTerminalMapper,
    options: StudyOptions,
    state: StudyState,
    completed: Vec<CaseTables>,
}

struct SolvedCase {
    results: FaultCurrentResultSet,
    sweep: Option<Vec<Option<Kiloamperes>>>,
}

impl<'a> ScenarioOrchestrator<'a> {
    pub fn new(
        network: &'a Network,
        solver: &'a dyn FaultSolver,
        calculator: SetpointCalculator,
    ) -> Self {
        Self {
            network,
            solver,
            calculator,
            mapper: DeviceTerminalMapper::new(),
            options: StudyOptions::default(),
            state: StudyState::Idle,
            completed: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: StudyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> StudyState {
        self.state
    }

    /// Cases that finished aggregation, in run order.
    pub fn completed_cases(&self) -> &[CaseTables] {
        &self.completed
    }

    fn transition(&mut self, next: StudyState) {
        info!("study state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: RelayError) -> RelayError {
        error!("study failed in {:?}: {}", self.state, err);
        self.transition(StudyState::Error);
        err
    }

    /// Run both cases. Calling `run` again starts a fresh study.
    pub fn run(&mut self) -> RelayResult<StudyTables> {
        let started = Instant::now();
        self.completed.clear();
        self.state = StudyState::Idle;
        info!(
            "starting study with solver '{}' ({})",
            self.solver.name(),
            self.network.stats()
        );

        for case in OperatingCase::ALL {
            self.transition(StudyState::solving(case));
            let solved = match self.solve_case(case) {
                Ok(solved) => solved,
                Err(err) => return Err(self.fail(err)),
            };

            self.transition(StudyState::aggregating(case));
            let tables = match self.aggregate(case, solved) {
                Ok(tables) => tables,
                Err(err) => return Err(self.fail(err)),
            };
            self.completed.push(tables);
        }

        self.transition(StudyState::Done);
        info!("study finished in {:.2?}", started.elapsed());

        let mut cases = self.completed.iter().cloned();
        match (cases.next(), cases.next()) {
            (Some(max), Some(min)) => Ok(StudyTables { max, min }),
            _ => Err(RelayError::Other(
                "study finished without both operating cases".into(),
            )),
        }
    }

    fn solve_case(&self, case: OperatingCase) -> RelayResult<SolvedCase> {
        let mut results = FaultCurrentResultSet::new(case);
        for &fault_type in &self.options.fault_types {
            let request =
                FaultRequest::new(fault_type, case).with_lv_tol(self.options.lv_tol_percent);
            let snapshot = self
                .solver
                .solve(self.network, &request)
                .map_err(|err| err.context(format!("{case} case {fault_type} fault")))?;
            if snapshot.fault_type != fault_type {
                return Err(RelayError::SolverFailure(format!(
                    "solver '{}' answered a {fault_type} request with a {} snapshot",
                    self.solver.name(),
                    snapshot.fault_type
                )));
            }
            info!(
                "{} case {} fault: {} bus currents",
                case,
                fault_type,
                snapshot.len()
            );
            results.record(snapshot)?;
        }

        let sweep = if self.options.bus_sweep {
            Some(self.bus_sweep(case)?)
        } else {
            None
        };
        Ok(SolvedCase { results, sweep })
    }

    fn bus_sweep(&self, case: OperatingCase) -> RelayResult<Vec<Option<Kiloamperes>>> {
        let buses = self.network.buses();
        debug!("{} case bus sweep over {} buses", case, buses.len());
        buses
            .iter()
            .map(|bus| {
                let request = FaultRequest::new(FaultType::ThreePhase, case)
                    .with_lv_tol(self.options.lv_tol_percent)
                    .with_target_bus(bus.id);
                self.solver
                    .solve(self.network, &request)
                    .map(|snapshot| snapshot.current_at(bus.id))
                    .map_err(|err| err.context(format!("{case} case sweep at '{}'", bus.name)))
            })
            .collect()
    }

    fn aggregate(&self, case: OperatingCase, solved: SolvedCase) -> RelayResult<CaseTables> {
        let SolvedCase { results, sweep } = solved;

        let mut bus = results.bus_table(self.network)?;
        self.calculator.apply(&mut bus, DeviceRole::Bus)?;

        let mut line_end = self.mapper.line_end_table(&results, self.network)?;
        self.calculator.apply(&mut line_end, DeviceRole::LineEnd)?;

        let mut transformer = self.mapper.transformer_table(&results, self.network)?;
        self.calculator
            .apply(&mut transformer, DeviceRole::Transformer)?;

        let bus_sweep = match sweep {
            Some(values) => {
                let names: Vec<String> = self
                    .network
                    .buses()
                    .iter()
                    .map(|b| b.name.clone())
                    .collect();
                Some(
                    DataFrame::new(vec![
                        Series::new("bus_name", names),
                        Series::new("ikss_ka", ka_values(values)),
                    ])
                    .map_err(table_error)?,
                )
            }
            None => None,
        };

        debug!(
            "{} case tables: {} buses, {} line ends, {} transformers",
            case,
            bus.height(),
            line_end.height(),
            transformer.height()
        );

        Ok(CaseTables {
            case,
            results,
            bus,
            line_end,
            transformer,
            bus_sweep,
        })
    }
}
