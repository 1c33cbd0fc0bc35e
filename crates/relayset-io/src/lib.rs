//! # relayset-io: Topologies, Study Settings and Table Export
//!
//! File formats around a setpoint study.
//!
//! ## Quick Start: Run a Study from Files
//!
//! ```rust,no_run
//! use relayset_algo::{Iec60909Solver, ScenarioOrchestrator, SetpointCalculator};
//! use relayset_io::{export_tables, import_network, load_study_config, TableFormat};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let imported = import_network(Path::new("demos/refinery.yaml"))?;
//!     let config = load_study_config(Path::new("demos/setpoints.toml"))?;
//!
//!     let solver = Iec60909Solver::new();
//!     let calculator = SetpointCalculator::new(config.setpoint_config()?)?;
//!     let tables = ScenarioOrchestrator::new(&imported.network, &solver, calculator)
//!         .with_options(config.study_options())
//!         .run()?;
//!
//!     export_tables(tables.named_tables(), Path::new("out"), TableFormat::Csv)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Input | Extensions | Module |
//! |-------|------------|--------|
//! | Topology document | `.yaml`, `.yml`, `.json` | [`topology`] |
//! | pandapower network | `.json` | [`importers::pandapower`] |
//! | Study configuration | `.toml`, `.yaml`, `.json` | [`config`] |
//! | Fault table | `.csv` | [`fault_table`] |
//!
//! Tables are exported as CSV, Parquet (feature `parquet`, on by default) or
//! JSON arrays of row objects.
//!
//! ## Error Handling
//!
//! Loaders return [`anyhow::Result`] with the file path in the context
//! chain. Domain errors from `relayset-core` pass through unchanged as the
//! root cause.

pub mod checksum;
pub mod config;
pub mod exporters;
pub mod fault_table;
pub mod importers;
pub mod topology;

pub use checksum::compute_sha256;
pub use config::{load_study_config, CoefficientPreset, CoefficientSpec, CtSettings, StageSpec, StudyConfig};
pub use exporters::{dataframe_to_json_rows, export_tables, write_table, TableFormat};
pub use fault_table::{load_fault_table, read_fault_records, write_fault_table};
pub use importers::{import_network, parse_pandapower, ImportResult, NetworkFormat};
pub use topology::{
    load_topology, load_topology_document, save_topology_document, BusRef, TopologyDocument,
};
