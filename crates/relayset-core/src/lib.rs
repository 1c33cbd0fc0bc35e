//! # relayset-core: Distribution Network Model for Protection Studies
//!
//! Provides the data structures that describe a medium-voltage distribution
//! network for short-circuit and relay-setpoint studies.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **undirected multigraphs** where:
//! - **Nodes**: Buses, external grids (sources) and loads
//! - **Edges**: Lines, two-winding transformers and bus-bus switches
//!
//! Parallel feeders between the same pair of buses are common in industrial
//! substations (the 6.3 kV board of a refinery may have a dozen outgoing
//! cables to the same load bus), so multiple edges between two nodes are the
//! normal case, not an exception.
//!
//! Iteration order over every element kind is insertion order. Downstream
//! result tables inherit this order, which keeps reports deterministic and
//! diffable between runs.
//!
//! ## Quick Start
//!
//! ```rust
//! use relayset_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus::new(BusId::new(0), "35kV Main Bus", Kilovolts(35.0)));
//! network.add_bus(Bus::new(BusId::new(1), "6.3kV Bus 1", Kilovolts(6.3)));
//!
//! network
//!     .add_external_grid(ExternalGrid::new(
//!         ExtGridId::new(0),
//!         "Utility",
//!         BusId::new(0),
//!         MegavoltAmperes(407.4),
//!         MegavoltAmperes(203.1),
//!     ))
//!     .unwrap();
//!
//! network
//!     .add_transformer(Transformer::new(
//!         TransformerId::new(0),
//!         "Transformer 1",
//!         BusId::new(0),
//!         BusId::new(1),
//!     ))
//!     .unwrap();
//!
//! assert_eq!(network.buses().len(), 2);
//! assert_eq!(network.transformers().len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`diagnostics`] - Validation findings
//! - [`graph_utils`] - Energization and electrical-node analysis
//! - [`solver`] - Dense complex linear-system backend
//! - [`units`] - Unit newtypes (kA, A, kV, MVA, s)

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod solver;
pub mod units;

pub use diagnostics::{Category, DiagnosticIssue, Diagnostics, Severity};
pub use error::{RelayError, RelayResult};
pub use graph_utils::*;
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use solver::*;
pub use units::{
    Amperes, Kiloamperes, Kilovolts, Megavars, MegavoltAmperes, Megawatts, Ohms,
    Seconds,
};

macro_rules! define_id {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }
    };
}

define_id!(BusId, "Bus");
define_id!(LineId, "Line");
define_id!(TransformerId, "Trafo");
define_id!(ExtGridId, "ExtGrid");
define_id!(LoadId, "Load");
define_id!(SwitchId, "Switch");

// ============================================================================
// Elements
// ============================================================================

#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Nominal line-to-line voltage
    pub vn_kv: Kilovolts,
    pub in_service: bool,
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>, vn_kv: Kilovolts) -> Self {
        Self {
            id,
            name: name.into(),
            vn_kv,
            in_service: true,
        }
    }
}

/// Equivalent of the upstream network feeding a bus.
///
/// The source strength is given as initial symmetrical short-circuit power
/// `S″k` for the maximum and minimum operating case, together with the R/X
/// ratio of the equivalent impedance. Zero-sequence ratios are optional; a
/// grid without them does not contribute a zero-sequence path.
#[derive(Debug, Clone)]
pub struct ExternalGrid {
    pub id: ExtGridId,
    pub name: String,
    pub bus: BusId,
    pub s_sc_max: MegavoltAmperes,
    pub s_sc_min: MegavoltAmperes,
    pub rx_max: f64,
    pub rx_min: f64,
    /// X0/X1 ratio for the maximum case
    pub x0x_max: Option<f64>,
    pub x0x_min: Option<f64>,
    /// R0/X0 ratio for the maximum case
    pub r0x0_max: Option<f64>,
    pub r0x0_min: Option<f64>,
    pub in_service: bool,
}

impl ExternalGrid {
    pub fn new(
        id: ExtGridId,
        name: impl Into<String>,
        bus: BusId,
        s_sc_max: MegavoltAmperes,
        s_sc_min: MegavoltAmperes,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            s_sc_max,
            s_sc_min,
            rx_max: 0.1,
            rx_min: 0.1,
            x0x_max: None,
            x0x_min: None,
            r0x0_max: None,
            r0x0_min: None,
            in_service: true,
        }
    }

    /// Set R/X ratios of the equivalent impedance.
    pub fn with_rx(mut self, rx_max: f64, rx_min: f64) -> Self {
        self.rx_max = rx_max;
        self.rx_min = rx_min;
        self
    }

    /// Set zero-sequence ratios (X0/X, R0/X0) for both cases.
    pub fn with_zero_sequence(mut self, x0x: (f64, f64), r0x0: (f64, f64)) -> Self {
        self.x0x_max = Some(x0x.0);
        self.x0x_min = Some(x0x.1);
        self.r0x0_max = Some(r0x0.0);
        self.r0x0_min = Some(r0x0.1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    /// Zero-sequence resistance; positive-sequence value is used when absent
    pub r0_ohm_per_km: Option<f64>,
    /// Zero-sequence reactance; positive-sequence value is used when absent
    pub x0_ohm_per_km: Option<f64>,
    /// Number of identical parallel systems
    pub parallel: u32,
    /// Conductor temperature at the end of the fault, for minimum currents
    pub endtemp_degree: f64,
    pub in_service: bool,
}

impl Line {
    pub fn new(id: LineId, name: impl Into<String>, from_bus: BusId, to_bus: BusId) -> Self {
        Self {
            id,
            name: name.into(),
            from_bus,
            to_bus,
            length_km: 1.0,
            r_ohm_per_km: 0.0,
            x_ohm_per_km: 0.0,
            r0_ohm_per_km: None,
            x0_ohm_per_km: None,
            parallel: 1,
            endtemp_degree: 20.0,
            in_service: true,
        }
    }

    pub fn with_length_km(mut self, length_km: f64) -> Self {
        self.length_km = length_km;
        self
    }

    pub fn with_impedance(mut self, r_ohm_per_km: f64, x_ohm_per_km: f64) -> Self {
        self.r_ohm_per_km = r_ohm_per_km;
        self.x_ohm_per_km = x_ohm_per_km;
        self
    }

    pub fn with_zero_sequence(mut self, r0_ohm_per_km: f64, x0_ohm_per_km: f64) -> Self {
        self.r0_ohm_per_km = Some(r0_ohm_per_km);
        self.x0_ohm_per_km = Some(x0_ohm_per_km);
        self
    }

    pub fn with_endtemp(mut self, endtemp_degree: f64) -> Self {
        self.endtemp_degree = endtemp_degree;
        self
    }

    /// Total positive-sequence series impedance (R, X) of all parallel systems.
    pub fn series_ohms(&self) -> (Ohms, Ohms) {
        let scale = self.length_km / self.parallel.max(1) as f64;
        (
            Ohms(self.r_ohm_per_km * scale),
            Ohms(self.x_ohm_per_km * scale),
        )
    }

    /// Total zero-sequence series impedance (R0, X0) of all parallel systems.
    pub fn zero_sequence_ohms(&self) -> (Ohms, Ohms) {
        let scale = self.length_km / self.parallel.max(1) as f64;
        (
            Ohms(self.r0_ohm_per_km.unwrap_or(self.r_ohm_per_km) * scale),
            Ohms(self.x0_ohm_per_km.unwrap_or(self.x_ohm_per_km) * scale),
        )
    }
}

/// Winding connection of a two-winding transformer.
///
/// Only the zero-sequence behaviour matters for fault studies; see
/// [`VectorGroup::zero_sequence_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VectorGroup {
    #[default]
    Dyn,
    YNd,
    YNyn,
    Yyn,
    Yd,
    Dy,
    Dd,
    Yy,
}

/// How a transformer appears in the zero-sequence network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroSequencePath {
    /// No zero-sequence current can flow through or into the transformer
    Open,
    /// Grounded star on the hv side, delta on the lv side
    GroundedHv,
    /// Delta on the hv side, grounded star on the lv side
    GroundedLv,
    /// Both windings grounded star
    Series,
}

impl VectorGroup {
    pub fn zero_sequence_path(self) -> ZeroSequencePath {
        match self {
            VectorGroup::Dyn => ZeroSequencePath::GroundedLv,
            VectorGroup::YNd => ZeroSequencePath::GroundedHv,
            VectorGroup::YNyn => ZeroSequencePath::Series,
            _ => ZeroSequencePath::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VectorGroup::Dyn => "Dyn",
            VectorGroup::YNd => "YNd",
            VectorGroup::YNyn => "YNyn",
            VectorGroup::Yyn => "Yyn",
            VectorGroup::Yd => "Yd",
            VectorGroup::Dy => "Dy",
            VectorGroup::Dd => "Dd",
            VectorGroup::Yy => "Yy",
        }
    }
}

impl FromStr for VectorGroup {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Clock numbers ("Dyn11", "YNd5") do not change the zero-sequence model
        let group = s.trim().trim_end_matches(|c: char| c.is_ascii_digit());
        match group {
            "Dyn" => Ok(VectorGroup::Dyn),
            "YNd" => Ok(VectorGroup::YNd),
            "YNyn" => Ok(VectorGroup::YNyn),
            "Yyn" => Ok(VectorGroup::Yyn),
            "Yd" => Ok(VectorGroup::Yd),
            "Dy" => Ok(VectorGroup::Dy),
            "Dd" => Ok(VectorGroup::Dd),
            "Yy" => Ok(VectorGroup::Yy),
            other => Err(RelayError::Parse(format!(
                "unknown transformer vector group '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transformer {
    pub id: TransformerId,
    pub name: String,
    pub hv_bus: BusId,
    pub lv_bus: BusId,
    pub sn_mva: MegavoltAmperes,
    pub vn_hv_kv: Kilovolts,
    pub vn_lv_kv: Kilovolts,
    /// Short-circuit voltage in percent of rated voltage
    pub vk_percent: f64,
    /// Real part of the short-circuit voltage in percent
    pub vkr_percent: f64,
    pub vk0_percent: Option<f64>,
    pub vkr0_percent: Option<f64>,
    pub vector_group: VectorGroup,
    pub in_service: bool,
}

impl Transformer {
    /// Transformer with typical 25 MVA 35/6.3 kV distribution ratings.
    pub fn new(id: TransformerId, name: impl Into<String>, hv_bus: BusId, lv_bus: BusId) -> Self {
        Self {
            id,
            name: name.into(),
            hv_bus,
            lv_bus,
            sn_mva: MegavoltAmperes(25.0),
            vn_hv_kv: Kilovolts(35.0),
            vn_lv_kv: Kilovolts(6.3),
            vk_percent: 8.0,
            vkr_percent: 0.5,
            vk0_percent: None,
            vkr0_percent: None,
            vector_group: VectorGroup::Dyn,
            in_service: true,
        }
    }

    pub fn with_rating(mut self, sn_mva: f64, vn_hv_kv: f64, vn_lv_kv: f64) -> Self {
        self.sn_mva = MegavoltAmperes(sn_mva);
        self.vn_hv_kv = Kilovolts(vn_hv_kv);
        self.vn_lv_kv = Kilovolts(vn_lv_kv);
        self
    }

    pub fn with_short_circuit_voltage(mut self, vk_percent: f64, vkr_percent: f64) -> Self {
        self.vk_percent = vk_percent;
        self.vkr_percent = vkr_percent;
        self
    }

    pub fn with_vector_group(mut self, vector_group: VectorGroup) -> Self {
        self.vector_group = vector_group;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    pub p_mw: Megawatts,
    pub q_mvar: Megavars,
}

/// Bus-bus switch (bus coupler, sectionalizer).
#[derive(Debug, Clone)]
pub struct Switch {
    pub id: SwitchId,
    pub name: String,
    pub bus: BusId,
    pub element_bus: BusId,
    pub closed: bool,
}

// Enum to represent different types of nodes in the graph
#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    ExtGrid(ExternalGrid),
    Load(Load),
}

// Enum to represent different types of edges in the graph
#[derive(Debug, Clone)]
pub enum Edge {
    Line(Line),
    Transformer(Transformer),
    Switch(Switch),
}

impl Node {
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.name,
            Node::ExtGrid(grid) => &grid.name,
            Node::Load(load) => &load.name,
        }
    }
}

impl Edge {
    pub fn label(&self) -> &str {
        match self {
            Edge::Line(line) => &line.name,
            Edge::Transformer(tx) => &tx.name,
            Edge::Switch(sw) => &sw.name,
        }
    }

    /// Terminal buses of the edge.
    pub fn terminals(&self) -> (BusId, BusId) {
        match self {
            Edge::Line(line) => (line.from_bus, line.to_bus),
            Edge::Transformer(tx) => (tx.hv_bus, tx.lv_bus),
            Edge::Switch(sw) => (sw.bus, sw.element_bus),
        }
    }

    /// Whether fault current can flow through the edge.
    pub fn conducts(&self) -> bool {
        match self {
            Edge::Line(line) => line.in_service,
            Edge::Transformer(tx) => tx.in_service,
            Edge::Switch(sw) => sw.closed,
        }
    }
}

// ============================================================================
// Network
// ============================================================================

/// The distribution network graph
#[derive(Debug, Default, Clone)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
        }
    }

    pub fn add_bus(&mut self, bus: Bus) -> NodeIndex {
        self.graph.add_node(Node::Bus(bus))
    }

    /// Graph node holding the bus with the given id.
    pub fn bus_node(&self, id: BusId) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&idx| matches!(&self.graph[idx], Node::Bus(b) if b.id == id))
    }

    fn require_bus_node(&self, id: BusId, element: &str) -> RelayResult<NodeIndex> {
        self.bus_node(id).ok_or_else(|| {
            RelayError::InvalidInput(format!("{element} references unknown bus {id}"))
        })
    }

    pub fn add_external_grid(&mut self, grid: ExternalGrid) -> RelayResult<NodeIndex> {
        self.require_bus_node(grid.bus, &format!("external grid '{}'", grid.name))?;
        Ok(self.graph.add_node(Node::ExtGrid(grid)))
    }

    pub fn add_load(&mut self, load: Load) -> RelayResult<NodeIndex> {
        self.require_bus_node(load.bus, &format!("load '{}'", load.name))?;
        Ok(self.graph.add_node(Node::Load(load)))
    }

    pub fn add_line(&mut self, line: Line) -> RelayResult<EdgeIndex> {
        let element = format!("line '{}'", line.name);
        let from = self.require_bus_node(line.from_bus, &element)?;
        let to = self.require_bus_node(line.to_bus, &element)?;
        Ok(self.graph.add_edge(from, to, Edge::Line(line)))
    }

    pub fn add_transformer(&mut self, transformer: Transformer) -> RelayResult<EdgeIndex> {
        let element = format!("transformer '{}'", transformer.name);
        let hv = self.require_bus_node(transformer.hv_bus, &element)?;
        let lv = self.require_bus_node(transformer.lv_bus, &element)?;
        Ok(self.graph.add_edge(hv, lv, Edge::Transformer(transformer)))
    }

    pub fn add_switch(&mut self, switch: Switch) -> RelayResult<EdgeIndex> {
        let element = format!("switch '{}'", switch.name);
        let a = self.require_bus_node(switch.bus, &element)?;
        let b = self.require_bus_node(switch.element_bus, &element)?;
        Ok(self.graph.add_edge(a, b, Edge::Switch(switch)))
    }

    /// All buses in insertion order
    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.graph.node_weights().find_map(|n| match n {
            Node::Bus(b) if b.id == id => Some(b),
            _ => None,
        })
    }

    pub fn external_grids(&self) -> Vec<&ExternalGrid> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::ExtGrid(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// All lines in insertion order
    pub fn lines(&self) -> Vec<&Line> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Line(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    /// All transformers in insertion order
    pub fn transformers(&self) -> Vec<&Transformer> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Transformer(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn switches(&self) -> Vec<&Switch> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Switch(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::ExtGrid(_) => stats.num_external_grids += 1,
                Node::Load(l) => {
                    stats.num_loads += 1;
                    stats.total_load_mw += l.p_mw.value();
                }
            }
        }
        for edge in self.graph.edge_weights() {
            match edge {
                Edge::Line(_) => stats.num_lines += 1,
                Edge::Transformer(_) => stats.num_transformers += 1,
                Edge::Switch(_) => stats.num_switches += 1,
            }
        }
        stats
    }

    /// Validate network data for issues that invalidate a fault study.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();

        if stats.num_buses == 0 {
            diag.error(Category::Structure, "Network has no buses");
            return;
        }
        if stats.num_external_grids == 0 {
            diag.error(Category::Source, "Network has no external grid");
        }

        let mut seen_ids = HashSet::new();
        for bus in self.buses() {
            if !seen_ids.insert(bus.id) {
                diag.error_at(Category::Structure, "duplicate bus id", &bus.id.to_string());
            }
            if bus.vn_kv.value() <= 0.0 {
                diag.error_at(Category::Voltage, "nominal voltage must be positive", &bus.name);
            }
        }

        for grid in self.external_grids() {
            if grid.s_sc_max.value() <= 0.0 || grid.s_sc_min.value() <= 0.0 {
                diag.error_at(
                    Category::Source,
                    "short-circuit power must be positive",
                    &grid.name,
                );
            } else if grid.s_sc_min > grid.s_sc_max {
                diag.warning_at(
                    Category::Source,
                    "minimum short-circuit power exceeds maximum",
                    &grid.name,
                );
            }
        }

        let mut line_names = HashSet::new();
        for line in self.lines() {
            if !line_names.insert(line.name.as_str()) {
                diag.warning_at(Category::Naming, "duplicate line name", &line.name);
            }
            let (r, x) = line.series_ohms();
            if r.value().hypot(x.value()) < 1e-12 {
                diag.error_at(
                    Category::Impedance,
                    "line has zero impedance; model bus ties as switches",
                    &line.name,
                );
            }
            if let (Some(from), Some(to)) = (self.bus(line.from_bus), self.bus(line.to_bus)) {
                if relative_mismatch(from.vn_kv.value(), to.vn_kv.value()) > 0.1 {
                    diag.warning_at(
                        Category::Voltage,
                        &format!(
                            "line joins buses with different nominal voltages ({} / {})",
                            from.vn_kv, to.vn_kv
                        ),
                        &line.name,
                    );
                }
            }
        }

        let mut trafo_names = HashSet::new();
        for tx in self.transformers() {
            if !trafo_names.insert(tx.name.as_str()) {
                diag.warning_at(Category::Naming, "duplicate transformer name", &tx.name);
            }
            if tx.sn_mva.value() <= 0.0 || tx.vk_percent <= 0.0 {
                diag.error_at(
                    Category::Impedance,
                    "transformer rating and vk_percent must be positive",
                    &tx.name,
                );
            }
            if tx.vkr_percent > tx.vk_percent {
                diag.error_at(
                    Category::Impedance,
                    "vkr_percent cannot exceed vk_percent",
                    &tx.name,
                );
            }
            for (bus_id, rated, side) in [
                (tx.hv_bus, tx.vn_hv_kv, "hv"),
                (tx.lv_bus, tx.vn_lv_kv, "lv"),
            ] {
                if let Some(bus) = self.bus(bus_id) {
                    if relative_mismatch(bus.vn_kv.value(), rated.value()) > 0.1 {
                        diag.warning_at(
                            Category::Voltage,
                            &format!(
                                "{side} rated voltage {} differs from bus voltage {}",
                                rated, bus.vn_kv
                            ),
                            &tx.name,
                        );
                    }
                }
            }
        }

        if stats.num_external_grids > 0 {
            let energized = energized_buses(self);
            for bus in self.buses() {
                if !energized.contains(&bus.id) {
                    diag.warning_at(
                        Category::Source,
                        "bus is not connected to any external grid; its fault current is 0 kA",
                        &bus.name,
                    );
                }
            }
        }
    }
}

fn relative_mismatch(a: f64, b: f64) -> f64 {
    let reference = a.abs().max(b.abs());
    if reference < 1e-12 {
        0.0
    } else {
        (a - b).abs() / reference
    }
}

/// Statistics about a network's size
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_external_grids: usize,
    pub num_loads: usize,
    pub num_lines: usize,
    pub num_transformers: usize,
    pub num_switches: usize,
    pub total_load_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} transformers, {} switches, {} external grids, {} loads ({:.1} MW)",
            self.num_buses,
            self.num_lines,
            self.num_transformers,
            self.num_switches,
            self.num_external_grids,
            self.num_loads,
            self.total_load_mw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(0), "A", Kilovolts(6.3)));
        network.add_bus(Bus::new(BusId::new(1), "B", Kilovolts(6.3)));
        network
            .add_external_grid(ExternalGrid::new(
                ExtGridId::new(0),
                "Grid",
                BusId::new(0),
                MegavoltAmperes(100.0),
                MegavoltAmperes(50.0),
            ))
            .unwrap();
        network
            .add_line(
                Line::new(LineId::new(0), "A-B", BusId::new(0), BusId::new(1))
                    .with_length_km(0.4)
                    .with_impedance(0.05, 0.08),
            )
            .unwrap();
        network
    }

    #[test]
    fn test_network_creation() {
        let network = two_bus_network();
        assert_eq!(network.buses().len(), 2);
        assert_eq!(network.lines().len(), 1);
        assert_eq!(network.external_grids().len(), 1);
        assert_eq!(network.bus(BusId::new(1)).unwrap().name, "B");
    }

    #[test]
    fn test_add_line_rejects_unknown_bus() {
        let mut network = two_bus_network();
        let err = network
            .add_line(Line::new(LineId::new(1), "A-X", BusId::new(0), BusId::new(9)))
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(_)));
        assert!(err.to_string().contains("Bus#9"));
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut network = two_bus_network();
        for (i, name) in ["6103", "6102", "6104"].iter().enumerate() {
            network
                .add_line(
                    Line::new(LineId::new(i + 1), *name, BusId::new(0), BusId::new(1))
                        .with_impedance(0.02, 0.03),
                )
                .unwrap();
        }
        let names: Vec<_> = network.lines().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["A-B", "6103", "6102", "6104"]);
    }

    #[test]
    fn test_line_impedance_scaling() {
        let mut line = Line::new(LineId::new(0), "L", BusId::new(0), BusId::new(1))
            .with_length_km(0.375)
            .with_impedance(0.0182, 0.03);
        line.parallel = 2;
        let (r, x) = line.series_ohms();
        assert!((r.value() - 0.0182 * 0.375 / 2.0).abs() < 1e-12);
        assert!((x.value() - 0.03 * 0.375 / 2.0).abs() < 1e-12);

        let (r0, x0) = line.zero_sequence_ohms();
        assert_eq!(r0, r);
        assert_eq!(x0, x);
    }

    #[test]
    fn test_vector_group_parsing() {
        assert_eq!("Dyn11".parse::<VectorGroup>().unwrap(), VectorGroup::Dyn);
        assert_eq!("YNd5".parse::<VectorGroup>().unwrap(), VectorGroup::YNd);
        assert_eq!(
            VectorGroup::Dyn.zero_sequence_path(),
            ZeroSequencePath::GroundedLv
        );
        assert_eq!(VectorGroup::Dd.zero_sequence_path(), ZeroSequencePath::Open);
        assert!("Xyz".parse::<VectorGroup>().is_err());
    }

    #[test]
    fn test_network_validation_empty() {
        let network = Network::new();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.message.contains("no buses")));
    }

    #[test]
    fn test_network_validation_flags_isolated_bus() {
        let mut network = two_bus_network();
        network.add_bus(Bus::new(BusId::new(2), "Spare", Kilovolts(6.3)));

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(!diag.has_errors());
        assert!(diag
            .warnings()
            .any(|i| i.entity.as_deref() == Some("Spare") && i.category == Category::Source));
    }

    #[test]
    fn test_network_validation_voltage_mismatch() {
        let mut network = two_bus_network();
        network.add_bus(Bus::new(BusId::new(2), "LV", Kilovolts(0.4)));
        network
            .add_line(
                Line::new(LineId::new(1), "bad", BusId::new(1), BusId::new(2))
                    .with_impedance(0.1, 0.1),
            )
            .unwrap();

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert_eq!(diag.in_category(Category::Voltage).count(), 1);
    }

    #[test]
    fn test_network_stats() {
        let mut network = two_bus_network();
        network
            .add_load(Load {
                id: LoadId::new(0),
                name: "Pump".into(),
                bus: BusId::new(1),
                p_mw: Megawatts(0.6),
                q_mvar: Megavars(0.2),
            })
            .unwrap();

        let stats = network.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_lines, 1);
        assert_eq!(stats.num_loads, 1);
        assert_eq!(stats.num_external_grids, 1);
        assert!((stats.total_load_mw - 0.6).abs() < 1e-12);
    }
}
