//! Positive- and zero-sequence admittance matrices for one operating case.

use super::voltage_factor::VoltageFactor;
use crate::fault::OperatingCase;
use num_complex::Complex64;
use relayset_core::{
    electrical_nodes, BusId, ElectricalNodes, ExternalGrid, Line, Network, RelayError,
    RelayResult, Transformer, ZeroSequencePath,
};
use std::collections::HashSet;

/// Per-unit power base in MVA.
pub(crate) const S_BASE_MVA: f64 = 1.0;

/// Temperature coefficient of resistance for copper and aluminium, 1/K.
const ALPHA_PER_K: f64 = 0.004;

const MIN_IMPEDANCE_PU: f64 = 1e-12;

/// One sequence network as a dense admittance matrix.
#[derive(Debug, Clone)]
pub(crate) struct SequenceMatrix {
    pub admittance: Vec<Vec<Complex64>>,
    /// Node pairs joined by a series element
    pub links: Vec<(usize, usize)>,
    /// Nodes with a shunt to the reference (source or earth path)
    pub anchored: Vec<bool>,
}

impl SequenceMatrix {
    fn new(n: usize) -> Self {
        Self {
            admittance: vec![vec![Complex64::new(0.0, 0.0); n]; n],
            links: Vec::new(),
            anchored: vec![false; n],
        }
    }

    fn add_shunt(&mut self, node: usize, y: Complex64) {
        self.admittance[node][node] += y;
        self.anchored[node] = true;
    }

    fn add_series(&mut self, a: usize, b: usize, y: Complex64) {
        if a == b {
            return;
        }
        self.admittance[a][a] += y;
        self.admittance[b][b] += y;
        self.admittance[a][b] -= y;
        self.admittance[b][a] -= y;
        self.links.push((a, b));
    }

    /// Node groups connected through series elements, ascending order.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let n = self.anchored.len();
        let mut parent: Vec<usize> = (0..n).collect();
        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for &(a, b) in &self.links {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                parent[ra.max(rb)] = ra.min(rb);
            }
        }
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut slot = vec![usize::MAX; n];
        for node in 0..n {
            let root = find(&mut parent, node);
            if slot[root] == usize::MAX {
                slot[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot[root]].push(node);
        }
        groups
    }

    pub fn submatrix(&self, nodes: &[usize]) -> Vec<Vec<Complex64>> {
        nodes
            .iter()
            .map(|&i| nodes.iter().map(|&j| self.admittance[i][j]).collect())
            .collect()
    }
}

/// Sequence networks of a topology for one operating case.
#[derive(Debug, Clone)]
pub(crate) struct SequenceNetworks {
    pub nodes: ElectricalNodes,
    /// Voltage base per node, kV
    pub base_kv: Vec<f64>,
    pub positive: SequenceMatrix,
    pub zero: SequenceMatrix,
}

fn impedance_error(kind: &str, name: &str) -> RelayError {
    RelayError::SolverFailure(format!(
        "{kind} '{name}' has zero impedance; model bus ties as switches"
    ))
}

fn admittance(z: Complex64, kind: &str, name: &str) -> RelayResult<Complex64> {
    if z.norm() < MIN_IMPEDANCE_PU || !z.is_finite() {
        return Err(impedance_error(kind, name));
    }
    Ok(z.inv())
}

impl SequenceNetworks {
    pub fn build(
        network: &Network,
        case: OperatingCase,
        factor: &VoltageFactor,
    ) -> RelayResult<Self> {
        let nodes = electrical_nodes(network);
        let n = nodes.node_count();

        let mut base_kv = vec![0.0; n];
        let mut seen = vec![false; n];
        let mut out_of_service = HashSet::new();
        for bus in network.buses() {
            if !bus.in_service {
                out_of_service.insert(bus.id);
            }
            if let Some(node) = nodes.node_of(bus.id) {
                if !seen[node] {
                    seen[node] = true;
                    base_kv[node] = bus.vn_kv.value();
                }
            }
        }

        let active = |bus: BusId| -> Option<usize> {
            if out_of_service.contains(&bus) {
                None
            } else {
                nodes.node_of(bus)
            }
        };

        let mut positive = SequenceMatrix::new(n);
        let mut zero = SequenceMatrix::new(n);

        for grid in network.external_grids() {
            if !grid.in_service {
                continue;
            }
            let Some(node) = active(grid.bus) else {
                continue;
            };
            let c = factor.c(case, base_kv[node]);
            let (z1, z0) = grid_impedance(grid, case, c)?;
            positive.add_shunt(node, z1.inv());
            if let Some(z0) = z0 {
                zero.add_shunt(node, admittance(z0, "external grid", &grid.name)?);
            }
        }

        for line in network.lines() {
            if !line.in_service {
                continue;
            }
            let (Some(a), Some(b)) = (active(line.from_bus), active(line.to_bus)) else {
                continue;
            };
            let z_base = base_kv[a] * base_kv[a] / S_BASE_MVA;
            let (z1, z0) = line_impedance(line, case);
            positive.add_series(a, b, admittance(z1 / z_base, "line", &line.name)?);
            zero.add_series(a, b, admittance(z0 / z_base, "line", &line.name)?);
        }

        for tx in network.transformers() {
            if !tx.in_service {
                continue;
            }
            let (Some(hv), Some(lv)) = (active(tx.hv_bus), active(tx.lv_bus)) else {
                continue;
            };
            let correction = match case {
                OperatingCase::Max => transformer_correction(tx, factor.c_max(base_kv[lv])),
                OperatingCase::Min => 1.0,
            };
            let (z1, z0) = transformer_impedance(tx, base_kv[lv]);
            positive.add_series(hv, lv, admittance(z1 * correction, "transformer", &tx.name)?);

            let y0 = admittance(z0 * correction, "transformer", &tx.name)?;
            match tx.vector_group.zero_sequence_path() {
                ZeroSequencePath::GroundedLv => zero.add_shunt(lv, y0),
                ZeroSequencePath::GroundedHv => zero.add_shunt(hv, y0),
                ZeroSequencePath::Series => zero.add_series(hv, lv, y0),
                ZeroSequencePath::Open => {}
            }
        }

        Ok(Self {
            nodes,
            base_kv,
            positive,
            zero,
        })
    }
}

/// Source impedance `c·Sb/S″k` split by R/X, plus the zero-sequence
/// impedance when both ratios are given.
fn grid_impedance(
    grid: &ExternalGrid,
    case: OperatingCase,
    c: f64,
) -> RelayResult<(Complex64, Option<Complex64>)> {
    let (s_sc, rx, x0x, r0x0) = match case {
        OperatingCase::Max => (grid.s_sc_max, grid.rx_max, grid.x0x_max, grid.r0x0_max),
        OperatingCase::Min => (grid.s_sc_min, grid.rx_min, grid.x0x_min, grid.r0x0_min),
    };
    if !s_sc.is_finite() || s_sc.value() <= 0.0 {
        return Err(RelayError::SolverFailure(format!(
            "external grid '{}' has no usable {case} short-circuit power",
            grid.name
        )));
    }
    let z = c * S_BASE_MVA / s_sc.value();
    let x = z / (1.0 + rx * rx).sqrt();
    let z1 = Complex64::new(rx * x, x);
    let z0 = match (x0x, r0x0) {
        (Some(x0x), Some(r0x0)) => {
            let x0 = x0x * x;
            Some(Complex64::new(r0x0 * x0, x0))
        }
        _ => None,
    };
    Ok((z1, z0))
}

/// Positive- and zero-sequence series impedance in ohms.
fn line_impedance(line: &Line, case: OperatingCase) -> (Complex64, Complex64) {
    let heating = match case {
        OperatingCase::Max => 1.0,
        OperatingCase::Min => 1.0 + ALPHA_PER_K * (line.endtemp_degree - 20.0),
    };
    let (r, x) = line.series_ohms();
    let (r0, x0) = line.zero_sequence_ohms();
    (
        Complex64::new(r.value() * heating, x.value()),
        Complex64::new(r0.value() * heating, x0.value()),
    )
}

/// Positive- and zero-sequence impedance in per unit, referred to the lv bus.
fn transformer_impedance(tx: &Transformer, lv_base_kv: f64) -> (Complex64, Complex64) {
    // Rated impedance on the lv side, converted to the lv node's base
    let z_rated = tx.vn_lv_kv.value() * tx.vn_lv_kv.value() / tx.sn_mva.value();
    let to_pu = z_rated / (lv_base_kv * lv_base_kv / S_BASE_MVA);
    let from_percent = |vk: f64, vkr: f64| {
        let z = vk / 100.0;
        let r = vkr / 100.0;
        let x = (z * z - r * r).max(0.0).sqrt();
        Complex64::new(r, x) * to_pu
    };
    let z1 = from_percent(tx.vk_percent, tx.vkr_percent);
    let z0 = from_percent(
        tx.vk0_percent.unwrap_or(tx.vk_percent),
        tx.vkr0_percent.unwrap_or(tx.vkr_percent),
    );
    (z1, z0)
}

/// `K_T = 0.95·cmax / (1 + 0.6·xT)` with `xT` the relative reactance.
fn transformer_correction(tx: &Transformer, c_max: f64) -> f64 {
    let vk = tx.vk_percent / 100.0;
    let vkr = tx.vkr_percent / 100.0;
    let x_t = (vk * vk - vkr * vkr).max(0.0).sqrt();
    0.95 * c_max / (1.0 + 0.6 * x_t)
}
