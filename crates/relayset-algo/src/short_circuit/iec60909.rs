use super::sequence::{SequenceMatrix, SequenceNetworks, S_BASE_MVA};
use super::voltage_factor::VoltageFactor;
use crate::fault::{FaultRequest, FaultSnapshot, FaultSolver, FaultType};
use num_complex::Complex64;
use relayset_core::{GaussSolver, Kiloamperes, LinearSystemBackend, Network, RelayError, RelayResult};
use std::sync::Arc;
use tracing::debug;

/// Equivalent voltage source solver.
///
/// Stateless apart from the linear-system backend; one instance serves any
/// number of requests.
#[derive(Clone)]
pub struct Iec60909Solver {
    backend: Arc<dyn LinearSystemBackend>,
}

impl Default for Iec60909Solver {
    fn default() -> Self {
        Self {
            backend: Arc::new(GaussSolver),
        }
    }
}

impl std::fmt::Debug for Iec60909Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Iec60909Solver").finish_non_exhaustive()
    }
}

impl Iec60909Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: Arc<dyn LinearSystemBackend>) -> Self {
        Self { backend }
    }

    /// Thevenin impedance per node; `None` where the component has no anchor.
    fn thevenin(&self, sequence: &SequenceMatrix) -> RelayResult<Vec<Option<Complex64>>> {
        let mut z = vec![None; sequence.anchored.len()];
        for component in sequence.components() {
            if !component.iter().any(|&node| sequence.anchored[node]) {
                continue;
            }
            let diag = self
                .backend
                .inverse_diagonal(&sequence.submatrix(&component))?;
            for (k, &node) in component.iter().enumerate() {
                z[node] = Some(diag[k]);
            }
        }
        Ok(z)
    }
}

impl FaultSolver for Iec60909Solver {
    fn name(&self) -> &str {
        "iec60909"
    }

    fn solve(&self, network: &Network, request: &FaultRequest) -> RelayResult<FaultSnapshot> {
        request.validate()?;
        if let Some(target) = request.target_bus {
            if network.bus(target).is_none() {
                return Err(RelayError::InvalidInput(format!(
                    "target {target} is not in the topology"
                )));
            }
        }

        let factor = VoltageFactor::new(request.lv_tol_percent);
        let seq = SequenceNetworks::build(network, request.case, &factor)?;
        let z1 = self.thevenin(&seq.positive)?;
        let z0 = match request.fault_type {
            FaultType::SinglePhase => self.thevenin(&seq.zero)?,
            _ => vec![None; z1.len()],
        };

        let mut snapshot = FaultSnapshot::new(request.fault_type, request.case);
        for bus in network.buses() {
            if request.target_bus.is_some_and(|target| target != bus.id) {
                continue;
            }
            let Some(node) = seq.nodes.node_of(bus.id) else {
                continue;
            };
            let ikss = match (bus.in_service, z1[node]) {
                (true, Some(z1)) => {
                    let c = factor.c(request.case, bus.vn_kv.value());
                    let i_base = S_BASE_MVA / (3.0_f64.sqrt() * seq.base_kv[node]);
                    let i_pu = match request.fault_type {
                        FaultType::ThreePhase => c / z1.norm(),
                        FaultType::TwoPhase => 3.0_f64.sqrt() * c / (2.0 * z1).norm(),
                        FaultType::SinglePhase => match z0[node] {
                            Some(z0) => 3.0 * c / (2.0 * z1 + z0).norm(),
                            None => 0.0,
                        },
                    };
                    i_pu * i_base
                }
                _ => 0.0,
            };
            snapshot.insert(bus.id, Kiloamperes(ikss));
        }

        if let Some((bus, peak)) = snapshot.peak() {
            debug!(
                "{} {} fault: {} buses solved, peak {} at {}",
                request.case,
                request.fault_type,
                snapshot.len(),
                peak,
                bus
            );
        }
        Ok(snapshot)
    }
}
