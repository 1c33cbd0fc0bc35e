//! # Short-Circuit Currents (IEC 60909)
//!
//! Initial symmetrical short-circuit currents `I″k` by the equivalent voltage
//! source method: all sources are replaced by a single voltage `c·Un/√3` at
//! the fault location, loads and line capacitances are neglected, and the
//! current follows from the Thevenin impedance seen from the faulted bus.
//!
//! ```text
//! I″k3 = c·Un / (√3·|Z1|)
//! I″k2 = c·Un / |Z1 + Z2|            (Z2 = Z1)
//! I″k1 = √3·c·Un / |Z1 + Z2 + Z0|
//! ```
//!
//! ## Operating cases
//!
//! | | max | min |
//! |-|-----|-----|
//! | voltage factor (MV) | 1.10 | 1.00 |
//! | voltage factor (LV, 6 % / 10 % tolerance) | 1.05 / 1.10 | 0.95 |
//! | source | `s_sc_max`, `rx_max` | `s_sc_min`, `rx_min` |
//! | line resistance | 20 °C | conductor end temperature |
//! | transformer correction `K_T` | applied | not applied |
//!
//! ## Per-unit system
//!
//! Admittance matrices are assembled in per unit on a 1 MVA base with each
//! electrical node's nominal voltage as voltage base. Buses tied by closed
//! switches form one node. Thevenin impedances are the diagonal of `Y⁻¹`,
//! solved per connected component; nodes in a component without a source
//! (or, for the zero sequence, without a path to earth) carry no current.
//!
//! ## References
//!
//! - IEC 60909-0:2016, Short-circuit currents in three-phase a.c. systems
//! - Schlabbach, "Short-circuit Currents", IET Power and Energy Series 51
//!   DOI: [10.1049/PBPO051E](https://doi.org/10.1049/PBPO051E)

mod iec60909;
mod sequence;
mod voltage_factor;

pub use iec60909::Iec60909Solver;
pub use voltage_factor::VoltageFactor;
