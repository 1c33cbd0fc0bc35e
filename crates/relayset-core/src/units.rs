//! Compile-time unit safety for short-circuit and protection quantities.
//!
//! Prevents mixing incompatible units like kA and A, or MVA and MW.
//!
//! # Design Philosophy
//!
//! Protection studies juggle several magnitudes of the same physical quantity:
//! - Fault currents are computed in kiloamperes (kA) on the primary side
//! - Relay thresholds are expressed in amperes (A), usually on the CT secondary
//! - Source strength is given as short-circuit power (MVA)
//! - Element impedances are given in ohms or in percent of their rating
//!
//! A kA value passed where amperes are expected is a factor of 1000 error
//! in a trip threshold; the newtypes below turn that into a type error.
//!
//! Every type is `#[repr(transparent)]` over `f64`.
//!
//! # Usage
//!
//! ```
//! use relayset_core::units::{Amperes, Kiloamperes};
//!
//! let ikss = Kiloamperes(6.72);
//! let primary: Amperes = ikss.to_amperes();
//!
//! assert!((primary.value() - 6720.0).abs() < 1e-9);
//!
//! // Does not compile: kA + A
//! // let wrong = ikss + primary;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Declares an `f64` newtype with the arithmetic a quantity of one unit
/// supports: sums and differences of the same unit, scaling by plain numbers
/// and ratios of two values.
macro_rules! unit {
    ($(#[$doc:meta])* $name:ident, $symbol:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub f64);

        impl $name {
            pub const SYMBOL: &'static str = $symbol;

            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }
        }

        unit!(@binary $name, Add, add, +);
        unit!(@binary $name, Sub, sub, -);

        impl Neg for $name {
            type Output = Self;
            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;
            fn mul(self, k: f64) -> Self {
                Self(self.0 * k)
            }
        }

        impl Mul<$name> for f64 {
            type Output = $name;
            fn mul(self, q: $name) -> $name {
                $name(self * q.0)
            }
        }

        impl Div<f64> for $name {
            type Output = Self;
            fn div(self, k: f64) -> Self {
                Self(self.0 / k)
            }
        }

        /// Ratio of two quantities of the same unit.
        impl Div for $name {
            type Output = f64;
            fn div(self, other: Self) -> f64 {
                self.0 / other.0
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|q| q.0).sum())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:.4} {}", self.0, $symbol)
            }
        }
    };
    (@binary $name:ident, $trait:ident, $method:ident, $op:tt) => {
        impl $trait for $name {
            type Output = Self;
            fn $method(self, other: Self) -> Self {
                Self(self.0 $op other.0)
            }
        }
    };
}

unit!(
    /// Active power (MW); only load totals use it.
    Megawatts, "MW"
);
unit!(
    /// Reactive power (Mvar)
    Megavars, "Mvar"
);
unit!(
    /// Apparent power (MVA).
    ///
    /// Used both for equipment ratings (transformer `Sn`) and for the initial
    /// symmetrical short-circuit power `S″k` of an upstream network.
    MegavoltAmperes, "MVA"
);
unit!(
    /// Line-to-line voltage (kV)
    Kilovolts, "kV"
);
unit!(
    /// Resistance or reactance (Ω)
    Ohms, "Ω"
);
unit!(
    /// Fault currents (kA), always on the primary side.
    Kiloamperes, "kA"
);
unit!(
    /// Relay thresholds (A), primary or CT-secondary.
    Amperes, "A"
);
unit!(
    /// Trip delays (s)
    Seconds, "s"
);

impl MegavoltAmperes {
    /// `S = √3 · U · I`, the short-circuit power behind a three-phase fault
    /// current.
    #[inline]
    pub fn from_fault_current(voltage: Kilovolts, current: Kiloamperes) -> Self {
        Self(3.0_f64.sqrt() * voltage.0 * current.0)
    }
}

impl Kiloamperes {
    pub const ZERO: Self = Self(0.0);

    #[inline]
    pub fn to_amperes(self) -> Amperes {
        Amperes(self.0 * 1000.0)
    }
}

impl Amperes {
    #[inline]
    pub fn to_kiloamperes(self) -> Kiloamperes {
        Kiloamperes(self.0 / 1000.0)
    }
}
