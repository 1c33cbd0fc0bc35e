//! Reliability coefficients, stage settings and CT scaling.
//!
//! A setpoint for fault type `f` and stage `s` is
//!
//! ```text
//! threshold [A] = K(f, s) · I″k [kA] · 1000 · F(s) / CT
//! ```
//!
//! where `K` comes from a [`CoefficientTable`], `F` and the optional delay
//! from [`StageSettings`], and `CT` is the current-transformer ratio
//! (primary / secondary). With [`CtReferral::Primary`] the CT division is
//! skipped for every device role.

use crate::fault::FaultType;
use relayset_core::{RelayError, RelayResult, Seconds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionStage {
    Instantaneous,
    TimeDelayed,
    TimeGraded,
}

impl ProtectionStage {
    pub const ALL: [ProtectionStage; 3] = [
        ProtectionStage::Instantaneous,
        ProtectionStage::TimeDelayed,
        ProtectionStage::TimeGraded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionStage::Instantaneous => "instantaneous",
            ProtectionStage::TimeDelayed => "time_delayed",
            ProtectionStage::TimeGraded => "time_graded",
        }
    }
}

impl fmt::Display for ProtectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtectionStage {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "instantaneous" | "inst" => Ok(ProtectionStage::Instantaneous),
            "time_delayed" | "delayed" => Ok(ProtectionStage::TimeDelayed),
            "time_graded" | "graded" => Ok(ProtectionStage::TimeGraded),
            other => Err(RelayError::Parse(format!("unknown protection stage '{other}'"))),
        }
    }
}

/// Which kind of device a table describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Bus,
    LineEnd,
    Transformer,
}

impl DeviceRole {
    pub const ALL: [DeviceRole; 3] = [DeviceRole::Bus, DeviceRole::LineEnd, DeviceRole::Transformer];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::Bus => "bus",
            DeviceRole::LineEnd => "line_end",
            DeviceRole::Transformer => "transformer",
        }
    }

    /// Column naming the device in this role's table.
    pub fn name_column(&self) -> &'static str {
        match self {
            DeviceRole::Bus => "bus_name",
            DeviceRole::LineEnd => "line_name",
            DeviceRole::Transformer => "transformer_name",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reliability coefficient K per (fault type, stage).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoefficientTable {
    entries: BTreeMap<(FaultType, ProtectionStage), f64>,
    fallback: Option<f64>,
}

impl CoefficientTable {
    /// Empty table without fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// K = 1.2 / 1.3 / 1.5 per stage for every fault type.
    pub fn standard() -> Self {
        let mut table = Self::new();
        for fault_type in FaultType::ALL {
            table.entries.insert((fault_type, ProtectionStage::Instantaneous), 1.2);
            table.entries.insert((fault_type, ProtectionStage::TimeDelayed), 1.3);
            table.entries.insert((fault_type, ProtectionStage::TimeGraded), 1.5);
        }
        table
    }

    /// Fault-type specific coefficients with a 1.2 fallback.
    pub fn graded_by_fault_type() -> Self {
        let rows = [
            (FaultType::ThreePhase, [1.2, 1.8, 2.4]),
            (FaultType::TwoPhase, [1.1, 1.7, 2.3]),
            (FaultType::SinglePhase, [1.0, 1.6, 2.2]),
        ];
        let mut table = Self::new().with_fallback(1.2);
        for (fault_type, ks) in rows {
            for (stage, k) in ProtectionStage::ALL.into_iter().zip(ks) {
                table.entries.insert((fault_type, stage), k);
            }
        }
        table
    }

    pub fn with_fallback(mut self, k: f64) -> Self {
        self.fallback = Some(k);
        self
    }

    pub fn fallback(&self) -> Option<f64> {
        self.fallback
    }

    pub fn set_fallback(&mut self, k: Option<f64>) -> RelayResult<()> {
        if let Some(k) = k {
            check_coefficient(k, "fallback")?;
        }
        self.fallback = k;
        Ok(())
    }

    pub fn set(&mut self, fault_type: FaultType, stage: ProtectionStage, k: f64) -> RelayResult<()> {
        check_coefficient(k, &format!("{fault_type}/{stage}"))?;
        self.entries.insert((fault_type, stage), k);
        Ok(())
    }

    /// Explicit entry only.
    pub fn explicit(&self, fault_type: FaultType, stage: ProtectionStage) -> Option<f64> {
        self.entries.get(&(fault_type, stage)).copied()
    }

    /// Explicit entry, else the fallback.
    pub fn get(&self, fault_type: FaultType, stage: ProtectionStage) -> Option<f64> {
        self.explicit(fault_type, stage).or(self.fallback)
    }

    pub fn require(&self, fault_type: FaultType, stage: ProtectionStage) -> RelayResult<f64> {
        self.get(fault_type, stage).ok_or_else(|| {
            RelayError::Configuration(format!(
                "no coefficient for {fault_type} {stage} and no fallback"
            ))
        })
    }

    /// Explicit entries in (fault type, stage) order.
    pub fn entries(&self) -> impl Iterator<Item = (FaultType, ProtectionStage, f64)> + '_ {
        self.entries.iter().map(|(&(f, s), &k)| (f, s, k))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.fallback.is_none()
    }

    /// Copy of `self` where entries (and the fallback) of `overrides` win.
    pub fn overlay(&self, overrides: &CoefficientTable) -> CoefficientTable {
        let mut merged = self.clone();
        merged
            .entries
            .extend(overrides.entries.iter().map(|(key, k)| (*key, *k)));
        if overrides.fallback.is_some() {
            merged.fallback = overrides.fallback;
        }
        merged
    }
}

fn check_coefficient(k: f64, what: &str) -> RelayResult<()> {
    if k.is_finite() && k > 0.0 {
        Ok(())
    } else {
        Err(RelayError::Configuration(format!(
            "coefficient {what} must be a positive number, got {k}"
        )))
    }
}

/// Multiplier and delay of one protection stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    pub factor: f64,
    #[serde(default)]
    pub delay: Option<Seconds>,
}

impl StageSettings {
    pub fn default_for(stage: ProtectionStage) -> Self {
        match stage {
            ProtectionStage::Instantaneous => Self {
                factor: 1.0,
                delay: None,
            },
            ProtectionStage::TimeDelayed => Self {
                factor: 1.5,
                delay: Some(Seconds(0.1)),
            },
            ProtectionStage::TimeGraded => Self {
                factor: 1.8,
                delay: Some(Seconds(0.2)),
            },
        }
    }
}

/// Where thresholds are referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtReferral {
    /// Divide by the CT ratio (relay side)
    #[default]
    Secondary,
    /// Keep primary amperes
    Primary,
}

/// Everything the setpoint calculator needs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointConfig {
    pub coefficients: CoefficientTable,
    pub line_overrides: Option<CoefficientTable>,
    pub transformer_overrides: Option<CoefficientTable>,
    pub ct_primary_a: f64,
    pub ct_secondary_a: f64,
    pub referral: CtReferral,
    pub stages: BTreeMap<ProtectionStage, StageSettings>,
    /// Fail instead of skipping when an input column is missing
    pub strict: bool,
}

impl Default for SetpointConfig {
    fn default() -> Self {
        Self {
            coefficients: CoefficientTable::standard(),
            line_overrides: None,
            transformer_overrides: None,
            ct_primary_a: 300.0,
            ct_secondary_a: 5.0,
            referral: CtReferral::Secondary,
            stages: ProtectionStage::ALL
                .into_iter()
                .map(|stage| (stage, StageSettings::default_for(stage)))
                .collect(),
            strict: false,
        }
    }
}

impl SetpointConfig {
    pub fn ct_ratio(&self) -> f64 {
        self.ct_primary_a / self.ct_secondary_a
    }

    /// Divisor applied to primary amperes.
    pub fn scaling_divisor(&self) -> f64 {
        match self.referral {
            CtReferral::Secondary => self.ct_ratio(),
            CtReferral::Primary => 1.0,
        }
    }

    pub fn stage(&self, stage: ProtectionStage) -> StageSettings {
        self.stages
            .get(&stage)
            .copied()
            .unwrap_or_else(|| StageSettings::default_for(stage))
    }

    /// Base table with the role's overrides applied.
    pub fn coefficients_for(&self, role: DeviceRole) -> CoefficientTable {
        let overrides = match role {
            DeviceRole::Bus => None,
            DeviceRole::LineEnd => self.line_overrides.as_ref(),
            DeviceRole::Transformer => self.transformer_overrides.as_ref(),
        };
        match overrides {
            Some(overrides) => self.coefficients.overlay(overrides),
            None => self.coefficients.clone(),
        }
    }

    pub fn validate(&self) -> RelayResult<()> {
        for (name, value) in [
            ("ct_primary_a", self.ct_primary_a),
            ("ct_secondary_a", self.ct_secondary_a),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RelayError::Configuration(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        for (stage, settings) in &self.stages {
            if !settings.factor.is_finite() || settings.factor <= 0.0 {
                return Err(RelayError::Configuration(format!(
                    "{stage} factor must be positive, got {}",
                    settings.factor
                )));
            }
            if let Some(delay) = settings.delay {
                if !delay.is_finite() || delay.value() < 0.0 {
                    return Err(RelayError::Configuration(format!(
                        "{stage} delay must be non-negative, got {}",
                        delay.value()
                    )));
                }
            }
        }
        let tables = [
            Some(&self.coefficients),
            self.line_overrides.as_ref(),
            self.transformer_overrides.as_ref(),
        ];
        for table in tables.into_iter().flatten() {
            for (fault_type, stage, k) in table.entries() {
                check_coefficient(k, &format!("{fault_type}/{stage}"))?;
            }
            if let Some(k) = table.fallback() {
                check_coefficient(k, "fallback")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table() {
        let table = CoefficientTable::standard();
        assert_eq!(table.entries().count(), 9);
        assert_eq!(
            table.get(FaultType::SinglePhase, ProtectionStage::TimeGraded),
            Some(1.5)
        );
        assert_eq!(table.fallback(), None);
    }

    #[test]
    fn fallback_applies_to_missing_entries() {
        let mut table = CoefficientTable::new().with_fallback(1.2);
        table
            .set(FaultType::ThreePhase, ProtectionStage::TimeDelayed, 1.8)
            .unwrap();
        assert_eq!(
            table.get(FaultType::TwoPhase, ProtectionStage::Instantaneous),
            Some(1.2)
        );
        assert_eq!(
            table.explicit(FaultType::TwoPhase, ProtectionStage::Instantaneous),
            None
        );
        assert_eq!(
            table.get(FaultType::ThreePhase, ProtectionStage::TimeDelayed),
            Some(1.8)
        );
    }

    #[test]
    fn require_without_fallback_is_configuration_error() {
        let table = CoefficientTable::new();
        let err = table
            .require(FaultType::ThreePhase, ProtectionStage::Instantaneous)
            .unwrap_err();
        assert!(matches!(err, RelayError::Configuration(_)));
    }

    #[test]
    fn role_overrides_take_precedence() {
        let mut overrides = CoefficientTable::new();
        overrides
            .set(FaultType::ThreePhase, ProtectionStage::Instantaneous, 1.25)
            .unwrap();
        let config = SetpointConfig {
            line_overrides: Some(overrides),
            ..SetpointConfig::default()
        };

        let line = config.coefficients_for(DeviceRole::LineEnd);
        let bus = config.coefficients_for(DeviceRole::Bus);
        assert_eq!(
            line.get(FaultType::ThreePhase, ProtectionStage::Instantaneous),
            Some(1.25)
        );
        assert_eq!(
            line.get(FaultType::ThreePhase, ProtectionStage::TimeDelayed),
            Some(1.3)
        );
        assert_eq!(
            bus.get(FaultType::ThreePhase, ProtectionStage::Instantaneous),
            Some(1.2)
        );
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(CoefficientTable::new()
            .set(FaultType::ThreePhase, ProtectionStage::Instantaneous, -1.0)
            .is_err());

        let config = SetpointConfig {
            ct_secondary_a: 0.0,
            ..SetpointConfig::default()
        };
        assert!(matches!(config.validate(), Err(RelayError::Configuration(_))));

        let mut config = SetpointConfig::default();
        config.stages.insert(
            ProtectionStage::TimeGraded,
            StageSettings {
                factor: f64::NAN,
                delay: None,
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn scaling_divisor_follows_referral() {
        let mut config = SetpointConfig::default();
        assert_eq!(config.scaling_divisor(), 60.0);
        config.referral = CtReferral::Primary;
        assert_eq!(config.scaling_divisor(), 1.0);
    }
}
