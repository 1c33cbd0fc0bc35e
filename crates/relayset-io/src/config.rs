//! Study configuration files.
//!
//! TOML, YAML or JSON (chosen by extension) with every key optional:
//!
//! ```toml
//! lv_tol_percent = 6
//! fault_types = ["3ph", "2ph", "1ph"]
//! bus_sweep = false
//! strict = false
//!
//! [ct]
//! primary_a = 300
//! secondary_a = 5
//! referral = "secondary"
//!
//! [coefficients]
//! preset = "standard"
//! fallback = 1.2
//! [coefficients.k."1ph"]
//! instantaneous = 1.1
//!
//! [transformer_overrides.k."3ph"]
//! instantaneous = 1.5
//!
//! [stages.time_delayed]
//! factor = 1.5
//! delay_s = 0.1
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use relayset_algo::{
    CoefficientTable, CtReferral, FaultType, ProtectionStage, SetpointConfig, StageSettings,
    StudyOptions, LV_TOLERANCES,
};
use relayset_core::{RelayError, RelayResult, Seconds};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_lv_tol")]
    pub lv_tol_percent: f64,
    #[serde(default = "default_fault_types")]
    pub fault_types: Vec<FaultType>,
    #[serde(default)]
    pub bus_sweep: bool,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub ct: CtSettings,
    #[serde(default)]
    pub coefficients: CoefficientSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_overrides: Option<CoefficientSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer_overrides: Option<CoefficientSpec>,
    #[serde(default)]
    pub stages: BTreeMap<ProtectionStage, StageSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtSettings {
    #[serde(default = "default_ct_primary")]
    pub primary_a: f64,
    #[serde(default = "default_ct_secondary")]
    pub secondary_a: f64,
    #[serde(default)]
    pub referral: CtReferral,
}

/// Built-in starting points for a coefficient table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoefficientPreset {
    /// 1.2 / 1.3 / 1.5 for every fault type
    Standard,
    /// Fault-type specific values with a 1.2 fallback
    Graded,
    /// No entries
    Empty,
}

impl CoefficientPreset {
    fn table(self) -> CoefficientTable {
        match self {
            CoefficientPreset::Standard => CoefficientTable::standard(),
            CoefficientPreset::Graded => CoefficientTable::graded_by_fault_type(),
            CoefficientPreset::Empty => CoefficientTable::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<CoefficientPreset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<f64>,
    /// K per fault type and stage, applied on top of the preset
    #[serde(default)]
    pub k: BTreeMap<FaultType, BTreeMap<ProtectionStage, f64>>,
}

impl CoefficientSpec {
    pub fn build(&self, default_preset: CoefficientPreset) -> RelayResult<CoefficientTable> {
        let mut table = self.preset.unwrap_or(default_preset).table();
        if self.fallback.is_some() {
            table.set_fallback(self.fallback)?;
        }
        for (&fault_type, stages) in &self.k {
            for (&stage, &k) in stages {
                table.set(fault_type, stage, k)?;
            }
        }
        Ok(table)
    }
}

/// Partial stage settings; missing fields keep the stage default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_s: Option<f64>,
}

fn default_lv_tol() -> f64 {
    6.0
}

fn default_fault_types() -> Vec<FaultType> {
    FaultType::ALL.to_vec()
}

fn default_ct_primary() -> f64 {
    300.0
}

fn default_ct_secondary() -> f64 {
    5.0
}

impl Default for CtSettings {
    fn default() -> Self {
        Self {
            primary_a: default_ct_primary(),
            secondary_a: default_ct_secondary(),
            referral: CtReferral::default(),
        }
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            lv_tol_percent: default_lv_tol(),
            fault_types: default_fault_types(),
            bus_sweep: false,
            strict: false,
            ct: CtSettings::default(),
            coefficients: CoefficientSpec::default(),
            line_overrides: None,
            transformer_overrides: None,
            stages: BTreeMap::new(),
        }
    }
}

impl StudyConfig {
    pub fn validate(&self) -> RelayResult<()> {
        if !LV_TOLERANCES.contains(&self.lv_tol_percent) {
            return Err(RelayError::Configuration(format!(
                "lv_tol_percent must be 6 or 10, got {}",
                self.lv_tol_percent
            )));
        }
        if self.fault_types.is_empty() {
            return Err(RelayError::Configuration(
                "fault_types must name at least one fault type".into(),
            ));
        }
        for (i, fault_type) in self.fault_types.iter().enumerate() {
            if self.fault_types[..i].contains(fault_type) {
                return Err(RelayError::Configuration(format!(
                    "fault type {fault_type} is listed twice"
                )));
            }
        }
        self.setpoint_config().map(|_| ())
    }

    /// Setpoint settings; validated before they are returned.
    pub fn setpoint_config(&self) -> RelayResult<SetpointConfig> {
        let overrides = |spec: &Option<CoefficientSpec>| {
            spec.as_ref()
                .map(|spec| spec.build(CoefficientPreset::Empty))
                .transpose()
        };
        let stages = ProtectionStage::ALL
            .into_iter()
            .map(|stage| {
                let mut settings = StageSettings::default_for(stage);
                if let Some(spec) = self.stages.get(&stage) {
                    if let Some(factor) = spec.factor {
                        settings.factor = factor;
                    }
                    if let Some(delay) = spec.delay_s {
                        settings.delay = Some(Seconds(delay));
                    }
                }
                (stage, settings)
            })
            .collect();

        let config = SetpointConfig {
            coefficients: self.coefficients.build(CoefficientPreset::Standard)?,
            line_overrides: overrides(&self.line_overrides)?,
            transformer_overrides: overrides(&self.transformer_overrides)?,
            ct_primary_a: self.ct.primary_a,
            ct_secondary_a: self.ct.secondary_a,
            referral: self.ct.referral,
            stages,
            strict: self.strict,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn study_options(&self) -> StudyOptions {
        StudyOptions {
            lv_tol_percent: self.lv_tol_percent,
            fault_types: self.fault_types.clone(),
            bus_sweep: self.bus_sweep,
        }
    }
}

/// Read a study configuration; TOML, YAML or JSON by extension.
pub fn load_study_config(path: &Path) -> Result<StudyConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading study config '{}'", path.display()))?;
    let config: StudyConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing study config yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing study config json")?
        }
        _ => toml::from_str(&data).context("parsing study config toml")?,
    };
    config
        .validate()
        .with_context(|| format!("invalid study config '{}'", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_matches_defaults() {
        let config: StudyConfig = toml::from_str("").unwrap();
        assert_eq!(config, StudyConfig::default());
        assert_eq!(config.setpoint_config().unwrap(), SetpointConfig::default());
        assert_eq!(config.study_options().fault_types, FaultType::ALL.to_vec());
    }

    #[test]
    fn toml_overrides_are_applied() {
        let config: StudyConfig = toml::from_str(
            r#"
lv_tol_percent = 10
fault_types = ["3ph", "1ph"]
strict = true

[ct]
primary_a = 600
referral = "primary"

[coefficients]
preset = "graded"
[coefficients.k."1ph"]
instantaneous = 1.15

[transformer_overrides.k."3ph"]
instantaneous = 1.5

[stages.time_graded]
delay_s = 0.5
"#,
        )
        .unwrap();
        config.validate().unwrap();

        let setpoints = config.setpoint_config().unwrap();
        assert!(setpoints.strict);
        assert_eq!(setpoints.ct_ratio(), 120.0);
        assert_eq!(setpoints.scaling_divisor(), 1.0);
        assert_eq!(
            setpoints
                .coefficients
                .get(FaultType::SinglePhase, ProtectionStage::Instantaneous),
            Some(1.15)
        );
        assert_eq!(setpoints.coefficients.fallback(), Some(1.2));
        let transformer = setpoints.coefficients_for(relayset_algo::DeviceRole::Transformer);
        assert_eq!(
            transformer.get(FaultType::ThreePhase, ProtectionStage::Instantaneous),
            Some(1.5)
        );
        let graded = setpoints.stage(ProtectionStage::TimeGraded);
        assert_eq!(graded.delay, Some(Seconds(0.5)));
        assert_eq!(
            graded.factor,
            StageSettings::default_for(ProtectionStage::TimeGraded).factor
        );

        let options = config.study_options();
        assert_eq!(options.lv_tol_percent, 10.0);
        assert_eq!(
            options.fault_types,
            vec![FaultType::ThreePhase, FaultType::SinglePhase]
        );
    }

    #[test]
    fn yaml_config_is_accepted() {
        let config: StudyConfig = serde_yaml::from_str(
            "bus_sweep: true\ncoefficients:\n  preset: empty\n  fallback: 1.25\n",
        )
        .unwrap();
        let setpoints = config.setpoint_config().unwrap();
        assert!(config.study_options().bus_sweep);
        assert_eq!(
            setpoints
                .coefficients
                .get(FaultType::TwoPhase, ProtectionStage::TimeDelayed),
            Some(1.25)
        );
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let bad_tol = StudyConfig {
            lv_tol_percent: 8.0,
            ..StudyConfig::default()
        };
        assert!(matches!(
            bad_tol.validate(),
            Err(RelayError::Configuration(_))
        ));

        let bad_ct = StudyConfig {
            ct: CtSettings {
                secondary_a: 0.0,
                ..CtSettings::default()
            },
            ..StudyConfig::default()
        };
        assert!(matches!(
            bad_ct.setpoint_config(),
            Err(RelayError::Configuration(_))
        ));

        let repeated = StudyConfig {
            fault_types: vec![FaultType::ThreePhase, FaultType::ThreePhase],
            ..StudyConfig::default()
        };
        assert!(repeated.validate().is_err());

        let mut negative = CoefficientSpec::default();
        negative
            .k
            .entry(FaultType::TwoPhase)
            .or_default()
            .insert(ProtectionStage::Instantaneous, -1.0);
        assert!(negative.build(CoefficientPreset::Standard).is_err());
    }

    #[test]
    fn load_reports_file_and_reason() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("study.toml");
        fs::write(&path, "lv_tol_percent = 7\n").unwrap();
        let err = format!("{:#}", load_study_config(&path).unwrap_err());
        assert!(err.contains("study.toml"));
        assert!(err.contains("lv_tol_percent"));
    }
}
