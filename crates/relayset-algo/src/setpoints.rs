//! Setpoint columns for bus, line-end and transformer tables.

use crate::coefficients::{DeviceRole, ProtectionStage, SetpointConfig};
use crate::fault::FaultType;
use crate::table::{f64_column, has_column, str_column, table_error};
use crate::terminals::DeviceTerminalMapper;
use polars::prelude::*;
use relayset_core::{Amperes, Kiloamperes, RelayError, RelayResult, Seconds};
use serde::Serialize;
use tracing::{debug, warn};

/// Terminal a setpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminal {
    /// The whole device (bus role)
    Device,
    From,
    To,
    Hv,
    Lv,
}

impl Terminal {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "from" => Some(Terminal::From),
            "to" => Some(Terminal::To),
            "hv" => Some(Terminal::Hv),
            "lv" => Some(Terminal::Lv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Terminal::Device => "device",
            Terminal::From => "from",
            Terminal::To => "to",
            Terminal::Hv => "hv",
            Terminal::Lv => "lv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetpointRecord {
    pub device: String,
    pub terminal: Terminal,
    pub stage: ProtectionStage,
    pub fault_type: FaultType,
    pub threshold: Amperes,
    /// Present for time-delayed and time-graded stages
    pub delay: Option<Seconds>,
}

/// Applies coefficients, stage factors and CT scaling to raw-current tables.
#[derive(Debug, Clone)]
pub struct SetpointCalculator {
    config: SetpointConfig,
}

impl SetpointCalculator {
    pub fn new(config: SetpointConfig) -> RelayResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SetpointConfig {
        &self.config
    }

    /// `K · I″k · 1000 · F(stage) / CT`, without the CT division for
    /// primary referral.
    pub fn threshold(&self, k: f64, ikss: Kiloamperes, stage: ProtectionStage) -> Amperes {
        let factor = self.config.stage(stage).factor;
        Amperes(k * ikss.to_amperes().value() * factor / self.config.scaling_divisor())
    }

    /// Add setpoint columns for `role` to `table`.
    ///
    /// Returns the names of the columns that were added. Columns already in
    /// the table are left untouched, so applying twice changes nothing.
    pub fn apply(&self, table: &mut DataFrame, role: DeviceRole) -> RelayResult<Vec<String>> {
        let added = match role {
            DeviceRole::Bus => self.apply_bus(table)?,
            DeviceRole::LineEnd => self.apply_terminals(table, role, ["from", "to"])?,
            DeviceRole::Transformer => self.apply_terminals(table, role, ["hv", "lv"])?,
        };
        debug!("{} setpoint columns added for {} role", added.len(), role);
        Ok(added)
    }

    fn apply_bus(&self, table: &mut DataFrame) -> RelayResult<Vec<String>> {
        let coefficients = self.config.coefficients_for(DeviceRole::Bus);
        let mut added = Vec::new();

        for fault_type in FaultType::ALL {
            let stages: Vec<(ProtectionStage, f64)> = ProtectionStage::ALL
                .into_iter()
                .filter_map(|stage| coefficients.get(fault_type, stage).map(|k| (stage, k)))
                .collect();
            if stages.is_empty() {
                continue;
            }

            let input = fault_type.column_name();
            let Some(currents) = self.input_currents(table, &input, DeviceRole::Bus)? else {
                continue;
            };

            for (stage, k) in stages {
                let thresholds = self.thresholds(&currents, k, stage);
                let column = format!("setpoint_{fault_type}_{stage}");
                if add_column(table, &column, &thresholds)? {
                    added.push(column);
                }

                if stage == ProtectionStage::Instantaneous {
                    continue;
                }
                if let Some(delay) = self.config.stage(stage).delay {
                    let delays: Vec<Option<f64>> = thresholds
                        .iter()
                        .map(|t| t.map(|_| delay.value()))
                        .collect();
                    let column = format!("{stage}_{fault_type}");
                    if add_column(table, &column, &delays)? {
                        added.push(column);
                    }
                }
            }
        }
        Ok(added)
    }

    fn apply_terminals(
        &self,
        table: &mut DataFrame,
        role: DeviceRole,
        labels: [&str; 2],
    ) -> RelayResult<Vec<String>> {
        let stage = ProtectionStage::Instantaneous;
        let fault_type = DeviceTerminalMapper::FAULT_TYPE;
        let k = self
            .config
            .coefficients_for(role)
            .require(fault_type, stage)
            .map_err(|err| err.context(format!("{role} setpoints")))?;

        let mut added = Vec::new();
        for label in labels {
            let input = format!("{label}_bus_ikss_ka");
            let Some(currents) = self.input_currents(table, &input, role)? else {
                continue;
            };
            let column = format!("setpoint_{label}_{fault_type}_{stage}");
            if add_column(table, &column, &self.thresholds(&currents, k, stage))? {
                added.push(column);
            }
        }
        Ok(added)
    }

    /// Checked input column, or `None` when it is missing in lenient mode.
    fn input_currents(
        &self,
        table: &DataFrame,
        column: &str,
        role: DeviceRole,
    ) -> RelayResult<Option<Vec<Option<f64>>>> {
        if !has_column(table, column) {
            if self.config.strict {
                return Err(RelayError::InvalidInput(format!(
                    "{role} table has no '{column}' column"
                )));
            }
            warn!(
                "{} table has no '{}' column; dependent setpoints skipped",
                role, column
            );
            return Ok(None);
        }

        let values = f64_column(table, column)?;
        if let Some((row, value)) = values
            .iter()
            .enumerate()
            .find_map(|(row, v)| v.filter(|x| !x.is_finite() || *x < 0.0).map(|x| (row, x)))
        {
            return Err(RelayError::InvalidInput(format!(
                "'{column}' row {row} holds an unusable current ({value})"
            )));
        }
        Ok(Some(values))
    }

    fn thresholds(&self, currents: &[Option<f64>], k: f64, stage: ProtectionStage) -> Vec<Option<f64>> {
        currents
            .iter()
            .map(|ikss| ikss.map(|i| self.threshold(k, Kiloamperes(i), stage).value()))
            .collect()
    }
}

fn add_column(table: &mut DataFrame, name: &str, values: &[Option<f64>]) -> RelayResult<bool> {
    if has_column(table, name) {
        return Ok(false);
    }
    table
        .with_column(Series::new(name, values))
        .map_err(table_error)?;
    Ok(true)
}

fn parse_setpoint_column(name: &str) -> Option<(Terminal, FaultType, ProtectionStage)> {
    let rest = name.strip_prefix("setpoint_")?;
    let (terminal, rest) = match rest.split_once('_') {
        Some((label, tail)) => match Terminal::from_label(label) {
            Some(terminal) => (terminal, tail),
            None => (Terminal::Device, rest),
        },
        None => return None,
    };
    let (fault, stage) = rest.split_once('_')?;
    Some((terminal, fault.parse().ok()?, stage.parse().ok()?))
}

/// Read the setpoint columns of a table back into typed records.
///
/// Rows with a null threshold produce no record.
pub fn setpoint_records(table: &DataFrame, role: DeviceRole) -> RelayResult<Vec<SetpointRecord>> {
    let names = str_column(table, role.name_column())?;

    let mut columns = Vec::new();
    for column in table.get_column_names() {
        let Some((terminal, fault_type, stage)) = parse_setpoint_column(column) else {
            continue;
        };
        let thresholds = f64_column(table, column)?;
        let delay_column = format!("{stage}_{fault_type}");
        let delays = if stage != ProtectionStage::Instantaneous && has_column(table, &delay_column) {
            Some(f64_column(table, &delay_column)?)
        } else {
            None
        };
        columns.push((terminal, fault_type, stage, thresholds, delays));
    }

    let mut records = Vec::new();
    for (row, name) in names.iter().enumerate() {
        for (terminal, fault_type, stage, thresholds, delays) in &columns {
            let Some(threshold) = thresholds[row] else {
                continue;
            };
            records.push(SetpointRecord {
                device: name.clone().unwrap_or_default(),
                terminal: *terminal,
                stage: *stage,
                fault_type: *fault_type,
                threshold: Amperes(threshold),
                delay: delays.as_ref().and_then(|d| d[row]).map(Seconds),
            });
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::{CoefficientTable, CtReferral};

    fn bus_table(currents_3ph: Vec<Option<f64>>) -> DataFrame {
        let names: Vec<String> = (0..currents_3ph.len()).map(|i| format!("bus{i}")).collect();
        DataFrame::new(vec![
            Series::new("bus_name", names),
            Series::new("3ph_ikss_ka", currents_3ph),
        ])
        .unwrap()
    }

    #[test]
    fn parses_setpoint_column_names() {
        assert_eq!(
            parse_setpoint_column("setpoint_3ph_time_delayed"),
            Some((
                Terminal::Device,
                FaultType::ThreePhase,
                ProtectionStage::TimeDelayed
            ))
        );
        assert_eq!(
            parse_setpoint_column("setpoint_hv_3ph_instantaneous"),
            Some((Terminal::Hv, FaultType::ThreePhase, ProtectionStage::Instantaneous))
        );
        assert_eq!(parse_setpoint_column("time_delayed_3ph"), None);
        assert_eq!(parse_setpoint_column("setpoint_xx"), None);
    }

    #[test]
    fn threshold_with_primary_referral() {
        let config = SetpointConfig {
            referral: CtReferral::Primary,
            ..SetpointConfig::default()
        };
        let calc = SetpointCalculator::new(config).unwrap();
        let t = calc.threshold(1.2, Kiloamperes(6.72), ProtectionStage::Instantaneous);
        assert!((t.value() - 8064.0).abs() < 1e-9);
    }

    #[test]
    fn null_current_gives_null_threshold() {
        let calc = SetpointCalculator::new(SetpointConfig::default()).unwrap();
        let mut table = bus_table(vec![None, Some(6.72)]);
        calc.apply(&mut table, DeviceRole::Bus).unwrap();

        let values = f64_column(&table, "setpoint_3ph_instantaneous").unwrap();
        assert_eq!(values[0], None);
        assert!((values[1].unwrap() - 134.4).abs() < 1e-9);

        let delays = f64_column(&table, "time_delayed_3ph").unwrap();
        assert_eq!(delays, vec![None, Some(0.1)]);
    }

    #[test]
    fn non_finite_current_is_rejected() {
        let calc = SetpointCalculator::new(SetpointConfig::default()).unwrap();
        let mut table = bus_table(vec![Some(f64::INFINITY)]);
        let err = calc.apply(&mut table, DeviceRole::Bus).unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(_)));
    }

    #[test]
    fn fallback_covers_unlisted_entries() {
        let config = SetpointConfig {
            coefficients: CoefficientTable::new().with_fallback(1.0),
            ..SetpointConfig::default()
        };
        let calc = SetpointCalculator::new(config).unwrap();
        let mut table = bus_table(vec![Some(3.0)]);
        let added = calc.apply(&mut table, DeviceRole::Bus).unwrap();
        assert_eq!(
            added,
            vec![
                "setpoint_3ph_instantaneous",
                "setpoint_3ph_time_delayed",
                "time_delayed_3ph",
                "setpoint_3ph_time_graded",
                "time_graded_3ph"
            ]
        );
    }

    #[test]
    fn records_round_trip_from_table() {
        let calc = SetpointCalculator::new(SetpointConfig::default()).unwrap();
        let mut table = bus_table(vec![Some(3.35)]);
        calc.apply(&mut table, DeviceRole::Bus).unwrap();

        let records = setpoint_records(&table, DeviceRole::Bus).unwrap();
        assert_eq!(records.len(), 3);
        let delayed = records
            .iter()
            .find(|r| r.stage == ProtectionStage::TimeDelayed)
            .unwrap();
        assert_eq!(delayed.device, "bus0");
        assert_eq!(delayed.terminal, Terminal::Device);
        assert!((delayed.threshold.value() - 108.875).abs() < 1e-9);
        assert_eq!(delayed.delay, Some(Seconds(0.1)));
    }
}
