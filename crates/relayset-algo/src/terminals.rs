//! Projection of bus fault currents onto line ends and transformer terminals.

use crate::fault::{FaultType, OperatingCase};
use crate::results::FaultCurrentResultSet;
use crate::table::{ka_values, table_error};
use polars::prelude::*;
use relayset_core::{BusId, Kiloamperes, Network, RelayError, RelayResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Line,
    Transformer,
}

impl DeviceKind {
    /// Labels of the two terminals, `(from, to)` or `(hv, lv)`.
    pub fn terminal_labels(&self) -> (&'static str, &'static str) {
        match self {
            DeviceKind::Line => ("from", "to"),
            DeviceKind::Transformer => ("hv", "lv"),
        }
    }
}

/// Three-phase currents seen at both terminals of a two-terminal device.
///
/// For lines `first` is the from-end and `second` the to-end; for
/// transformers they are the hv and lv terminals.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTerminalRecord {
    pub device: String,
    pub kind: DeviceKind,
    pub case: OperatingCase,
    pub first_bus: BusId,
    pub second_bus: BusId,
    pub first_ikss: Option<Kiloamperes>,
    pub second_ikss: Option<Kiloamperes>,
}

/// Builds line-end and transformer-terminal records from a result set.
///
/// Only three-phase currents are propagated; the `*_bus_ikss_ka` columns feed
/// the `setpoint_from_3ph_*` columns downstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceTerminalMapper;

impl DeviceTerminalMapper {
    /// Fault type whose currents land on device terminals.
    pub const FAULT_TYPE: FaultType = FaultType::ThreePhase;

    pub fn new() -> Self {
        Self
    }

    fn record(
        &self,
        results: &FaultCurrentResultSet,
        network: &Network,
        kind: DeviceKind,
        device: &str,
        buses: (BusId, BusId),
    ) -> RelayResult<DeviceTerminalRecord> {
        for bus in [buses.0, buses.1] {
            if network.bus(bus).is_none() {
                return Err(RelayError::InvalidInput(format!(
                    "{kind:?} '{device}' references {bus}, which is not in the topology"
                )));
            }
        }
        Ok(DeviceTerminalRecord {
            device: device.to_string(),
            kind,
            case: results.case(),
            first_bus: buses.0,
            second_bus: buses.1,
            first_ikss: results.current_at(buses.0, Self::FAULT_TYPE),
            second_ikss: results.current_at(buses.1, Self::FAULT_TYPE),
        })
    }

    /// One record per line, in topology order.
    pub fn line_end_records(
        &self,
        results: &FaultCurrentResultSet,
        network: &Network,
    ) -> RelayResult<Vec<DeviceTerminalRecord>> {
        network
            .lines()
            .into_iter()
            .map(|line| {
                self.record(
                    results,
                    network,
                    DeviceKind::Line,
                    &line.name,
                    (line.from_bus, line.to_bus),
                )
            })
            .collect()
    }

    /// One record per transformer, in topology order.
    pub fn transformer_records(
        &self,
        results: &FaultCurrentResultSet,
        network: &Network,
    ) -> RelayResult<Vec<DeviceTerminalRecord>> {
        network
            .transformers()
            .into_iter()
            .map(|tx| {
                self.record(
                    results,
                    network,
                    DeviceKind::Transformer,
                    &tx.name,
                    (tx.hv_bus, tx.lv_bus),
                )
            })
            .collect()
    }

    /// `line_name, from_bus_id, to_bus_id, from_bus_ikss_ka, to_bus_ikss_ka`
    pub fn line_end_table(
        &self,
        results: &FaultCurrentResultSet,
        network: &Network,
    ) -> RelayResult<DataFrame> {
        let records = self.line_end_records(results, network)?;
        records_to_table(&records, DeviceKind::Line)
    }

    /// `transformer_name, hv_bus_id, lv_bus_id, hv_bus_ikss_ka, lv_bus_ikss_ka`
    pub fn transformer_table(
        &self,
        results: &FaultCurrentResultSet,
        network: &Network,
    ) -> RelayResult<DataFrame> {
        let records = self.transformer_records(results, network)?;
        records_to_table(&records, DeviceKind::Transformer)
    }
}

fn records_to_table(records: &[DeviceTerminalRecord], kind: DeviceKind) -> RelayResult<DataFrame> {
    let (first, second) = kind.terminal_labels();
    let name_column = match kind {
        DeviceKind::Line => "line_name",
        DeviceKind::Transformer => "transformer_name",
    };
    DataFrame::new(vec![
        Series::new(
            name_column,
            records.iter().map(|r| r.device.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            &format!("{first}_bus_id"),
            records
                .iter()
                .map(|r| r.first_bus.value() as u64)
                .collect::<Vec<_>>(),
        ),
        Series::new(
            &format!("{second}_bus_id"),
            records
                .iter()
                .map(|r| r.second_bus.value() as u64)
                .collect::<Vec<_>>(),
        ),
        Series::new(
            &format!("{first}_bus_ikss_ka"),
            ka_values(records.iter().map(|r| r.first_ikss)),
        ),
        Series::new(
            &format!("{second}_bus_ikss_ka"),
            ka_values(records.iter().map(|r| r.second_ikss)),
        ),
    ])
    .map_err(table_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultSnapshot;
    use crate::table::{f64_column, str_column};
    use relayset_core::*;

    fn network() -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(0), "A", Kilovolts(6.3)));
        network.add_bus(Bus::new(BusId::new(1), "B", Kilovolts(6.0)));
        network
            .add_line(
                Line::new(LineId::new(0), "A-B", BusId::new(0), BusId::new(1))
                    .with_impedance(0.1, 0.1),
            )
            .unwrap();
        network
    }

    fn results() -> FaultCurrentResultSet {
        let mut results = FaultCurrentResultSet::new(OperatingCase::Max);
        let mut snapshot = FaultSnapshot::new(FaultType::ThreePhase, OperatingCase::Max);
        snapshot.insert(BusId::new(0), Kiloamperes(6.72));
        results.record(snapshot).unwrap();
        results
    }

    #[test]
    fn line_end_carries_endpoint_currents() {
        let records = DeviceTerminalMapper::new()
            .line_end_records(&results(), &network())
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].device, "A-B");
        assert_eq!(records[0].first_ikss, Some(Kiloamperes(6.72)));
        assert_eq!(records[0].second_ikss, None);
    }

    #[test]
    fn line_end_table_columns() {
        let table = DeviceTerminalMapper::new()
            .line_end_table(&results(), &network())
            .unwrap();
        assert_eq!(
            table.get_column_names(),
            vec![
                "line_name",
                "from_bus_id",
                "to_bus_id",
                "from_bus_ikss_ka",
                "to_bus_ikss_ka"
            ]
        );
        assert_eq!(
            str_column(&table, "line_name").unwrap(),
            vec![Some("A-B".to_string())]
        );
        assert_eq!(f64_column(&table, "to_bus_ikss_ka").unwrap(), vec![None]);
    }

    #[test]
    fn only_three_phase_currents_reach_terminals() {
        let mut results = results();
        let mut two_phase = FaultSnapshot::new(FaultType::TwoPhase, OperatingCase::Max);
        two_phase.insert(BusId::new(0), Kiloamperes(5.0));
        two_phase.insert(BusId::new(1), Kiloamperes(4.0));
        results.record(two_phase).unwrap();

        let records = DeviceTerminalMapper::new()
            .line_end_records(&results, &network())
            .unwrap();
        assert_eq!(records[0].first_ikss, Some(Kiloamperes(6.72)));
        // No 3ph current at B, and the 2ph one must not stand in for it
        assert_eq!(records[0].second_ikss, None);
    }

    #[test]
    fn transformer_terminals_follow_hv_and_lv_buses() {
        let mut network = network();
        network.add_bus(Bus::new(BusId::new(2), "C", Kilovolts(0.4)));
        network
            .add_transformer(
                Transformer::new(TransformerId::new(0), "T1", BusId::new(1), BusId::new(2))
                    .with_rating(1.6, 6.0, 0.4)
                    .with_short_circuit_voltage(6.0, 1.0),
            )
            .unwrap();

        let table = DeviceTerminalMapper::new()
            .transformer_table(&results(), &network)
            .unwrap();
        assert_eq!(
            table.get_column_names(),
            vec![
                "transformer_name",
                "hv_bus_id",
                "lv_bus_id",
                "hv_bus_ikss_ka",
                "lv_bus_ikss_ka"
            ]
        );
        // Neither terminal bus has a recorded 3ph current
        assert_eq!(f64_column(&table, "hv_bus_ikss_ka").unwrap(), vec![None]);
        assert_eq!(f64_column(&table, "lv_bus_ikss_ka").unwrap(), vec![None]);
    }

    #[test]
    fn dangling_bus_reference_is_invalid_input() {
        let mut network = network();
        let a = network.bus_node(BusId::new(0)).unwrap();
        let b = network.bus_node(BusId::new(1)).unwrap();
        network.graph.add_edge(
            a,
            b,
            Edge::Transformer(Transformer::new(
                TransformerId::new(0),
                "T1",
                BusId::new(0),
                BusId::new(42),
            )),
        );

        let err = DeviceTerminalMapper::new()
            .transformer_records(&results(), &network)
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(_)));
    }
}
