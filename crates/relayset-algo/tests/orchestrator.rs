//! End-to-end studies driven through the orchestrator.

use relayset_algo::table::{f64_column, str_column};
use relayset_algo::*;
use relayset_core::*;

fn two_bus_network() -> Network {
    let mut network = Network::new();
    network.add_bus(Bus::new(BusId::new(0), "A", Kilovolts(6.3)));
    network.add_bus(Bus::new(BusId::new(1), "B", Kilovolts(6.3)));
    network
        .add_line(
            Line::new(LineId::new(0), "A-B", BusId::new(0), BusId::new(1))
                .with_length_km(0.3)
                .with_impedance(0.0993, 0.08),
        )
        .unwrap();
    network
}

fn tabulated(cases: &[OperatingCase]) -> TabulatedSolver {
    let mut solver = TabulatedSolver::new();
    for &case in cases {
        let b = match case {
            OperatingCase::Max => 6.72,
            OperatingCase::Min => 3.35,
        };
        for fault_type in FaultType::ALL {
            solver
                .insert(case, fault_type, BusId::new(0), Kiloamperes(0.0))
                .unwrap();
            solver
                .insert(case, fault_type, BusId::new(1), Kiloamperes(b))
                .unwrap();
        }
    }
    solver
}

fn calculator() -> SetpointCalculator {
    SetpointCalculator::new(SetpointConfig::default()).unwrap()
}

#[test]
fn study_produces_six_named_tables() {
    let network = two_bus_network();
    let solver = tabulated(&OperatingCase::ALL);
    let mut orchestrator = ScenarioOrchestrator::new(&network, &solver, calculator());
    let tables = orchestrator.run().unwrap();

    assert_eq!(orchestrator.state(), StudyState::Done);
    let names: Vec<String> = tables.named_tables().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, TABLE_NAMES);
    assert!(tables.get("max_bus_sweep").is_none());
}

#[test]
fn bus_setpoints_for_zero_and_rated_current() {
    let network = two_bus_network();
    let solver = tabulated(&OperatingCase::ALL);
    let tables = ScenarioOrchestrator::new(&network, &solver, calculator())
        .run()
        .unwrap();

    let max_bus = tables.get("max_bus").unwrap();
    let setpoints = f64_column(max_bus, "setpoint_3ph_instantaneous").unwrap();
    assert_eq!(setpoints[0], Some(0.0));
    assert!((setpoints[1].unwrap() - 134.4).abs() < 1e-9);

    let min_bus = tables.get("min_bus").unwrap();
    let delayed = f64_column(min_bus, "setpoint_3ph_time_delayed").unwrap();
    assert!((delayed[1].unwrap() - 108.875).abs() < 1e-9);
    assert_eq!(
        f64_column(min_bus, "time_delayed_3ph").unwrap()[1],
        Some(0.1)
    );
}

#[test]
fn one_line_gives_one_line_end_record_per_case() {
    let network = two_bus_network();
    let solver = tabulated(&OperatingCase::ALL);
    let tables = ScenarioOrchestrator::new(&network, &solver, calculator())
        .run()
        .unwrap();

    for case in OperatingCase::ALL {
        let line_end = &tables.case(case).line_end;
        assert_eq!(line_end.height(), 1);
        assert_eq!(
            str_column(line_end, "line_name").unwrap(),
            vec![Some("A-B".to_string())]
        );
        let from = f64_column(line_end, "from_bus_ikss_ka").unwrap();
        let to = f64_column(line_end, "to_bus_ikss_ka").unwrap();
        let results = &tables.case(case).results;
        assert_eq!(
            from[0],
            results
                .current_at(BusId::new(0), FaultType::ThreePhase)
                .map(|i| i.value())
        );
        assert_eq!(
            to[0],
            results
                .current_at(BusId::new(1), FaultType::ThreePhase)
                .map(|i| i.value())
        );
        assert_eq!(tables.case(case).transformer.height(), 0);
    }
}

#[test]
fn transformer_terminals_match_bus_currents() {
    let mut network = two_bus_network();
    network.add_bus(Bus::new(BusId::new(2), "C", Kilovolts(0.4)));
    network
        .add_transformer(
            Transformer::new(TransformerId::new(0), "T1", BusId::new(1), BusId::new(2))
                .with_rating(1.6, 6.3, 0.4)
                .with_short_circuit_voltage(6.0, 1.0),
        )
        .unwrap();
    let mut solver = tabulated(&OperatingCase::ALL);
    // The lv bus only has a max-case 3ph current; min leaves it null
    solver
        .insert(OperatingCase::Max, FaultType::ThreePhase, BusId::new(2), Kiloamperes(21.5))
        .unwrap();
    let tables = ScenarioOrchestrator::new(&network, &solver, calculator())
        .run()
        .unwrap();

    for case in OperatingCase::ALL {
        let case_tables = tables.case(case);
        let bus_currents = f64_column(&case_tables.bus, "3ph_ikss_ka").unwrap();
        let transformer = &case_tables.transformer;
        assert_eq!(transformer.height(), 1);
        assert_eq!(
            str_column(transformer, "transformer_name").unwrap(),
            vec![Some("T1".to_string())]
        );
        assert_eq!(
            f64_column(transformer, "hv_bus_ikss_ka").unwrap(),
            vec![bus_currents[1]]
        );
        assert_eq!(
            f64_column(transformer, "lv_bus_ikss_ka").unwrap(),
            vec![bus_currents[2]]
        );
    }

    assert_eq!(
        f64_column(&tables.max.transformer, "lv_bus_ikss_ka").unwrap(),
        vec![Some(21.5)]
    );
    assert_eq!(
        f64_column(&tables.min.transformer, "lv_bus_ikss_ka").unwrap(),
        vec![None]
    );
    assert_eq!(
        f64_column(&tables.min.transformer, "setpoint_lv_3ph_instantaneous").unwrap(),
        vec![None]
    );
}

#[test]
fn failing_case_keeps_completed_tables() {
    let network = two_bus_network();
    let solver = tabulated(&[OperatingCase::Max]);
    let mut orchestrator = ScenarioOrchestrator::new(&network, &solver, calculator());
    let err = orchestrator.run().unwrap_err();

    assert!(matches!(err, RelayError::SolverFailure(_)));
    assert!(err.to_string().contains("min case"));
    assert_eq!(orchestrator.state(), StudyState::Error);
    assert_eq!(orchestrator.completed_cases().len(), 1);
    assert_eq!(orchestrator.completed_cases()[0].case, OperatingCase::Max);
}

#[test]
fn bus_sweep_adds_seventh_table_per_case() {
    let network = two_bus_network();
    let solver = tabulated(&OperatingCase::ALL);
    let options = StudyOptions {
        bus_sweep: true,
        ..StudyOptions::default()
    };
    let tables = ScenarioOrchestrator::new(&network, &solver, calculator())
        .with_options(options)
        .run()
        .unwrap();

    let sweep = tables.get("max_bus_sweep").unwrap();
    assert_eq!(sweep.get_column_names(), vec!["bus_name", "ikss_ka"]);
    assert_eq!(
        f64_column(sweep, "ikss_ka").unwrap(),
        vec![Some(0.0), Some(6.72)]
    );
    assert!(tables.get("min_bus_sweep").is_some());
}

#[test]
fn three_phase_only_study_omits_other_setpoints() {
    let network = two_bus_network();
    let solver = tabulated(&OperatingCase::ALL);
    let options = StudyOptions {
        fault_types: vec![FaultType::ThreePhase],
        ..StudyOptions::default()
    };
    let tables = ScenarioOrchestrator::new(&network, &solver, calculator())
        .with_options(options)
        .run()
        .unwrap();

    let columns = tables.max.bus.get_column_names();
    assert!(columns.contains(&"setpoint_3ph_time_graded"));
    assert!(!columns.iter().any(|c| c.contains("2ph") || c.contains("1ph")));
}

#[test]
fn iec_solver_drives_full_study() {
    let mut network = two_bus_network();
    network
        .add_external_grid(ExternalGrid::new(
            ExtGridId::new(0),
            "Grid",
            BusId::new(0),
            MegavoltAmperes(150.0),
            MegavoltAmperes(80.0),
        ))
        .unwrap();
    let solver = Iec60909Solver::new();
    let tables = ScenarioOrchestrator::new(&network, &solver, calculator())
        .run()
        .unwrap();

    let max = f64_column(&tables.max.bus, "3ph_ikss_ka").unwrap();
    let min = f64_column(&tables.min.bus, "3ph_ikss_ka").unwrap();
    for (hi, lo) in max.iter().zip(&min) {
        assert!(hi.unwrap() > lo.unwrap());
    }
    // Current falls along the feeder
    assert!(max[0].unwrap() > max[1].unwrap());
}
