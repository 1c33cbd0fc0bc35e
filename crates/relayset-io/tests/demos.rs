//! Studies on the files shipped under `demos/`.

use std::path::PathBuf;

use relayset_algo::table::{f64_column, str_column};
use relayset_algo::{Iec60909Solver, ScenarioOrchestrator, SetpointCalculator};
use relayset_io::{
    export_tables, import_network, load_fault_table, load_study_config, TableFormat,
};

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name)
}

#[test]
fn refinery_topology_imports_cleanly() {
    let imported = import_network(&demo("refinery.yaml")).unwrap();
    let stats = imported.network.stats();
    assert_eq!(stats.num_buses, 6);
    assert_eq!(stats.num_external_grids, 2);
    assert_eq!(stats.num_transformers, 2);
    assert_eq!(stats.num_lines, 21);
    assert_eq!(stats.num_loads, 26);
    assert_eq!(stats.num_switches, 1);
    assert!((stats.total_load_mw - 15.6).abs() < 1e-9);
    assert!(
        !imported.diagnostics.has_errors(),
        "{}",
        imported.diagnostics.summary()
    );
}

#[test]
fn refinery_study_with_iec_solver() {
    let imported = import_network(&demo("refinery.yaml")).unwrap();
    let config = load_study_config(&demo("setpoints.toml")).unwrap();
    let solver = Iec60909Solver::new();
    let calculator = SetpointCalculator::new(config.setpoint_config().unwrap()).unwrap();
    let tables = ScenarioOrchestrator::new(&imported.network, &solver, calculator)
        .with_options(config.study_options())
        .run()
        .unwrap();

    let max_bus = tables.get("max_bus").unwrap();
    let ikss = f64_column(max_bus, "3ph_ikss_ka").unwrap();
    // Both 35 kV buses carry their own utility infeed
    assert!((ikss[0].unwrap() - 6.72).abs() < 1e-6);
    assert!((ikss[1].unwrap() - 6.72).abs() < 1e-6);
    assert!(ikss.iter().all(|i| i.unwrap() > 0.0));

    let line_end = tables.get("max_line_end").unwrap();
    assert_eq!(line_end.height(), 21);
    assert_eq!(
        str_column(line_end, "line_name").unwrap()[0].as_deref(),
        Some("6102 Hydrotreater 1")
    );
    // Line override K = 1.3 on the sending end
    let from = f64_column(line_end, "from_bus_ikss_ka").unwrap()[0].unwrap();
    let setpoint = f64_column(line_end, "setpoint_from_3ph_instantaneous").unwrap()[0].unwrap();
    assert!((setpoint - 1.3 * from * 1000.0 / 60.0).abs() < 1e-9);

    let sweep = tables.get("min_bus_sweep").unwrap();
    assert_eq!(sweep.height(), 6);
}

#[test]
fn refinery_tables_export_to_csv() {
    let imported = import_network(&demo("refinery.yaml")).unwrap();
    let config = load_study_config(&demo("setpoints.toml")).unwrap();
    let solver = Iec60909Solver::new();
    let calculator = SetpointCalculator::new(config.setpoint_config().unwrap()).unwrap();
    let tables = ScenarioOrchestrator::new(&imported.network, &solver, calculator)
        .with_options(config.study_options())
        .run()
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let written = export_tables(tables.named_tables(), dir.path(), TableFormat::Csv).unwrap();
    let names: Vec<String> = written
        .iter()
        .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
        .collect();
    assert_eq!(
        names,
        vec![
            "max_bus.csv",
            "max_line_end.csv",
            "max_transformer.csv",
            "max_bus_sweep.csv",
            "min_bus.csv",
            "min_line_end.csv",
            "min_transformer.csv",
            "min_bus_sweep.csv",
        ]
    );
    let transformer = std::fs::read_to_string(&written[2]).unwrap();
    assert!(transformer.starts_with("transformer_name,"));
    assert!(transformer.contains("Transformer 2"));
}

#[test]
fn two_bus_study_from_fault_table() {
    let imported = import_network(&demo("two_bus.yaml")).unwrap();
    let solver = load_fault_table(&demo("two_bus_faults.csv"), &imported.network).unwrap();
    let calculator = SetpointCalculator::new(Default::default()).unwrap();
    let tables = ScenarioOrchestrator::new(&imported.network, &solver, calculator)
        .run()
        .unwrap();

    let setpoints = f64_column(tables.get("max_bus").unwrap(), "setpoint_3ph_instantaneous").unwrap();
    assert_eq!(setpoints[0], Some(0.0));
    assert!((setpoints[1].unwrap() - 134.4).abs() < 1e-9);
}
