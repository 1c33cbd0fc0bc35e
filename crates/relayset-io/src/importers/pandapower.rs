//! Pandapower JSON network format importer
//!
//! Pandapower uses a JSON format that wraps serialized pandas DataFrames.
//! Each element table (bus, ext_grid, line, trafo, load, switch) is a
//! DataFrame in split orientation stored as a JSON string.
//!
//! Only the columns the short-circuit model needs are read. Result tables
//! (`res_*`, `res_bus_sc`) are ignored.
//!
//! Reference: <https://pandapower.readthedocs.io/en/latest/file_io.html>

use std::{collections::HashMap, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use relayset_core::{
    Bus, BusId, Category, Diagnostics, ExtGridId, ExternalGrid, Kilovolts, Line, LineId, Load, LoadId,
    MegavoltAmperes, Megavars, Megawatts, Network, Switch, SwitchId, Transformer, TransformerId,
    VectorGroup,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::ImportResult;

/// Top-level pandapower JSON structure
#[derive(Debug, Deserialize)]
struct PandapowerJson {
    _object: PandapowerNet,
}

/// The pandapower network container
#[derive(Debug, Deserialize)]
struct PandapowerNet {
    bus: Option<DataFrameJson>,
    ext_grid: Option<DataFrameJson>,
    line: Option<DataFrameJson>,
    trafo: Option<DataFrameJson>,
    load: Option<DataFrameJson>,
    switch: Option<DataFrameJson>,
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

/// A serialized pandas DataFrame
#[derive(Debug, Deserialize)]
struct DataFrameJson {
    /// The DataFrame content as a JSON string
    _object: String,
}

/// Parsed DataFrame content (split orientation)
#[derive(Debug, Deserialize)]
struct DataFrameContent {
    columns: Vec<String>,
    index: Vec<usize>,
    data: Vec<Vec<Value>>,
}

impl DataFrameJson {
    fn parse_content(&self) -> Result<DataFrameContent> {
        serde_json::from_str(&self._object).context("parsing DataFrame JSON content")
    }
}

/// Row access by column name into a parsed DataFrame.
struct DataFrameView<'a> {
    index: &'a [usize],
    data: &'a [Vec<Value>],
    col_map: HashMap<&'a str, usize>,
}

impl<'a> DataFrameView<'a> {
    fn new(content: &'a DataFrameContent) -> Self {
        let col_map = content
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        Self {
            index: &content.index,
            data: &content.data,
            col_map,
        }
    }

    fn rows(&self) -> impl Iterator<Item = Row<'_, 'a>> {
        (0..self.data.len()).map(move |row| Row { view: self, row })
    }
}

struct Row<'v, 'a> {
    view: &'v DataFrameView<'a>,
    row: usize,
}

impl Row<'_, '_> {
    /// The pandas index of the row
    fn index(&self) -> usize {
        self.view.index.get(self.row).copied().unwrap_or(self.row)
    }

    fn get(&self, col: &str) -> Option<&Value> {
        let col_idx = self.view.col_map.get(col)?;
        self.view.data.get(self.row)?.get(*col_idx)
    }

    /// Numbers only; pandas NaN arrives as `null`.
    fn f64(&self, col: &str) -> Option<f64> {
        match self.get(col)? {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    fn usize(&self, col: &str) -> Option<usize> {
        match self.get(col)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0 && *v >= 0.0).map(|v| v as u64))
                .and_then(|v| usize::try_from(v).ok()),
            _ => None,
        }
    }

    fn bool(&self, col: &str) -> Option<bool> {
        match self.get(col)? {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn string(&self, col: &str) -> Option<String> {
        match self.get(col)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn require_bus(&self, col: &str, table: &str) -> Result<BusId> {
        self.usize(col)
            .map(BusId::new)
            .ok_or_else(|| anyhow!("{table} {} missing '{col}'", self.index()))
    }
}

fn with_view<F>(table: Option<&DataFrameJson>, mut f: F) -> Result<()>
where
    F: FnMut(&DataFrameView) -> Result<()>,
{
    if let Some(table) = table {
        let content = table.parse_content()?;
        f(&DataFrameView::new(&content))?;
    }
    Ok(())
}

/// Parse a pandapower JSON file together with import diagnostics.
pub fn parse_pandapower(json_file: &Path) -> Result<ImportResult> {
    let content = fs::read_to_string(json_file)
        .with_context(|| format!("reading pandapower JSON file '{}'", json_file.display()))?;
    let pp: PandapowerJson = serde_json::from_str(&content)
        .with_context(|| format!("parsing pandapower JSON from '{}'", json_file.display()))?;

    let mut diagnostics = Diagnostics::new();
    let network = build_network_from_pandapower(&pp._object, &mut diagnostics)?;
    Ok(ImportResult {
        network,
        diagnostics,
        name: pp._object.name.filter(|name| !name.is_empty()),
    })
}

/// Load a pandapower JSON file and return the network only.
pub fn load_pandapower_network(json_file: &Path) -> Result<Network> {
    parse_pandapower(json_file).map(|result| result.network)
}

fn build_network_from_pandapower(pp: &PandapowerNet, diag: &mut Diagnostics) -> Result<Network> {
    let mut network = Network::new();
    let mut voltages: HashMap<usize, f64> = HashMap::new();

    with_view(pp.bus.as_ref(), |view| {
        for row in view.rows() {
            let idx = row.index();
            let name = row.string("name").unwrap_or_else(|| format!("Bus {idx}"));
            let vn_kv = row
                .f64("vn_kv")
                .ok_or_else(|| anyhow!("bus {idx} missing 'vn_kv'"))?;
            let mut bus = Bus::new(BusId::new(idx), name, Kilovolts(vn_kv));
            bus.in_service = row.bool("in_service").unwrap_or(true);
            network.add_bus(bus);
            voltages.insert(idx, vn_kv);
        }
        Ok(())
    })?;

    let mut grid_id = 0usize;
    with_view(pp.ext_grid.as_ref(), |view| {
        for row in view.rows() {
            let idx = row.index();
            let bus = row.require_bus("bus", "ext_grid")?;
            let name = row.string("name").unwrap_or_else(|| format!("Grid {idx}"));
            let (Some(s_max), Some(s_min)) = (row.f64("s_sc_max_mva"), row.f64("s_sc_min_mva"))
            else {
                diag.error_at(
                    Category::Import,
                    "ext_grid has no s_sc_max_mva/s_sc_min_mva; skipped",
                    &name,
                );
                continue;
            };
            if !voltages.contains_key(&bus.value()) {
                diag.warning_at(
                    Category::Reference,
                    &format!("references unknown {bus}"),
                    &name,
                );
                continue;
            }

            let mut grid = ExternalGrid::new(
                ExtGridId::new(grid_id),
                name,
                bus,
                MegavoltAmperes(s_max),
                MegavoltAmperes(s_min),
            );
            if let Some(rx) = row.f64("rx_max") {
                grid.rx_max = rx;
                grid.rx_min = row.f64("rx_min").unwrap_or(rx);
            }
            grid.x0x_max = row.f64("x0x_max");
            grid.x0x_min = row.f64("x0x_min").or(grid.x0x_max);
            grid.r0x0_max = row.f64("r0x0_max");
            grid.r0x0_min = row.f64("r0x0_min").or(grid.r0x0_max);
            grid.in_service = row.bool("in_service").unwrap_or(true);
            network.add_external_grid(grid)?;
            grid_id += 1;
        }
        Ok(())
    })?;

    let mut trafo_id = 0usize;
    with_view(pp.trafo.as_ref(), |view| {
        for row in view.rows() {
            let idx = row.index();
            let hv_bus = row.require_bus("hv_bus", "trafo")?;
            let lv_bus = row.require_bus("lv_bus", "trafo")?;
            let name = row
                .string("name")
                .unwrap_or_else(|| format!("Trafo {}-{}", hv_bus.value(), lv_bus.value()));
            if !voltages.contains_key(&hv_bus.value()) || !voltages.contains_key(&lv_bus.value())
            {
                diag.warning_at(
                    Category::Reference,
                    &format!("trafo {idx} references an unknown bus"),
                    &name,
                );
                continue;
            }

            let vector_group = match row.string("vector_group") {
                Some(group) => match group.parse::<VectorGroup>() {
                    Ok(group) => group,
                    Err(err) => {
                        diag.warning_at(
                            Category::Import,
                            &format!("{err}; assuming Dyn"),
                            &name,
                        );
                        VectorGroup::Dyn
                    }
                },
                None => VectorGroup::Dyn,
            };

            let sn_mva = row.f64("sn_mva").unwrap_or(25.0);
            let vn_hv_kv = row
                .f64("vn_hv_kv")
                .or_else(|| voltages.get(&hv_bus.value()).copied())
                .unwrap_or(1.0);
            let vn_lv_kv = row
                .f64("vn_lv_kv")
                .or_else(|| voltages.get(&lv_bus.value()).copied())
                .unwrap_or(1.0);
            let vk = row
                .f64("vk_percent")
                .ok_or_else(|| anyhow!("trafo {idx} missing 'vk_percent'"))?;
            let vkr = row.f64("vkr_percent").unwrap_or(0.0);

            let mut transformer =
                Transformer::new(TransformerId::new(trafo_id), name, hv_bus, lv_bus)
                    .with_rating(sn_mva, vn_hv_kv, vn_lv_kv)
                    .with_short_circuit_voltage(vk, vkr)
                    .with_vector_group(vector_group);
            transformer.vk0_percent = row.f64("vk0_percent");
            transformer.vkr0_percent = row.f64("vkr0_percent");
            transformer.in_service = row.bool("in_service").unwrap_or(true);
            network.add_transformer(transformer)?;
            trafo_id += 1;
        }
        Ok(())
    })?;

    let mut line_id = 0usize;
    with_view(pp.line.as_ref(), |view| {
        for row in view.rows() {
            let idx = row.index();
            let from_bus = row.require_bus("from_bus", "line")?;
            let to_bus = row.require_bus("to_bus", "line")?;
            let name = row
                .string("name")
                .unwrap_or_else(|| format!("Line {}-{}", from_bus.value(), to_bus.value()));
            if !voltages.contains_key(&from_bus.value()) || !voltages.contains_key(&to_bus.value())
            {
                diag.warning_at(
                    Category::Reference,
                    &format!("line {idx} references an unknown bus"),
                    &name,
                );
                continue;
            }

            let mut line = Line::new(LineId::new(line_id), name, from_bus, to_bus)
                .with_length_km(row.f64("length_km").unwrap_or(1.0))
                .with_impedance(
                    row.f64("r_ohm_per_km").unwrap_or(0.0),
                    row.f64("x_ohm_per_km").unwrap_or(0.0),
                );
            line.r0_ohm_per_km = row.f64("r0_ohm_per_km");
            line.x0_ohm_per_km = row.f64("x0_ohm_per_km");
            line.parallel = row
                .usize("parallel")
                .and_then(|p| u32::try_from(p).ok())
                .unwrap_or(1)
                .max(1);
            if let Some(endtemp) = row.f64("endtemp_degree") {
                line.endtemp_degree = endtemp;
            }
            line.in_service = row.bool("in_service").unwrap_or(true);
            network.add_line(line)?;
            line_id += 1;
        }
        Ok(())
    })?;

    let mut load_id = 0usize;
    with_view(pp.load.as_ref(), |view| {
        for row in view.rows() {
            let idx = row.index();
            let bus = row.require_bus("bus", "load")?;
            let name = row.string("name").unwrap_or_else(|| format!("Load {idx}"));
            if !row.bool("in_service").unwrap_or(true) {
                debug!("skipping out-of-service load '{}'", name);
                continue;
            }
            if !voltages.contains_key(&bus.value()) {
                diag.warning_at(
                    Category::Reference,
                    &format!("references unknown {bus}"),
                    &name,
                );
                continue;
            }
            network.add_load(Load {
                id: LoadId::new(load_id),
                name,
                bus,
                p_mw: Megawatts(row.f64("p_mw").unwrap_or(0.0)),
                q_mvar: Megavars(row.f64("q_mvar").unwrap_or(0.0)),
            })?;
            load_id += 1;
        }
        Ok(())
    })?;

    let mut switch_id = 0usize;
    with_view(pp.switch.as_ref(), |view| {
        for row in view.rows() {
            let idx = row.index();
            let name = row.string("name").unwrap_or_else(|| format!("Switch {idx}"));
            // Line and transformer switches are folded into the element's in_service flag
            if row.string("et").as_deref() != Some("b") {
                debug!("ignoring non bus-bus switch '{}'", name);
                continue;
            }
            let bus = row.require_bus("bus", "switch")?;
            let element_bus = row.require_bus("element", "switch")?;
            if !voltages.contains_key(&bus.value()) || !voltages.contains_key(&element_bus.value())
            {
                diag.warning_at(
                    Category::Reference,
                    &format!("switch {idx} references an unknown bus"),
                    &name,
                );
                continue;
            }
            network.add_switch(Switch {
                id: SwitchId::new(switch_id),
                name,
                bus,
                element_bus,
                closed: row.bool("closed").unwrap_or(true),
            })?;
            switch_id += 1;
        }
        Ok(())
    })?;

    debug!("imported pandapower network: {}", network.stats());
    Ok(network)
}
