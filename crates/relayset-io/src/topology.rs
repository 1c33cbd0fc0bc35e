//! Native topology documents.
//!
//! A topology document lists the elements of one network in YAML or JSON.
//! Buses are referenced either by their numeric id or by their name:
//!
//! ```yaml
//! name: Refinery substation
//! buses:
//!   - { id: 0, name: 35kV Main Bus, vn_kv: 35 }
//!   - { id: 2, name: 6.3kV Bus 1, vn_kv: 6.3 }
//! external_grids:
//!   - { name: Utility, bus: 35kV Main Bus, ikss_max_ka: 6.72, ikss_min_ka: 3.35 }
//! transformers:
//!   - name: Transformer 1
//!     hv_bus: 0
//!     lv_bus: 2
//!     sn_mva: 25
//!     vn_hv_kv: 35
//!     vn_lv_kv: 6.3
//!     vk_percent: 8.16
//!     vkr_percent: 0.5
//!     vector_group: Dyn11
//! ```
//!
//! Bus ids default to the position in the `buses` list.

use std::{collections::HashMap, fmt, fs, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use relayset_core::{
    Bus, BusId, ExtGridId, ExternalGrid, Kiloamperes, Kilovolts, Line, LineId, Load, LoadId,
    MegavoltAmperes, Megavars, Megawatts, Network, Switch, SwitchId, Transformer, TransformerId,
    VectorGroup,
};
use serde::{Deserialize, Serialize};

/// Reference to a bus by id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BusRef {
    Id(usize),
    Name(String),
}

impl fmt::Display for BusRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusRef::Id(id) => write!(f, "{id}"),
            BusRef::Name(name) => write!(f, "'{name}'"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub buses: Vec<BusSpec>,
    #[serde(default)]
    pub external_grids: Vec<ExternalGridSpec>,
    #[serde(default)]
    pub transformers: Vec<TransformerSpec>,
    #[serde(default)]
    pub lines: Vec<LineSpec>,
    #[serde(default)]
    pub loads: Vec<LoadSpec>,
    #[serde(default)]
    pub switches: Vec<SwitchSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<usize>,
    pub name: String,
    pub vn_kv: f64,
    #[serde(default = "default_true")]
    pub in_service: bool,
}

/// Source at a bus.
///
/// The short-circuit power is given either directly (`s_sc_*_mva`) or as the
/// three-phase current it delivers at its bus (`ikss_*_ka`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalGridSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub bus: BusRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_sc_max_mva: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_sc_min_mva: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ikss_max_ka: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ikss_min_ka: Option<f64>,
    #[serde(default = "default_rx")]
    pub rx_max: f64,
    #[serde(default = "default_rx")]
    pub rx_min: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x0x_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x0x_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r0x0_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r0x0_min: Option<f64>,
    #[serde(default = "default_true")]
    pub in_service: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerSpec {
    pub name: String,
    pub hv_bus: BusRef,
    pub lv_bus: BusRef,
    pub sn_mva: f64,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    pub vk_percent: f64,
    pub vkr_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vk0_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vkr0_percent: Option<f64>,
    #[serde(default = "default_vector_group")]
    pub vector_group: String,
    #[serde(default = "default_true")]
    pub in_service: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSpec {
    pub name: String,
    pub from_bus: BusRef,
    pub to_bus: BusRef,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r0_ohm_per_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x0_ohm_per_km: Option<f64>,
    #[serde(default = "default_parallel")]
    pub parallel: u32,
    #[serde(default = "default_endtemp")]
    pub endtemp_degree: f64,
    #[serde(default = "default_true")]
    pub in_service: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub bus: BusRef,
    #[serde(default)]
    pub p_mw: f64,
    #[serde(default)]
    pub q_mvar: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub bus: BusRef,
    pub element_bus: BusRef,
    #[serde(default = "default_true")]
    pub closed: bool,
}

fn default_true() -> bool {
    true
}

fn default_rx() -> f64 {
    0.1
}

fn default_vector_group() -> String {
    VectorGroup::default().as_str().to_string()
}

fn default_parallel() -> u32 {
    1
}

fn default_endtemp() -> f64 {
    20.0
}

/// Resolves [`BusRef`]s against the declared buses.
struct BusIndex {
    ids: HashMap<usize, Kilovolts>,
    names: HashMap<String, Vec<usize>>,
}

impl BusIndex {
    fn resolve(&self, bus: &BusRef) -> Result<BusId> {
        match bus {
            BusRef::Id(id) if self.ids.contains_key(id) => Ok(BusId::new(*id)),
            BusRef::Id(id) => Err(anyhow!("unknown bus id {id}")),
            BusRef::Name(name) => match self.names.get(name).map(Vec::as_slice) {
                Some([id]) => Ok(BusId::new(*id)),
                Some(_) => Err(anyhow!("bus name '{name}' is ambiguous; use the bus id")),
                None => Err(anyhow!("unknown bus '{name}'")),
            },
        }
    }

    fn voltage(&self, bus: BusId) -> Kilovolts {
        self.ids.get(&bus.value()).copied().unwrap_or(Kilovolts(0.0))
    }
}

impl TopologyDocument {
    /// Build the network graph. Every reference must resolve.
    pub fn to_network(&self) -> Result<Network> {
        let mut network = Network::new();
        let mut index = BusIndex {
            ids: HashMap::with_capacity(self.buses.len()),
            names: HashMap::new(),
        };

        for (position, spec) in self.buses.iter().enumerate() {
            let id = spec.id.unwrap_or(position);
            if index.ids.insert(id, Kilovolts(spec.vn_kv)).is_some() {
                bail!("bus id {id} is declared twice");
            }
            index.names.entry(spec.name.clone()).or_default().push(id);
            let mut bus = Bus::new(BusId::new(id), spec.name.clone(), Kilovolts(spec.vn_kv));
            bus.in_service = spec.in_service;
            network.add_bus(bus);
        }

        for (i, spec) in self.external_grids.iter().enumerate() {
            let name = spec
                .name
                .clone()
                .unwrap_or_else(|| format!("Grid {}", i + 1));
            let grid = spec
                .build(ExtGridId::new(i), &name, &index)
                .with_context(|| format!("external grid '{name}'"))?;
            network.add_external_grid(grid)?;
        }

        for (i, spec) in self.transformers.iter().enumerate() {
            let transformer = spec
                .build(TransformerId::new(i), &index)
                .with_context(|| format!("transformer '{}'", spec.name))?;
            network.add_transformer(transformer)?;
        }

        for (i, spec) in self.lines.iter().enumerate() {
            let line = spec
                .build(LineId::new(i), &index)
                .with_context(|| format!("line '{}'", spec.name))?;
            network.add_line(line)?;
        }

        for (i, spec) in self.loads.iter().enumerate() {
            let name = spec
                .name
                .clone()
                .unwrap_or_else(|| format!("Load {}", i + 1));
            let bus = index
                .resolve(&spec.bus)
                .with_context(|| format!("load '{name}'"))?;
            network.add_load(Load {
                id: LoadId::new(i),
                name,
                bus,
                p_mw: Megawatts(spec.p_mw),
                q_mvar: Megavars(spec.q_mvar),
            })?;
        }

        for (i, spec) in self.switches.iter().enumerate() {
            let name = spec
                .name
                .clone()
                .unwrap_or_else(|| format!("Switch {}", i + 1));
            let bus = index
                .resolve(&spec.bus)
                .with_context(|| format!("switch '{name}'"))?;
            let element_bus = index
                .resolve(&spec.element_bus)
                .with_context(|| format!("switch '{name}'"))?;
            network.add_switch(Switch {
                id: SwitchId::new(i),
                name,
                bus,
                element_bus,
                closed: spec.closed,
            })?;
        }

        Ok(network)
    }

    /// Describe an existing network. Buses are referenced by id.
    pub fn from_network(network: &Network, name: Option<String>) -> Self {
        let bus_ref = |id: BusId| BusRef::Id(id.value());
        Self {
            name,
            buses: network
                .buses()
                .into_iter()
                .map(|bus| BusSpec {
                    id: Some(bus.id.value()),
                    name: bus.name.clone(),
                    vn_kv: bus.vn_kv.value(),
                    in_service: bus.in_service,
                })
                .collect(),
            external_grids: network
                .external_grids()
                .into_iter()
                .map(|grid| ExternalGridSpec {
                    name: Some(grid.name.clone()),
                    bus: bus_ref(grid.bus),
                    s_sc_max_mva: Some(grid.s_sc_max.value()),
                    s_sc_min_mva: Some(grid.s_sc_min.value()),
                    ikss_max_ka: None,
                    ikss_min_ka: None,
                    rx_max: grid.rx_max,
                    rx_min: grid.rx_min,
                    x0x_max: grid.x0x_max,
                    x0x_min: grid.x0x_min,
                    r0x0_max: grid.r0x0_max,
                    r0x0_min: grid.r0x0_min,
                    in_service: grid.in_service,
                })
                .collect(),
            transformers: network
                .transformers()
                .into_iter()
                .map(|tx| TransformerSpec {
                    name: tx.name.clone(),
                    hv_bus: bus_ref(tx.hv_bus),
                    lv_bus: bus_ref(tx.lv_bus),
                    sn_mva: tx.sn_mva.value(),
                    vn_hv_kv: tx.vn_hv_kv.value(),
                    vn_lv_kv: tx.vn_lv_kv.value(),
                    vk_percent: tx.vk_percent,
                    vkr_percent: tx.vkr_percent,
                    vk0_percent: tx.vk0_percent,
                    vkr0_percent: tx.vkr0_percent,
                    vector_group: tx.vector_group.as_str().to_string(),
                    in_service: tx.in_service,
                })
                .collect(),
            lines: network
                .lines()
                .into_iter()
                .map(|line| LineSpec {
                    name: line.name.clone(),
                    from_bus: bus_ref(line.from_bus),
                    to_bus: bus_ref(line.to_bus),
                    length_km: line.length_km,
                    r_ohm_per_km: line.r_ohm_per_km,
                    x_ohm_per_km: line.x_ohm_per_km,
                    r0_ohm_per_km: line.r0_ohm_per_km,
                    x0_ohm_per_km: line.x0_ohm_per_km,
                    parallel: line.parallel,
                    endtemp_degree: line.endtemp_degree,
                    in_service: line.in_service,
                })
                .collect(),
            loads: network
                .loads()
                .into_iter()
                .map(|load| LoadSpec {
                    name: Some(load.name.clone()),
                    bus: bus_ref(load.bus),
                    p_mw: load.p_mw.value(),
                    q_mvar: load.q_mvar.value(),
                })
                .collect(),
            switches: network
                .switches()
                .into_iter()
                .map(|sw| SwitchSpec {
                    name: Some(sw.name.clone()),
                    bus: bus_ref(sw.bus),
                    element_bus: bus_ref(sw.element_bus),
                    closed: sw.closed,
                })
                .collect(),
        }
    }
}

impl ExternalGridSpec {
    fn build(&self, id: ExtGridId, name: &str, index: &BusIndex) -> Result<ExternalGrid> {
        let bus = index.resolve(&self.bus)?;
        let vn = index.voltage(bus);
        let power = |mva: Option<f64>, ka: Option<f64>, case: &str| match (mva, ka) {
            (Some(mva), _) => Ok(MegavoltAmperes(mva)),
            (None, Some(ka)) => Ok(MegavoltAmperes::from_fault_current(vn, Kiloamperes(ka))),
            (None, None) => Err(anyhow!(
                "needs s_sc_{case}_mva or ikss_{case}_ka"
            )),
        };
        let s_max = power(self.s_sc_max_mva, self.ikss_max_ka, "max")?;
        let s_min = power(self.s_sc_min_mva, self.ikss_min_ka, "min")?;

        let mut grid = ExternalGrid::new(id, name, bus, s_max, s_min).with_rx(self.rx_max, self.rx_min);
        grid.x0x_max = self.x0x_max;
        grid.x0x_min = self.x0x_min.or(self.x0x_max);
        grid.r0x0_max = self.r0x0_max;
        grid.r0x0_min = self.r0x0_min.or(self.r0x0_max);
        grid.in_service = self.in_service;
        Ok(grid)
    }
}

impl TransformerSpec {
    fn build(&self, id: TransformerId, index: &BusIndex) -> Result<Transformer> {
        let hv_bus = index.resolve(&self.hv_bus)?;
        let lv_bus = index.resolve(&self.lv_bus)?;
        let vector_group: VectorGroup = self.vector_group.parse()?;
        let mut transformer = Transformer::new(id, self.name.clone(), hv_bus, lv_bus)
            .with_rating(self.sn_mva, self.vn_hv_kv, self.vn_lv_kv)
            .with_short_circuit_voltage(self.vk_percent, self.vkr_percent)
            .with_vector_group(vector_group);
        transformer.vk0_percent = self.vk0_percent;
        transformer.vkr0_percent = self.vkr0_percent;
        transformer.in_service = self.in_service;
        Ok(transformer)
    }
}

impl LineSpec {
    fn build(&self, id: LineId, index: &BusIndex) -> Result<Line> {
        let from_bus = index.resolve(&self.from_bus)?;
        let to_bus = index.resolve(&self.to_bus)?;
        if self.parallel == 0 {
            bail!("parallel must be at least 1");
        }
        let mut line = Line::new(id, self.name.clone(), from_bus, to_bus)
            .with_length_km(self.length_km)
            .with_impedance(self.r_ohm_per_km, self.x_ohm_per_km)
            .with_endtemp(self.endtemp_degree);
        line.r0_ohm_per_km = self.r0_ohm_per_km;
        line.x0_ohm_per_km = self.x0_ohm_per_km;
        line.parallel = self.parallel;
        line.in_service = self.in_service;
        Ok(line)
    }
}

/// Read a topology document; YAML or JSON is chosen by extension.
pub fn load_topology_document(path: &Path) -> Result<TopologyDocument> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading topology '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing topology yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing topology json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing topology"),
    }
}

pub fn load_topology(path: &Path) -> Result<Network> {
    load_topology_document(path)?
        .to_network()
        .with_context(|| format!("building network from '{}'", path.display()))
}

/// Write a topology document; JSON for `.json`, YAML otherwise.
pub fn save_topology_document(document: &TopologyDocument, path: &Path) -> Result<()> {
    let data = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::to_string_pretty(document).context("serializing topology json")?
        }
        _ => serde_yaml::to_string(document).context("serializing topology yaml")?,
    };
    fs::write(path, data).with_context(|| format!("writing topology '{}'", path.display()))
}
