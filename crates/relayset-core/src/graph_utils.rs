use crate::{BusId, Edge, Network, Node};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

/// One electrically connected group of buses.
#[derive(Debug, Clone)]
pub struct IslandSummary {
    pub island_id: usize,
    pub bus_count: usize,
    /// Whether an in-service external grid feeds the island
    pub has_source: bool,
}

/// Bus to island tag, for `validate` output.
#[derive(Debug, Clone)]
pub struct BusAssignment {
    pub bus_id: BusId,
    pub label: String,
    pub island_id: usize,
}

#[derive(Debug, Clone)]
pub struct IslandAnalysis {
    pub islands: Vec<IslandSummary>,
    pub assignments: Vec<BusAssignment>,
}

impl IslandAnalysis {
    pub fn unfed_islands(&self) -> impl Iterator<Item = &IslandSummary> {
        self.islands.iter().filter(|island| !island.has_source)
    }
}

/// Buses grouped into electrical nodes.
///
/// Buses joined by a closed bus-bus switch share one node. Node indices are
/// dense (`0..node_count`) and assigned in bus insertion order.
#[derive(Debug, Clone, Default)]
pub struct ElectricalNodes {
    index: HashMap<BusId, usize>,
    node_count: usize,
}

impl ElectricalNodes {
    pub fn node_of(&self, bus: BusId) -> Option<usize> {
        self.index.get(&bus).copied()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }
}

fn bus_id_at(network: &Network, idx: NodeIndex) -> Option<BusId> {
    match &network.graph[idx] {
        Node::Bus(bus) => Some(bus.id),
        _ => None,
    }
}

/// Breadth-first walk over conducting edges starting at `start`.
fn reachable_buses(network: &Network, start: NodeIndex, visited: &mut HashSet<NodeIndex>) -> Vec<NodeIndex> {
    let mut members = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(start);
    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        members.push(node);
        for edge in network.graph.edges(node) {
            if !edge.weight().conducts() {
                continue;
            }
            let next = if edge.source() == node {
                edge.target()
            } else {
                edge.source()
            };
            if !visited.contains(&next) {
                queue.push_back(next);
            }
        }
    }
    members
}

/// Buses with a conducting path to at least one in-service external grid.
pub fn energized_buses(network: &Network) -> HashSet<BusId> {
    let mut visited = HashSet::new();
    let mut energized = HashSet::new();
    for grid in network.external_grids() {
        if !grid.in_service {
            continue;
        }
        let Some(start) = network.bus_node(grid.bus) else {
            continue;
        };
        for node in reachable_buses(network, start, &mut visited) {
            if let Some(id) = bus_id_at(network, node) {
                energized.insert(id);
            }
        }
    }
    energized
}

/// Merge buses connected through closed switches into shared nodes.
pub fn electrical_nodes(network: &Network) -> ElectricalNodes {
    let buses = network.buses();
    let position: HashMap<BusId, usize> = buses
        .iter()
        .enumerate()
        .map(|(i, bus)| (bus.id, i))
        .collect();

    let mut parent: Vec<usize> = (0..buses.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for edge in network.graph.edge_weights() {
        if let Edge::Switch(sw) = edge {
            if !sw.closed {
                continue;
            }
            if let (Some(&a), Some(&b)) = (position.get(&sw.bus), position.get(&sw.element_bus)) {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    // Keep the earlier bus as representative so numbering follows insertion order
                    let (keep, drop) = if ra < rb { (ra, rb) } else { (rb, ra) };
                    parent[drop] = keep;
                }
            }
        }
    }

    let mut dense = HashMap::new();
    let mut index = HashMap::new();
    for (i, bus) in buses.iter().enumerate() {
        let root = find(&mut parent, i);
        let next = dense.len();
        let node = *dense.entry(root).or_insert(next);
        index.insert(bus.id, node);
    }

    ElectricalNodes {
        index,
        node_count: dense.len(),
    }
}

/// Labels bus islands (breadth-first search over conducting edges) and flags
/// the ones without a source.
pub fn find_islands(network: &Network) -> IslandAnalysis {
    let fed: HashSet<BusId> = network
        .external_grids()
        .iter()
        .filter(|g| g.in_service)
        .map(|g| g.bus)
        .collect();

    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    let mut assignments = Vec::new();

    for start in network.graph.node_indices() {
        if visited.contains(&start) || bus_id_at(network, start).is_none() {
            continue;
        }
        let island_id = islands.len();
        let members = reachable_buses(network, start, &mut visited);
        let mut has_source = false;
        let mut bus_count = 0;
        for node in members {
            if let Node::Bus(bus) = &network.graph[node] {
                bus_count += 1;
                has_source |= fed.contains(&bus.id);
                assignments.push(BusAssignment {
                    bus_id: bus.id,
                    label: bus.name.clone(),
                    island_id,
                });
            }
        }
        islands.push(IslandSummary {
            island_id,
            bus_count,
            has_source,
        });
    }

    assignments.sort_by_key(|a| a.bus_id);
    IslandAnalysis {
        islands,
        assignments,
    }
}
