//! Circuit graph over the fixed meter/cell terminals and its voltage solver.
//!
//! The graph holds zero-weight wire edges and one signed battery edge per complete
//! cell. Solving enumerates every simple path from the negative meter terminal to
//! the positive one and reports the mean of the path sums. The averaging rule is an
//! approximation of mixed series/parallel networks and is kept as the game defines
//! it, not as a conductance model.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::chemistry::round2;
use super::state::{CellConfig, CellId, Team};

/// One of the six fixed circuit terminals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeId {
    #[serde(rename = "v_pos")]
    MeterPositive,
    #[serde(rename = "v_neg")]
    MeterNegative,
    #[serde(rename = "c1_L")]
    Cell1Left,
    #[serde(rename = "c1_R")]
    Cell1Right,
    #[serde(rename = "c2_L")]
    Cell2Left,
    #[serde(rename = "c2_R")]
    Cell2Right,
}

impl NodeId {
    pub const ALL: [NodeId; 6] = [
        NodeId::MeterPositive,
        NodeId::MeterNegative,
        NodeId::Cell1Left,
        NodeId::Cell1Right,
        NodeId::Cell2Left,
        NodeId::Cell2Right,
    ];

    pub fn index(self) -> usize {
        match self {
            NodeId::MeterPositive => 0,
            NodeId::MeterNegative => 1,
            NodeId::Cell1Left => 2,
            NodeId::Cell1Right => 3,
            NodeId::Cell2Left => 4,
            NodeId::Cell2Right => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeId::MeterPositive => "v_pos",
            NodeId::MeterNegative => "v_neg",
            NodeId::Cell1Left => "c1_L",
            NodeId::Cell1Right => "c1_R",
            NodeId::Cell2Left => "c2_L",
            NodeId::Cell2Right => "c2_R",
        }
    }

    /// Left and right terminals of a cell.
    pub fn terminals_of(cell: CellId) -> (NodeId, NodeId) {
        match cell {
            CellId::One => (NodeId::Cell1Left, NodeId::Cell1Right),
            CellId::Two => (NodeId::Cell2Left, NodeId::Cell2Right),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Player-made undirected connection between two terminals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wire {
    pub from: NodeId,
    pub to: NodeId,
}

impl Wire {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }

    /// True when both wires join the same pair, in either direction.
    pub fn same_edge(&self, other: &Wire) -> bool {
        (self.from == other.from && self.to == other.to)
            || (self.from == other.to && self.to == other.from)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum WireRejection {
    SelfLoop { node: NodeId },
    Duplicate { from: NodeId, to: NodeId },
    NodeFull { node: NodeId },
}

pub fn connections_at(wires: &[Wire], node: NodeId) -> usize {
    wires.iter().filter(|wire| wire.touches(node)).count()
}

/// Checks whether `candidate` may join `wires` without breaking the wiring rules.
pub fn check_wire(
    wires: &[Wire],
    candidate: Wire,
    max_per_node: usize,
) -> Result<(), WireRejection> {
    if candidate.from == candidate.to {
        return Err(WireRejection::SelfLoop {
            node: candidate.from,
        });
    }
    if wires.iter().any(|wire| wire.same_edge(&candidate)) {
        return Err(WireRejection::Duplicate {
            from: candidate.from,
            to: candidate.to,
        });
    }
    for node in [candidate.from, candidate.to] {
        if connections_at(wires, node) >= max_per_node {
            return Err(WireRejection::NodeFull { node });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    to: usize,
    weight: f64,
}

struct Frame {
    node: usize,
    next_edge: usize,
    voltage: f64,
}

/// Weighted undirected multigraph. Parallel edges between the same pair of
/// nodes are kept distinct and each yields its own paths.
#[derive(Debug, Clone)]
pub struct CircuitGraph {
    adjacency: Vec<Vec<Edge>>,
}

impl CircuitGraph {
    pub fn with_nodes(node_count: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); node_count],
        }
    }

    pub fn build(cells: [&CellConfig; 2], wires: &[Wire]) -> Self {
        let mut graph = Self::with_nodes(NodeId::ALL.len());
        for wire in wires {
            graph.add_edge(wire.from.index(), wire.to.index(), 0.0);
        }
        for cell in cells {
            // Open cells conduct nothing: no edge at all, not a zero-volt edge.
            if let Some(weight) = cell.voltage() {
                let (left, right) = NodeId::terminals_of(cell.id);
                graph.add_edge(left.index(), right.index(), weight);
            }
        }
        graph
    }

    pub fn from_team(team: &Team) -> Self {
        Self::build([&team.cell1, &team.cell2], &team.wires)
    }

    /// Adds `weight` for `a -> b` traversal and `-weight` for `b -> a`.
    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) {
        self.adjacency[a].push(Edge { to: b, weight });
        self.adjacency[b].push(Edge {
            to: a,
            weight: -weight,
        });
    }

    /// Signed voltage sum of every simple path from `start` to `goal`.
    pub fn path_sums(&self, start: usize, goal: usize) -> Vec<f64> {
        let mut sums = Vec::new();
        let mut visited = vec![false; self.adjacency.len()];
        let mut stack = vec![Frame {
            node: start,
            next_edge: 0,
            voltage: 0.0,
        }];
        visited[start] = true;

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            if node == goal {
                sums.push(frame.voltage);
                visited[node] = false;
                stack.pop();
                continue;
            }

            match self.adjacency[node].get(frame.next_edge) {
                Some(edge) => {
                    frame.next_edge += 1;
                    if !visited[edge.to] {
                        let voltage = frame.voltage + edge.weight;
                        visited[edge.to] = true;
                        stack.push(Frame {
                            node: edge.to,
                            next_edge: 0,
                            voltage,
                        });
                    }
                }
                None => {
                    visited[node] = false;
                    stack.pop();
                }
            }
        }

        sums
    }

    /// Net meter voltage; 0 when the meter terminals are not connected.
    pub fn solve(&self) -> f64 {
        let sums = self.path_sums(
            NodeId::MeterNegative.index(),
            NodeId::MeterPositive.index(),
        );
        if sums.is_empty() {
            return 0.0;
        }
        let total: f64 = sums.iter().sum();
        round2(total / sums.len() as f64)
    }
}

/// Net voltage a team's meter reads.
pub fn solve(team: &Team) -> f64 {
    CircuitGraph::from_team(team).solve()
}

const BROKEN_EPSILON: f64 = 0.01;
const MATCH_TOLERANCE: f64 = 0.05;

/// Informational label inferred from the solved voltage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConnectionType {
    #[default]
    Broken,
    Series,
    Parallel,
    ReverseSeries,
    Custom,
}

impl ConnectionType {
    pub fn classify(v1: f64, v2: f64, total: f64) -> Self {
        let close = |expected: f64| (total - expected).abs() < MATCH_TOLERANCE;
        if total.abs() < BROKEN_EPSILON {
            ConnectionType::Broken
        } else if close(v1 + v2) {
            ConnectionType::Series
        } else if close((v1 + v2) / 2.0) {
            ConnectionType::Parallel
        } else if close(v1 - v2) || close(v2 - v1) {
            ConnectionType::ReverseSeries
        } else {
            ConnectionType::Custom
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionType::Broken => "Broken Circuit",
            ConnectionType::Series => "Series (串聯)",
            ConnectionType::Parallel => "Parallel (並聯)",
            ConnectionType::ReverseSeries => "Reverse Series (反接)",
            ConnectionType::Custom => "Custom / Complex",
        }
    }
}

/// Human-readable working shown next to a history snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalculationLog {
    pub cell1_math: String,
    pub cell2_math: String,
    pub total_math: String,
    pub connection_type: ConnectionType,
}

fn cell_math(cell: &CellConfig) -> String {
    match (cell.effective_left(), cell.effective_right(), cell.voltage()) {
        (Some(left), Some(right), Some(voltage)) => {
            let reversed = if cell.flipped { " [REVERSED]" } else { "" };
            format!(
                "{right}({}) - {left}({}) = {voltage:.2}V{reversed}",
                right.potential(),
                left.potential()
            )
        }
        _ => "Empty".to_string(),
    }
}

pub fn explain(cell1: &CellConfig, cell2: &CellConfig, total: f64) -> CalculationLog {
    let v1 = cell1.voltage().unwrap_or(0.0);
    let v2 = cell2.voltage().unwrap_or(0.0);
    let connection_type = ConnectionType::classify(v1, v2, total);
    let total_math = match connection_type {
        ConnectionType::Broken => "No valid path (0V)".to_string(),
        ConnectionType::Series => format!("{v1:.2} + {v2:.2} = {total:.2}V"),
        ConnectionType::Parallel => format!("({v1:.2} + {v2:.2}) ÷ 2 = {total:.2}V"),
        ConnectionType::ReverseSeries => format!("{v1:.2} - {v2:.2} = {total:.2}V"),
        ConnectionType::Custom => format!("Circuit Result: {total:.2}V"),
    };
    CalculationLog {
        cell1_math: cell_math(cell1),
        cell2_math: cell_math(cell2),
        total_math,
        connection_type,
    }
}
