//! Visibility-graph pathfinder with path memoization.
//!
//! The arena is sampled on a grid. Open cells that border a blocked cell
//! hug the obstacles; together with the goal they become the graph points.
//! Two points are joined when the straight segment between them misses
//! every obstacle. The graph lives in a petgraph `Graph` and is rebuilt
//! whenever the layout changes.
//!
//! Queries run A* from a temporary start point. Every successful search
//! records, for each graph point on the path, the remaining route to the
//! goal. Later searches that reach a memoized point can splice that route
//! in, and they do so as soon as the splice is the cheapest frontier entry.

use flock_core::error::{FlockError, Result};
use flock_core::geometry::Shape;
use flock_core::types::{LayoutId, Vec2};
use flock_core::world::WorldSnapshot;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::debug;

/// Pathfinder tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    /// Spacing of the sampling grid in arena units.
    pub grid_step: f64,
    /// Probe radius as a multiple of the largest agent size.
    pub probe_scale: f64,
    /// Searches give up once `f` exceeds this multiple of the arena perimeter.
    pub bound_factor: f64,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            grid_step: 1.0,
            probe_scale: 1.0,
            bound_factor: 1.0,
        }
    }
}

impl PathfinderConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.grid_step.is_finite() && self.grid_step > 0.0) {
            return Err(FlockError::invalid_value(
                "pathfinder.grid_step",
                self.grid_step,
                "must be positive",
            ));
        }
        if !(self.probe_scale.is_finite() && self.probe_scale >= 0.0) {
            return Err(FlockError::invalid_value(
                "pathfinder.probe_scale",
                self.probe_scale,
                "must be non-negative",
            ));
        }
        if !(self.bound_factor.is_finite() && self.bound_factor > 0.0) {
            return Err(FlockError::invalid_value(
                "pathfinder.bound_factor",
                self.bound_factor,
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Remaining route from a graph point to the goal.
#[derive(Debug, Clone)]
struct MemoEntry {
    /// Starts at the memoized point, ends at the goal.
    nodes: Vec<NodeIndex>,
    distance: f64,
}

/// Counters for one pathfinder lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PathfinderStats {
    pub rebuilds: u64,
    pub queries: u64,
    pub direct: u64,
    pub memo_splices: u64,
    pub failures: u64,
}

/// One step of a partial route; `node == None` is the start point.
#[derive(Debug, Clone, Copy)]
struct TrailStep {
    node: Option<NodeIndex>,
    parent: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Frontier {
    f: f64,
    g: f64,
    splice: bool,
    seq: u64,
    trail: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    // BinaryHeap pops the greatest: lowest f, then splices, then oldest.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| self.splice.cmp(&other.splice))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Visibility-graph pathfinder.
pub struct Pathfinder {
    config: PathfinderConfig,
    graph: Graph<Vec2, f64, petgraph::Undirected>,
    goal: Option<NodeIndex>,
    obstacles: Vec<Shape>,
    bound: f64,
    layout: Option<LayoutId>,
    memo: HashMap<NodeIndex, MemoEntry>,
    stats: PathfinderStats,
}

impl Pathfinder {
    pub fn new(config: PathfinderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            graph: Graph::new_undirected(),
            goal: None,
            obstacles: Vec::new(),
            bound: 0.0,
            layout: None,
            memo: HashMap::new(),
            stats: PathfinderStats::default(),
        })
    }

    /// Rebuild the graph for the world's current layout and clear the memo.
    pub fn initialize(&mut self, world: &WorldSnapshot) {
        self.graph.clear();
        self.memo.clear();
        self.obstacles = world.obstacles.clone();
        self.bound = self.config.bound_factor * world.bounds.perimeter();
        self.layout = Some(world.layout);

        let step = self.config.grid_step;
        let probe = self.config.probe_scale * world.max_agent_size();
        let cols = (world.bounds.width / step).floor() as usize;
        let rows = (world.bounds.height / step).floor() as usize;
        let goal = world.goal;

        let mut open = vec![false; cols * rows];
        for ix in 0..cols {
            for iy in 0..rows {
                let p = Vec2::new(ix as f64 * step, iy as f64 * step);
                open[ix * rows + iy] = p.distance_to(goal.position) < goal.radius
                    || !self.obstacles.iter().any(|o| o.overlaps_circle(p, probe));
            }
        }

        let blocked = |x: usize, y: usize| !open[x * rows + y];
        for ix in 1..cols.saturating_sub(1) {
            for iy in 1..rows.saturating_sub(1) {
                if blocked(ix, iy) {
                    continue;
                }
                let hugs_obstacle = (ix - 1..=ix + 1)
                    .any(|nx| (iy - 1..=iy + 1).any(|ny| blocked(nx, ny)));
                if hugs_obstacle {
                    self.add_point(Vec2::new(ix as f64 * step, iy as f64 * step));
                }
            }
        }
        self.goal = Some(self.add_point(goal.position));
        self.stats.rebuilds += 1;

        debug!(
            layout = world.layout.0,
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "Visibility graph rebuilt"
        );
    }

    // New node joined to every existing node it can see.
    fn add_point(&mut self, position: Vec2) -> NodeIndex {
        let visible: Vec<(NodeIndex, f64)> = self
            .graph
            .node_indices()
            .filter_map(|other| {
                let p = self.graph[other];
                self.clear_line(position, p)
                    .then(|| (other, position.distance_to(p)))
            })
            .collect();
        let idx = self.graph.add_node(position);
        for (other, weight) in visible {
            self.graph.add_edge(idx, other, weight);
        }
        idx
    }

    fn clear_line(&self, a: Vec2, b: Vec2) -> bool {
        !self.obstacles.iter().any(|o| o.intersects_segment(a, b))
    }

    /// Waypoints from `from` to the goal, starting with `from`.
    ///
    /// Returns an empty path when the goal cannot be reached within the
    /// search bound, or before the first `initialize`.
    pub fn calculate_path(&mut self, from: Vec2) -> Vec<Vec2> {
        self.stats.queries += 1;
        let Some(goal) = self.goal else {
            return Vec::new();
        };
        let goal_pos = self.graph[goal];

        if self.clear_line(from, goal_pos) {
            self.stats.direct += 1;
            return vec![from, goal_pos];
        }

        let mut trail = vec![TrailStep {
            node: None,
            parent: None,
        }];
        let mut open = BinaryHeap::new();
        let mut best_g: HashMap<NodeIndex, f64> = HashMap::new();
        let mut closed: HashSet<NodeIndex> = HashSet::new();
        let mut seq = 0u64;

        // The start point is never added to the graph; its edges are
        // computed here.
        let start_edges: Vec<(NodeIndex, f64)> = self
            .graph
            .node_indices()
            .filter_map(|n| {
                let p = self.graph[n];
                self.clear_line(from, p).then(|| (n, from.distance_to(p)))
            })
            .collect();
        for (node, g) in start_edges {
            self.push_frontier(&mut open, &mut trail, &mut best_g, &mut seq, node, g, 0, goal_pos);
        }

        while let Some(entry) = open.pop() {
            if entry.f > self.bound {
                break;
            }
            let Some(node) = trail[entry.trail].node else {
                continue;
            };

            if entry.splice {
                let mut nodes = self.trail_nodes(&trail, entry.trail);
                if let Some(memo) = self.memo.get(&node) {
                    nodes.extend_from_slice(&memo.nodes[1..]);
                }
                self.stats.memo_splices += 1;
                self.remember(&nodes);
                return self.positions(from, &nodes);
            }

            if !closed.insert(node) {
                continue;
            }
            if node == goal {
                let nodes = self.trail_nodes(&trail, entry.trail);
                self.remember(&nodes);
                return self.positions(from, &nodes);
            }

            let edges: Vec<(NodeIndex, f64)> = self
                .graph
                .edges(node)
                .map(|e| {
                    let other = if e.source() == node { e.target() } else { e.source() };
                    (other, *e.weight())
                })
                .collect();
            for (next, weight) in edges {
                if closed.contains(&next) {
                    continue;
                }
                self.push_frontier(
                    &mut open,
                    &mut trail,
                    &mut best_g,
                    &mut seq,
                    next,
                    entry.g + weight,
                    entry.trail,
                    goal_pos,
                );
            }
        }

        self.stats.failures += 1;
        debug!(x = from.x, y = from.y, "No path to goal within search bound");
        Vec::new()
    }

    #[allow(clippy::too_many_arguments)]
    fn push_frontier(
        &self,
        open: &mut BinaryHeap<Frontier>,
        trail: &mut Vec<TrailStep>,
        best_g: &mut HashMap<NodeIndex, f64>,
        seq: &mut u64,
        node: NodeIndex,
        g: f64,
        parent: usize,
        goal_pos: Vec2,
    ) {
        if best_g.get(&node).is_some_and(|&known| known <= g) {
            return;
        }
        best_g.insert(node, g);
        trail.push(TrailStep {
            node: Some(node),
            parent: Some(parent),
        });
        let at = trail.len() - 1;

        *seq += 1;
        open.push(Frontier {
            f: g + self.graph[node].distance_to(goal_pos),
            g,
            splice: false,
            seq: *seq,
            trail: at,
        });
        if let Some(memo) = self.memo.get(&node) {
            *seq += 1;
            open.push(Frontier {
                f: g + memo.distance,
                g,
                splice: true,
                seq: *seq,
                trail: at,
            });
        }
    }

    // Graph nodes from the first waypoint after the start up to `at`.
    fn trail_nodes(&self, trail: &[TrailStep], at: usize) -> Vec<NodeIndex> {
        let mut nodes = Vec::new();
        let mut cursor = Some(at);
        while let Some(i) = cursor {
            if let Some(node) = trail[i].node {
                nodes.push(node);
            }
            cursor = trail[i].parent;
        }
        nodes.reverse();
        nodes
    }

    fn positions(&self, from: Vec2, nodes: &[NodeIndex]) -> Vec<Vec2> {
        std::iter::once(from)
            .chain(nodes.iter().map(|n| self.graph[*n]))
            .collect()
    }

    /// Record the remaining route for every point of a goal-terminated
    /// node list, walking back from the goal. Shorter entries win.
    fn remember(&mut self, nodes: &[NodeIndex]) {
        let mut distance = 0.0;
        for i in (0..nodes.len()).rev() {
            if i + 1 < nodes.len() {
                distance += self.graph[nodes[i]].distance_to(self.graph[nodes[i + 1]]);
            }
            let keep = self
                .memo
                .get(&nodes[i])
                .is_some_and(|existing| existing.distance <= distance);
            if !keep {
                self.memo.insert(
                    nodes[i],
                    MemoEntry {
                        nodes: nodes[i..].to_vec(),
                        distance,
                    },
                );
            }
        }
    }

    pub fn layout(&self) -> Option<LayoutId> {
        self.layout
    }

    pub fn is_initialized(&self) -> bool {
        self.goal.is_some()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    pub fn stats(&self) -> PathfinderStats {
        self.stats
    }

    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }
}

/// Total length of a polyline.
pub fn path_length(path: &[Vec2]) -> f64 {
    path.windows(2).map(|w| w[0].distance_to(w[1])).sum()
}
