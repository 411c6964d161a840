//! Accessibility-filtered shortest-path search
//!
//! Dijkstra over any graph exposing its outgoing hops. Costs are ordered
//! lexicographically by (total weight, floor transitions), so among equally
//! short paths the one with fewer floor changes wins; remaining ties keep the
//! path discovered first, because relaxation only replaces strictly better
//! costs and the heap breaks ties by push order.

use crate::domain::route::EdgeRef;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Debug;
use std::hash::Hash;

/// One traversable edge leaving a node
#[derive(Debug, Clone, Copy)]
pub struct Hop<N> {
    pub to: N,
    pub edge: EdgeRef,
    pub weight: f64,
    pub accessibility: u8,
    pub floor_change: bool,
}

impl<N> Hop<N> {
    /// Hard minimum-rating filter: 0 admits every edge, 100 only fully accessible ones
    #[inline]
    pub fn admits(&self, min_accessibility: u8) -> bool {
        self.accessibility >= min_accessibility
    }
}

pub trait SearchGraph {
    type Node: Copy + Eq + Hash + Debug;

    fn contains(&self, node: Self::Node) -> bool;

    /// Append the hops leaving `node` to `out`
    fn hops(&self, node: Self::Node, out: &mut Vec<Hop<Self::Node>>);
}

/// A found path
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPath<N> {
    pub nodes: Vec<N>,
    /// `edges[i]` joins `nodes[i]` and `nodes[i + 1]`
    pub edges: Vec<EdgeRef>,
    pub cost: f64,
    pub transitions: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost {
    weight: f64,
    transitions: u32,
}

impl Cost {
    const ZERO: Cost = Cost { weight: 0.0, transitions: 0 };

    fn cmp(&self, other: &Cost) -> Ordering {
        self.weight.total_cmp(&other.weight).then(self.transitions.cmp(&other.transitions))
    }
}

#[derive(Debug)]
struct State<N> {
    cost: Cost,
    seq: u64,
    node: N,
}

impl<N> PartialEq for State<N> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<N> Eq for State<N> {}

impl<N> Ord for State<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap behavior; earlier pushes pop first on ties
        other.cost.cmp(&self.cost).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<N> PartialOrd for State<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Settled single-source search results
#[derive(Debug)]
pub struct SearchTree<N> {
    start: N,
    dist: FxHashMap<N, Cost>,
    prev: FxHashMap<N, (N, EdgeRef)>,
}

impl<N: Copy + Eq + Hash> SearchTree<N> {
    pub fn reached(&self, node: N) -> bool {
        self.dist.contains_key(&node)
    }

    pub fn cost_to(&self, node: N) -> Option<f64> {
        self.dist.get(&node).map(|c| c.weight)
    }

    /// Reconstruct the path from the start to `goal`
    pub fn path_to(&self, goal: N) -> Option<SearchPath<N>> {
        let cost = *self.dist.get(&goal)?;
        let mut nodes = vec![goal];
        let mut edges = Vec::new();
        let mut current = goal;
        while current != self.start {
            let (p, edge) = *self.prev.get(&current)?;
            nodes.push(p);
            edges.push(edge);
            current = p;
        }
        nodes.reverse();
        edges.reverse();
        Some(SearchPath { nodes, edges, cost: cost.weight, transitions: cost.transitions })
    }
}

/// Dijkstra from `start`, stopping early once `goal` is settled
pub fn search<G: SearchGraph>(
    graph: &G,
    start: G::Node,
    goal: Option<G::Node>,
    min_accessibility: u8,
) -> SearchTree<G::Node> {
    let mut dist: FxHashMap<G::Node, Cost> = FxHashMap::default();
    let mut prev: FxHashMap<G::Node, (G::Node, EdgeRef)> = FxHashMap::default();
    let mut heap = BinaryHeap::new();
    let mut hops = Vec::new();
    let mut seq = 0u64;

    dist.insert(start, Cost::ZERO);
    heap.push(State { cost: Cost::ZERO, seq, node: start });

    while let Some(State { cost, node, .. }) = heap.pop() {
        if goal == Some(node) {
            break;
        }
        if dist.get(&node).is_some_and(|best| cost.cmp(best) == Ordering::Greater) {
            continue;
        }

        hops.clear();
        graph.hops(node, &mut hops);
        for hop in hops.iter().filter(|h| h.admits(min_accessibility)) {
            let next = Cost {
                weight: cost.weight + hop.weight,
                transitions: cost.transitions + u32::from(hop.floor_change),
            };
            let better = dist.get(&hop.to).map_or(true, |d| next.cmp(d) == Ordering::Less);
            if better {
                dist.insert(hop.to, next);
                prev.insert(hop.to, (node, hop.edge));
                seq += 1;
                heap.push(State { cost: next, seq, node: hop.to });
            }
        }
    }

    SearchTree { start, dist, prev }
}

/// Shortest admissible path, or None when the goal is unreachable
pub fn shortest_path<G: SearchGraph>(
    graph: &G,
    start: G::Node,
    goal: G::Node,
    min_accessibility: u8,
) -> Option<SearchPath<G::Node>> {
    if !graph.contains(start) || !graph.contains(goal) {
        return None;
    }
    search(graph, start, Some(goal), min_accessibility).path_to(goal)
}
