// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use petgraph::Direction;
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;

/// Weighted directed graph over integer vertex ids (cells or locations).
///
/// Every query that returns vertices or edges returns them sorted by id, so
/// anything built on top (cycle removal, sweep order, stages) is
/// deterministic regardless of insertion order.
#[derive(Debug, Clone, Default)]
pub struct SweepGraph {
    graph: DiGraphMap<usize, f64>,
}

impl SweepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph with vertices `0..n` and no edges.
    pub fn with_vertices(n: usize) -> Self {
        let mut g = Self::new();
        for v in 0..n {
            g.add_vertex(v);
        }
        g
    }

    pub fn add_vertex(&mut self, v: usize) {
        self.graph.add_node(v);
    }

    /// Add `u -> v`, accumulating the weight if the edge already exists.
    pub fn add_edge(&mut self, u: usize, v: usize, weight: f64) {
        if let Some(w) = self.graph.edge_weight_mut(u, v) {
            *w += weight;
        } else {
            self.graph.add_edge(u, v, weight);
        }
    }

    pub fn remove_edge(&mut self, u: usize, v: usize) -> Option<f64> {
        self.graph.remove_edge(u, v)
    }

    pub fn contains_edge(&self, u: usize, v: usize) -> bool {
        self.graph.contains_edge(u, v)
    }

    pub fn edge_weight(&self, u: usize, v: usize) -> Option<f64> {
        self.graph.edge_weight(u, v).copied()
    }

    pub fn num_vertices(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertices(&self) -> Vec<usize> {
        let mut vs: Vec<usize> = self.graph.nodes().collect();
        vs.sort_unstable();
        vs
    }

    pub fn successors(&self, v: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(v, Direction::Outgoing)
            .collect();
        out.sort_unstable();
        out
    }

    pub fn predecessors(&self, v: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(v, Direction::Incoming)
            .collect();
        out.sort_unstable();
        out
    }

    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        let mut out: Vec<(usize, usize, f64)> = self
            .graph
            .all_edges()
            .map(|(u, v, w)| (u, v, *w))
            .collect();
        out.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        out
    }

    /// Cross-check used after cycle removal.
    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Kahn's algorithm, always releasing the lowest ready id first.
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree: BTreeMap<usize, usize> = self
            .vertices()
            .into_iter()
            .map(|v| (v, self.predecessors(v).len()))
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(v, _)| Reverse(*v))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(v)) = ready.pop() {
            order.push(v);
            for w in self.successors(v) {
                if let Some(d) = in_degree.get_mut(&w) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(Reverse(w));
                    }
                }
            }
        }

        (order.len() == self.num_vertices()).then_some(order)
    }

    /// Longest path from any source to each vertex.
    pub fn levels(&self) -> Option<BTreeMap<usize, usize>> {
        let order = self.topological_order()?;
        let mut level = BTreeMap::new();
        for &v in &order {
            let l = self
                .predecessors(v)
                .iter()
                .filter_map(|p| level.get(p))
                .map(|l: &usize| l + 1)
                .max()
                .unwrap_or(0);
            level.insert(v, l);
        }
        Some(level)
    }

    /// Longest path from each vertex to any sink.
    pub fn heights(&self) -> Option<BTreeMap<usize, usize>> {
        let order = self.topological_order()?;
        let mut height = BTreeMap::new();
        for &v in order.iter().rev() {
            let h = self
                .successors(v)
                .iter()
                .filter_map(|s| height.get(s))
                .map(|h: &usize| h + 1)
                .max()
                .unwrap_or(0);
            height.insert(v, h);
        }
        Some(height)
    }
}
