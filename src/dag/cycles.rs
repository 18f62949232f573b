// src/dag/cycles.rs

//! Deterministic cycle removal.
//!
//! Each pass runs a depth-first search (roots and neighbours in ascending id
//! order) until it meets a back edge, reconstructs the cycle that edge
//! closes, and deletes the lightest edge of that cycle. Ties go to the
//! lexicographically smallest `(source, target)` pair. Passes repeat until
//! the search finds nothing.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::dag::graph::SweepGraph;
use crate::errors::{GraphScope, Result, SweepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Active,
    Done,
}

/// Edges of one cycle in `graph`, in traversal order, or `None` if acyclic.
pub fn find_cycle(graph: &SweepGraph) -> Option<Vec<(usize, usize)>> {
    let mut marks: HashMap<usize, Mark> = HashMap::new();
    let mut parent: HashMap<usize, usize> = HashMap::new();

    for root in graph.vertices() {
        if marks.contains_key(&root) {
            continue;
        }
        marks.insert(root, Mark::Active);
        let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(root, graph.successors(root), 0)];

        while let Some((v, succs, next)) = stack.last_mut() {
            if *next < succs.len() {
                let w = succs[*next];
                *next += 1;
                let v = *v;
                match marks.get(&w) {
                    None => {
                        marks.insert(w, Mark::Active);
                        parent.insert(w, v);
                        stack.push((w, graph.successors(w), 0));
                    }
                    Some(Mark::Active) => return Some(cycle_edges(&parent, w, v)),
                    Some(Mark::Done) => {}
                }
            } else {
                marks.insert(*v, Mark::Done);
                stack.pop();
            }
        }
    }

    None
}

/// Walk tree edges back from `tail` to `head`, then close with `tail -> head`.
fn cycle_edges(parent: &HashMap<usize, usize>, head: usize, tail: usize) -> Vec<(usize, usize)> {
    let mut edges = Vec::new();
    let mut x = tail;
    while x != head {
        let Some(&p) = parent.get(&x) else { break };
        edges.push((p, x));
        x = p;
    }
    edges.reverse();
    edges.push((tail, head));
    edges
}

/// Remove edges from `graph` until it is acyclic.
///
/// Returns the removed edges in removal order. Fails with
/// [`SweepError::CycleResolutionFailure`] if `max_passes` removals were not
/// enough or the residual still fails the acyclicity check.
pub fn remove_cyclic_edges(
    graph: &mut SweepGraph,
    scope: GraphScope,
    max_passes: usize,
) -> Result<Vec<(usize, usize)>> {
    let mut removed = Vec::new();

    for _ in 0..max_passes {
        let Some(cycle) = find_cycle(graph) else {
            if graph.is_cyclic() {
                break;
            }
            if !removed.is_empty() {
                debug!(?scope, removed = ?removed, "cycle removal finished");
            }
            return Ok(removed);
        };

        let victim = cycle
            .iter()
            .copied()
            .min_by(|a, b| {
                let wa = graph.edge_weight(a.0, a.1).unwrap_or(0.0);
                let wb = graph.edge_weight(b.0, b.1).unwrap_or(0.0);
                wa.total_cmp(&wb).then(a.cmp(b))
            })
            .unwrap_or(cycle[0]);

        debug!(?scope, ?cycle, edge = ?victim, "breaking cycle");
        graph.remove_edge(victim.0, victim.1);
        removed.push(victim);
    }

    if find_cycle(graph).is_none() && !graph.is_cyclic() {
        return Ok(removed);
    }

    warn!(?scope, passes = max_passes, edges = ?removed, "cycle removal did not converge");
    Err(SweepError::CycleResolutionFailure {
        scope,
        passes: max_passes,
        edges: removed,
    })
}
