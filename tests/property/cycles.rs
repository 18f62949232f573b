use std::collections::HashSet;

use proptest::prelude::*;

use sweepdag::dag::{SweepGraph, find_cycle, remove_cyclic_edges};
use sweepdag::errors::GraphScope;

// Random weighted digraphs, cycles and self loops allowed.
fn graph_strategy(max_vertices: usize) -> impl Strategy<Value = SweepGraph> {
    (1..=max_vertices).prop_flat_map(|n| {
        proptest::collection::vec((0..n, 0..n, 1u8..=4), 0..(3 * n)).prop_map(move |edges| {
            let mut graph = SweepGraph::with_vertices(n);
            for (u, v, w) in edges {
                graph.add_edge(u, v, f64::from(w));
            }
            graph
        })
    })
}

proptest! {
    #[test]
    fn residual_graph_is_acyclic(original in graph_strategy(12)) {
        let mut graph = original.clone();
        let removed = remove_cyclic_edges(&mut graph, GraphScope::Local, 10_000).unwrap();

        prop_assert!(!graph.is_cyclic());
        prop_assert!(find_cycle(&graph).is_none());
        prop_assert_eq!(graph.num_edges() + removed.len(), original.num_edges());

        let distinct: HashSet<_> = removed.iter().copied().collect();
        prop_assert_eq!(distinct.len(), removed.len());
        for (u, v) in &removed {
            prop_assert!(original.contains_edge(*u, *v));
            prop_assert!(!graph.contains_edge(*u, *v));
        }
    }

    #[test]
    fn removal_is_idempotent_and_deterministic(original in graph_strategy(10)) {
        let mut first = original.clone();
        let mut second = original.clone();
        let a = remove_cyclic_edges(&mut first, GraphScope::Global, 10_000).unwrap();
        let b = remove_cyclic_edges(&mut second, GraphScope::Global, 10_000).unwrap();
        prop_assert_eq!(&a, &b);

        let again = remove_cyclic_edges(&mut first, GraphScope::Global, 10_000).unwrap();
        prop_assert!(again.is_empty());
    }

    #[test]
    fn topological_order_respects_every_edge(original in graph_strategy(12)) {
        let mut graph = original;
        remove_cyclic_edges(&mut graph, GraphScope::Local, 10_000).unwrap();
        let order = graph.topological_order().unwrap();
        prop_assert_eq!(order.len(), graph.num_vertices());

        let position: Vec<usize> = {
            let mut pos = vec![0; order.len()];
            for (i, v) in order.iter().enumerate() {
                pos[*v] = i;
            }
            pos
        };
        for (u, v, _) in graph.edges() {
            prop_assert!(position[u] < position[v]);
        }

        let levels = graph.levels().unwrap();
        let heights = graph.heights().unwrap();
        for (u, v, _) in graph.edges() {
            prop_assert!(levels[&u] < levels[&v]);
            prop_assert!(heights[&u] > heights[&v]);
        }
    }
}
