// tests/dependency_graph.rs

mod common;
use crate::common::{init_tracing, run_on_cluster};

use sweepdag::comm::Communicator;
use sweepdag::dag::{DepSlot, FaceOrientation, PlanOptions, SweepPlan};
use sweepdag::mesh::OrthoGrid;
use sweepdag::quadrature::Direction;

fn plans_for(grid: &OrthoGrid, omega: [f64; 3]) -> Vec<SweepPlan> {
    let direction = Direction::new(omega, 1.0).unwrap();
    run_on_cluster(grid.num_locations(), 4, |mut comm| {
        let mesh = grid.build_location(comm.location_id())?;
        let plan = SweepPlan::build(&mesh, &direction, &mut comm, &PlanOptions::default())?;
        comm.finalize()?;
        Ok(plan)
    })
    .into_iter()
    .map(|r| r.unwrap())
    .collect()
}

#[test]
fn slab_split_in_two_sweeps_in_two_stages() {
    init_tracing();
    let grid = OrthoGrid::slab(4, 1.0, 2);
    let plans = plans_for(&grid, [1.0, 0.0, 0.0]);

    assert_eq!(plans[0].dependencies.location_dependencies, Vec::<usize>::new());
    assert_eq!(plans[0].dependencies.location_successors, vec![1]);
    assert_eq!(plans[1].dependencies.location_dependencies, vec![0]);
    assert!(plans[1].dependencies.location_successors.is_empty());

    for plan in &plans {
        assert_eq!(plan.stage_graph.levels, vec![vec![0], vec![1]]);
        assert!(plan.stage_graph.removed_edges.is_empty());
        assert_eq!(plan.spls, vec![0, 1]);
    }
    assert_eq!(plans[0].depth_of_graph(), 1);
    assert_eq!(plans[1].depth_of_graph(), 0);
}

#[test]
fn reversed_direction_reverses_everything() {
    let grid = OrthoGrid::slab(4, 1.0, 2);
    let plans = plans_for(&grid, [-1.0, 0.0, 0.0]);

    assert_eq!(plans[1].dependencies.location_successors, vec![0]);
    assert_eq!(plans[0].dependencies.location_dependencies, vec![1]);
    assert_eq!(plans[0].stage_graph.levels, vec![vec![1], vec![0]]);
    assert_eq!(plans[0].spls, vec![1, 0]);
    assert_eq!(plans[1].depth_of_graph(), 1);
}

#[test]
fn rectangle_blocks_form_three_stages() {
    let grid = OrthoGrid::rectangle([4, 4], [1.0, 1.0], [2, 2]);
    let plans = plans_for(&grid, [0.6, 0.8, 0.0]);

    let levels = &plans[0].stage_graph.levels;
    assert_eq!(levels, &vec![vec![0], vec![1, 2], vec![3]]);
    assert_eq!(plans[3].dependencies.location_dependencies, vec![1, 2]);
    assert_eq!(plans[0].dependencies.location_successors, vec![1, 2]);
    assert_eq!(plans[0].depth_of_graph(), 2);
    assert_eq!(plans[3].depth_of_graph(), 0);

    for plan in &plans {
        assert_eq!(plan.stage_graph.num_stages(), 3);
        assert!(plan.local_delayed_edges.is_empty());
    }
}

#[test]
fn opposite_octants_never_need_cycle_breaking() {
    let grid = OrthoGrid::rectangle([3, 5], [1.0, 2.0], [3, 2]);
    for omega in [[0.6, 0.8, 0.0], [-0.6, 0.8, 0.0], [0.6, -0.8, 0.0], [-0.6, -0.8, 0.0]] {
        for plan in plans_for(&grid, omega) {
            assert!(plan.stage_graph.removed_edges.is_empty(), "omega {omega:?}");
            assert!(plan.dependencies.delayed_location_dependencies.is_empty());
            assert!(plan.dependencies.delayed_location_successors.is_empty());
        }
    }
}

#[test]
fn face_parallel_to_direction_carries_no_dependency() {
    let grid = OrthoGrid::rectangle([2, 2], [1.0, 1.0], [1, 2]);
    let plans = plans_for(&grid, [1.0, 0.0, 0.0]);

    // Blocks are stacked along y; a pure +x direction never crosses them.
    for plan in &plans {
        assert!(plan.dependencies.location_dependencies.is_empty());
        assert!(plan.dependencies.location_successors.is_empty());
        assert_eq!(plan.stage_graph.num_stages(), 1);
        for faces in &plan.orientations {
            assert_eq!(faces[2], FaceOrientation::Parallel);
            assert_eq!(faces[3], FaceOrientation::Parallel);
        }
    }
}

#[test]
fn dependency_and_successor_lists_agree_across_locations() {
    let grid = OrthoGrid::rectangle([6, 4], [1.0, 1.0], [3, 2]);
    let plans = plans_for(&grid, [-0.3, 0.9, 0.3]);

    for (p, plan) in plans.iter().enumerate() {
        for &s in &plan.dependencies.location_successors {
            assert_eq!(
                plans[s].dependencies.map_dependency(p),
                Some(DepSlot::Live(
                    plans[s]
                        .dependencies
                        .location_dependencies
                        .binary_search(&p)
                        .unwrap()
                ))
            );
        }
        for &d in &plan.dependencies.location_dependencies {
            assert!(plans[d].dependencies.location_successors.contains(&p));
        }
    }
}
