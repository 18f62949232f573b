use proptest::prelude::*;

use crate::common::run_on_cluster;

use sweepdag::comm::Communicator;
use sweepdag::dag::{PlanOptions, SweepPlan};
use sweepdag::mesh::OrthoGrid;
use sweepdag::quadrature::Direction;

// Grids with at least one cell per partition and a direction off every axis.
fn case_strategy() -> impl Strategy<Value = (OrthoGrid, [f64; 3])> {
    (1usize..=3, 1usize..=3, 0usize..3, 0usize..3, 0usize..4, 0.1f64..1.0).prop_map(
        |(px, py, ex, ey, quadrant, t)| {
            let grid = OrthoGrid::rectangle([px + ex, py + ey], [1.0, 1.0], [px, py]);
            let (sx, sy) = [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)][quadrant];
            (grid, [sx * t, sy * (1.0 - t * t).sqrt(), 0.0])
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn successor_and_dependency_lists_mirror_each_other((grid, omega) in case_strategy()) {
        let direction = Direction::new(omega, 1.0).unwrap();
        let plans: Vec<SweepPlan> = run_on_cluster(grid.num_locations(), 4, |mut comm| {
            let mesh = grid.build_location(comm.location_id())?;
            let plan = SweepPlan::build(&mesh, &direction, &mut comm, &PlanOptions::default())?;
            comm.finalize()?;
            Ok(plan)
        })
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

        for (p, plan) in plans.iter().enumerate() {
            prop_assert!(plan.stage_graph.removed_edges.is_empty());
            prop_assert_eq!(plan.spls.len(), grid.build_location(p).unwrap().num_cells());
            for q in 0..plans.len() {
                let forward = plan.dependencies.location_successors.contains(&q);
                let backward = plans[q].dependencies.location_dependencies.contains(&p);
                prop_assert_eq!(forward, backward);
            }
            // Stage of every dependency precedes this location's stage.
            let stage = plan.stage_graph.stage_of(p).unwrap();
            for d in &plan.dependencies.location_dependencies {
                prop_assert!(plan.stage_graph.stage_of(*d).unwrap() < stage);
            }
        }
    }
}
