// tests/scheduler_policies.rs

mod common;
use crate::common::builders::ProblemConfigBuilder;
use crate::common::{
    assert_close, build_scheduler, init_tracing, run_on_cluster, single_direction,
    sweep_fixed_source,
};

use std::sync::Arc;

use sweepdag::comm::{Communicator, Mailbox};
use sweepdag::config::BoundaryConfig;
use sweepdag::dag::{PlanOptions, SweepPlan};
use sweepdag::engine::{RunMode, SchedulerOptions, TimingLog, run_cluster};
use sweepdag::exec::TransportChunk;
use sweepdag::mesh::OrthoGrid;
use sweepdag::quadrature::AngularQuadrature;
use sweepdag::sweep::{AggregationOptions, AngleSet, Boundaries, SweepContext};
use sweepdag::types::{AngleSetStatus, SchedulingPolicy};
use sweepdag_test_utils::with_timeout;

#[tokio::test]
async fn fifo_and_depth_of_graph_agree() {
    init_tracing();
    let base = || {
        ProblemConfigBuilder::rectangle([6, 6], [2, 2])
            .with_quadrature(2, 4)
            .with_material(1.0, 0.3, 1.0)
            .with_boundary("xmin", BoundaryConfig::Reflecting)
            .with_boundary("ymax", BoundaryConfig::Isotropic { value: 0.5 })
            .with_channel_capacity(2)
    };
    let fifo = base().with_policy(SchedulingPolicy::Fifo).build();
    let dog = base().with_policy(SchedulingPolicy::DepthOfGraph).build();

    let a = with_timeout(run_cluster(&fifo, RunMode::Sweeps(4))).await.unwrap();
    let b = with_timeout(run_cluster(&dog, RunMode::Sweeps(4))).await.unwrap();

    assert_eq!(a.iterations(), 4);
    assert_eq!(b.iterations(), 4);
    assert_close(&a.global_flux(), &b.global_flux(), 1e-12);
}

#[tokio::test]
async fn partition_count_does_not_change_the_answer() {
    let serial = ProblemConfigBuilder::rectangle([4, 6], [1, 1])
        .with_quadrature(2, 8)
        .with_groups(2)
        .build();
    let split = ProblemConfigBuilder::rectangle([4, 6], [2, 3])
        .with_quadrature(2, 8)
        .with_groups(2)
        .with_policy(SchedulingPolicy::DepthOfGraph)
        .build();

    let a = with_timeout(run_cluster(&serial, RunMode::Sweeps(1))).await.unwrap();
    let b = with_timeout(run_cluster(&split, RunMode::Sweeps(1))).await.unwrap();
    assert_eq!(b.locations.len(), 6);
    assert_close(&a.global_flux(), &b.global_flux(), 1e-12);
}

#[tokio::test]
async fn reflecting_slab_converges_to_infinite_medium_flux() {
    init_tracing();
    let problem = ProblemConfigBuilder::slab(8, 2)
        .with_quadrature(4, 1)
        .with_material(1.0, 0.5, 1.0)
        .with_boundary("xmin", BoundaryConfig::Reflecting)
        .with_boundary("xmax", BoundaryConfig::Reflecting)
        .with_solver(1000, 1e-11)
        .build();

    let report = with_timeout(run_cluster(&problem, RunMode::SourceIteration))
        .await
        .unwrap();
    assert!(report.converged());
    let flux = report.global_flux();
    assert_close(&flux, &vec![2.0; flux.len()], 1e-6);
}

#[tokio::test]
async fn reflecting_box_converges_under_depth_of_graph() {
    let problem = ProblemConfigBuilder::rectangle([4, 4], [2, 2])
        .with_quadrature(2, 4)
        .with_material(2.0, 1.0, 3.0)
        .with_boundary("xmin", BoundaryConfig::Reflecting)
        .with_boundary("xmax", BoundaryConfig::Reflecting)
        .with_boundary("ymin", BoundaryConfig::Reflecting)
        .with_boundary("ymax", BoundaryConfig::Reflecting)
        .with_policy(SchedulingPolicy::DepthOfGraph)
        .with_solver(2000, 1e-11)
        .build();

    let report = with_timeout(run_cluster(&problem, RunMode::SourceIteration))
        .await
        .unwrap();
    assert!(report.converged());
    let flux = report.global_flux();
    assert_close(&flux, &vec![3.0; flux.len()], 1e-6);
}

#[test]
fn repeated_sweeps_with_a_fixed_source_are_identical() {
    let grid = OrthoGrid::rectangle([4, 4], [1.0, 1.0], [2, 2]);
    let results = run_on_cluster(4, 4, |comm| {
        let mesh = grid.build_location(comm.location_id())?;
        let mut scheduler = build_scheduler(
            mesh,
            AngularQuadrature::product(2, 4)?,
            Boundaries::vacuum(4, 1),
            comm,
            &AggregationOptions::default(),
            SchedulerOptions::default(),
        )?;
        let once = sweep_fixed_source_keep_open(&mut scheduler)?;
        let twice = sweep_fixed_source(&mut scheduler, 1.0, 1.0, 1)?;
        let reset = scheduler
            .aggregation()
            .angle_sets()
            .all(|s| s.status() == AngleSetStatus::NotFinished);
        Ok((once, twice, scheduler.round(), reset))
    });

    for result in results {
        let (once, twice, round, reset) = result.unwrap();
        assert_close(&once, &twice, 1e-12);
        assert_eq!(round, 2);
        assert!(reset);
    }
}

fn sweep_fixed_source_keep_open(
    scheduler: &mut sweepdag::engine::SweepScheduler<sweepdag::comm::ChannelComm>,
) -> sweepdag::errors::Result<Vec<f64>> {
    let mesh = scheduler.aggregation().mesh();
    let mut chunk = TransportChunk::new(mesh.geometry(), mesh.num_cells(), 1, 1.0);
    chunk.set_source_moments(vec![1.0; mesh.num_cells()])?;
    scheduler.sweep(&mut chunk)?;
    Ok(chunk.flux_moments().to_vec())
}

#[test]
fn single_cell_finishes_in_one_advance() {
    let grid = OrthoGrid::slab(1, 1.0, 1);
    let mut results = run_on_cluster(1, 1, |mut comm| {
        let mesh = grid.build_location(0)?;
        let quadrature = single_direction([1.0, 0.0, 0.0]);
        let plan = SweepPlan::build(&mesh, quadrature.direction(0), &mut comm, &PlanOptions::default())?;
        let mut set = AngleSet::new(0, vec![0], Arc::new(plan), &mesh, 1, 16)?;
        let mut chunk = TransportChunk::new(mesh.geometry(), 1, 1, 1.0);
        chunk.set_source_moments(vec![1.0])?;

        let mut boundaries = Boundaries::vacuum(2, 1);
        let mut mailbox = Mailbox::new(comm);
        let mut timing = TimingLog::new();
        let mut ctx = SweepContext {
            mesh: &mesh,
            quadrature: &quadrature,
            boundaries: &mut boundaries,
            mailbox: &mut mailbox,
            timing: &mut timing,
            round: 0,
        };
        let status = set.advance(&mut ctx, &mut chunk)?;
        let again = set.advance(&mut ctx, &mut chunk)?;
        let flux = chunk.flux_moments()[0];
        mailbox.comm_mut().finalize()?;
        Ok((status, again, flux, timing.count(sweepdag::engine::CHUNK_TAG)))
    });

    let (status, again, flux, chunks) = results.pop().unwrap().unwrap();
    assert_eq!(status, AngleSetStatus::Finished);
    assert_eq!(again, AngleSetStatus::Finished);
    assert_eq!(chunks, 1);
    // Diamond difference on one unit cell with vacuum inflow: psi = 1 / 3.
    assert!((flux - 1.0 / 3.0).abs() < 1e-12, "flux {flux}");
}

#[test]
fn depth_of_graph_ranks_deepest_angle_sets_first() {
    let grid = OrthoGrid::slab(4, 1.0, 2);
    let results = run_on_cluster(2, 4, |comm| {
        let location = comm.location_id();
        let mesh = grid.build_location(location)?;
        let mut scheduler = build_scheduler(
            mesh,
            AngularQuadrature::slab(4)?,
            Boundaries::vacuum(2, 1),
            comm,
            &AggregationOptions::default(),
            SchedulerOptions {
                policy: SchedulingPolicy::DepthOfGraph,
                ..SchedulerOptions::default()
            },
        )?;
        let ranking = scheduler.ranking().to_vec();
        scheduler.comm_mut().finalize()?;
        Ok((location, ranking))
    });

    for result in results {
        let (location, ranking) = result.unwrap();
        assert_eq!(ranking.len(), 4);
        assert!(ranking.windows(2).all(|w| w[0].depth_of_graph >= w[1].depth_of_graph));
        // Location 0 feeds location 1 in +x, so +x sets lead there.
        let lead_sign = if location == 0 { 1 } else { -1 };
        assert_eq!(ranking[0].depth_of_graph, 1);
        assert_eq!(ranking[0].signs[0], lead_sign);
        assert_eq!(ranking[3].depth_of_graph, 0);
        assert_eq!(ranking[3].signs[0], -lead_sign);
    }
}

#[test]
fn directions_with_identical_plans_share_angle_sets() {
    let grid = OrthoGrid::rectangle([3, 3], [1.0, 1.0], [1, 1]);
    let counts = run_on_cluster(1, 4, |mut comm| {
        let mesh = Arc::new(grid.build_location(0)?);
        let quadrature = Arc::new(AngularQuadrature::product(4, 4)?);
        let mut counts = Vec::new();
        for angles_per_set in [1, 2, 8] {
            let options = AggregationOptions {
                angles_per_set,
                ..AggregationOptions::default()
            };
            let aggregation = sweepdag::sweep::AngleAggregation::build(
                Arc::clone(&mesh),
                Arc::clone(&quadrature),
                Boundaries::vacuum(4, 1),
                &mut comm,
                &options,
            )?;
            counts.push((aggregation.groups().len(), aggregation.diagnostics().num_angle_sets));
        }
        comm.finalize()?;
        Ok(counts)
    });

    // 16 directions, two per octant; at most two can share a plan.
    assert_eq!(counts.into_iter().next().unwrap().unwrap(), vec![(8, 16), (8, 8), (8, 8)]);
}
