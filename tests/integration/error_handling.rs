// tests/integration/error_handling.rs

use crate::common::builders::MeshBuilder;
use crate::common::{build_scheduler, init_tracing, run_on_cluster, single_direction, sweep_fixed_source};

use sweepdag::comm::{Communicator, FaceRecord, FluxMessage, MessageTag, SendOutcome};
use sweepdag::dag::{PlanOptions, SweepPlan};
use sweepdag::engine::SchedulerOptions;
use sweepdag::errors::SweepError;
use sweepdag::mesh::{CellView, FaceConnection, FaceNeighbor, FaceView, LocalMesh, OrthoGrid};
use sweepdag::quadrature::Direction;
use sweepdag::sweep::{AggregationOptions, Boundaries};
use sweepdag::types::GeometryKind;

fn slab_cell(local_id: usize, minus: FaceConnection, plus: FaceConnection) -> CellView {
    CellView {
        local_id,
        global_id: local_id,
        volume: 1.0,
        faces: vec![
            FaceView {
                normal: [-1.0, 0.0, 0.0],
                area: 1.0,
                connection: minus,
            },
            FaceView {
                normal: [1.0, 0.0, 0.0],
                area: 1.0,
                connection: plus,
            },
        ],
    }
}

fn plan_single(mesh: LocalMesh) -> Result<SweepPlan, SweepError> {
    let direction = Direction::new([1.0, 0.0, 0.0], 1.0).unwrap();
    run_on_cluster(1, 1, |mut comm| {
        let plan = SweepPlan::build(&mesh, &direction, &mut comm, &PlanOptions::default());
        comm.finalize()?;
        plan
    })
    .pop()
    .unwrap()
}

#[test]
fn neighbor_on_unknown_location_is_a_connectivity_error() {
    let cell = slab_cell(
        0,
        FaceConnection::Boundary { boundary_id: 0 },
        FaceConnection::Interior(FaceNeighbor {
            local_id: 0,
            global_id: 1,
            location: 3,
            associated_face: 0,
        }),
    );
    let mesh = LocalMesh::new(0, 1, GeometryKind::Slab, vec![cell]).unwrap();

    match plan_single(mesh) {
        Err(SweepError::ConnectivityError {
            location,
            neighbor_location,
            ..
        }) => {
            assert_eq!(location, 0);
            assert_eq!(neighbor_location, 3);
        }
        other => panic!("expected ConnectivityError, got {other:?}"),
    }
}

#[test]
fn local_neighbor_outside_the_arena_is_a_connectivity_error() {
    let cell = slab_cell(
        0,
        FaceConnection::Boundary { boundary_id: 0 },
        FaceConnection::Interior(FaceNeighbor {
            local_id: 7,
            global_id: 7,
            location: 0,
            associated_face: 0,
        }),
    );
    let mesh = LocalMesh::new(0, 1, GeometryKind::Slab, vec![cell]).unwrap();

    let err = plan_single(mesh).unwrap_err();
    assert!(matches!(err, SweepError::ConnectivityError { .. }), "{err}");
    assert!(err.to_string().contains("location 0"));
}

#[test]
fn mesh_with_misnumbered_cells_is_rejected() {
    let cell = slab_cell(
        1,
        FaceConnection::Boundary { boundary_id: 0 },
        FaceConnection::Boundary { boundary_id: 1 },
    );
    let err = LocalMesh::new(0, 1, GeometryKind::Slab, vec![cell]).unwrap_err();
    assert!(matches!(err, SweepError::MeshError(_)));
}

#[test]
fn silent_upstream_location_stalls_the_sweep() {
    init_tracing();
    let grid = OrthoGrid::slab(4, 1.0, 2);
    let mut results = run_on_cluster(2, 4, |comm| {
        let location = comm.location_id();
        let mesh = grid.build_location(location)?;
        let mut scheduler = build_scheduler(
            mesh,
            single_direction([1.0, 0.0, 0.0]),
            Boundaries::vacuum(2, 1),
            comm,
            &AggregationOptions::default(),
            SchedulerOptions {
                max_idle_polls: 1_000,
                ..SchedulerOptions::default()
            },
        )?;
        if location == 0 {
            // Leaves cleanly without ever sweeping.
            scheduler.comm_mut().finalize()?;
            return Ok(());
        }
        sweep_fixed_source(&mut scheduler, 1.0, 1.0, 1).map(|_| ())
    });

    let downstream = results.pop().unwrap();
    assert!(results.pop().unwrap().is_ok());
    match downstream {
        Err(SweepError::CommunicationStall {
            location,
            attempts,
            pending,
        }) => {
            assert_eq!(location, 1);
            assert_eq!(attempts, 1_000);
            assert_eq!(pending, vec![0]);
        }
        other => panic!("expected CommunicationStall, got {other:?}"),
    }
}

#[test]
fn missing_delayed_data_stalls_the_drain() {
    // Ring over three locations: the 0 -> 1 edge is delayed, so location 1
    // only waits on location 0 after the barrier.
    let meshes = MeshBuilder::ring(3, 3).build().unwrap();
    let results = run_on_cluster(3, 4, |comm| {
        let location = comm.location_id();
        let mut scheduler = build_scheduler(
            meshes[location].clone(),
            single_direction([1.0, 0.0, 0.0]),
            Boundaries::vacuum(2, 1),
            comm,
            &AggregationOptions::default(),
            SchedulerOptions {
                max_idle_polls: 1_000,
                ..SchedulerOptions::default()
            },
        )?;
        if location == 0 {
            scheduler.comm_mut().barrier()?;
            scheduler.comm_mut().finalize()?;
            return Ok(());
        }
        sweep_fixed_source(&mut scheduler, 1.0, 1.0, 1).map(|_| ())
    });

    let mut results = results.into_iter();
    assert!(results.next().unwrap().is_ok());
    match results.next().unwrap() {
        Err(SweepError::CommunicationStall {
            location,
            attempts,
            pending,
        }) => {
            assert_eq!(location, 1);
            assert_eq!(attempts, 1_000);
            assert_eq!(pending, vec![0]);
        }
        other => panic!("expected CommunicationStall, got {other:?}"),
    }
}

#[test]
fn mesh_split_differently_from_the_cluster_is_rejected() {
    let mesh = OrthoGrid::slab(4, 1.0, 2).build_location(0).unwrap();
    let direction = Direction::new([1.0, 0.0, 0.0], 1.0).unwrap();
    let err = run_on_cluster(1, 1, |mut comm| {
        let plan = SweepPlan::build(&mesh, &direction, &mut comm, &PlanOptions::default());
        comm.finalize()?;
        plan
    })
    .pop()
    .unwrap()
    .unwrap_err();
    assert!(matches!(err, SweepError::MeshError(_)), "{err}");
}

#[test]
fn zero_epsilon_sweeps_cells_stacked_across_the_direction() {
    let grid = OrthoGrid::rectangle([1, 2], [1.0, 1.0], [1, 2]);
    let results = run_on_cluster(2, 4, |comm| {
        let mesh = grid.build_location(comm.location_id())?;
        let mut scheduler = build_scheduler(
            mesh,
            single_direction([1.0, 0.0, 0.0]),
            Boundaries::vacuum(4, 1),
            comm,
            &AggregationOptions {
                plan: PlanOptions {
                    epsilon: 0.0,
                    ..PlanOptions::default()
                },
                ..AggregationOptions::default()
            },
            SchedulerOptions::default(),
        )?;
        sweep_fixed_source(&mut scheduler, 1.0, 1.0, 1)
    });

    for flux in results {
        let flux = flux.unwrap();
        assert_eq!(flux.len(), 1);
        assert!(flux[0] > 0.0 && flux[0].is_finite());
    }
}

#[test]
fn extra_message_parts_overrun_the_negotiated_buffer() {
    let grid = OrthoGrid::slab(4, 1.0, 2);
    let mut results = run_on_cluster(2, 4, |comm| {
        let location = comm.location_id();
        let mesh = grid.build_location(location)?;
        let mut scheduler = build_scheduler(
            mesh,
            single_direction([1.0, 0.0, 0.0]),
            Boundaries::vacuum(2, 1),
            comm,
            &AggregationOptions::default(),
            SchedulerOptions::default(),
        )?;
        let negotiated = scheduler
            .aggregation()
            .angle_sets()
            .map(|s| s.max_buffer_messages())
            .max()
            .unwrap_or(0);

        if location == 0 {
            // Upstream misbehaves: one part more than agreed on.
            for part in 0..=negotiated {
                let message = FluxMessage {
                    tag: MessageTag {
                        source: 0,
                        destination: 1,
                        round: 0,
                        angle_set: 0,
                        part,
                        delayed: false,
                    },
                    records: vec![FaceRecord {
                        cell_local_id: 1,
                        face_index: 1,
                        angle_index: 0,
                        values: vec![0.0],
                    }],
                };
                assert!(matches!(scheduler.comm_mut().try_send(message)?, SendOutcome::Sent));
            }
            scheduler.comm_mut().barrier()?;
            scheduler.comm_mut().finalize()?;
            return Ok(negotiated);
        }
        scheduler.comm_mut().barrier()?;
        sweep_fixed_source(&mut scheduler, 1.0, 1.0, 1).map(|_| negotiated)
    });

    let downstream = results.pop().unwrap();
    assert_eq!(results.pop().unwrap().unwrap(), 1);
    match downstream {
        Err(SweepError::BufferOverrun {
            angle_set,
            requested,
            negotiated,
        }) => {
            assert_eq!(angle_set, 0);
            assert_eq!(requested, 2);
            assert_eq!(negotiated, 1);
        }
        other => panic!("expected BufferOverrun, got {other:?}"),
    }
}

#[test]
fn small_face_limit_splits_messages_consistently() {
    // Eight faces cross the block boundary; a limit of 3 needs 3 parts.
    let grid = OrthoGrid::rectangle([4, 8], [1.0, 1.0], [2, 1]);
    let results = run_on_cluster(2, 1, |comm| {
        let mesh = grid.build_location(comm.location_id())?;
        let mut scheduler = build_scheduler(
            mesh,
            single_direction([0.8, 0.6, 0.0]),
            Boundaries::vacuum(4, 1),
            comm,
            &AggregationOptions {
                message_face_limit: 3,
                ..AggregationOptions::default()
            },
            SchedulerOptions::default(),
        )?;
        let parts: Vec<usize> = scheduler
            .aggregation()
            .angle_sets()
            .map(|s| s.max_buffer_messages())
            .collect();
        let flux = sweep_fixed_source(&mut scheduler, 1.0, 1.0, 2)?;
        Ok((parts, flux))
    });

    for result in results {
        let (parts, flux) = result.unwrap();
        assert_eq!(parts, vec![3]);
        assert!(flux.iter().all(|v| *v > 0.0));
    }
}
