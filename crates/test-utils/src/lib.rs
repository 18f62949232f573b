pub mod builders;

use std::sync::{Arc, Once};
use std::thread;

use tracing_subscriber::{fmt, EnvFilter};

use sweepdag::comm::{ChannelComm, Communicator, channel_cluster};
use sweepdag::engine::{SchedulerOptions, SweepScheduler};
use sweepdag::errors::{Result, SweepError};
use sweepdag::exec::TransportChunk;
use sweepdag::mesh::LocalMesh;
use sweepdag::quadrature::AngularQuadrature;
use sweepdag::sweep::{AggregationOptions, AngleAggregation, Boundaries};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 30-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(30), f)
        .await
        .expect("Test timed out after 30 seconds")
}

/// Run `f` once per location of a fresh in-process cluster, each on its own
/// thread, and collect the results by location.
///
/// A panicking location is reported as a `CommError`; its endpoint is dropped
/// during unwinding, which aborts the others.
pub fn run_on_cluster<T, F>(num_locations: usize, capacity: usize, f: F) -> Vec<Result<T>>
where
    T: Send,
    F: Fn(ChannelComm) -> Result<T> + Sync,
{
    let comms = channel_cluster(num_locations, capacity).expect("failed to build test cluster");
    thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(SweepError::CommError("location thread panicked".to_string()))
                })
            })
            .collect()
    })
}

/// Build the aggregation and scheduler for one location (collective).
pub fn build_scheduler(
    mesh: LocalMesh,
    quadrature: AngularQuadrature,
    boundaries: Boundaries,
    mut comm: ChannelComm,
    aggregation: &AggregationOptions,
    options: SchedulerOptions,
) -> Result<SweepScheduler<ChannelComm>> {
    let aggregation = AngleAggregation::build(
        Arc::new(mesh),
        Arc::new(quadrature),
        boundaries,
        &mut comm,
        aggregation,
    )?;
    SweepScheduler::new(aggregation, comm, options)
}

/// Sweep `sweeps` times with a fixed source and return the scalar flux of
/// the last sweep. Finalizes the communicator.
pub fn sweep_fixed_source(
    scheduler: &mut SweepScheduler<ChannelComm>,
    sigma_t: f64,
    source: f64,
    sweeps: usize,
) -> Result<Vec<f64>> {
    let aggregation = scheduler.aggregation();
    let geometry = aggregation.mesh().geometry();
    let cells = aggregation.mesh().num_cells();
    let groups = aggregation.boundaries().num_groups();
    let mut chunk = TransportChunk::new(geometry, cells, groups, sigma_t);
    chunk.set_source_moments(vec![source; cells * groups])?;
    for _ in 0..sweeps {
        chunk.zero_flux_moments();
        scheduler.sweep(&mut chunk)?;
    }
    scheduler.comm_mut().finalize()?;
    Ok(chunk.flux_moments().to_vec())
}
