// src/engine/scheduler.rs

use std::cmp::Reverse;

use tracing::{debug, info, warn};

use crate::comm::{Communicator, Mailbox};
use crate::engine::retry::{BoundedRetry, PollOutcome};
use crate::engine::timing::{CHUNK_TAG, SWEEP_TAG, SweepTimings, TimingLog};
use crate::errors::{Result, SweepError};
use crate::exec::SweepChunk;
use crate::sweep::{AngleAggregation, AngleSetGroup, SweepContext, SweepDiagnostics};
use crate::types::{LocationId, SchedulingPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub policy: SchedulingPolicy,
    /// Consecutive no-progress polls before a sweep is declared stalled.
    pub max_idle_polls: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::Fifo,
            max_idle_polls: 10_000_000,
        }
    }
}

/// Priority entry of one angle set under the depth-of-graph policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedAngleSet {
    pub group: usize,
    pub index: usize,
    pub angle_set_id: usize,
    pub depth_of_graph: usize,
    pub signs: [i8; 3],
}

/// Drives every angle set of one location through one sweep at a time.
///
/// Owns the communicator (through its [`Mailbox`]); the only blocking
/// points are the collectives in [`SweepScheduler::new`] and the barrier
/// at the end of each sweep.
#[derive(Debug)]
pub struct SweepScheduler<C: Communicator> {
    policy: SchedulingPolicy,
    aggregation: AngleAggregation,
    mailbox: Mailbox<C>,
    timing: TimingLog,
    retry: BoundedRetry,
    ranking: Vec<RankedAngleSet>,
    round: u64,
}

impl<C: Communicator> SweepScheduler<C> {
    /// Collective: negotiates the per-successor message count.
    pub fn new(mut aggregation: AngleAggregation, comm: C, options: SchedulerOptions) -> Result<Self> {
        aggregation.boundaries.reset_ready_flags();
        for set in aggregation.angle_sets_mut() {
            set.init_delayed_buffers();
        }

        let mut mailbox = Mailbox::new(comm);
        let local_max = aggregation
            .angle_sets()
            .map(|s| s.get_max_buffer_messages())
            .max()
            .unwrap_or(1);
        let negotiated = mailbox.comm_mut().all_reduce_max(local_max)?;
        for set in aggregation.angle_sets_mut() {
            set.set_max_buffer_messages(negotiated);
        }

        let ranking = match options.policy {
            SchedulingPolicy::DepthOfGraph => rank_angle_sets(&aggregation.groups),
            SchedulingPolicy::Fifo => Vec::new(),
        };

        info!(
            location = mailbox.location_id(),
            policy = %options.policy,
            max_buffer_messages = negotiated,
            "sweep scheduler ready"
        );

        Ok(Self {
            policy: options.policy,
            aggregation,
            mailbox,
            timing: TimingLog::new(),
            retry: BoundedRetry::new(options.max_idle_polls),
            ranking,
            round: 0,
        })
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub fn location_id(&self) -> LocationId {
        self.mailbox.location_id()
    }

    /// Number of completed sweeps.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn ranking(&self) -> &[RankedAngleSet] {
        &self.ranking
    }

    pub fn aggregation(&self) -> &AngleAggregation {
        &self.aggregation
    }

    pub fn diagnostics(&self) -> SweepDiagnostics {
        self.aggregation.diagnostics()
    }

    pub fn timing(&self) -> &TimingLog {
        &self.timing
    }

    pub fn comm_mut(&mut self) -> &mut C {
        self.mailbox.comm_mut()
    }

    pub fn into_comm(self) -> C {
        self.mailbox.into_comm()
    }

    /// Execute one full sweep of every angle set.
    pub fn sweep(&mut self, chunk: &mut dyn SweepChunk) -> Result<SweepTimings> {
        let compute_before = self.timing.total(CHUNK_TAG);
        self.timing.begin(SWEEP_TAG);
        debug!(location = self.location_id(), round = self.round, policy = %self.policy, "sweep started");

        match self.policy {
            SchedulingPolicy::Fifo => self.execute_fifo(chunk)?,
            SchedulingPolicy::DepthOfGraph => self.execute_depth_of_graph(chunk)?,
        }

        self.mailbox.comm_mut().barrier()?;
        self.drain()?;
        self.reset_sweep();

        let total = self.timing.end(SWEEP_TAG).unwrap_or_default();
        let compute = self.timing.total(CHUNK_TAG).saturating_sub(compute_before);
        self.round += 1;
        debug!(location = self.location_id(), round = self.round, ?total, ?compute, "sweep finished");
        Ok(SweepTimings { total, compute })
    }

    /// Reset every group and boundary without sweeping.
    pub fn reset_sweep(&mut self) {
        self.aggregation.reset_sweep();
    }

    fn execute_fifo(&mut self, chunk: &mut dyn SweepChunk) -> Result<()> {
        let retry = self.retry;
        let Self {
            aggregation,
            mailbox,
            timing,
            round,
            ..
        } = self;
        let AngleAggregation {
            mesh,
            quadrature,
            groups,
            boundaries,
            ..
        } = aggregation;
        let mut ctx = SweepContext {
            mesh: &**mesh,
            quadrature: &**quadrature,
            boundaries,
            mailbox,
            timing,
            round: *round,
        };

        let report = retry.run(|| {
            let activity = ctx.mailbox.activity();
            let mut moved = false;
            let mut finished = 0;
            for group in groups.iter_mut() {
                let cursor = group.current_angle_set();
                if group.advance(&mut ctx, &mut *chunk)?.is_finished() {
                    finished += 1;
                }
                moved |= group.current_angle_set() != cursor;
            }
            Ok(if finished == groups.len() {
                PollOutcome::Finished
            } else if moved || ctx.mailbox.activity() != activity {
                PollOutcome::Progress
            } else {
                PollOutcome::Stalled
            })
        })?;

        if report.outcome == PollOutcome::Stalled {
            return Err(stall(ctx.mailbox, groups, report.idle_polls));
        }
        Ok(())
    }

    fn execute_depth_of_graph(&mut self, chunk: &mut dyn SweepChunk) -> Result<()> {
        let retry = self.retry;
        let Self {
            aggregation,
            mailbox,
            timing,
            round,
            ranking,
            ..
        } = self;
        let AngleAggregation {
            mesh,
            quadrature,
            groups,
            boundaries,
            ..
        } = aggregation;
        let mut ctx = SweepContext {
            mesh: &**mesh,
            quadrature: &**quadrature,
            boundaries,
            mailbox,
            timing,
            round: *round,
        };

        let report = retry.run(|| {
            let activity = ctx.mailbox.activity();
            let mut moved = false;
            let mut all_finished = true;
            for rank in ranking.iter() {
                let set = &mut groups[rank.group].angle_sets_mut()[rank.index];
                if set.status().is_finished() {
                    continue;
                }
                if set.advance(&mut ctx, &mut *chunk)?.is_finished() {
                    moved = true;
                } else {
                    all_finished = false;
                }
            }
            Ok(if all_finished {
                PollOutcome::Finished
            } else if moved || ctx.mailbox.activity() != activity {
                PollOutcome::Progress
            } else {
                PollOutcome::Stalled
            })
        })?;

        if report.outcome == PollOutcome::Stalled {
            return Err(stall(ctx.mailbox, groups, report.idle_polls));
        }
        Ok(())
    }

    /// Flush remaining sends and collect delayed data for the next sweep.
    fn drain(&mut self) -> Result<()> {
        let round = self.round;
        let mailbox = &mut self.mailbox;
        let groups = &mut self.aggregation.groups;

        let report = self.retry.run(|| {
            let activity = mailbox.activity();
            let mut sending = false;
            let mut complete = true;
            for group in groups.iter_mut() {
                for set in group.angle_sets_mut() {
                    sending |= set.flush_send_buffers(mailbox)?;
                    complete &= set.receive_delayed_data(mailbox, round)?;
                }
            }
            Ok(if !sending && complete {
                PollOutcome::Finished
            } else if mailbox.activity() != activity {
                PollOutcome::Progress
            } else {
                PollOutcome::Stalled
            })
        })?;

        if report.outcome == PollOutcome::Stalled {
            return Err(stall(mailbox, groups, report.idle_polls));
        }
        Ok(())
    }
}

/// Depth of graph descending, then octant signs descending, then id.
fn rank_angle_sets(groups: &[AngleSetGroup]) -> Vec<RankedAngleSet> {
    let mut ranking: Vec<RankedAngleSet> = groups
        .iter()
        .enumerate()
        .flat_map(|(g, group)| {
            group.angle_sets().iter().enumerate().map(move |(i, set)| RankedAngleSet {
                group: g,
                index: i,
                angle_set_id: set.id(),
                depth_of_graph: set.plan().depth_of_graph(),
                signs: set.plan().direction.octant_signs(),
            })
        })
        .collect();
    ranking.sort_by_key(|r| (Reverse(r.depth_of_graph), Reverse(r.signs), r.angle_set_id));
    ranking
}

fn stall<C: Communicator>(
    mailbox: &Mailbox<C>,
    groups: &[AngleSetGroup],
    attempts: usize,
) -> SweepError {
    let mut pending: Vec<LocationId> = groups
        .iter()
        .flat_map(|g| g.angle_sets().iter())
        .flat_map(|s| s.pending_locations(mailbox))
        .collect();
    pending.sort_unstable();
    pending.dedup();
    let location = mailbox.location_id();
    warn!(location, attempts, ?pending, "sweep stalled");
    SweepError::CommunicationStall {
        location,
        attempts,
        pending,
    }
}
