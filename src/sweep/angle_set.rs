// src/sweep/angle_set.rs

use std::sync::Arc;

use tracing::{debug, trace};

use crate::comm::{Communicator, FaceRecord, FluxMessage, InboxKey, Mailbox, MessageTag};
use crate::dag::{DepSlot, FaceOrientation, SweepPlan};
use crate::engine::timing::{CHUNK_TAG, TimingLog};
use crate::errors::{Result, SweepError};
use crate::exec::{CellSweepInput, SweepChunk};
use crate::mesh::{CellView, FaceConnection, LocalMesh};
use crate::quadrature::AngularQuadrature;
use crate::sweep::boundary::Boundaries;
use crate::sweep::fluds::{FaceKey, Fluds};
use crate::types::{AngleSetStatus, LocationId};

/// Borrowed partition state an angle set needs while advancing.
#[derive(Debug)]
pub struct SweepContext<'a, C> {
    pub mesh: &'a LocalMesh,
    pub quadrature: &'a AngularQuadrature,
    pub boundaries: &'a mut Boundaries,
    pub mailbox: &'a mut Mailbox<C>,
    pub timing: &'a mut TimingLog,
    pub round: u64,
}

/// Directions sharing one sweep plan, swept together as a unit.
#[derive(Debug)]
pub struct AngleSet {
    id: usize,
    angles: Vec<usize>,
    plan: Arc<SweepPlan>,
    fluds: Fluds,
    status: AngleSetStatus,
    executed: bool,
    message_face_limit: usize,
    /// Face records produced per sweep for each live / delayed successor.
    live_payload: Vec<usize>,
    delayed_payload: Vec<usize>,
    max_buffer_messages: usize,
    live_parts: Vec<usize>,
    delayed_parts: Vec<usize>,
}

impl AngleSet {
    pub fn new(
        id: usize,
        angles: Vec<usize>,
        plan: Arc<SweepPlan>,
        mesh: &LocalMesh,
        num_groups: usize,
        message_face_limit: usize,
    ) -> Result<Self> {
        let deps = &plan.dependencies;
        let mut live_payload = vec![0; deps.location_successors.len()];
        let mut delayed_payload = vec![0; deps.delayed_location_successors.len()];
        for cell in mesh.cells() {
            for (f, face) in cell.faces.iter().enumerate() {
                let Some(nb) = face.neighbor() else { continue };
                if nb.location == mesh.location_id()
                    || plan.orientations[cell.local_id][f] != FaceOrientation::Outgoing
                {
                    continue;
                }
                match plan.successor_slot(nb.location, cell.local_id, f)? {
                    DepSlot::Live(s) => live_payload[s] += angles.len(),
                    DepSlot::Delayed(s) => delayed_payload[s] += angles.len(),
                }
            }
        }

        Ok(Self {
            id,
            fluds: Fluds::new(num_groups, deps),
            live_parts: vec![0; deps.location_dependencies.len()],
            delayed_parts: vec![0; deps.delayed_location_dependencies.len()],
            angles,
            plan,
            status: AngleSetStatus::NotFinished,
            executed: false,
            message_face_limit: message_face_limit.max(1),
            live_payload,
            delayed_payload,
            max_buffer_messages: 1,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn angles(&self) -> &[usize] {
        &self.angles
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub fn status(&self) -> AngleSetStatus {
        self.status
    }

    /// Messages this set needs per successor to respect the face limit.
    pub fn get_max_buffer_messages(&self) -> usize {
        let limit = self.message_face_limit;
        self.live_payload
            .iter()
            .chain(self.delayed_payload.iter())
            .map(|&n| n.div_ceil(limit))
            .max()
            .unwrap_or(0)
            .max(1)
    }

    /// Adopt the globally agreed message count per successor.
    pub fn set_max_buffer_messages(&mut self, n: usize) {
        self.max_buffer_messages = n.max(1);
    }

    pub fn max_buffer_messages(&self) -> usize {
        self.max_buffer_messages
    }

    /// Size delayed receive buffers so the first sweep reads zeros.
    pub fn init_delayed_buffers(&mut self) {
        self.delayed_parts.clear();
        self.delayed_parts
            .resize(self.plan.dependencies.delayed_location_dependencies.len(), 0);
    }

    /// One non-blocking step. Runs the chunk at most once per sweep.
    pub fn advance<C: Communicator>(
        &mut self,
        ctx: &mut SweepContext<'_, C>,
        chunk: &mut dyn SweepChunk,
    ) -> Result<AngleSetStatus> {
        if self.status.is_finished() {
            return Ok(AngleSetStatus::Finished);
        }

        // Always drain the transport; peers may be blocked on our channel.
        ctx.mailbox.poll()?;
        if !self.executed {
            self.absorb_live(ctx.mailbox, ctx.round)?;
            if !self.upstream_complete() {
                return Ok(AngleSetStatus::NotFinished);
            }

            ctx.timing.begin(CHUNK_TAG);
            let swept = self.execute(ctx, chunk);
            ctx.timing.end(CHUNK_TAG);
            swept?;

            self.post_outgoing(ctx.mailbox, ctx.round)?;
            self.executed = true;
        }

        ctx.mailbox.flush(self.id, true)?;
        if ctx.mailbox.flush(self.id, false)? == 0 {
            self.status = AngleSetStatus::Finished;
            debug!(
                location = ctx.mailbox.location_id(),
                angle_set = self.id,
                round = ctx.round,
                "angle set finished"
            );
        }
        Ok(self.status)
    }

    fn upstream_complete(&self) -> bool {
        self.live_parts.iter().all(|&n| n >= self.max_buffer_messages)
    }

    fn absorb_live<C: Communicator>(&mut self, mailbox: &mut Mailbox<C>, round: u64) -> Result<()> {
        for (slot, &source) in self.plan.dependencies.location_dependencies.iter().enumerate() {
            let key = InboxKey {
                angle_set: self.id,
                round,
                source,
                delayed: false,
            };
            for message in mailbox.take(&key) {
                self.live_parts[slot] += 1;
                self.check_parts(self.live_parts[slot])?;
                self.fluds.absorb_upstream(slot, message.records);
            }
        }
        Ok(())
    }

    fn check_parts(&self, received: usize) -> Result<()> {
        if received > self.max_buffer_messages {
            return Err(SweepError::BufferOverrun {
                angle_set: self.id,
                requested: received,
                negotiated: self.max_buffer_messages,
            });
        }
        Ok(())
    }

    fn execute<C: Communicator>(
        &mut self,
        ctx: &mut SweepContext<'_, C>,
        chunk: &mut dyn SweepChunk,
    ) -> Result<()> {
        let plan = Arc::clone(&self.plan);
        let angles = self.angles.clone();
        let mesh: &LocalMesh = ctx.mesh;
        let quadrature: &AngularQuadrature = ctx.quadrature;
        let mut incoming: Vec<Vec<f64>> = Vec::new();
        let mut outgoing: Vec<Vec<f64>> = Vec::new();

        for &c in &plan.spls {
            let cell = mesh.cell(c);
            let orientations = &plan.orientations[c];
            incoming.resize_with(cell.faces.len(), Vec::new);
            outgoing.resize_with(cell.faces.len(), Vec::new);

            for &angle in &angles {
                for (f, values) in incoming.iter_mut().enumerate().take(cell.faces.len()) {
                    values.clear();
                    if orientations[f] == FaceOrientation::Incoming {
                        self.gather_upwind(ctx, cell, f, angle, values)?;
                    }
                }

                let input = CellSweepInput {
                    cell,
                    direction: quadrature.direction(angle),
                    angle_index: angle,
                    orientations,
                    incoming: &incoming[..cell.faces.len()],
                };
                chunk.sweep_cell(&input, &mut outgoing[..cell.faces.len()])?;

                for f in 0..cell.faces.len() {
                    if orientations[f] == FaceOrientation::Outgoing {
                        let values = std::mem::take(&mut outgoing[f]);
                        self.deposit_downwind(ctx, cell, f, angle, values)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn gather_upwind<C: Communicator>(
        &self,
        ctx: &SweepContext<'_, C>,
        cell: &CellView,
        face: usize,
        angle: usize,
        out: &mut Vec<f64>,
    ) -> Result<()> {
        let me = ctx.mesh.location_id();
        let nb = match &cell.faces[face].connection {
            FaceConnection::Boundary { boundary_id } => {
                return ctx.boundaries.incoming(
                    *boundary_id,
                    FaceKey::new(cell.local_id, face, angle),
                    &cell.faces[face].normal,
                    ctx.quadrature,
                    out,
                );
            }
            FaceConnection::Interior(nb) => nb,
        };
        let key = FaceKey::new(nb.local_id, nb.associated_face, angle);
        let missing = |location: LocationId| SweepError::ConnectivityError {
            location: me,
            neighbor_location: location,
            detail: format!(
                "cell {} face {face} angle {angle} has no upwind value from cell {}",
                cell.local_id, nb.local_id
            ),
        };

        if nb.location == me {
            if self.plan.is_delayed_local_edge(nb.local_id, cell.local_id) {
                out.extend_from_slice(self.fluds.lagged_local(&key));
            } else {
                out.extend_from_slice(self.fluds.local(&key).ok_or_else(|| missing(me))?);
            }
            return Ok(());
        }

        match self.plan.dependency_slot(nb.location, cell.local_id, face)? {
            DepSlot::Live(slot) => out.extend_from_slice(
                self.fluds
                    .upstream(slot, &key)
                    .ok_or_else(|| missing(nb.location))?,
            ),
            DepSlot::Delayed(slot) => out.extend_from_slice(self.fluds.delayed_upstream(slot, &key)),
        }
        Ok(())
    }

    fn deposit_downwind<C: Communicator>(
        &mut self,
        ctx: &mut SweepContext<'_, C>,
        cell: &CellView,
        face: usize,
        angle: usize,
        values: Vec<f64>,
    ) -> Result<()> {
        let key = FaceKey::new(cell.local_id, face, angle);
        match &cell.faces[face].connection {
            FaceConnection::Boundary { boundary_id } => {
                ctx.boundaries.deposit(*boundary_id, key, &values)
            }
            FaceConnection::Interior(nb) if nb.location == ctx.mesh.location_id() => {
                self.fluds.store_local(key, values);
                Ok(())
            }
            FaceConnection::Interior(nb) => {
                let slot = self.plan.successor_slot(nb.location, cell.local_id, face)?;
                self.fluds.push_downstream(
                    slot,
                    FaceRecord {
                        cell_local_id: cell.local_id,
                        face_index: face,
                        angle_index: angle,
                        values,
                    },
                );
                Ok(())
            }
        }
    }

    fn post_outgoing<C: Communicator>(&mut self, mailbox: &mut Mailbox<C>, round: u64) -> Result<()> {
        let (live, delayed) = self.fluds.take_downstream();
        let deps = &self.plan.dependencies;
        for (records, &dest) in live.into_iter().zip(deps.location_successors.iter()) {
            self.post_parts(mailbox, dest, round, false, records)?;
        }
        for (records, &dest) in delayed.into_iter().zip(deps.delayed_location_successors.iter()) {
            self.post_parts(mailbox, dest, round, true, records)?;
        }
        Ok(())
    }

    /// Split one successor's payload into exactly `max_buffer_messages` parts.
    fn post_parts<C: Communicator>(
        &self,
        mailbox: &mut Mailbox<C>,
        destination: LocationId,
        round: u64,
        delayed: bool,
        records: Vec<FaceRecord>,
    ) -> Result<()> {
        let parts = self.max_buffer_messages;
        let required = records.len().div_ceil(self.message_face_limit);
        if required > parts {
            return Err(SweepError::BufferOverrun {
                angle_set: self.id,
                requested: required,
                negotiated: parts,
            });
        }

        let source = mailbox.location_id();
        let per_part = records.len().div_ceil(parts).max(1);
        trace!(
            angle_set = self.id,
            destination,
            delayed,
            records = records.len(),
            parts,
            "posting face data"
        );
        let mut records = records.into_iter();
        for part in 0..parts {
            let chunk: Vec<FaceRecord> = records.by_ref().take(per_part).collect();
            mailbox.post(FluxMessage {
                tag: MessageTag {
                    source,
                    destination,
                    round,
                    angle_set: self.id,
                    part,
                    delayed,
                },
                records: chunk,
            })?;
        }
        Ok(())
    }

    /// Retry every queued send; returns true while any remain.
    pub fn flush_send_buffers<C: Communicator>(&mut self, mailbox: &mut Mailbox<C>) -> Result<bool> {
        let live = mailbox.flush(self.id, false)?;
        let delayed = mailbox.flush(self.id, true)?;
        Ok(live + delayed > 0)
    }

    /// Collect delayed-dependency data for the next sweep.
    ///
    /// Returns true once every delayed dependency delivered all its parts.
    pub fn receive_delayed_data<C: Communicator>(
        &mut self,
        mailbox: &mut Mailbox<C>,
        round: u64,
    ) -> Result<bool> {
        mailbox.poll()?;
        for (slot, &source) in self
            .plan
            .dependencies
            .delayed_location_dependencies
            .iter()
            .enumerate()
        {
            let key = InboxKey {
                angle_set: self.id,
                round,
                source,
                delayed: true,
            };
            for message in mailbox.take(&key) {
                self.delayed_parts[slot] += 1;
                self.check_parts(self.delayed_parts[slot])?;
                self.fluds.absorb_delayed(slot, message.records);
            }
        }
        Ok(self
            .delayed_parts
            .iter()
            .all(|&n| n >= self.max_buffer_messages))
    }

    /// Locations this set is still waiting on or still sending to.
    pub fn pending_locations<C: Communicator>(&self, mailbox: &Mailbox<C>) -> Vec<LocationId> {
        let deps = &self.plan.dependencies;
        let mut out: Vec<LocationId> = Vec::new();
        if !self.executed {
            out.extend(
                deps.location_dependencies
                    .iter()
                    .zip(&self.live_parts)
                    .filter(|(_, n)| **n < self.max_buffer_messages)
                    .map(|(l, _)| *l),
            );
        }
        out.extend(
            deps.delayed_location_dependencies
                .iter()
                .zip(&self.delayed_parts)
                .filter(|(_, n)| **n < self.max_buffer_messages)
                .map(|(l, _)| *l),
        );
        out.extend(mailbox.pending_destinations(self.id));
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Ready the set for the next sweep; lagged data is kept.
    pub fn reset_sweep(&mut self) {
        self.status = AngleSetStatus::NotFinished;
        self.executed = false;
        self.live_parts.iter_mut().for_each(|n| *n = 0);
        self.delayed_parts.iter_mut().for_each(|n| *n = 0);
        self.fluds.reset();
    }
}
