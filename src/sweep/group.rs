// src/sweep/group.rs

use crate::comm::Communicator;
use crate::errors::Result;
use crate::exec::SweepChunk;
use crate::sweep::angle_set::{AngleSet, SweepContext};
use crate::types::AngleSetStatus;

/// Angle sets of one octant, advanced one after another.
#[derive(Debug)]
pub struct AngleSetGroup {
    id: usize,
    angle_sets: Vec<AngleSet>,
    current_angle_set: usize,
}

impl AngleSetGroup {
    pub fn new(id: usize, angle_sets: Vec<AngleSet>) -> Self {
        Self {
            id,
            angle_sets,
            current_angle_set: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn angle_sets(&self) -> &[AngleSet] {
        &self.angle_sets
    }

    pub fn angle_sets_mut(&mut self) -> &mut [AngleSet] {
        &mut self.angle_sets
    }

    pub fn current_angle_set(&self) -> usize {
        self.current_angle_set
    }

    /// Advance the current angle set; `Finished` once all of them are.
    pub fn advance<C: Communicator>(
        &mut self,
        ctx: &mut SweepContext<'_, C>,
        chunk: &mut dyn SweepChunk,
    ) -> Result<AngleSetStatus> {
        let Some(set) = self.angle_sets.get_mut(self.current_angle_set) else {
            return Ok(AngleSetStatus::Finished);
        };
        if set.advance(ctx, chunk)?.is_finished() {
            self.current_angle_set += 1;
            if self.current_angle_set >= self.angle_sets.len() {
                return Ok(AngleSetStatus::Finished);
            }
        }
        Ok(AngleSetStatus::NotFinished)
    }

    pub fn reset_sweep(&mut self) {
        self.current_angle_set = 0;
        self.angle_sets.iter_mut().for_each(AngleSet::reset_sweep);
    }
}
