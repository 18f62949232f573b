// src/sweep/fluds.rs

//! Flux data storage (FLUDS) for one angle set.
//!
//! Values are always keyed by the producing side `(cell, face, angle)`; a
//! reader translates its own face into the upwind cell's face through the
//! mesh's associated-face index.
//!
//! Three kinds of storage live here:
//!
//! - local: faces between cells of this partition, plus the previous
//!   sweep's snapshot read across cycle-broken local edges,
//! - upstream: records received from live and delayed dependencies,
//! - downstream: records produced for each successor, drained into
//!   messages once the chunk has run.

use std::collections::HashMap;
use std::mem;

use crate::comm::FaceRecord;
use crate::dag::{DepSlot, DependencySet};
use crate::types::CellIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceKey {
    pub cell: CellIndex,
    pub face: usize,
    pub angle: usize,
}

impl FaceKey {
    pub fn new(cell: CellIndex, face: usize, angle: usize) -> Self {
        Self { cell, face, angle }
    }
}

impl From<&FaceRecord> for FaceKey {
    fn from(r: &FaceRecord) -> Self {
        Self::new(r.cell_local_id, r.face_index, r.angle_index)
    }
}

pub type FaceTable = HashMap<FaceKey, Vec<f64>>;

fn absorb(table: &mut FaceTable, records: Vec<FaceRecord>) {
    for r in records {
        let key = FaceKey::from(&r);
        table.insert(key, r.values);
    }
}

#[derive(Debug, Clone)]
pub struct Fluds {
    zeros: Vec<f64>,
    local: FaceTable,
    previous_local: FaceTable,
    upstream: Vec<FaceTable>,
    /// Filled during this sweep's drain; read next sweep.
    delayed_upstream: Vec<FaceTable>,
    /// What delayed dependencies sent last sweep.
    previous_delayed_upstream: Vec<FaceTable>,
    downstream: Vec<Vec<FaceRecord>>,
    delayed_downstream: Vec<Vec<FaceRecord>>,
}

impl Fluds {
    pub fn new(num_groups: usize, deps: &DependencySet) -> Self {
        let tables = |n: usize| vec![FaceTable::new(); n];
        Self {
            zeros: vec![0.0; num_groups],
            local: FaceTable::new(),
            previous_local: FaceTable::new(),
            upstream: tables(deps.location_dependencies.len()),
            delayed_upstream: tables(deps.delayed_location_dependencies.len()),
            previous_delayed_upstream: tables(deps.delayed_location_dependencies.len()),
            downstream: vec![Vec::new(); deps.location_successors.len()],
            delayed_downstream: vec![Vec::new(); deps.delayed_location_successors.len()],
        }
    }

    pub fn store_local(&mut self, key: FaceKey, values: Vec<f64>) {
        self.local.insert(key, values);
    }

    pub fn local(&self, key: &FaceKey) -> Option<&[f64]> {
        self.local.get(key).map(Vec::as_slice)
    }

    /// Previous sweep's local value; zero before the first sweep.
    pub fn lagged_local(&self, key: &FaceKey) -> &[f64] {
        self.previous_local.get(key).map_or(self.zeros.as_slice(), Vec::as_slice)
    }

    pub fn absorb_upstream(&mut self, slot: usize, records: Vec<FaceRecord>) {
        if let Some(table) = self.upstream.get_mut(slot) {
            absorb(table, records);
        }
    }

    pub fn upstream(&self, slot: usize, key: &FaceKey) -> Option<&[f64]> {
        self.upstream.get(slot)?.get(key).map(Vec::as_slice)
    }

    pub fn absorb_delayed(&mut self, slot: usize, records: Vec<FaceRecord>) {
        if let Some(table) = self.delayed_upstream.get_mut(slot) {
            absorb(table, records);
        }
    }

    /// Previous sweep's delayed value; zero before the first sweep.
    pub fn delayed_upstream(&self, slot: usize, key: &FaceKey) -> &[f64] {
        self.previous_delayed_upstream
            .get(slot)
            .and_then(|t| t.get(key))
            .map_or(self.zeros.as_slice(), Vec::as_slice)
    }

    pub fn push_downstream(&mut self, slot: DepSlot, record: FaceRecord) {
        let list = match slot {
            DepSlot::Live(i) => self.downstream.get_mut(i),
            DepSlot::Delayed(i) => self.delayed_downstream.get_mut(i),
        };
        if let Some(list) = list {
            list.push(record);
        }
    }

    /// Drain produced records as `(live, delayed)`, one list per successor.
    pub fn take_downstream(&mut self) -> (Vec<Vec<FaceRecord>>, Vec<Vec<FaceRecord>>) {
        let live = self.downstream.iter_mut().map(mem::take).collect();
        let delayed = self.delayed_downstream.iter_mut().map(mem::take).collect();
        (live, delayed)
    }

    /// Rotate lagged snapshots and clear live storage for the next sweep.
    pub fn reset(&mut self) {
        self.previous_local = mem::take(&mut self.local);
        for (prev, cur) in self
            .previous_delayed_upstream
            .iter_mut()
            .zip(self.delayed_upstream.iter_mut())
        {
            *prev = mem::take(cur);
        }
        self.upstream.iter_mut().for_each(FaceTable::clear);
        self.downstream.iter_mut().for_each(Vec::clear);
        self.delayed_downstream.iter_mut().for_each(Vec::clear);
    }
}
